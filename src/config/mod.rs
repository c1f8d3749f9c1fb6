//! Configuration module for the Terralift stack format.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `terralift.stack.yaml`
//! - Validation of configuration values and reference well-formedness
//! - Parsing `${resource.attribute}` output references

mod spec;
mod parser;
mod validator;

pub use spec::{EngineConfig, OutputRef, ProjectConfig, ResourceConfig, StackConfig};
pub use parser::{ConfigParser, find_config_file, DEFAULT_CONFIG_FILES};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
