//! CLI module for the Terralift provisioning tool.
//!
//! This module provides the command-line interface for validating,
//! inspecting, and deploying stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
