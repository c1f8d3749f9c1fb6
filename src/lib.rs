// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Terralift
//!
//! Declarative resource-graph provisioning for cloud deployments.
//!
//! ## Overview
//!
//! Terralift turns a declarative stack description into a dependency
//! graph and realizes it through a deployment engine:
//!
//! - Declare resources and their configuration in a YAML stack file
//! - Dependencies are inferred from output references and declared lists
//! - Independent resources realize concurrently, in dependency order
//! - A failure blocks only its dependents; the rest of the stack finishes
//!
//! ## Architecture
//!
//! A deployment has two strictly separated phases:
//!
//! 1. **Construction**: declarations are inserted into a builder which
//!    derives dependency edges and produces an immutable, acyclic graph.
//! 2. **Realization**: the orchestrator submits each declaration to the
//!    engine once its dependencies have realized, resolving deferred
//!    output references along the way.
//!
//! ## Modules
//!
//! - [`config`]: Stack file parsing and validation
//! - [`graph`]: Declarations, the graph builder, and the resource graph
//! - [`output`]: Deferred output handles and the async resolver
//! - [`engine`]: Engine client, orchestrator, and deployment reports
//! - [`stack`]: Compilation from configuration to a deployable stack
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: files-api
//!   environment: prod
//!
//! resources:
//!   - type: filesystem
//!     name: storage
//!   - type: gateway
//!     name: api
//!     properties:
//!       upstream: ${storage.id}
//!
//! outputs:
//!   url: ${api.url}
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod output;
pub mod stack;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, StackConfig};
pub use engine::{
    DeploymentEngine, DeploymentReport, HttpEngineClient, Orchestrator, RealizedResource,
};
pub use error::{Result, TerraliftError};
pub use graph::{
    PropertyValue, ResourceDeclaration, ResourceGraph, ResourceGraphBuilder, ResourceIdent,
};
pub use output::{OutputHandle, OutputResolver};
pub use stack::{Stack, StackDeployment};
