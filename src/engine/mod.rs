//! Deployment engine integration and realization orchestration.
//!
//! The engine itself is an external collaborator reachable through a
//! declare-resource capability. This module provides the trait seam,
//! the HTTP client backend, the concurrent orchestrator that realizes a
//! graph in dependency order, and the report describing each run.

mod http;
mod orchestrator;
mod provider;
mod report;

pub use http::HttpEngineClient;
pub use orchestrator::{cancellation, CancelToken, Canceller, Orchestrator};
pub use provider::{DeploymentEngine, RealizedResource};
pub use report::{DeclarationOutcome, DeclarationStatus, DeploymentReport};
