//! Deployment report types.
//!
//! A realization run always produces a report, even on partial failure:
//! one outcome per declaration, in insertion order, plus run-level
//! metadata.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::graph::ResourceIdent;

/// Terminal status of one declaration after a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationStatus {
    /// The declaration was realized successfully.
    Succeeded,
    /// The realization itself failed.
    Failed,
    /// A dependency failed, so the declaration was never submitted.
    Blocked,
    /// The deployment was aborted before the declaration was submitted,
    /// or its in-flight result was discarded.
    Cancelled,
}

/// Outcome of one declaration.
#[derive(Debug, Clone, Serialize)]
pub struct DeclarationOutcome {
    /// Identity of the declaration.
    pub ident: ResourceIdent,
    /// Terminal status.
    pub status: DeclarationStatus,
    /// Engine-side resource id (when realized).
    pub resource_id: Option<String>,
    /// Error message (when failed or blocked).
    pub error: Option<String>,
    /// Wall time spent realizing, in milliseconds (when submitted).
    pub duration_ms: Option<u64>,
}

/// Report of one full deployment run.
#[derive(Debug, Serialize)]
pub struct DeploymentReport {
    /// Unique id of this run.
    pub deployment_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-declaration outcomes, in insertion order.
    pub outcomes: Vec<DeclarationOutcome>,
}

impl DeploymentReport {
    /// Returns the number of declarations with the given status.
    #[must_use]
    pub fn count(&self, status: DeclarationStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Returns true if every declaration realized successfully.
    #[must_use]
    pub fn success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status == DeclarationStatus::Succeeded)
    }

    /// Returns true if some declarations realized while others did not.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.success() && self.count(DeclarationStatus::Succeeded) > 0
    }

    /// Returns the outcome for a declaration identity, if present.
    #[must_use]
    pub fn outcome(&self, ident: &ResourceIdent) -> Option<&DeclarationOutcome> {
        self.outcomes.iter().find(|o| &o.ident == ident)
    }
}

impl std::fmt::Display for DeclarationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{status}")
    }
}

impl std::fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Realized {} declarations: {} succeeded, {} failed, {} blocked, {} cancelled",
            self.outcomes.len(),
            self.count(DeclarationStatus::Succeeded),
            self.count(DeclarationStatus::Failed),
            self.count(DeclarationStatus::Blocked),
            self.count(DeclarationStatus::Cancelled),
        )
    }
}
