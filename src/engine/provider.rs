//! Deployment engine trait definition.
//!
//! The engine is an external collaborator: it receives one fully
//! resolved declaration at a time and realizes the actual resource.
//! Diffing against recorded state, retries, and retirement of removed
//! resources all live behind this seam.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::graph::ResourceDeclaration;
use crate::output::OutputMap;

/// Result of realizing a single declaration.
#[derive(Debug, Clone)]
pub struct RealizedResource {
    /// Opaque engine-side identifier of the created/updated resource.
    pub resource_id: String,
    /// Output attributes produced by the realization.
    pub outputs: OutputMap,
}

/// Trait for deployment engine backends.
#[async_trait]
pub trait DeploymentEngine: Send + Sync {
    /// Realizes one declaration.
    ///
    /// `properties` is the declaration's property mapping with every
    /// output handle already replaced by its concrete value.
    async fn realize(
        &self,
        declaration: &ResourceDeclaration,
        properties: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<RealizedResource>;

    /// Gets the engine backend name.
    fn engine_type(&self) -> &'static str;
}

#[async_trait]
impl DeploymentEngine for Arc<dyn DeploymentEngine> {
    async fn realize(
        &self,
        declaration: &ResourceDeclaration,
        properties: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<RealizedResource> {
        (**self).realize(declaration, properties).await
    }

    fn engine_type(&self) -> &'static str {
        (**self).engine_type()
    }
}
