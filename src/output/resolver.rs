//! Asynchronous output resolution.
//!
//! During realization each declaration owns one output slot. The slot
//! starts `Pending`, transitions exactly once to a terminal state, and
//! every clone of the resolver observes the same cached value
//! afterwards. `resolve` is a suspension point: the calling task yields
//! until the producer's slot leaves `Pending`, without blocking
//! unrelated work.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

use crate::error::{DeployError, Result, TerraliftError};
use crate::graph::{NodeId, PropertyMap, PropertyValue, ResourceGraph};

use super::handle::OutputHandle;

/// Realized output attributes of one declaration.
pub type OutputMap = HashMap<String, serde_json::Value>;

/// State of one declaration's output slot.
#[derive(Debug, Clone)]
enum OutputSlot {
    /// The producer has not finished realizing.
    Pending,
    /// The producer realized successfully.
    Ready(Arc<OutputMap>),
    /// The producer's realization failed.
    Failed(Arc<str>),
    /// The producer was never submitted because a dependency failed.
    Blocked(Arc<str>),
    /// The producer was cancelled before realization.
    Cancelled,
}

/// Resolver for deferred output handles.
///
/// Cheap to clone; all clones share the same slots. One resolver is
/// created per deployment, sized to the graph being realized.
#[derive(Debug, Clone)]
pub struct OutputResolver {
    slots: Arc<Vec<watch::Sender<OutputSlot>>>,
}

impl OutputResolver {
    /// Creates a resolver with one pending slot per graph node.
    #[must_use]
    pub fn for_graph(graph: &ResourceGraph) -> Self {
        let slots = (0..graph.len())
            .map(|_| watch::Sender::new(OutputSlot::Pending))
            .collect();
        Self {
            slots: Arc::new(slots),
        }
    }

    /// Publishes the realized outputs of a declaration.
    ///
    /// The first terminal state wins; later writes are ignored so that
    /// every waiter observes one realization at most.
    pub fn complete(&self, node: NodeId, outputs: OutputMap) {
        trace!(node = %node, "Publishing realized outputs");
        self.settle(node, OutputSlot::Ready(Arc::new(outputs)));
    }

    /// Marks a declaration's realization as failed.
    pub fn fail(&self, node: NodeId, reason: &str) {
        self.settle(node, OutputSlot::Failed(Arc::from(reason)));
    }

    /// Marks a declaration as blocked by a failed dependency.
    pub fn block(&self, node: NodeId, reason: &str) {
        self.settle(node, OutputSlot::Blocked(Arc::from(reason)));
    }

    /// Marks a declaration as cancelled.
    pub fn cancel(&self, node: NodeId) {
        self.settle(node, OutputSlot::Cancelled);
    }

    fn settle(&self, node: NodeId, next: OutputSlot) {
        if let Some(sender) = self.slots.get(node.index()) {
            sender.send_if_modified(|slot| {
                if matches!(slot, OutputSlot::Pending) {
                    *slot = next;
                    true
                } else {
                    false
                }
            });
        }
    }

    /// Resolves a handle to its concrete value.
    ///
    /// Suspends until the producing declaration has been realized, then
    /// yields the produced value. Repeated resolution of the same handle
    /// returns the same cached value.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::UnresolvedDependency`] if the producer
    /// failed, was blocked, or was cancelled, and
    /// [`DeployError::MissingOutput`] if the producer realized without
    /// emitting the requested attribute.
    pub async fn resolve(&self, handle: &OutputHandle) -> Result<serde_json::Value> {
        let sender = self.slots.get(handle.node().index()).ok_or_else(|| {
            TerraliftError::internal(format!(
                "output handle '{handle}' does not belong to this deployment"
            ))
        })?;

        let mut receiver = sender.subscribe();
        let slot = receiver
            .wait_for(|slot| !matches!(slot, OutputSlot::Pending))
            .await
            .map_err(|_| TerraliftError::internal("output slot closed while pending"))?
            .clone();

        match slot {
            OutputSlot::Ready(outputs) => outputs.get(handle.attribute()).cloned().ok_or_else(|| {
                TerraliftError::Deploy(DeployError::MissingOutput {
                    producer: handle.producer().to_string(),
                    attribute: handle.attribute().to_string(),
                })
            }),
            OutputSlot::Failed(reason) => Err(TerraliftError::Deploy(DeployError::unresolved(
                handle.to_string(),
                format!("realization failed: {reason}"),
            ))),
            OutputSlot::Blocked(reason) => Err(TerraliftError::Deploy(DeployError::unresolved(
                handle.to_string(),
                format!("blocked: {reason}"),
            ))),
            OutputSlot::Cancelled => Err(TerraliftError::Deploy(DeployError::unresolved(
                handle.to_string(),
                "deployment was cancelled",
            ))),
            OutputSlot::Pending => unreachable!("wait_for filters pending slots"),
        }
    }

    /// Resolves every handle embedded in a property mapping and returns
    /// the fully-literal JSON object submitted to the engine.
    ///
    /// # Errors
    ///
    /// Propagates the first resolution error encountered.
    pub async fn resolve_properties(
        &self,
        properties: &PropertyMap,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut resolved: HashMap<OutputHandle, serde_json::Value> = HashMap::new();
        for handle in crate::graph::collect_handles(properties) {
            let value = self.resolve(&handle).await?;
            resolved.insert(handle, value);
        }

        let mut object = serde_json::Map::new();
        for (key, value) in properties {
            object.insert(key.clone(), substitute(value, &resolved));
        }
        Ok(object)
    }
}

/// Replaces output handles with their resolved values.
fn substitute(
    value: &PropertyValue,
    resolved: &HashMap<OutputHandle, serde_json::Value>,
) -> serde_json::Value {
    match value {
        PropertyValue::Output(handle) => resolved
            .get(handle)
            .cloned()
            .unwrap_or(serde_json::Value::Null),
        PropertyValue::List(items) => {
            serde_json::Value::Array(items.iter().map(|v| substitute(v, resolved)).collect())
        }
        PropertyValue::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, resolved)))
                .collect(),
        ),
        literal => literal.to_canonical_json(),
    }
}
