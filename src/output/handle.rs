//! Deferred output handles.
//!
//! An [`OutputHandle`] refers to one attribute of a declaration's
//! realized outputs before that value exists. Handles are created by the
//! graph builder when a resource is declared, embedded in later
//! declarations' properties, and resolved through the
//! [`OutputResolver`](super::OutputResolver) once the producer has been
//! realized.

use std::sync::Arc;

use crate::graph::{NodeId, ResourceIdent};

/// Shared inner state of a handle.
#[derive(Debug)]
struct HandleInner {
    /// Producing declaration.
    node: NodeId,
    /// Identity of the producing declaration.
    ident: ResourceIdent,
    /// Output attribute name.
    attribute: String,
}

/// A deferred, read-only reference to a value produced by realizing a
/// resource declaration.
///
/// Handles are cheap to clone and may be held by many declarations at
/// once; all clones refer to the same producer attribute.
#[derive(Debug, Clone)]
pub struct OutputHandle {
    inner: Arc<HandleInner>,
}

impl OutputHandle {
    /// Creates a handle for one output attribute of a declaration.
    pub(crate) fn new(node: NodeId, ident: ResourceIdent, attribute: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                node,
                ident,
                attribute: attribute.into(),
            }),
        }
    }

    /// Returns the producing node.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    /// Returns the identity of the producing declaration.
    #[must_use]
    pub fn producer(&self) -> &ResourceIdent {
        &self.inner.ident
    }

    /// Returns the output attribute name.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.inner.attribute
    }
}

impl PartialEq for OutputHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.node == other.inner.node && self.inner.attribute == other.inner.attribute
    }
}

impl Eq for OutputHandle {}

impl std::hash::Hash for OutputHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.node.hash(state);
        self.inner.attribute.hash(state);
    }
}

impl std::fmt::Display for OutputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.inner.ident, self.inner.attribute)
    }
}
