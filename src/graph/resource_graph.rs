//! Immutable resource graph.
//!
//! A [`ResourceGraph`] is the output of the builder's `build()` step: the
//! full set of declarations plus their dependency edges, frozen before
//! the realization phase begins. The graph is read-only thereafter and
//! may be shared freely across realization tasks.

use std::collections::HashMap;

use super::declaration::{ResourceDeclaration, ResourceIdent};

/// Opaque identifier of a declaration within one graph.
///
/// Ids are assigned in insertion order, which is also the tie-break
/// order for otherwise-independent declarations during realization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the zero-based insertion index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a dependency edge was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Listed in the declaration's explicit dependency list.
    Explicit,
    /// Inferred from an output handle embedded in the properties.
    Implicit,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Implicit => write!(f, "implicit"),
        }
    }
}

/// A dependency edge from one declaration to one of its prerequisites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    /// The prerequisite declaration.
    pub on: NodeId,
    /// How the edge was derived.
    pub kind: EdgeKind,
}

/// An immutable, acyclic graph of resource declarations.
#[derive(Debug)]
pub struct ResourceGraph {
    /// Declarations in insertion order.
    nodes: Vec<ResourceDeclaration>,
    /// Per-node dependency edges.
    dependencies: Vec<Vec<DependencyEdge>>,
    /// Per-node reverse edges (who depends on this node).
    dependents: Vec<Vec<NodeId>>,
    /// A valid topological order, stable by insertion order.
    order: Vec<NodeId>,
    /// Identity lookup.
    index: HashMap<ResourceIdent, NodeId>,
}

impl ResourceGraph {
    pub(crate) fn new(
        nodes: Vec<ResourceDeclaration>,
        dependencies: Vec<Vec<DependencyEdge>>,
        dependents: Vec<Vec<NodeId>>,
        order: Vec<NodeId>,
        index: HashMap<ResourceIdent, NodeId>,
    ) -> Self {
        Self {
            nodes,
            dependencies,
            dependents,
            order,
            index,
        }
    }

    /// Returns the number of declarations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph holds no declarations.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the declaration for a node.
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this graph.
    #[must_use]
    pub fn declaration(&self, id: NodeId) -> &ResourceDeclaration {
        &self.nodes[id.0]
    }

    /// Looks up a node by identity.
    #[must_use]
    pub fn lookup(&self, ident: &ResourceIdent) -> Option<NodeId> {
        self.index.get(ident).copied()
    }

    /// Returns node ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Returns all declarations in insertion order.
    #[must_use]
    pub fn declarations(&self) -> &[ResourceDeclaration] {
        &self.nodes
    }

    /// Returns the dependency edges of a node.
    #[must_use]
    pub fn dependencies(&self, id: NodeId) -> &[DependencyEdge] {
        &self.dependencies[id.0]
    }

    /// Returns the nodes that depend on the given node.
    #[must_use]
    pub fn dependents(&self, id: NodeId) -> &[NodeId] {
        &self.dependents[id.0]
    }

    /// Returns a valid topological execution order.
    ///
    /// Declarations with no mutual dependency appear in insertion order.
    #[must_use]
    pub fn execution_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Returns the nodes with no dependencies, in insertion order.
    #[must_use]
    pub fn roots(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|id| self.dependencies[id.0].is_empty())
            .collect()
    }

    /// Returns the number of dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.dependencies.iter().map(Vec::len).sum()
    }
}

impl std::fmt::Display for ResourceGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Resource graph: {} declarations, {} edges",
            self.len(),
            self.edge_count()
        )?;
        for id in self.execution_order() {
            let decl = self.declaration(*id);
            if self.dependencies(*id).is_empty() {
                writeln!(f, "  {decl}")?;
            } else {
                let deps: Vec<String> = self
                    .dependencies(*id)
                    .iter()
                    .map(|e| self.declaration(e.on).to_string())
                    .collect();
                writeln!(f, "  {decl} (after {})", deps.join(", "))?;
            }
        }
        Ok(())
    }
}
