//! Resource graph construction.
//!
//! The builder accepts an ordered sequence of resource declarations,
//! derives implicit dependency edges from output handles embedded in
//! their properties, merges them with each declaration's explicit
//! dependency list, and produces an immutable [`ResourceGraph`] via an
//! explicit `build()` step. Construction is synchronous and has no side
//! effects beyond the builder itself; no engine calls happen here.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, BTreeMap, HashMap};
use tracing::debug;

use crate::error::{GraphError, Result, TerraliftError};
use crate::output::OutputHandle;

use super::declaration::{ResourceDeclaration, ResourceIdent};
use super::resource_graph::{DependencyEdge, EdgeKind, NodeId, ResourceGraph};
use super::visitor::collect_handles;

/// Builder for an acyclic graph of resource declarations.
#[derive(Debug, Default)]
pub struct ResourceGraphBuilder {
    /// Declarations in insertion order.
    nodes: Vec<ResourceDeclaration>,
    /// Per-node dependency edges.
    dependencies: Vec<Vec<DependencyEdge>>,
    /// Identity lookup.
    index: HashMap<ResourceIdent, NodeId>,
}

/// A declaration inserted into the builder.
///
/// Serves as the factory for output handles referring to the
/// declaration's eventual realized outputs.
#[derive(Debug, Clone)]
pub struct DeclaredResource {
    id: NodeId,
    ident: ResourceIdent,
}

impl DeclaredResource {
    /// Returns the node id assigned by the builder.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the declaration identity.
    #[must_use]
    pub const fn ident(&self) -> &ResourceIdent {
        &self.ident
    }

    /// Creates a deferred handle to one of this declaration's output
    /// attributes.
    #[must_use]
    pub fn output(&self, attribute: impl Into<String>) -> OutputHandle {
        OutputHandle::new(self.id, self.ident.clone(), attribute)
    }
}

impl ResourceGraphBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of declarations inserted so far.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no declarations have been inserted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts a declaration and derives its dependency edges.
    ///
    /// Implicit edges are inferred from every output handle reachable in
    /// the property mapping; explicit edges come from the declaration's
    /// dependency list. When both name the same prerequisite the edge is
    /// recorded once, as explicit.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateName`] if a declaration with the
    /// same (type, name) identity already exists,
    /// [`GraphError::UnknownDependency`] if an explicit dependency names
    /// an undeclared resource, and [`GraphError::ForeignHandle`] if an
    /// embedded handle was not created by this builder.
    pub fn declare(&mut self, declaration: ResourceDeclaration) -> Result<DeclaredResource> {
        if self.index.contains_key(declaration.ident()) {
            return Err(TerraliftError::Graph(GraphError::DuplicateName {
                resource_type: declaration.resource_type().to_string(),
                name: declaration.name().to_string(),
            }));
        }

        // Handles can only point at already-inserted declarations, so
        // derived edges never form a cycle here. A handle minted by a
        // different builder is caught by its producer identity, not
        // just its index. Targets are collected before the node is
        // inserted to keep a failed declare() from mutating the builder.
        let mut edges: BTreeMap<NodeId, EdgeKind> = BTreeMap::new();

        for handle in collect_handles(declaration.properties()) {
            let known = self
                .nodes
                .get(handle.node().index())
                .is_some_and(|producer| producer.ident() == handle.producer());
            if !known {
                return Err(TerraliftError::Graph(GraphError::ForeignHandle {
                    handle: handle.to_string(),
                }));
            }
            edges.entry(handle.node()).or_insert(EdgeKind::Implicit);
        }

        for target in declaration.depends_on() {
            let Some(&node) = self.index.get(target) else {
                return Err(TerraliftError::Graph(GraphError::UnknownDependency {
                    reference: target.to_string(),
                }));
            };
            edges.insert(node, EdgeKind::Explicit);
        }

        let id = NodeId(self.nodes.len());
        let declared = DeclaredResource {
            id,
            ident: declaration.ident().clone(),
        };

        debug!(
            resource = %declaration.ident(),
            dependencies = edges.len(),
            "Declared resource"
        );

        self.index.insert(declaration.ident().clone(), id);
        self.nodes.push(declaration);
        self.dependencies.push(
            edges
                .into_iter()
                .map(|(on, kind)| DependencyEdge { on, kind })
                .collect(),
        );

        Ok(declared)
    }

    /// Adds an explicit ordering constraint: `from` realizes only after
    /// `on` has succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownDependency`] if either identity is
    /// not declared, and [`GraphError::Cycle`] if the edge would create
    /// a dependency cycle. On error the builder is left unchanged.
    pub fn add_dependency(&mut self, from: &ResourceIdent, on: &ResourceIdent) -> Result<()> {
        let from_id = self.resolve(from)?;
        let on_id = self.resolve(on)?;

        if from_id == on_id {
            return Err(TerraliftError::Graph(GraphError::Cycle {
                path: format!("{from} -> {from}"),
            }));
        }

        if self.dependencies[from_id.index()]
            .iter()
            .any(|edge| edge.on == on_id)
        {
            return Ok(());
        }

        // The edge "from depends on on" closes a cycle exactly when
        // `on` already depends, transitively, on `from`.
        if let Some(path) = self.dependency_path(on_id, from_id) {
            let mut names: Vec<String> = vec![self.nodes[from_id.index()].ident().to_string()];
            names.extend(path.iter().map(|id| self.nodes[id.index()].ident().to_string()));
            return Err(TerraliftError::Graph(GraphError::Cycle {
                path: names.join(" -> "),
            }));
        }

        self.dependencies[from_id.index()].push(DependencyEdge {
            on: on_id,
            kind: EdgeKind::Explicit,
        });
        Ok(())
    }

    /// Finalizes the builder into an immutable graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] if the accumulated edges do not
    /// form a directed acyclic graph.
    pub fn build(self) -> Result<ResourceGraph> {
        let order = self.topological_order()?;

        let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];
        for (idx, edges) in self.dependencies.iter().enumerate() {
            for edge in edges {
                dependents[edge.on.index()].push(NodeId(idx));
            }
        }

        debug!(
            declarations = self.nodes.len(),
            "Built resource graph"
        );

        Ok(ResourceGraph::new(
            self.nodes,
            self.dependencies,
            dependents,
            order,
            self.index,
        ))
    }

    /// Looks up a declared identity.
    fn resolve(&self, ident: &ResourceIdent) -> Result<NodeId> {
        self.index.get(ident).copied().ok_or_else(|| {
            TerraliftError::Graph(GraphError::UnknownDependency {
                reference: ident.to_string(),
            })
        })
    }

    /// Returns a dependency path from `start` to `target`, if one
    /// exists, following dependency edges depth-first.
    fn dependency_path(&self, start: NodeId, target: NodeId) -> Option<Vec<NodeId>> {
        let mut stack = vec![vec![start]];
        let mut visited = vec![false; self.nodes.len()];

        while let Some(path) = stack.pop() {
            let current = *path.last()?;
            if current == target {
                return Some(path);
            }
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;

            for edge in &self.dependencies[current.index()] {
                let mut next = path.clone();
                next.push(edge.on);
                stack.push(next);
            }
        }

        None
    }

    /// Kahn's algorithm with a min-heap so that simultaneously-ready
    /// declarations come out in insertion order.
    fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (idx, edges) in self.dependencies.iter().enumerate() {
            for edge in edges {
                dependents[edge.on.index()].push(idx);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(NodeId(idx));
            for &dependent in &dependents[idx] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            let stuck: Vec<String> = remaining
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(idx, _)| self.nodes[idx].ident().to_string())
                .collect();
            Err(TerraliftError::Graph(GraphError::Cycle {
                path: stuck.join(" -> "),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerraliftError;
    use crate::graph::EdgeKind;

    fn decl(resource_type: &str, name: &str) -> ResourceDeclaration {
        ResourceDeclaration::new(resource_type, name)
    }

    #[test]
    fn test_acyclic_graph_yields_topological_order() {
        let mut builder = ResourceGraphBuilder::new();
        let network = builder.declare(decl("network", "vpc")).unwrap();
        let storage = builder.declare(decl("filesystem", "storage")).unwrap();
        builder
            .declare(
                decl("mount-target", "mount")
                    .with_property("filesystem_id", storage.output("id"))
                    .with_property("subnet_id", network.output("subnet_id")),
            )
            .unwrap();

        let graph = builder.build().unwrap();
        let order: Vec<usize> = graph.execution_order().iter().map(|id| id.index()).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_independent_declarations_keep_insertion_order() {
        let mut builder = ResourceGraphBuilder::new();
        builder.declare(decl("network", "c")).unwrap();
        builder.declare(decl("network", "a")).unwrap();
        builder.declare(decl("network", "b")).unwrap();

        let graph = builder.build().unwrap();
        let order: Vec<usize> = graph.execution_order().iter().map(|id| id.index()).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_diamond_order_is_stable() {
        let mut builder = ResourceGraphBuilder::new();
        let a = builder.declare(decl("network", "a")).unwrap();
        builder
            .declare(decl("filesystem", "b").with_property("net", a.output("id")))
            .unwrap();
        builder
            .declare(decl("filesystem", "c").with_property("net", a.output("id")))
            .unwrap();
        builder
            .declare(
                decl("gateway", "d")
                    .with_dependency(ResourceIdent::new("filesystem", "b"))
                    .with_dependency(ResourceIdent::new("filesystem", "c")),
            )
            .unwrap();

        let graph = builder.build().unwrap();
        let order: Vec<usize> = graph.execution_order().iter().map(|id| id.index()).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_duplicate_identity_is_rejected() {
        let mut builder = ResourceGraphBuilder::new();
        builder.declare(decl("network", "vpc")).unwrap();
        let err = builder.declare(decl("network", "vpc")).unwrap_err();
        assert!(matches!(
            err,
            TerraliftError::Graph(GraphError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_same_name_different_type_is_allowed() {
        let mut builder = ResourceGraphBuilder::new();
        builder.declare(decl("network", "main")).unwrap();
        builder.declare(decl("filesystem", "main")).unwrap();
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_handle_from_another_builder_is_rejected() {
        let mut other = ResourceGraphBuilder::new();
        let storage = other.declare(decl("filesystem", "storage")).unwrap();
        let foreign = storage.output("id");

        // This builder's node #0 is an unrelated declaration; the
        // foreign handle's index is in range but its producer is not.
        let mut builder = ResourceGraphBuilder::new();
        builder.declare(decl("network", "vpc")).unwrap();
        let err = builder
            .declare(decl("mount-target", "mount").with_property("filesystem_id", foreign))
            .unwrap_err();
        assert!(matches!(
            err,
            TerraliftError::Graph(GraphError::ForeignHandle { .. })
        ));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_handle_past_end_of_builder_is_rejected() {
        let mut other = ResourceGraphBuilder::new();
        other.declare(decl("network", "vpc")).unwrap();
        let storage = other.declare(decl("filesystem", "storage")).unwrap();
        let foreign = storage.output("id");

        let mut builder = ResourceGraphBuilder::new();
        builder.declare(decl("network", "vpc")).unwrap();
        let err = builder
            .declare(decl("mount-target", "mount").with_property("filesystem_id", foreign))
            .unwrap_err();
        assert!(matches!(
            err,
            TerraliftError::Graph(GraphError::ForeignHandle { .. })
        ));
    }

    #[test]
    fn test_unknown_explicit_dependency_is_rejected() {
        let mut builder = ResourceGraphBuilder::new();
        let err = builder
            .declare(decl("gateway", "api").with_dependency(ResourceIdent::new("function", "missing")))
            .unwrap_err();
        assert!(matches!(
            err,
            TerraliftError::Graph(GraphError::UnknownDependency { .. })
        ));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_cycle_is_rejected_and_graph_unchanged() {
        let mut builder = ResourceGraphBuilder::new();
        let a = ResourceIdent::new("role", "a");
        let b = ResourceIdent::new("policy", "b");
        builder.declare(decl("role", "a")).unwrap();
        builder.declare(decl("policy", "b")).unwrap();

        builder.add_dependency(&a, &b).unwrap();
        let err = builder.add_dependency(&b, &a).unwrap_err();
        assert!(matches!(err, TerraliftError::Graph(GraphError::Cycle { .. })));

        // The failed insertion left the graph unchanged.
        let graph = builder.build().unwrap();
        assert_eq!(graph.edge_count(), 1);
        let order: Vec<usize> = graph.execution_order().iter().map(|id| id.index()).collect();
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut builder = ResourceGraphBuilder::new();
        let a = ResourceIdent::new("role", "a");
        builder.declare(decl("role", "a")).unwrap();
        let err = builder.add_dependency(&a, &a).unwrap_err();
        assert!(matches!(err, TerraliftError::Graph(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_transitive_cycle_is_rejected() {
        let mut builder = ResourceGraphBuilder::new();
        let a = ResourceIdent::new("r", "a");
        let b = ResourceIdent::new("r", "b");
        let c = ResourceIdent::new("r", "c");
        for name in ["a", "b", "c"] {
            builder.declare(decl("r", name)).unwrap();
        }
        builder.add_dependency(&a, &b).unwrap();
        builder.add_dependency(&b, &c).unwrap();
        let err = builder.add_dependency(&c, &a).unwrap_err();
        assert!(matches!(err, TerraliftError::Graph(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_implicit_and_explicit_edge_merge_as_explicit() {
        let mut builder = ResourceGraphBuilder::new();
        let storage = builder.declare(decl("filesystem", "storage")).unwrap();
        let mount = builder
            .declare(
                decl("mount-target", "mount")
                    .with_property("filesystem_id", storage.output("id"))
                    .with_dependency(ResourceIdent::new("filesystem", "storage")),
            )
            .unwrap();

        let graph = builder.build().unwrap();
        let edges = graph.dependencies(mount.id());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::Explicit);
        assert_eq!(edges[0].on, storage.id());
    }

    #[test]
    fn test_add_dependency_is_idempotent() {
        let mut builder = ResourceGraphBuilder::new();
        let a = ResourceIdent::new("r", "a");
        let b = ResourceIdent::new("r", "b");
        builder.declare(decl("r", "a")).unwrap();
        builder.declare(decl("r", "b")).unwrap();
        builder.add_dependency(&b, &a).unwrap();
        builder.add_dependency(&b, &a).unwrap();

        let graph = builder.build().unwrap();
        assert_eq!(graph.edge_count(), 1);
    }
}
