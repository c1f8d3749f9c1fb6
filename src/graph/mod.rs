//! Resource graph module.
//!
//! This module covers the synchronous construction phase of a
//! deployment:
//! - Declaration types and property trees
//! - The graph builder with implicit/explicit edge derivation
//! - The immutable, acyclic [`ResourceGraph`] produced by `build()`
//! - The property-tree visitor used for dependency inference

mod builder;
mod declaration;
mod resource_graph;
mod visitor;

pub use builder::{DeclaredResource, ResourceGraphBuilder};
pub use declaration::{PropertyMap, PropertyValue, ResourceDeclaration, ResourceIdent};
pub use resource_graph::{DependencyEdge, EdgeKind, NodeId, ResourceGraph};
pub use visitor::{collect_handles, walk_properties, walk_value, PropertyVisitor};
