//! Property tree traversal.
//!
//! Implicit dependency inference is a traversal that collects every
//! output handle reachable within a declaration's property mapping,
//! independent of the shape of the tree. The traversal is exposed as a
//! visitor so other passes (reference rewriting, validation) can reuse
//! the same walk.

use std::collections::HashSet;

use crate::output::OutputHandle;

use super::declaration::{PropertyMap, PropertyValue};

/// Visitor over a declaration's property tree.
pub trait PropertyVisitor {
    /// Called for every output handle encountered.
    fn visit_output(&mut self, handle: &OutputHandle);

    /// Called for every literal leaf. Default: ignored.
    fn visit_literal(&mut self, _value: &PropertyValue) {}
}

/// Walks a single property value depth-first.
pub fn walk_value<V: PropertyVisitor>(value: &PropertyValue, visitor: &mut V) {
    match value {
        PropertyValue::Output(handle) => visitor.visit_output(handle),
        PropertyValue::List(items) => {
            for item in items {
                walk_value(item, visitor);
            }
        }
        PropertyValue::Map(map) => {
            for item in map.values() {
                walk_value(item, visitor);
            }
        }
        leaf => visitor.visit_literal(leaf),
    }
}

/// Walks every value of a property mapping depth-first, in key order.
pub fn walk_properties<V: PropertyVisitor>(properties: &PropertyMap, visitor: &mut V) {
    for value in properties.values() {
        walk_value(value, visitor);
    }
}

/// Collects the distinct output handles embedded in a property mapping,
/// in traversal order.
#[must_use]
pub fn collect_handles(properties: &PropertyMap) -> Vec<OutputHandle> {
    struct Collector {
        seen: HashSet<OutputHandle>,
        handles: Vec<OutputHandle>,
    }

    impl PropertyVisitor for Collector {
        fn visit_output(&mut self, handle: &OutputHandle) {
            if self.seen.insert(handle.clone()) {
                self.handles.push(handle.clone());
            }
        }
    }

    let mut collector = Collector {
        seen: HashSet::new(),
        handles: Vec::new(),
    };
    walk_properties(properties, &mut collector);
    collector.handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeId, ResourceIdent};
    use std::collections::BTreeMap;

    fn handle(index: usize, attr: &str) -> OutputHandle {
        OutputHandle::new(
            NodeId(index),
            ResourceIdent::new("filesystem", "storage"),
            attr,
        )
    }

    #[test]
    fn test_collects_nested_handles() {
        let mut nested = BTreeMap::new();
        nested.insert("fs_id".to_string(), PropertyValue::Output(handle(0, "id")));

        let mut properties = PropertyMap::new();
        properties.insert("config".to_string(), PropertyValue::Map(nested));
        properties.insert(
            "mounts".to_string(),
            PropertyValue::List(vec![
                PropertyValue::String("literal".to_string()),
                PropertyValue::Output(handle(1, "arn")),
            ]),
        );

        let handles = collect_handles(&properties);
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].node(), NodeId(0));
        assert_eq!(handles[1].node(), NodeId(1));
    }

    #[test]
    fn test_deduplicates_repeated_handles() {
        let shared = handle(3, "id");
        let mut properties = PropertyMap::new();
        properties.insert("a".to_string(), PropertyValue::Output(shared.clone()));
        properties.insert("b".to_string(), PropertyValue::Output(shared));

        let handles = collect_handles(&properties);
        assert_eq!(handles.len(), 1);
    }

    #[test]
    fn test_literal_only_tree_has_no_handles() {
        let mut properties = PropertyMap::new();
        properties.insert("cidr".to_string(), PropertyValue::from("10.0.0.0/16"));
        properties.insert("subnets".to_string(), PropertyValue::from(2_i64));
        assert!(collect_handles(&properties).is_empty());
    }
}
