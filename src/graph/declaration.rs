//! Resource declaration types.
//!
//! A declaration is a desired-state description of one infrastructure
//! resource: a type tag, a logical name, and a property mapping whose
//! values may be literals or deferred output handles. Declarations are
//! immutable once inserted into a graph; their identity is the
//! (type, name) pair.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::output::OutputHandle;

/// Identity of a resource declaration: (type tag, logical name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdent {
    /// Type tag (e.g., "network", "filesystem", "gateway").
    pub resource_type: String,
    /// Logical name, unique per type within a graph.
    pub name: String,
}

impl ResourceIdent {
    /// Creates a new resource identity.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.name)
    }
}

/// A single property value in a declaration.
///
/// Values form a tree of literals; an [`OutputHandle`] leaf embeds a
/// deferred reference to another declaration's realized output.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Absent value.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Numeric literal.
    Number(serde_json::Number),
    /// String literal.
    String(String),
    /// Ordered list of values.
    List(Vec<PropertyValue>),
    /// Nested mapping, ordered by key.
    Map(BTreeMap<String, PropertyValue>),
    /// Deferred reference to another declaration's output.
    Output(OutputHandle),
}

/// Property mapping of a declaration, ordered by key.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

impl PropertyValue {
    /// Converts a plain JSON value (no deferred references) into a
    /// property value.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Renders the value as canonical JSON for fingerprinting.
    ///
    /// Deferred references are encoded as `{"$output": "type/name.attr"}`
    /// so that swapping one handle for another changes the fingerprint.
    #[must_use]
    pub fn to_canonical_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_canonical_json).collect())
            }
            Self::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_canonical_json()))
                    .collect(),
            ),
            Self::Output(handle) => serde_json::json!({ "$output": handle.to_string() }),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Number(serde_json::Number::from(value))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<OutputHandle> for PropertyValue {
    fn from(handle: OutputHandle) -> Self {
        Self::Output(handle)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// A named, typed record of desired resource configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDeclaration {
    /// Identity of the declaration.
    ident: ResourceIdent,
    /// Desired configuration.
    properties: PropertyMap,
    /// Explicitly declared dependencies.
    depends_on: Vec<ResourceIdent>,
}

impl ResourceDeclaration {
    /// Creates a new declaration with no properties.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ident: ResourceIdent::new(resource_type, name),
            properties: PropertyMap::new(),
            depends_on: Vec::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Replaces the full property mapping.
    #[must_use]
    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }

    /// Adds an explicit dependency on another declaration.
    #[must_use]
    pub fn with_dependency(mut self, target: ResourceIdent) -> Self {
        self.depends_on.push(target);
        self
    }

    /// Returns the declaration identity.
    #[must_use]
    pub const fn ident(&self) -> &ResourceIdent {
        &self.ident
    }

    /// Returns the type tag.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.ident.resource_type
    }

    /// Returns the logical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.ident.name
    }

    /// Returns the property mapping.
    #[must_use]
    pub const fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Returns the explicitly declared dependencies.
    #[must_use]
    pub fn depends_on(&self) -> &[ResourceIdent] {
        &self.depends_on
    }

    /// Computes a stable fingerprint of the declaration.
    ///
    /// The fingerprint is a SHA-256 digest of the canonical JSON form of
    /// (type, name, properties) and is used for change detection between
    /// deployments.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "type": self.ident.resource_type,
            "name": self.ident.name,
            "properties": serde_json::Value::Object(
                self.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_canonical_json()))
                    .collect(),
            ),
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for ResourceDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_display() {
        let ident = ResourceIdent::new("filesystem", "storage");
        assert_eq!(ident.to_string(), "filesystem/storage");
    }

    #[test]
    fn test_fingerprint_stable_across_property_order() {
        let a = ResourceDeclaration::new("network", "vpc")
            .with_property("cidr", "10.0.0.0/16")
            .with_property("subnets", 2_i64);
        let b = ResourceDeclaration::new("network", "vpc")
            .with_property("subnets", 2_i64)
            .with_property("cidr", "10.0.0.0/16");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_properties() {
        let a = ResourceDeclaration::new("network", "vpc").with_property("cidr", "10.0.0.0/16");
        let b = ResourceDeclaration::new("network", "vpc").with_property("cidr", "10.1.0.0/16");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_from_json_round_trip() {
        let json = serde_json::json!({
            "uid": 1000,
            "path": "/www",
            "tags": { "Name": "demo" },
            "flags": [true, false],
        });
        let value = PropertyValue::from_json(json.clone());
        assert_eq!(value.to_canonical_json(), json);
    }
}
