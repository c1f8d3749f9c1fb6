//! Stack specification types.
//!
//! This module defines the structs that map to the `terralift.stack.yaml`
//! file: a project header, the engine endpoint, an ordered list of
//! resource declarations, and the exported outputs. These types are
//! declarative and fully describe the desired deployment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The root configuration structure for a Terralift stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Deployment engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Ordered list of resource declarations.
    pub resources: Vec<ResourceConfig>,
    /// Exported outputs: name -> `${resource.attribute}` reference.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Unique name for the project.
    pub name: String,
    /// Environment (e.g., "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Deployment engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Engine API base URL. Falls back to `TERRALIFT_ENGINE_ENDPOINT`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Per-realization request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// One declared resource in the stack file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceConfig {
    /// Resource type tag (e.g., "network", "filesystem", "gateway").
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Logical name, unique within the stack.
    pub name: String,
    /// Desired configuration. String values of the form
    /// `${resource.attribute}` become deferred output references.
    #[serde(default)]
    pub properties: serde_yaml::Value,
    /// Names of resources that must realize first.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

// Default value functions

const fn default_timeout_secs() -> u64 {
    300
}

fn default_environment() -> String {
    String::from("dev")
}

/// A parsed `${resource.attribute}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRef {
    /// Logical name of the producing resource.
    pub resource: String,
    /// Output attribute name.
    pub attribute: String,
}

impl OutputRef {
    /// Parses a reference expression like `${storage.id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression is not a well-formed
    /// reference.
    pub fn parse(expr: &str) -> Result<Self, String> {
        let inner = expr
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| format!("Expected ${{resource.attribute}}, got: {expr}"))?;

        let (resource, attribute) = inner
            .split_once('.')
            .ok_or_else(|| format!("Reference '{inner}' is missing an attribute"))?;

        if resource.is_empty() || attribute.is_empty() {
            return Err(format!("Reference '{inner}' has an empty component"));
        }

        Ok(Self {
            resource: resource.to_string(),
            attribute: attribute.to_string(),
        })
    }

    /// Classifies a property string.
    ///
    /// Returns `None` for plain literals, `Some(Ok)` for a whole-string
    /// reference, and `Some(Err)` for malformed or interpolated
    /// references (string interpolation is not supported).
    #[must_use]
    pub fn try_parse(value: &str) -> Option<Result<Self, String>> {
        if !value.contains("${") {
            return None;
        }
        if value.starts_with("${") && value.ends_with('}') && value.matches("${").count() == 1 {
            return Some(Self::parse(value));
        }
        Some(Err(format!(
            "String interpolation is not supported; use a whole-string reference: {value}"
        )))
    }
}

impl std::fmt::Display for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${{{}.{}}}", self.resource, self.attribute)
    }
}

impl StackConfig {
    /// Returns the fully qualified project name including environment.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}-{}", self.project.name, self.project.environment)
    }

    /// Returns resource names in declaration order.
    #[must_use]
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }

    /// Looks up a resource by logical name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_ref_parse() {
        let reference = OutputRef::parse("${storage.id}").unwrap();
        assert_eq!(reference.resource, "storage");
        assert_eq!(reference.attribute, "id");
    }

    #[test]
    fn test_output_ref_nested_attribute() {
        let reference = OutputRef::parse("${gateway.url.host}").unwrap();
        assert_eq!(reference.resource, "gateway");
        assert_eq!(reference.attribute, "url.host");
    }

    #[test]
    fn test_output_ref_invalid() {
        assert!(OutputRef::parse("storage.id").is_err());
        assert!(OutputRef::parse("${storage}").is_err());
        assert!(OutputRef::parse("${.id}").is_err());
    }

    #[test]
    fn test_try_parse_classification() {
        assert!(OutputRef::try_parse("plain string").is_none());
        assert!(OutputRef::try_parse("${storage.id}").unwrap().is_ok());
        assert!(OutputRef::try_parse("prefix-${storage.id}").unwrap().is_err());
        assert!(OutputRef::try_parse("${a.b}-${c.d}").unwrap().is_err());
    }

    #[test]
    fn test_qualified_name() {
        let config = StackConfig {
            project: ProjectConfig {
                name: String::from("files-api"),
                environment: String::from("prod"),
            },
            engine: EngineConfig::default(),
            resources: vec![],
            outputs: BTreeMap::new(),
        };
        assert_eq!(config.qualified_name(), "files-api-prod");
    }
}
