//! Configuration validation for stack specs.
//!
//! This module checks a parsed stack configuration before any graph is
//! built: naming conventions, unique resource names, and reference
//! well-formedness. References may only point at resources declared
//! earlier in the file, which keeps the stack acyclic by construction.

use crate::error::{ConfigError, Result, TerraliftError};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{OutputRef, ResourceConfig, StackConfig};

/// Validator for stack configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a stack configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, config: &StackConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_project(&config.project, &mut result);
        Self::validate_resources(&config.resources, &mut result);
        Self::validate_outputs(config, &mut result);

        if result.errors.is_empty() {
            debug!("Stack configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(TerraliftError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates project configuration.
    fn validate_project(project: &super::spec::ProjectConfig, result: &mut ValidationResult) {
        if project.name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.name"),
                message: String::from("Project name cannot be empty"),
            });
        } else if !is_valid_name(&project.name) {
            result.errors.push(ValidationError {
                field: String::from("project.name"),
                message: format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    project.name
                ),
            });
        }

        if project.environment.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.environment"),
                message: String::from("Environment cannot be empty"),
            });
        }
    }

    /// Validates all resource declarations.
    fn validate_resources(resources: &[ResourceConfig], result: &mut ValidationResult) {
        if resources.is_empty() {
            result
                .warnings
                .push(String::from("No resources defined in configuration"));
            return;
        }

        // Names of resources declared before the one being checked.
        let mut declared: HashSet<&str> = HashSet::new();

        for (i, resource) in resources.iter().enumerate() {
            let prefix = format!("resources[{i}]");

            if declared.contains(resource.name.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Duplicate resource name: {}", resource.name),
                });
            }

            if !is_valid_name(&resource.name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!(
                        "Resource name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                        resource.name
                    ),
                });
            }

            if !is_valid_name(&resource.resource_type) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.type"),
                    message: format!(
                        "Resource type '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                        resource.resource_type
                    ),
                });
            }

            Self::validate_depends_on(resource, &prefix, &declared, result);
            Self::validate_references(
                &resource.properties,
                &format!("{prefix}.properties"),
                &declared,
                result,
            );

            declared.insert(&resource.name);
        }
    }

    /// Validates explicit dependencies against earlier declarations.
    fn validate_depends_on(
        resource: &ResourceConfig,
        prefix: &str,
        declared: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        let mut seen = HashSet::new();

        for (i, target) in resource.depends_on.iter().enumerate() {
            if !seen.insert(target.as_str()) {
                result.warnings.push(format!(
                    "{prefix}.depends_on[{i}]: Duplicate dependency on '{target}'"
                ));
            }

            if target == &resource.name {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.depends_on[{i}]"),
                    message: format!("Resource '{}' cannot depend on itself", resource.name),
                });
            } else if !declared.contains(target.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.depends_on[{i}]"),
                    message: format!(
                        "Dependency '{target}' is not declared earlier in the stack"
                    ),
                });
            }
        }
    }

    /// Walks a property tree and validates every reference string.
    fn validate_references(
        value: &serde_yaml::Value,
        path: &str,
        declared: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        match value {
            serde_yaml::Value::String(s) => match OutputRef::try_parse(s) {
                None => {}
                Some(Err(message)) => {
                    result.errors.push(ValidationError {
                        field: path.to_string(),
                        message,
                    });
                }
                Some(Ok(reference)) => {
                    if !declared.contains(reference.resource.as_str()) {
                        result.errors.push(ValidationError {
                            field: path.to_string(),
                            message: format!(
                                "Reference '{reference}' points at a resource not declared earlier in the stack"
                            ),
                        });
                    }
                }
            },
            serde_yaml::Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    Self::validate_references(item, &format!("{path}[{i}]"), declared, result);
                }
            }
            serde_yaml::Value::Mapping(map) => {
                for (key, item) in map {
                    let key = key.as_str().unwrap_or("?");
                    Self::validate_references(item, &format!("{path}.{key}"), declared, result);
                }
            }
            _ => {}
        }
    }

    /// Validates the exported outputs section.
    fn validate_outputs(config: &StackConfig, result: &mut ValidationResult) {
        let names: HashSet<&str> = config.resource_names().into_iter().collect();

        for (name, expr) in &config.outputs {
            let field = format!("outputs.{name}");
            match OutputRef::parse(expr) {
                Err(message) => result.errors.push(ValidationError { field, message }),
                Ok(reference) => {
                    if !names.contains(reference.resource.as_str()) {
                        result.errors.push(ValidationError {
                            field,
                            message: format!(
                                "Output '{name}' references unknown resource '{}'",
                                reference.resource
                            ),
                        });
                    }
                }
            }
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let mut chars = name.chars();

    // First character must be a letter
    if let Some(first) = chars.next()
        && !first.is_ascii_lowercase() {
            return false;
        }

    // Rest must be lowercase alphanumeric or hyphen
    for c in chars {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return false;
        }
    }

    // Cannot end with hyphen
    if name.ends_with('-') {
        return false;
    }

    // Cannot have consecutive hyphens
    if name.contains("--") {
        return false;
    }

    true
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn parse(yaml: &str) -> StackConfig {
        ConfigParser::new().parse_yaml(yaml, None).unwrap()
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("app-network"));
        assert!(is_valid_name("storage-2"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("App-Network")); // uppercase
        assert!(!is_valid_name("2-network")); // starts with number
        assert!(!is_valid_name("app_network")); // underscore
        assert!(!is_valid_name("network-")); // ends with hyphen
        assert!(!is_valid_name("app--network")); // consecutive hyphens
    }

    #[test]
    fn test_valid_stack_passes() {
        let config = parse(
            r"
project:
  name: files-api
resources:
  - type: filesystem
    name: storage
  - type: gateway
    name: api
    properties:
      upstream: ${storage.id}
    depends_on:
      - storage
outputs:
  url: ${api.url}
",
        );
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_duplicate_resource_name() {
        let config = parse(
            r"
project:
  name: files-api
resources:
  - type: filesystem
    name: storage
  - type: network
    name: storage
",
        );
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate resource name"));
    }

    #[test]
    fn test_forward_reference_rejected() {
        let config = parse(
            r"
project:
  name: files-api
resources:
  - type: gateway
    name: api
    properties:
      upstream: ${storage.id}
  - type: filesystem
    name: storage
",
        );
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("not declared earlier"));
    }

    #[test]
    fn test_interpolation_rejected() {
        let config = parse(
            r"
project:
  name: files-api
resources:
  - type: filesystem
    name: storage
  - type: gateway
    name: api
    properties:
      upstream: https://${storage.id}.example.com
",
        );
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("interpolation"));
    }

    #[test]
    fn test_unknown_output_reference() {
        let config = parse(
            r"
project:
  name: files-api
resources:
  - type: filesystem
    name: storage
outputs:
  url: ${api.url}
",
        );
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("unknown resource"));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let config = parse(
            r"
project:
  name: files-api
resources:
  - type: filesystem
    name: storage
    depends_on:
      - storage
",
        );
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("cannot depend on itself"));
    }

    #[test]
    fn test_empty_resources_warns() {
        let config = parse(
            r"
project:
  name: files-api
resources: []
",
        );
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }
}
