//! Stack assembly: from configuration to a deployed graph.
//!
//! A [`Stack`] compiles a validated [`StackConfig`] into an immutable
//! [`ResourceGraph`], turning `${resource.attribute}` strings into
//! deferred output handles, and drives a full deployment run through
//! the orchestrator. After the run it resolves the stack's exported
//! outputs from the realized values.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ConfigValidator, OutputRef, StackConfig};
use crate::engine::{
    CancelToken, DeploymentEngine, DeploymentReport, Orchestrator,
};
use crate::error::{ConfigError, Result, TerraliftError};
use crate::graph::{
    DeclaredResource, PropertyMap, PropertyValue, ResourceDeclaration, ResourceGraph,
    ResourceGraphBuilder,
};
use crate::output::{OutputHandle, OutputResolver};

/// A compiled stack: the configuration plus its dependency graph.
#[derive(Debug)]
pub struct Stack {
    /// The validated source configuration.
    config: StackConfig,
    /// The compiled resource graph.
    graph: ResourceGraph,
    /// Handles backing the exported outputs, by output name.
    output_handles: BTreeMap<String, OutputHandle>,
}

/// Result of one stack deployment run.
pub struct StackDeployment {
    /// Per-declaration outcomes and run metadata.
    pub report: DeploymentReport,
    /// Exported outputs that resolved, by output name.
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl Stack {
    /// Validates and compiles a configuration into a stack.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the graph cannot be
    /// built.
    pub fn from_config(config: StackConfig) -> Result<Self> {
        let validation = ConfigValidator::new().validate(&config)?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        let mut builder = ResourceGraphBuilder::new();
        let mut declared: HashMap<String, DeclaredResource> = HashMap::new();

        for resource in &config.resources {
            let properties = compile_properties(&resource.properties, &declared)?;
            let mut declaration =
                ResourceDeclaration::new(&resource.resource_type, &resource.name)
                    .with_properties(properties);

            for target in &resource.depends_on {
                let dependency = declared.get(target).ok_or_else(|| {
                    TerraliftError::Config(ConfigError::validation(
                        format!("Unknown dependency '{target}'"),
                        format!("resources.{}.depends_on", resource.name),
                    ))
                })?;
                declaration = declaration.with_dependency(dependency.ident().clone());
            }

            let inserted = builder.declare(declaration)?;
            declared.insert(resource.name.clone(), inserted);
        }

        let mut output_handles = BTreeMap::new();
        for (name, expr) in &config.outputs {
            let reference = OutputRef::parse(expr).map_err(|message| {
                TerraliftError::Config(ConfigError::InvalidReference {
                    expr: expr.clone(),
                    message,
                })
            })?;
            let producer = declared.get(&reference.resource).ok_or_else(|| {
                TerraliftError::Config(ConfigError::InvalidReference {
                    expr: expr.clone(),
                    message: format!("Unknown resource '{}'", reference.resource),
                })
            })?;
            output_handles.insert(name.clone(), producer.output(&reference.attribute));
        }

        let graph = builder.build()?;
        debug!(
            stack = %config.qualified_name(),
            declarations = graph.len(),
            edges = graph.edge_count(),
            "Compiled stack"
        );

        Ok(Self {
            config,
            graph,
            output_handles,
        })
    }

    /// Returns the fully qualified stack name.
    #[must_use]
    pub fn name(&self) -> String {
        self.config.qualified_name()
    }

    /// Returns the source configuration.
    #[must_use]
    pub const fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Returns the compiled resource graph.
    #[must_use]
    pub const fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Realizes the stack against the given engine.
    ///
    /// # Errors
    ///
    /// Returns an error only on orchestration failure; per-resource
    /// failures are reported in the [`DeploymentReport`] instead.
    pub async fn deploy(&self, engine: Arc<dyn DeploymentEngine>) -> Result<StackDeployment> {
        self.deploy_with_cancel(engine, CancelToken::never()).await
    }

    /// Realizes the stack, honoring an external cancellation signal.
    ///
    /// # Errors
    ///
    /// Returns an error only on orchestration failure.
    pub async fn deploy_with_cancel(
        &self,
        engine: Arc<dyn DeploymentEngine>,
        cancel: CancelToken,
    ) -> Result<StackDeployment> {
        info!(stack = %self.name(), "Deploying stack");

        let resolver = OutputResolver::for_graph(&self.graph);
        let orchestrator = Orchestrator::new(engine);
        let report = orchestrator
            .deploy_with_cancel(&self.graph, &resolver, cancel)
            .await?;

        // Every slot is settled once the run finishes, so resolving
        // cannot suspend here. Outputs whose producer did not realize
        // are simply absent from a partial deployment.
        let mut outputs = BTreeMap::new();
        for (name, handle) in &self.output_handles {
            match resolver.resolve(handle).await {
                Ok(value) => {
                    outputs.insert(name.clone(), value);
                }
                Err(e) => {
                    warn!(output = %name, error = %e, "Stack output did not resolve");
                }
            }
        }

        Ok(StackDeployment { report, outputs })
    }
}

/// Compiles a YAML property tree into a declaration property map,
/// replacing whole-string references with output handles.
fn compile_properties(
    value: &serde_yaml::Value,
    declared: &HashMap<String, DeclaredResource>,
) -> Result<PropertyMap> {
    match value {
        serde_yaml::Value::Null => Ok(PropertyMap::new()),
        serde_yaml::Value::Mapping(map) => {
            let mut properties = PropertyMap::new();
            for (key, item) in map {
                let key = key.as_str().ok_or_else(|| {
                    TerraliftError::Config(ConfigError::validation_general(format!(
                        "Property keys must be strings, got: {key:?}"
                    )))
                })?;
                properties.insert(key.to_string(), compile_value(item, declared)?);
            }
            Ok(properties)
        }
        other => Err(TerraliftError::Config(ConfigError::validation_general(
            format!("Resource properties must be a mapping, got: {other:?}"),
        ))),
    }
}

/// Compiles one YAML value into a property value.
fn compile_value(
    value: &serde_yaml::Value,
    declared: &HashMap<String, DeclaredResource>,
) -> Result<PropertyValue> {
    match value {
        serde_yaml::Value::Null => Ok(PropertyValue::Null),
        serde_yaml::Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
        serde_yaml::Value::Number(n) => compile_number(n),
        serde_yaml::Value::String(s) => match OutputRef::try_parse(s) {
            None => Ok(PropertyValue::String(s.clone())),
            Some(Ok(reference)) => {
                let producer = declared.get(&reference.resource).ok_or_else(|| {
                    TerraliftError::Config(ConfigError::InvalidReference {
                        expr: s.clone(),
                        message: format!("Unknown resource '{}'", reference.resource),
                    })
                })?;
                Ok(PropertyValue::Output(producer.output(&reference.attribute)))
            }
            Some(Err(message)) => Err(TerraliftError::Config(ConfigError::InvalidReference {
                expr: s.clone(),
                message,
            })),
        },
        serde_yaml::Value::Sequence(items) => Ok(PropertyValue::List(
            items
                .iter()
                .map(|item| compile_value(item, declared))
                .collect::<Result<_>>()?,
        )),
        serde_yaml::Value::Mapping(_) => {
            Ok(PropertyValue::Map(compile_properties(value, declared)?))
        }
        serde_yaml::Value::Tagged(tagged) => Err(TerraliftError::Config(
            ConfigError::validation_general(format!(
                "YAML tags are not supported in properties: !{}",
                tagged.tag
            )),
        )),
    }
}

/// Converts a YAML number to a JSON number.
fn compile_number(n: &serde_yaml::Number) -> Result<PropertyValue> {
    if let Some(i) = n.as_i64() {
        return Ok(PropertyValue::Number(serde_json::Number::from(i)));
    }
    if let Some(u) = n.as_u64() {
        return Ok(PropertyValue::Number(serde_json::Number::from(u)));
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(PropertyValue::Number)
        .ok_or_else(|| {
            TerraliftError::Config(ConfigError::validation_general(format!(
                "Unrepresentable number in properties: {n}"
            )))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use crate::engine::DeclarationStatus;
    use crate::engine::RealizedResource;
    use crate::output::OutputMap;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const STACK_YAML: &str = r"
project:
  name: files-api
  environment: dev
resources:
  - type: network
    name: net
    properties:
      cidr: 10.0.0.0/16
  - type: filesystem
    name: storage
  - type: mount-target
    name: mount
    properties:
      filesystem: ${storage.id}
      network: ${net.id}
  - type: gateway
    name: api
    properties:
      upstream: ${mount.address}
outputs:
  url: ${api.url}
";

    /// Engine double producing `{name}-id` ids and a URL output.
    struct FakeEngine {
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DeploymentEngine for FakeEngine {
        async fn realize(
            &self,
            declaration: &ResourceDeclaration,
            properties: &serde_json::Map<String, serde_json::Value>,
        ) -> crate::error::Result<RealizedResource> {
            let name = declaration.name().to_string();
            self.submitted.lock().unwrap().push(name.clone());

            // References must arrive fully substituted.
            for value in properties.values() {
                if let Some(s) = value.as_str() {
                    assert!(!s.contains("${"), "unsubstituted reference: {s}");
                }
            }

            Ok(RealizedResource {
                resource_id: format!("{name}-id"),
                outputs: OutputMap::from([
                    ("id".to_string(), serde_json::json!(format!("{name}-id"))),
                    (
                        "address".to_string(),
                        serde_json::json!(format!("{name}.internal")),
                    ),
                    (
                        "url".to_string(),
                        serde_json::json!(format!("https://{name}.example.com/")),
                    ),
                ]),
            })
        }

        fn engine_type(&self) -> &'static str {
            "fake"
        }
    }

    fn stack() -> Stack {
        let config = ConfigParser::new().parse_yaml(STACK_YAML, None).unwrap();
        Stack::from_config(config).unwrap()
    }

    #[test]
    fn test_compile_builds_graph_with_reference_edges() {
        let stack = stack();
        assert_eq!(stack.graph().len(), 4);
        assert_eq!(stack.name(), "files-api-dev");

        // mount depends on both storage and net through references.
        let mount = stack
            .graph()
            .lookup(&crate::graph::ResourceIdent::new("mount-target", "mount"))
            .unwrap();
        assert_eq!(stack.graph().dependencies(mount).len(), 2);
    }

    #[test]
    fn test_compile_rejects_unknown_reference() {
        let config = ConfigParser::new()
            .parse_yaml(
                r"
project:
  name: files-api
resources:
  - type: filesystem
    name: storage
outputs:
  url: ${api.url}
",
                None,
            )
            .unwrap();
        let err = Stack::from_config(config).unwrap_err();
        assert!(matches!(err, TerraliftError::Config(_)));
    }

    #[tokio::test]
    async fn test_deploy_resolves_stack_outputs() {
        let stack = stack();
        let engine = Arc::new(FakeEngine {
            submitted: Mutex::new(Vec::new()),
        });

        let deployment = stack
            .deploy(engine.clone() as Arc<dyn DeploymentEngine>)
            .await
            .unwrap();

        assert!(deployment.report.success());
        assert_eq!(
            deployment.outputs["url"],
            serde_json::json!("https://api.example.com/")
        );

        let order = engine.submitted.lock().unwrap().clone();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(pos("storage") < pos("mount"));
        assert!(pos("net") < pos("mount"));
        assert!(pos("mount") < pos("api"));
    }

    #[tokio::test]
    async fn test_partial_deployment_omits_unresolved_outputs() {
        struct FailingEngine;

        #[async_trait]
        impl DeploymentEngine for FailingEngine {
            async fn realize(
                &self,
                declaration: &ResourceDeclaration,
                _properties: &serde_json::Map<String, serde_json::Value>,
            ) -> crate::error::Result<RealizedResource> {
                if declaration.name() == "storage" {
                    return Err(TerraliftError::internal("injected failure"));
                }
                Ok(RealizedResource {
                    resource_id: format!("{}-id", declaration.name()),
                    outputs: OutputMap::from([(
                        "id".to_string(),
                        serde_json::json!(declaration.name()),
                    )]),
                })
            }

            fn engine_type(&self) -> &'static str {
                "fake"
            }
        }

        let stack = stack();
        let deployment = stack.deploy(Arc::new(FailingEngine)).await.unwrap();

        assert!(deployment.report.is_partial());
        assert!(deployment.outputs.is_empty());

        let blocked = deployment
            .report
            .outcome(&crate::graph::ResourceIdent::new("gateway", "api"))
            .unwrap();
        assert_eq!(blocked.status, DeclarationStatus::Blocked);
    }
}
