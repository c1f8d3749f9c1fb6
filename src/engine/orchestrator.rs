//! Concurrent, dependency-ordered realization.
//!
//! The orchestrator walks an immutable [`ResourceGraph`] and submits
//! each declaration to the deployment engine once all of its
//! dependencies have realized successfully. Independent subgraphs run
//! concurrently; ties between simultaneously-ready declarations break
//! by insertion order. A realization failure blocks every transitive
//! dependent that has not yet been submitted while independent branches
//! run to completion.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Result, TerraliftError};
use crate::graph::{NodeId, ResourceGraph};
use crate::output::OutputResolver;

use super::provider::{DeploymentEngine, RealizedResource};
use super::report::{DeclarationOutcome, DeclarationStatus, DeploymentReport};

/// Handle used to abort an in-progress deployment.
///
/// Cancelling marks every not-yet-submitted declaration `Cancelled`.
/// In-flight realizations are not force-terminated; they run to
/// completion and their results are discarded.
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: watch::Sender<bool>,
}

impl Canceller {
    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    /// Resolves once cancellation has been signalled.
    async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Canceller dropped without firing: never cancel.
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a linked canceller/token pair.
#[must_use]
pub fn cancellation() -> (Canceller, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx }, CancelToken { rx })
}

/// Scheduling state of one node during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    /// Not yet submitted.
    Pending,
    /// Submitted to the engine.
    Running,
    /// Terminal outcome recorded.
    Settled,
}

/// Result carried back from one realization task.
struct TaskResult {
    node: NodeId,
    duration_ms: u64,
    result: Result<RealizedResource>,
}

/// Orchestrator for deployment runs.
pub struct Orchestrator {
    /// Engine backend receiving resolved declarations.
    engine: Arc<dyn DeploymentEngine>,
}

impl Orchestrator {
    /// Creates a new orchestrator over the given engine.
    #[must_use]
    pub fn new(engine: Arc<dyn DeploymentEngine>) -> Self {
        Self { engine }
    }

    /// Realizes the full graph and returns the deployment report.
    ///
    /// # Errors
    ///
    /// Returns an error only if a realization task panics; per-resource
    /// failures are reported in the [`DeploymentReport`] instead.
    pub async fn deploy(
        &self,
        graph: &ResourceGraph,
        resolver: &OutputResolver,
    ) -> Result<DeploymentReport> {
        self.deploy_with_cancel(graph, resolver, CancelToken::never())
            .await
    }

    /// Realizes the graph, honoring an external cancellation signal.
    ///
    /// # Errors
    ///
    /// Returns an error only if a realization task panics.
    pub async fn deploy_with_cancel(
        &self,
        graph: &ResourceGraph,
        resolver: &OutputResolver,
        mut cancel: CancelToken,
    ) -> Result<DeploymentReport> {
        let deployment_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            %deployment_id,
            declarations = graph.len(),
            engine = self.engine.engine_type(),
            "Starting deployment"
        );

        let mut remaining: Vec<usize> = graph.ids().map(|id| graph.dependencies(id).len()).collect();
        let mut states = vec![NodeState::Pending; graph.len()];
        let mut outcomes: Vec<Option<DeclarationOutcome>> = vec![None; graph.len()];
        let mut join_set: JoinSet<TaskResult> = JoinSet::new();
        let mut cancelled = false;

        for node in graph.roots() {
            states[node.index()] = NodeState::Running;
            self.submit(node, graph, resolver, &mut join_set);
        }

        while !join_set.is_empty() {
            tokio::select! {
                biased;

                () = cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    warn!(%deployment_id, "Deployment cancelled; draining in-flight realizations");
                    for idx in 0..graph.len() {
                        if states[idx] == NodeState::Pending {
                            let node = NodeId(idx);
                            states[idx] = NodeState::Settled;
                            resolver.cancel(node);
                            outcomes[idx] = Some(DeclarationOutcome {
                                ident: graph.declaration(node).ident().clone(),
                                status: DeclarationStatus::Cancelled,
                                resource_id: None,
                                error: Some(String::from("Deployment cancelled before submission")),
                                duration_ms: None,
                            });
                        }
                    }
                }

                Some(joined) = join_set.join_next() => {
                    let task = joined.map_err(|e| {
                        TerraliftError::internal(format!("Realization task panicked: {e}"))
                    })?;
                    self.handle_completion(
                        task,
                        graph,
                        resolver,
                        cancelled,
                        &mut remaining,
                        &mut states,
                        &mut outcomes,
                        &mut join_set,
                    );
                }
            }
        }

        // Anything still pending here had a dependency that never
        // realized; settle it as blocked so the report is complete.
        for idx in 0..graph.len() {
            if states[idx] == NodeState::Pending {
                let node = NodeId(idx);
                resolver.block(node, "dependency did not realize");
                outcomes[idx] = Some(DeclarationOutcome {
                    ident: graph.declaration(node).ident().clone(),
                    status: DeclarationStatus::Blocked,
                    resource_id: None,
                    error: Some(String::from("Dependency did not realize")),
                    duration_ms: None,
                });
            }
        }

        let report = DeploymentReport {
            deployment_id,
            started_at,
            finished_at: Utc::now(),
            outcomes: outcomes.into_iter().flatten().collect(),
        };
        info!(%deployment_id, "{report}");
        Ok(report)
    }

    /// Spawns one realization task.
    fn submit(
        &self,
        node: NodeId,
        graph: &ResourceGraph,
        resolver: &OutputResolver,
        join_set: &mut JoinSet<TaskResult>,
    ) {
        let declaration = graph.declaration(node).clone();
        let engine = Arc::clone(&self.engine);
        let resolver = resolver.clone();

        debug!(resource = %declaration.ident(), "Submitting declaration to engine");
        join_set.spawn(async move {
            let started = tokio::time::Instant::now();
            let result = async {
                let properties = resolver.resolve_properties(declaration.properties()).await?;
                engine.realize(&declaration, &properties).await
            }
            .await;

            TaskResult {
                node,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                result,
            }
        });
    }

    /// Records a task result and schedules or blocks dependents.
    #[allow(clippy::too_many_arguments)]
    fn handle_completion(
        &self,
        task: TaskResult,
        graph: &ResourceGraph,
        resolver: &OutputResolver,
        cancelled: bool,
        remaining: &mut [usize],
        states: &mut [NodeState],
        outcomes: &mut [Option<DeclarationOutcome>],
        join_set: &mut JoinSet<TaskResult>,
    ) {
        let node = task.node;
        let ident = graph.declaration(node).ident().clone();
        states[node.index()] = NodeState::Settled;

        if cancelled {
            debug!(resource = %ident, "Discarding result of cancelled deployment");
            resolver.cancel(node);
            outcomes[node.index()] = Some(DeclarationOutcome {
                ident,
                status: DeclarationStatus::Cancelled,
                resource_id: None,
                error: Some(String::from("Result discarded after cancellation")),
                duration_ms: Some(task.duration_ms),
            });
            return;
        }

        match task.result {
            Ok(realized) => {
                info!(
                    resource = %ident,
                    resource_id = %realized.resource_id,
                    "Realized resource"
                );
                resolver.complete(node, realized.outputs);
                outcomes[node.index()] = Some(DeclarationOutcome {
                    ident,
                    status: DeclarationStatus::Succeeded,
                    resource_id: Some(realized.resource_id),
                    error: None,
                    duration_ms: Some(task.duration_ms),
                });

                let mut ready = Vec::new();
                for &dependent in graph.dependents(node) {
                    remaining[dependent.index()] -= 1;
                    if remaining[dependent.index()] == 0
                        && states[dependent.index()] == NodeState::Pending
                    {
                        ready.push(dependent);
                    }
                }
                // Insertion-order tie-break for simultaneously-ready nodes.
                ready.sort_unstable();
                for dependent in ready {
                    states[dependent.index()] = NodeState::Running;
                    self.submit(dependent, graph, resolver, join_set);
                }
            }
            Err(e) => {
                let reason = e.to_string();
                error!(resource = %ident, error = %reason, "Realization failed");
                resolver.fail(node, &reason);
                outcomes[node.index()] = Some(DeclarationOutcome {
                    ident: ident.clone(),
                    status: DeclarationStatus::Failed,
                    resource_id: None,
                    error: Some(reason),
                    duration_ms: Some(task.duration_ms),
                });

                // Cascade: every transitive dependent that has not been
                // submitted yet ends blocked and is never submitted.
                let mut queue: VecDeque<NodeId> = graph.dependents(node).iter().copied().collect();
                while let Some(dependent) = queue.pop_front() {
                    if states[dependent.index()] != NodeState::Pending {
                        continue;
                    }
                    states[dependent.index()] = NodeState::Settled;
                    let blocked_reason = format!("Dependency {ident} failed");
                    warn!(
                        resource = %graph.declaration(dependent).ident(),
                        "{blocked_reason}; declaration blocked"
                    );
                    resolver.block(dependent, &blocked_reason);
                    outcomes[dependent.index()] = Some(DeclarationOutcome {
                        ident: graph.declaration(dependent).ident().clone(),
                        status: DeclarationStatus::Blocked,
                        resource_id: None,
                        error: Some(blocked_reason),
                        duration_ms: None,
                    });
                    queue.extend(graph.dependents(dependent).iter().copied());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::graph::{ResourceDeclaration, ResourceGraphBuilder};
    use crate::output::OutputMap;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Engine double: records submission order, optionally fails or
    /// delays specific resources, and produces `{name}-id` ids plus a
    /// per-resource URL output.
    struct TestEngine {
        fail: HashSet<String>,
        delay_ms: HashMap<String, u64>,
        submitted: Mutex<Vec<String>>,
    }

    impl TestEngine {
        fn new() -> Self {
            Self {
                fail: HashSet::new(),
                delay_ms: HashMap::new(),
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, name: &str) -> Self {
            self.fail.insert(name.to_string());
            self
        }

        fn delayed(mut self, name: &str, ms: u64) -> Self {
            self.delay_ms.insert(name.to_string(), ms);
            self
        }

        fn submitted(&self) -> Vec<String> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeploymentEngine for TestEngine {
        async fn realize(
            &self,
            declaration: &ResourceDeclaration,
            _properties: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<RealizedResource> {
            let name = declaration.name().to_string();
            self.submitted.lock().unwrap().push(name.clone());

            if let Some(ms) = self.delay_ms.get(&name) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }

            if self.fail.contains(&name) {
                return Err(TerraliftError::Engine(EngineError::api_error(
                    500,
                    format!("injected failure for {name}"),
                )));
            }

            Ok(RealizedResource {
                resource_id: format!("{name}-id"),
                outputs: OutputMap::from([
                    ("id".to_string(), serde_json::json!(format!("{name}-id"))),
                    (
                        "url".to_string(),
                        serde_json::json!(format!("https://{name}.example.com/")),
                    ),
                ]),
            })
        }

        fn engine_type(&self) -> &'static str {
            "test"
        }
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_dependency_ordering() {
        let mut builder = ResourceGraphBuilder::new();
        builder
            .declare(ResourceDeclaration::new("network", "network"))
            .unwrap();
        let storage = builder
            .declare(ResourceDeclaration::new("filesystem", "storage"))
            .unwrap();
        let mount = builder
            .declare(
                ResourceDeclaration::new("mount-target", "mount")
                    .with_dependency(storage.ident().clone()),
            )
            .unwrap();
        let endpoint = builder
            .declare(
                ResourceDeclaration::new("gateway", "endpoint")
                    .with_property("target", mount.output("id")),
            )
            .unwrap();
        let url_handle = endpoint.output("url");
        let graph = builder.build().unwrap();

        let engine = Arc::new(TestEngine::new());
        let resolver = OutputResolver::for_graph(&graph);
        let orchestrator = Orchestrator::new(engine.clone() as Arc<dyn DeploymentEngine>);

        let report = orchestrator.deploy(&graph, &resolver).await.unwrap();
        assert!(report.success());
        assert_eq!(report.count(DeclarationStatus::Succeeded), 4);

        let order = engine.submitted();
        assert!(position(&order, "storage") < position(&order, "mount"));
        assert!(position(&order, "mount") < position(&order, "endpoint"));

        let url = resolver.resolve(&url_handle).await.unwrap();
        assert_eq!(url, serde_json::json!("https://endpoint.example.com/"));
    }

    #[tokio::test]
    async fn test_failure_blocks_dependents_and_spares_independents() {
        let mut builder = ResourceGraphBuilder::new();
        let x = builder
            .declare(ResourceDeclaration::new("filesystem", "x"))
            .unwrap();
        builder
            .declare(ResourceDeclaration::new("mount-target", "y").with_dependency(x.ident().clone()))
            .unwrap();
        builder
            .declare(ResourceDeclaration::new("network", "z"))
            .unwrap();
        let graph = builder.build().unwrap();

        let engine = Arc::new(TestEngine::new().failing("x"));
        let resolver = OutputResolver::for_graph(&graph);
        let orchestrator = Orchestrator::new(engine.clone() as Arc<dyn DeploymentEngine>);

        let report = orchestrator.deploy(&graph, &resolver).await.unwrap();
        assert!(!report.success());
        assert!(report.is_partial());

        let x_outcome = report.outcome(x.ident()).unwrap();
        assert_eq!(x_outcome.status, DeclarationStatus::Failed);

        let y_outcome = report
            .outcome(&crate::graph::ResourceIdent::new("mount-target", "y"))
            .unwrap();
        assert_eq!(y_outcome.status, DeclarationStatus::Blocked);

        let z_outcome = report
            .outcome(&crate::graph::ResourceIdent::new("network", "z"))
            .unwrap();
        assert_eq!(z_outcome.status, DeclarationStatus::Succeeded);

        // The blocked declaration was never submitted to the engine.
        let order = engine.submitted();
        assert!(!order.contains(&"y".to_string()));
        assert!(order.contains(&"z".to_string()));
    }

    #[tokio::test]
    async fn test_failure_cascade_is_transitive() {
        let mut builder = ResourceGraphBuilder::new();
        let a = builder
            .declare(ResourceDeclaration::new("r", "a"))
            .unwrap();
        let b = builder
            .declare(ResourceDeclaration::new("r", "b").with_dependency(a.ident().clone()))
            .unwrap();
        builder
            .declare(ResourceDeclaration::new("r", "c").with_dependency(b.ident().clone()))
            .unwrap();
        let graph = builder.build().unwrap();

        let engine = Arc::new(TestEngine::new().failing("a"));
        let resolver = OutputResolver::for_graph(&graph);
        let orchestrator = Orchestrator::new(engine.clone() as Arc<dyn DeploymentEngine>);

        let report = orchestrator.deploy(&graph, &resolver).await.unwrap();
        assert_eq!(report.count(DeclarationStatus::Failed), 1);
        assert_eq!(report.count(DeclarationStatus::Blocked), 2);
        assert_eq!(engine.submitted(), vec!["a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_declarations_realize_concurrently() {
        let mut builder = ResourceGraphBuilder::new();
        builder
            .declare(ResourceDeclaration::new("network", "network"))
            .unwrap();
        builder
            .declare(ResourceDeclaration::new("filesystem", "storage"))
            .unwrap();
        let graph = builder.build().unwrap();

        let engine = Arc::new(
            TestEngine::new()
                .delayed("network", 100)
                .delayed("storage", 100),
        );
        let resolver = OutputResolver::for_graph(&graph);
        let orchestrator = Orchestrator::new(engine.clone() as Arc<dyn DeploymentEngine>);

        let started = tokio::time::Instant::now();
        let report = orchestrator.deploy(&graph, &resolver).await.unwrap();
        assert!(report.success());

        // Two 100ms realizations overlapping, not back to back.
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_skips_unsubmitted_and_discards_inflight() {
        let mut builder = ResourceGraphBuilder::new();
        let a = builder
            .declare(ResourceDeclaration::new("r", "a"))
            .unwrap();
        builder
            .declare(ResourceDeclaration::new("r", "b").with_dependency(a.ident().clone()))
            .unwrap();
        let graph = builder.build().unwrap();

        let engine = Arc::new(TestEngine::new().delayed("a", 200));
        let resolver = OutputResolver::for_graph(&graph);
        let orchestrator = Orchestrator::new(engine.clone() as Arc<dyn DeploymentEngine>);

        let (canceller, token) = cancellation();
        let deploy = {
            let resolver = resolver.clone();
            async move { orchestrator.deploy_with_cancel(&graph, &resolver, token).await }
        };

        let cancel_after = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        };

        let (report, ()) = tokio::join!(deploy, cancel_after);
        let report = report.unwrap();

        assert_eq!(report.count(DeclarationStatus::Cancelled), 2);
        assert_eq!(report.count(DeclarationStatus::Succeeded), 0);
        // Only the in-flight declaration ever reached the engine.
        assert_eq!(engine.submitted(), vec!["a".to_string()]);
    }
}
