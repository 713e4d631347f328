// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The host-facing bridge.
//!
//! [`EdgeFlow`] owns everything one execution core needs: the loaded graph,
//! the device registry, the plan cache, the single session slot, the
//! completion handler and the async runtime the sessions run on. Host calls
//! are synchronous and return booleans; results of a running session arrive
//! only through the completion handler.

use crate::engine::{CancelHandle, Engine, ExecutionContext, RunOutput};
use crate::error::FailureDescriptor;
use crate::executor::{ExecutorRegistry, OperatorExecutor};
use crate::metrics::InferenceMetrics;
use crate::session::{CompletionHandler, CompletionNotifier, HandlerSlot, SessionState};
use crate::transport::{InProcessTransport, Transport};
use crate::{RuntimeConfig, RuntimeError};
use device_registry::{DeviceId, DeviceKind, DeviceRegistry, DeviceSet, LivenessProbe, TcpProbe};
use model_ir::{graph::Validated, GraphSource, ModelGraph, ModelLoader};
use partition_planner::{CacheStats, ExecutionPlan, PartitionStrategy, PlanCache};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tensor_core::payload;

// ── Shared state ───────────────────────────────────────────────

struct Shared {
    state: SessionState,
    graph: Option<Arc<ModelGraph<Validated>>>,
    registry: Option<DeviceRegistry>,
    devices: Option<Arc<DeviceSet>>,
    plan: Option<Arc<ExecutionPlan>>,
    cache: PlanCache,
    sessions: u64,
    cancel: Option<CancelHandle>,
    last_error: Option<FailureDescriptor>,
    last_metrics: Option<InferenceMetrics>,
}

struct Inner {
    shared: Mutex<Shared>,
    handler: HandlerSlot,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the end of session `id` and settles the state. Runs on the
    /// blocking pool since it may re-probe devices.
    fn finish(
        &self,
        id: u64,
        result: Result<RunOutput, RuntimeError>,
    ) -> (Result<String, FailureDescriptor>, Option<InferenceMetrics>) {
        let (result, plan_devices, registry) = {
            let mut shared = self.lock();
            let cancelled = shared.cancel.take().is_some_and(|c| c.is_cancelled());
            let result = match result {
                Ok(_) if cancelled => Err(RuntimeError::Cancelled),
                other => other,
            };

            shared.state = if result.is_ok() {
                SessionState::Completed
            } else {
                SessionState::Failed
            };
            let reprobe = result.as_ref().err().is_some_and(RuntimeError::is_device_related);
            let plan_devices: Vec<DeviceId> = match (&shared.plan, reprobe) {
                (Some(plan), true) => plan.devices_used().into_iter().cloned().collect(),
                _ => Vec::new(),
            };
            let registry = if plan_devices.is_empty() {
                None
            } else {
                shared.registry.clone()
            };
            (result, plan_devices, registry)
        };

        // Re-probe outside the lock. `Failed` keeps initialize and start
        // out until the state below is settled.
        let reprobed = registry.map(|mut registry| {
            let all_up = registry.reprobe(&plan_devices);
            (registry, all_up)
        });

        let mut shared = self.lock();
        let settled = match reprobed {
            Some((registry, false)) => {
                tracing::warn!(session = id, "a device of the plan is unreachable; plan dropped");
                shared.devices = Some(Arc::new(registry.snapshot()));
                shared.registry = Some(registry);
                shared.plan = None;
                SessionState::Idle
            }
            Some((registry, true)) => {
                shared.registry = Some(registry);
                SessionState::Initialized
            }
            None => SessionState::Initialized,
        };

        let (outcome, metrics) = match result {
            Ok(output) => {
                tracing::info!(session = id, outputs = output.outputs.len(), "session completed");
                shared.last_error = None;
                (Ok(output.payload()), Some(output.metrics))
            }
            Err(e) => {
                let failure = e.to_failure();
                tracing::warn!(session = id, failure = %failure, "session failed");
                shared.last_error = Some(failure.clone());
                (Err(failure), None)
            }
        };
        shared.last_metrics = metrics.clone();
        shared.state = settled;
        tracing::debug!(session = id, state = %settled, "session settled");
        (outcome, metrics)
    }
}

// ── Builder ────────────────────────────────────────────────────

/// Configures an [`EdgeFlow`] before it starts its runtime.
pub struct EdgeFlowBuilder {
    config: RuntimeConfig,
    probe: Option<Arc<dyn LivenessProbe>>,
    transport: Option<Arc<dyn Transport>>,
    strategy: Option<Arc<dyn PartitionStrategy>>,
    executors: ExecutorRegistry,
}

impl EdgeFlowBuilder {
    /// Replaces the default TCP liveness probe.
    pub fn probe(mut self, probe: impl LivenessProbe + 'static) -> Self {
        self.probe = Some(Arc::new(probe));
        self
    }

    /// Replaces the in-process transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Overrides the strategy named in the configuration.
    pub fn strategy(mut self, strategy: impl PartitionStrategy + 'static) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Replaces the executor used where no override applies.
    pub fn default_executor(mut self, executor: impl OperatorExecutor + 'static) -> Self {
        self.executors.set_default(Arc::new(executor));
        self
    }

    pub fn executor_for_kind(mut self, kind: DeviceKind, executor: impl OperatorExecutor + 'static) -> Self {
        self.executors.register_kind(kind, Arc::new(executor));
        self
    }

    pub fn executor_for_device(mut self, device: impl Into<DeviceId>, executor: impl OperatorExecutor + 'static) -> Self {
        self.executors.register_device(device.into(), Arc::new(executor));
        self
    }

    /// Starts the async runtime.
    ///
    /// # Errors
    /// [`RuntimeError::ConfigError`] for an unknown strategy or if the
    /// runtime cannot be started.
    pub fn build(self) -> Result<EdgeFlow, RuntimeError> {
        let strategy = match self.strategy {
            Some(strategy) => strategy,
            None => Arc::from(self.config.create_strategy()?),
        };
        let threads = self.config.resolve_threads();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("edgeflow-worker")
            .enable_time()
            .build()
            .map_err(|e| RuntimeError::ConfigError(format!("cannot start async runtime: {e}")))?;

        tracing::info!(
            strategy = strategy.name(),
            threads,
            executors = ?self.executors,
            "edgeflow core created"
        );

        Ok(EdgeFlow {
            probe: self
                .probe
                .unwrap_or_else(|| Arc::new(TcpProbe::new(self.config.probe_timeout()))),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(InProcessTransport::default())),
            executors: Arc::new(self.executors),
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    state: SessionState::Idle,
                    graph: None,
                    registry: None,
                    devices: None,
                    plan: None,
                    cache: PlanCache::new(self.config.plan_cache_capacity),
                    sessions: 0,
                    cancel: None,
                    last_error: None,
                    last_metrics: None,
                }),
                handler: Arc::new(Mutex::new(None)),
            }),
            strategy,
            runtime: Some(runtime),
            config: self.config,
        })
    }
}

// ── EdgeFlow ───────────────────────────────────────────────────

/// One execution core: load a graph and a fleet, then run sessions.
///
/// # Example
/// ```no_run
/// use edgeflow_runtime::{CompletionEvent, EdgeFlow, RuntimeConfig};
///
/// # fn example(graph_json: &str) -> Result<(), edgeflow_runtime::RuntimeError> {
/// let core = EdgeFlow::new(RuntimeConfig::default())?;
/// core.register_completion_handler(|event: CompletionEvent| {
///     println!("{:?}", event.outcome);
/// });
/// let info = r#"{"id": "phone", "compute_class": 1.0, "memory_budget": "256M"}"#;
/// if core.initialize(graph_json, info, "[]") {
///     core.start_inference("1, 0");
/// }
/// # Ok(())
/// # }
/// ```
pub struct EdgeFlow {
    config: RuntimeConfig,
    runtime: Option<tokio::runtime::Runtime>,
    strategy: Arc<dyn PartitionStrategy>,
    executors: Arc<ExecutorRegistry>,
    transport: Arc<dyn Transport>,
    probe: Arc<dyn LivenessProbe>,
    inner: Arc<Inner>,
}

impl EdgeFlow {
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        Self::builder(config).build()
    }

    pub fn builder(config: RuntimeConfig) -> EdgeFlowBuilder {
        EdgeFlowBuilder {
            config,
            probe: None,
            transport: None,
            strategy: None,
            executors: ExecutorRegistry::new(),
        }
    }

    /// Loads the graph and the fleet, then builds (or reuses) a plan.
    ///
    /// `model` is either inline JSON or a path to a manifest. Returns
    /// `false` on any error; see [`EdgeFlow::try_initialize`].
    pub fn initialize(&self, model: &str, device_info: &str, device_list: &str) -> bool {
        match self.try_initialize(model, device_info, device_list) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(kind = %e.kind(), error = %e, "initialization failed");
                self.inner.lock().last_error = Some(e.to_failure());
                false
            }
        }
    }

    /// Like [`EdgeFlow::initialize`] with the error.
    ///
    /// Malformed input leaves the previous graph, registry and plan in
    /// place. A planning failure keeps the new graph and registry loaded
    /// but leaves no plan, and the state becomes `Idle`.
    ///
    /// # Errors
    /// [`RuntimeError::AlreadyRunning`] from the moment a session is
    /// accepted until it has settled, including while a failed session
    /// re-checks its devices.
    pub fn try_initialize(&self, model: &str, device_info: &str, device_list: &str) -> Result<(), RuntimeError> {
        if self.inner.lock().state.is_in_flight() {
            return Err(RuntimeError::AlreadyRunning);
        }

        let graph = Arc::new(ModelLoader::load(GraphSource::from_host(model))?);
        let registry = DeviceRegistry::load_with_probe(device_info, device_list, Arc::clone(&self.probe))?;
        let devices = Arc::new(registry.snapshot());

        let mut shared = self.inner.lock();
        if shared.state.is_in_flight() {
            return Err(RuntimeError::AlreadyRunning);
        }
        shared.graph = Some(Arc::clone(&graph));
        shared.registry = Some(registry);
        shared.devices = Some(Arc::clone(&devices));
        shared.plan = None;
        shared.state = SessionState::Idle;

        let plan = shared.cache.get_or_build(&graph, &devices, self.strategy.as_ref())?;
        tracing::info!(
            graph = %graph.name,
            devices = devices.len(),
            cache_hits = shared.cache.stats().hits,
            "{}",
            plan.summary()
        );
        shared.plan = Some(plan);
        shared.state = SessionState::Initialized;
        shared.last_error = None;
        Ok(())
    }

    /// Starts a session on `input_payload`. Returns `false`, with no state
    /// change, if the session cannot start; see [`EdgeFlow::try_start`].
    pub fn start_inference(&self, input_payload: &str) -> bool {
        match self.try_start(input_payload) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(kind = %e.kind(), error = %e, "inference not started");
                false
            }
        }
    }

    /// Like [`EdgeFlow::start_inference`], returning the session id.
    ///
    /// # Errors
    /// [`RuntimeError::AlreadyRunning`], [`RuntimeError::NotInitialized`] or
    /// [`RuntimeError::InvalidPayload`]. The completion handler is not
    /// invoked for a rejected start.
    pub fn try_start(&self, input_payload: &str) -> Result<u64, RuntimeError> {
        let runtime = self.runtime.as_ref().ok_or(RuntimeError::NotInitialized)?;
        let mut shared = self.inner.lock();
        match shared.state {
            SessionState::Initialized => {}
            state if state.is_in_flight() => return Err(RuntimeError::AlreadyRunning),
            _ => return Err(RuntimeError::NotInitialized),
        }
        let (Some(graph), Some(plan), Some(devices)) =
            (shared.graph.clone(), shared.plan.clone(), shared.devices.clone())
        else {
            return Err(RuntimeError::NotInitialized);
        };

        let inputs = payload::decode(input_payload, &graph.input_shapes()).map_err(RuntimeError::InvalidPayload)?;

        shared.sessions += 1;
        let id = shared.sessions;
        let cancel = CancelHandle::new();
        let token = cancel.token();
        shared.cancel = Some(cancel);
        shared.state = SessionState::Running;
        drop(shared);

        let ctx = ExecutionContext {
            graph,
            plan,
            devices,
            executors: Arc::clone(&self.executors),
            transport: Arc::clone(&self.transport),
            retry: self.config.retry_policy(),
            profiling: self.config.enable_profiling,
        };
        let inner = Arc::clone(&self.inner);
        let notifier = CompletionNotifier::new(id, Arc::clone(&self.inner.handler));

        tracing::info!(session = id, "session accepted");
        runtime.spawn(async move {
            let result = Engine::new(ctx).run(inputs, token).await;
            let completion = tokio::task::spawn_blocking(move || {
                let (outcome, metrics) = inner.finish(id, result);
                notifier.notify(outcome, metrics);
            });
            if let Err(e) = completion.await {
                tracing::error!(session = id, error = %e, "completion task failed");
            }
        });
        Ok(id)
    }

    /// Sets the handler for session completions. The last registration
    /// wins, including for a session already running.
    ///
    /// The session has settled before its handler runs: the state is
    /// already `Initialized`, or `Idle` when a device of the plan was found
    /// unreachable, and [`EdgeFlow::last_error`] and
    /// [`EdgeFlow::last_metrics`] describe that session. A handler may
    /// therefore call [`EdgeFlow::start_inference`] or
    /// [`EdgeFlow::initialize`] directly.
    pub fn register_completion_handler<H>(&self, handler: H) -> bool
    where
        H: CompletionHandler + 'static,
    {
        *self.inner.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
        true
    }

    /// Cancels the running session. Returns `true` only for the call that
    /// requested cancellation; the handler then receives one `Cancelled`
    /// failure.
    pub fn cancel(&self) -> bool {
        let shared = self.inner.lock();
        if shared.state != SessionState::Running {
            return false;
        }
        let requested = shared.cancel.as_ref().is_some_and(CancelHandle::cancel);
        if requested {
            tracing::info!(session = shared.sessions, "cancellation requested");
        }
        requested
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn graph(&self) -> Option<Arc<ModelGraph<Validated>>> {
        self.inner.lock().graph.clone()
    }

    pub fn devices(&self) -> Option<Arc<DeviceSet>> {
        self.inner.lock().devices.clone()
    }

    pub fn plan(&self) -> Option<Arc<ExecutionPlan>> {
        self.inner.lock().plan.clone()
    }

    /// The most recent initialization or session failure, cleared by the
    /// next success.
    pub fn last_error(&self) -> Option<FailureDescriptor> {
        self.inner.lock().last_error.clone()
    }

    /// Metrics of the most recent successful session.
    pub fn last_metrics(&self) -> Option<InferenceMetrics> {
        self.inner.lock().last_metrics.clone()
    }

    /// Sessions accepted so far.
    pub fn sessions_started(&self) -> u64 {
        self.inner.lock().sessions
    }

    pub fn plan_cache_len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    pub fn plan_cache_stats(&self) -> CacheStats {
        self.inner.lock().cache.stats()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }
}

impl Drop for EdgeFlow {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            // Unfinished sessions are dropped; their notifiers report the abort.
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for EdgeFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.lock();
        f.debug_struct("EdgeFlow")
            .field("state", &shared.state)
            .field("strategy", &self.strategy.name())
            .field("graph", &shared.graph.as_ref().map(|g| g.name.clone()))
            .field("has_plan", &shared.plan.is_some())
            .field("sessions", &shared.sessions)
            .finish()
    }
}
