// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The session execution engine.
//!
//! ```text
//!                 ┌──────────────┐   Job    ┌──────────────────┐
//!   ready set ───►│ coordinator  │─────────►│ worker: device A │──┐
//!  (topo order)   │              │─────────►│ worker: device B │──┤ Done
//!                 └──────▲───────┘          └──────────────────┘  │
//!                        └────────────────────────────────────────┘
//! ```
//!
//! The coordinator owns all session state: the ready set, the tensor arena
//! and the metrics. Each device used by the plan gets one worker task fed
//! by an mpsc queue; the worker runs transfers and the operator on the
//! blocking pool, one node at a time. Nodes on different devices therefore
//! run concurrently while a node never starts before its producers finish.
//!
//! The first failure wins. Once one is recorded the coordinator stops
//! dispatching, raises the internal halt signal so queued and in-flight
//! nodes stop at the next device boundary, and waits until every dispatched
//! node has reported back before returning.
//!
//! Outputs produced off the local device are moved back to it once the
//! last node has finished; a failed return ends the session with
//! [`RuntimeError::TransferFailure`] for that output.

use crate::arena::TensorArena;
use crate::executor::{ExecutorRegistry, OperatorExecutor};
use crate::metrics::{InferenceMetrics, NodeMetrics};
use crate::transport::{RetryPolicy, Transport};
use crate::RuntimeError;
use device_registry::{DeviceDescriptor, DeviceId, DeviceSet};
use memory_manager::{MemoryLedger, Reservation};
use model_ir::{graph::Validated, ModelGraph, NodeId, OperatorKind};
use partition_planner::{ExecutionPlan, PlannerError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tensor_core::{Tensor, TensorError};
use tokio::sync::{mpsc, watch};

// ── Cancellation ───────────────────────────────────────────────

/// Owner side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Raises the signal. Returns `true` only for the call that raised it.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is raised. Never resolves if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ── Execution context ──────────────────────────────────────────

/// Everything a session needs, shared read-only with the device workers.
#[derive(Clone)]
pub struct ExecutionContext {
    pub graph: Arc<ModelGraph<Validated>>,
    pub plan: Arc<ExecutionPlan>,
    pub devices: Arc<DeviceSet>,
    pub executors: Arc<ExecutorRegistry>,
    pub transport: Arc<dyn Transport>,
    pub retry: RetryPolicy,
    /// Record per-node metrics.
    pub profiling: bool,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("graph", &self.graph.name)
            .field("strategy", &self.plan.strategy_name)
            .field("devices", &self.devices.len())
            .field("retry", &self.retry)
            .field("profiling", &self.profiling)
            .finish()
    }
}

/// The result of a successful session.
#[derive(Debug)]
pub struct RunOutput {
    /// Output tensors in declared output order.
    pub outputs: Vec<Arc<Tensor>>,
    pub metrics: InferenceMetrics,
}

impl RunOutput {
    /// The outputs in host payload form.
    pub fn payload(&self) -> String {
        tensor_core::payload::encode(self.outputs.iter().map(Arc::as_ref))
    }
}

// ── Engine ─────────────────────────────────────────────────────

/// Runs one session of a validated plan.
///
/// # Example
/// ```no_run
/// use edgeflow_runtime::{CancelHandle, Engine, ExecutionContext};
///
/// # async fn example(ctx: ExecutionContext, inputs: Vec<tensor_core::Tensor>)
/// #     -> Result<(), edgeflow_runtime::RuntimeError> {
/// let cancel = CancelHandle::new();
/// let output = Engine::new(ctx).run(inputs, cancel.token()).await?;
/// println!("{}", output.payload());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Engine {
    ctx: ExecutionContext,
}

impl Engine {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Executes the plan on `inputs`, given in declared input order.
    ///
    /// Returns the outputs once every output node has finished, or the
    /// first failure once every dispatched node has stopped. Raising
    /// `cancel` ends the session with [`RuntimeError::Cancelled`].
    pub async fn run(&self, inputs: Vec<Tensor>, cancel: CancelToken) -> Result<RunOutput, RuntimeError> {
        let ctx = &self.ctx;
        ctx.plan.validate(&ctx.graph, &ctx.devices)?;
        if inputs.len() != ctx.graph.inputs().len() {
            return Err(RuntimeError::InvalidPayload(TensorError::InvalidPayload(format!(
                "expected {} input tensor(s), got {}",
                ctx.graph.inputs().len(),
                inputs.len()
            ))));
        }

        let started = Instant::now();
        let mut ledgers = BTreeMap::new();
        for id in ctx.plan.devices_used() {
            let device = ctx
                .devices
                .get(id)
                .ok_or_else(|| PlannerError::UnknownDevice(id.clone()))?;
            ledgers.insert(id.clone(), MemoryLedger::new(device.memory_budget));
        }

        tracing::info!(
            graph = %ctx.graph.name,
            strategy = %ctx.plan.strategy_name,
            nodes = ctx.graph.num_nodes(),
            devices = ledgers.len(),
            "session started"
        );

        let halt = CancelHandle::new();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut queues = HashMap::with_capacity(ledgers.len());
        let mut workers = Vec::with_capacity(ledgers.len());
        for (id, ledger) in &ledgers {
            let device = ctx
                .devices
                .get(id)
                .ok_or_else(|| PlannerError::UnknownDevice(id.clone()))?;
            let worker = Arc::new(DeviceWorker {
                executor: ctx.executors.resolve(device),
                device: device.clone(),
                ledger: ledger.clone(),
                graph: Arc::clone(&ctx.graph),
                devices: Arc::clone(&ctx.devices),
                transport: Arc::clone(&ctx.transport),
                retry: ctx.retry,
                halt: halt.token(),
            });
            let (tx, rx) = mpsc::unbounded_channel();
            workers.push(tokio::spawn(worker.serve(rx, done_tx.clone())));
            queues.insert(id.clone(), tx);
        }
        drop(done_tx);

        let mut coordinator = Coordinator::new(ctx, halt);
        if let Err(e) = coordinator.seed(inputs, &ledgers) {
            coordinator.fail(e);
        }

        let mut cancel_wait = cancel.clone();
        let mut cancel_seen = false;
        loop {
            if coordinator.failure.is_none() {
                if let Err(e) = coordinator.dispatch_ready(&queues) {
                    coordinator.fail(e);
                }
            }
            if coordinator.in_flight == 0 {
                break;
            }
            tokio::select! {
                done = done_rx.recv() => match done {
                    Some(done) => coordinator.complete(done),
                    None => {
                        coordinator.fail(RuntimeError::NodeExecution {
                            node: NodeId::from("<session>"),
                            device: ctx.devices.local_id().clone(),
                            detail: "all device workers stopped".into(),
                        });
                        break;
                    }
                },
                _ = cancel_wait.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    tracing::info!(in_flight = coordinator.in_flight, "session cancellation requested");
                    coordinator.fail(RuntimeError::Cancelled);
                }
            }
        }

        if coordinator.failure.is_none() && cancel.is_cancelled() {
            coordinator.fail(RuntimeError::Cancelled);
        }

        coordinator.halt.cancel();
        drop(queues);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "device worker ended abnormally");
            }
        }

        let Coordinator {
            arena,
            failure,
            mut metrics,
            ..
        } = coordinator;

        for (id, ledger) in &ledgers {
            metrics.record_peak(id, ledger.stats().peak_reserved_bytes);
        }

        if let Some(e) = failure {
            tracing::warn!(kind = %e.kind(), error = %e, "session failed");
            return Err(e);
        }

        let held = arena
            .collect(ctx.graph.outputs())
            .map_err(|node| RuntimeError::NodeExecution {
                node,
                device: ctx.devices.local_id().clone(),
                detail: "output was never produced".into(),
            })?;
        drop(arena);

        let outputs = self.return_outputs(held, cancel, &mut metrics).await?;
        metrics.finalise(started.elapsed());

        tracing::info!("{}", metrics.summary());
        Ok(RunOutput { outputs, metrics })
    }

    /// Moves every output held off the local device back to it, with the
    /// same retry policy as inbound transfers.
    async fn return_outputs(
        &self,
        held: Vec<(Arc<Tensor>, DeviceId)>,
        cancel: CancelToken,
        metrics: &mut InferenceMetrics,
    ) -> Result<Vec<Arc<Tensor>>, RuntimeError> {
        let ctx = &self.ctx;
        let local = ctx.devices.local_id();
        if held.iter().all(|(_, device)| device == local) {
            return Ok(held.into_iter().map(|(tensor, _)| tensor).collect());
        }

        let names = ctx.graph.outputs().to_vec();
        let devices = Arc::clone(&ctx.devices);
        let transport = Arc::clone(&ctx.transport);
        let retry = ctx.retry;
        let returned = tokio::task::spawn_blocking(move || {
            return_to_local(&names, held, &devices, transport.as_ref(), retry, &cancel)
        })
        .await
        .map_err(|e| RuntimeError::NodeExecution {
            node: NodeId::from("<session>"),
            device: ctx.devices.local_id().clone(),
            detail: format!("output return task failed: {e}"),
        })?;

        let (outputs, moves) = match returned {
            Ok(returned) => returned,
            Err(e) => {
                tracing::warn!(kind = %e.kind(), error = %e, "session failed");
                return Err(e);
            }
        };
        if ctx.profiling {
            for (bytes, attempts, duration) in moves {
                metrics.record_return(bytes, attempts, duration);
            }
        }
        Ok(outputs)
    }
}

/// Size, attempts and duration of one return transfer.
type ReturnMove = (u64, u32, Duration);

/// Blocking part of [`Engine::return_outputs`]. `held` follows `names`.
fn return_to_local(
    names: &[NodeId],
    held: Vec<(Arc<Tensor>, DeviceId)>,
    devices: &DeviceSet,
    transport: &dyn Transport,
    retry: RetryPolicy,
    cancel: &CancelToken,
) -> Result<(Vec<Arc<Tensor>>, Vec<ReturnMove>), RuntimeError> {
    let local = devices.local_id();
    let to = devices
        .get(local)
        .ok_or_else(|| PlannerError::UnknownDevice(local.clone()))?;
    let mut outputs = Vec::with_capacity(held.len());
    let mut moves = Vec::new();
    for (node, (tensor, device)) in names.iter().zip(held) {
        if device == *local {
            outputs.push(tensor);
            continue;
        }
        let Some(from) = devices.get(&device) else {
            return Err(RuntimeError::TransferFailure {
                node: node.clone(),
                from: device,
                to: local.clone(),
                attempts: 0,
                detail: "source device is not registered".into(),
            });
        };
        let start = Instant::now();
        let (moved, attempts) = transfer_with_retry(transport, retry, cancel, node, node, &tensor, from, to)?;
        tracing::debug!(node = %node, from = %from.id, attempts, "output returned to the local device");
        moves.push((moved.size_bytes() as u64, attempts, start.elapsed()));
        outputs.push(moved);
    }
    Ok((outputs, moves))
}

/// One transfer with bounded retries on transient failures. `halt` is
/// checked after every backoff.
#[allow(clippy::too_many_arguments)]
fn transfer_with_retry(
    transport: &dyn Transport,
    retry: RetryPolicy,
    halt: &CancelToken,
    node: &NodeId,
    producer: &NodeId,
    tensor: &Arc<Tensor>,
    from: &DeviceDescriptor,
    to: &DeviceDescriptor,
) -> Result<(Arc<Tensor>, u32), RuntimeError> {
    let max_attempts = retry.max_attempts();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match transport.transfer(tensor, from, to) {
            Ok(moved) => return Ok((moved, attempt)),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(
                    node = %node,
                    producer = %producer,
                    from = %from.id,
                    to = %to.id,
                    attempt,
                    error = %e,
                    "transfer failed; retrying"
                );
                std::thread::sleep(retry.backoff);
                if halt.is_cancelled() {
                    return Err(RuntimeError::Cancelled);
                }
            }
            Err(e) => {
                return Err(RuntimeError::TransferFailure {
                    node: node.clone(),
                    from: from.id.clone(),
                    to: to.id.clone(),
                    attempts: attempt,
                    detail: e.to_string(),
                })
            }
        }
    }
}

// ── Coordinator ────────────────────────────────────────────────

struct Operand {
    producer: NodeId,
    tensor: Arc<Tensor>,
    device: DeviceId,
}

struct Job {
    node: NodeId,
    inputs: Vec<Operand>,
}

struct Finished {
    tensor: Arc<Tensor>,
    reservation: Reservation,
    transfer_duration: Duration,
    compute_duration: Duration,
    bytes_transferred: u64,
    transfer_attempts: u32,
    transfers: usize,
}

struct Done {
    node: NodeId,
    result: Result<Finished, RuntimeError>,
}

struct Coordinator<'a> {
    ctx: &'a ExecutionContext,
    position: HashMap<NodeId, usize>,
    /// Unfinished input edges per node.
    waiting: HashMap<NodeId, usize>,
    ready: BTreeSet<(usize, NodeId)>,
    started: HashMap<NodeId, (u64, DeviceId)>,
    arena: TensorArena,
    seq: u64,
    in_flight: usize,
    failure: Option<RuntimeError>,
    halt: CancelHandle,
    metrics: InferenceMetrics,
}

impl<'a> Coordinator<'a> {
    fn new(ctx: &'a ExecutionContext, halt: CancelHandle) -> Self {
        let graph = &ctx.graph;
        let position = graph
            .topological_order()
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect::<HashMap<_, _>>();

        let mut waiting = HashMap::new();
        let mut ready = BTreeSet::new();
        for node in graph.iter_nodes() {
            if node.op == OperatorKind::Input {
                continue;
            }
            if node.inputs.is_empty() {
                ready.insert((position[&node.id], node.id.clone()));
            } else {
                waiting.insert(node.id.clone(), node.inputs.len());
            }
        }

        Self {
            ctx,
            position,
            waiting,
            ready,
            started: HashMap::new(),
            arena: TensorArena::new(),
            seq: 0,
            in_flight: 0,
            failure: None,
            halt,
            metrics: InferenceMetrics::new(),
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    fn fail(&mut self, error: RuntimeError) {
        if self.failure.is_none() {
            tracing::debug!(error = %error, "first session failure recorded");
            self.failure = Some(error);
        }
        self.halt.cancel();
    }

    /// Places the request tensors on the devices of the input nodes.
    fn seed(&mut self, inputs: Vec<Tensor>, ledgers: &BTreeMap<DeviceId, MemoryLedger>) -> Result<(), RuntimeError> {
        let ctx = self.ctx;
        let graph = &ctx.graph;
        for (id, tensor) in graph.inputs().iter().zip(inputs) {
            let node = graph.node(id).ok_or_else(|| RuntimeError::NotInitialized)?;
            if tensor.shape() != &node.shape {
                return Err(RuntimeError::InvalidPayload(TensorError::ShapeMismatch {
                    op: "input",
                    lhs: node.shape.clone(),
                    rhs: tensor.shape().clone(),
                }));
            }
            let device = self.assigned(id)?;
            let ledger = ledgers
                .get(&device)
                .ok_or_else(|| PlannerError::UnknownDevice(device.clone()))?;
            let reservation = ledger.reserve(tensor.size_bytes()).map_err(|e| RuntimeError::NodeExecution {
                node: id.clone(),
                device: device.clone(),
                detail: format!("resource exhaustion: {e}"),
            })?;
            self.produced(id, device, Arc::new(tensor), reservation);
        }
        Ok(())
    }

    fn assigned(&self, id: &NodeId) -> Result<DeviceId, RuntimeError> {
        self.ctx.plan.device_of(id).cloned().ok_or_else(|| {
            RuntimeError::Planner(PlannerError::InvalidPlan {
                strategy: self.ctx.plan.strategy_name.clone(),
                detail: format!("node '{id}' has no assignment"),
            })
        })
    }

    /// Stores a produced tensor and readies consumers whose inputs are all
    /// available.
    fn produced(&mut self, id: &NodeId, device: DeviceId, tensor: Arc<Tensor>, reservation: Reservation) {
        let ctx = self.ctx;
        let graph = &ctx.graph;
        let consumers = graph.consumers(id);
        self.arena
            .insert(id.clone(), device, tensor, reservation, consumers.len(), graph.is_output(id));

        for consumer in consumers {
            let Some(waiting) = self.waiting.get_mut(consumer) else {
                continue;
            };
            *waiting = waiting.saturating_sub(1);
            if *waiting == 0 {
                self.waiting.remove(consumer);
                self.ready.insert((self.position[consumer], consumer.clone()));
            }
        }
    }

    /// Sends every ready node to its device worker, in topological order.
    fn dispatch_ready(
        &mut self,
        queues: &HashMap<DeviceId, mpsc::UnboundedSender<Job>>,
    ) -> Result<(), RuntimeError> {
        let ctx = self.ctx;
        while let Some((_, id)) = self.ready.pop_first() {
            let node = ctx.graph.node(&id).ok_or(RuntimeError::NotInitialized)?;
            let device = self.assigned(&id)?;

            let inputs = node
                .inputs
                .iter()
                .map(|producer| {
                    let (tensor, source) = self.arena.get(producer).ok_or_else(|| RuntimeError::NodeExecution {
                        node: id.clone(),
                        device: device.clone(),
                        detail: format!("input '{producer}' is not available"),
                    })?;
                    Ok(Operand {
                        producer: producer.clone(),
                        tensor: Arc::clone(tensor),
                        device: source.clone(),
                    })
                })
                .collect::<Result<Vec<_>, RuntimeError>>()?;

            let queue = queues
                .get(&device)
                .ok_or_else(|| PlannerError::UnknownDevice(device.clone()))?;
            let seq = self.next_seq();
            tracing::debug!(node = %id, device = %device, seq, "node dispatched");
            queue
                .send(Job {
                    node: id.clone(),
                    inputs,
                })
                .map_err(|_| RuntimeError::NodeExecution {
                    node: id.clone(),
                    device: device.clone(),
                    detail: "device worker stopped".into(),
                })?;
            self.started.insert(id, (seq, device));
            self.in_flight += 1;
        }
        Ok(())
    }

    fn complete(&mut self, done: Done) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let finish_seq = self.next_seq();
        let Some((start_seq, device)) = self.started.remove(&done.node) else {
            tracing::warn!(node = %done.node, "completion for a node that was never dispatched");
            return;
        };

        let finished = match done.result {
            Ok(finished) => finished,
            Err(e) => {
                tracing::warn!(node = %done.node, device = %device, error = %e, "node failed");
                self.fail(e);
                return;
            }
        };
        if self.failure.is_some() {
            // Result of a node that was already running when the session failed.
            return;
        }

        let ctx = self.ctx;
        if let Some(node) = ctx.graph.node(&done.node) {
            for producer in &node.inputs {
                self.arena.consume(producer);
            }
        }

        if ctx.profiling {
            self.metrics.record_node(
                NodeMetrics {
                    node: done.node.clone(),
                    device: device.clone(),
                    start_seq,
                    finish_seq,
                    transfer_duration: finished.transfer_duration,
                    compute_duration: finished.compute_duration,
                    bytes_transferred: finished.bytes_transferred,
                    transfer_attempts: finished.transfer_attempts,
                },
                finished.transfers,
            );
        }

        self.produced(&done.node, device, finished.tensor, finished.reservation);
    }
}

// ── Device worker ──────────────────────────────────────────────

struct DeviceWorker {
    device: DeviceDescriptor,
    executor: Arc<dyn OperatorExecutor>,
    ledger: MemoryLedger,
    graph: Arc<ModelGraph<Validated>>,
    devices: Arc<DeviceSet>,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    halt: CancelToken,
}

impl DeviceWorker {
    async fn serve(self: Arc<Self>, mut jobs: mpsc::UnboundedReceiver<Job>, done: mpsc::UnboundedSender<Done>) {
        while let Some(job) = jobs.recv().await {
            let node = job.node.clone();
            let result = if self.halt.is_cancelled() {
                Err(RuntimeError::Cancelled)
            } else {
                let worker = Arc::clone(&self);
                match tokio::task::spawn_blocking(move || worker.execute(job)).await {
                    Ok(result) => result,
                    Err(e) => Err(RuntimeError::NodeExecution {
                        node: node.clone(),
                        device: self.device.id.clone(),
                        detail: format!("execution task failed: {e}"),
                    }),
                }
            };
            if done.send(Done { node, result }).is_err() {
                break;
            }
        }
        tracing::trace!(device = %self.device.id, "device worker stopped");
    }

    fn failed(&self, node: &NodeId, detail: impl Into<String>) -> RuntimeError {
        RuntimeError::NodeExecution {
            node: node.clone(),
            device: self.device.id.clone(),
            detail: detail.into(),
        }
    }

    /// Moves the inputs onto this device, runs the operator and reserves
    /// the output. Runs on the blocking pool.
    fn execute(&self, job: Job) -> Result<Finished, RuntimeError> {
        let node = self
            .graph
            .node(&job.node)
            .ok_or_else(|| self.failed(&job.node, "node is not part of the graph"))?;

        let mut inputs = Vec::with_capacity(job.inputs.len());
        let mut transfer_duration = Duration::ZERO;
        let mut bytes_transferred = 0u64;
        let mut transfer_attempts = 0u32;
        let mut transfers = 0usize;
        for operand in job.inputs {
            if operand.device == self.device.id {
                inputs.push(operand.tensor);
                continue;
            }
            let start = Instant::now();
            let (moved, attempts) = self.transfer(&node.id, &operand)?;
            transfer_duration += start.elapsed();
            bytes_transferred += moved.size_bytes() as u64;
            transfer_attempts += attempts;
            transfers += 1;
            inputs.push(moved);
        }

        if self.halt.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let start = Instant::now();
        let output = self
            .executor
            .execute(node, &inputs)
            .map_err(|e| self.failed(&node.id, e.to_string()))?;
        let compute_duration = start.elapsed();

        if output.shape() != &node.shape {
            return Err(self.failed(
                &node.id,
                format!("executor produced shape {} but the node declares {}", output.shape(), node.shape),
            ));
        }
        if self.halt.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let reservation = self
            .ledger
            .reserve(output.size_bytes())
            .map_err(|e| self.failed(&node.id, format!("resource exhaustion: {e}")))?;

        tracing::debug!(
            node = %node.id,
            device = %self.device.id,
            executor = self.executor.name(),
            compute_us = compute_duration.as_micros() as u64,
            transfers,
            "node finished"
        );

        Ok(Finished {
            tensor: Arc::new(output),
            reservation,
            transfer_duration,
            compute_duration,
            bytes_transferred,
            transfer_attempts,
            transfers,
        })
    }

    fn transfer(&self, node: &NodeId, operand: &Operand) -> Result<(Arc<Tensor>, u32), RuntimeError> {
        let Some(from) = self.devices.get(&operand.device) else {
            return Err(RuntimeError::TransferFailure {
                node: node.clone(),
                from: operand.device.clone(),
                to: self.device.id.clone(),
                attempts: 0,
                detail: "source device is not registered".into(),
            });
        };
        transfer_with_retry(
            self.transport.as_ref(),
            self.retry,
            &self.halt,
            node,
            &operand.producer,
            &operand.tensor,
            from,
            &self.device,
        )
    }
}
