// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # edgeflow-runtime
//!
//! The execution engine and host bridge of EdgeFlow.
//!
//! The runtime takes:
//! - A validated `ModelGraph` from `model-ir`.
//! - A `DeviceSet` snapshot from `device-registry`.
//! - An `ExecutionPlan` from `partition-planner`.
//!
//! And runs one inference session at a time: nodes are dispatched in
//! topological order to one worker per device, inputs that live on another
//! device are moved through a [`Transport`], and the result (or the first
//! failure) is delivered exactly once to the registered
//! [`CompletionHandler`].
//!
//! # Session Lifecycle
//! ```text
//! Idle ─► Initialized ─► Running ─► Completed | Failed ─► Initialized | Idle
//! ```
//! [`EdgeFlow`] enforces the lifecycle at run time: starting a session
//! requires `Initialized`, and re-initialization while `Running` fails fast.
//!
//! # Async Execution
//! Uses a `tokio` multi-thread runtime owned by [`EdgeFlow`]. Operators and
//! transfers are blocking calls and run on the blocking pool; the host API
//! itself is synchronous.

mod arena;
mod config;
mod edgeflow;
mod engine;
mod error;
mod executor;
mod metrics;
mod session;
mod transport;

pub use config::RuntimeConfig;
pub use edgeflow::{EdgeFlow, EdgeFlowBuilder};
pub use engine::{CancelHandle, CancelToken, Engine, ExecutionContext, RunOutput};
pub use error::{ErrorKind, FailureDescriptor, RuntimeError};
pub use executor::{CpuExecutor, ExecutorError, ExecutorRegistry, OperatorExecutor};
pub use metrics::{InferenceMetrics, NodeMetrics};
pub use session::{CompletionEvent, CompletionHandler, SessionState};
pub use transport::{InProcessTransport, RetryPolicy, Transport, TransportError};
