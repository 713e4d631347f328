// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Session lifecycle and completion delivery.
//!
//! ```text
//! Idle ──initialize──► Initialized ──start──► Running ──► Completed ─┐
//!                          ▲                          └─► Failed ────┤
//!                          └────────── settle (plan devices up) ─────┘
//! ```
//!
//! `Completed` and `Failed` are transient: once a session ends the state
//! settles back to `Initialized`, or to `Idle` if a device of the plan was
//! lost.

use crate::error::{ErrorKind, FailureDescriptor};
use crate::metrics::InferenceMetrics;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Lifecycle state of the single execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No usable plan.
    Idle,
    /// Graph, registry and plan are loaded; a session may start.
    Initialized,
    Running,
    Completed,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// A session has been accepted and has not settled yet. `Completed` and
    /// `Failed` only last while the session is being settled.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Running | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the completion handler receives, once per session.
#[derive(Debug, Clone)]
pub struct CompletionEvent {
    pub session_id: u64,
    /// The output payload, or why the session failed.
    pub outcome: Result<String, FailureDescriptor>,
    /// Metrics of the run, when the engine got far enough to collect them.
    pub metrics: Option<InferenceMetrics>,
}

impl CompletionEvent {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.outcome.as_ref().err().map(|f| f.kind)
    }
}

/// Receives session completions. Called from a runtime worker thread.
pub trait CompletionHandler: Send + Sync {
    fn on_complete(&self, event: CompletionEvent);
}

impl<F> CompletionHandler for F
where
    F: Fn(CompletionEvent) + Send + Sync,
{
    fn on_complete(&self, event: CompletionEvent) {
        self(event)
    }
}

/// The registered handler. Replacing it affects sessions that have not
/// delivered yet.
pub(crate) type HandlerSlot = Arc<Mutex<Option<Arc<dyn CompletionHandler>>>>;

/// Delivers the completion of one session exactly once.
///
/// If the notifier is dropped without delivering (the runtime shut down
/// mid-session) it delivers a `Cancelled` failure itself.
pub(crate) struct CompletionNotifier {
    session_id: u64,
    handler: HandlerSlot,
    fired: bool,
}

impl CompletionNotifier {
    pub fn new(session_id: u64, handler: HandlerSlot) -> Self {
        Self {
            session_id,
            handler,
            fired: false,
        }
    }

    pub fn notify(mut self, outcome: Result<String, FailureDescriptor>, metrics: Option<InferenceMetrics>) {
        self.deliver(outcome, metrics);
    }

    fn deliver(&mut self, outcome: Result<String, FailureDescriptor>, metrics: Option<InferenceMetrics>) {
        if self.fired {
            return;
        }
        self.fired = true;

        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(handler) = handler else {
            tracing::warn!(session = self.session_id, "no completion handler registered; result dropped");
            return;
        };

        match &outcome {
            Ok(_) => tracing::debug!(session = self.session_id, "delivering success"),
            Err(f) => tracing::debug!(session = self.session_id, kind = %f.kind, "delivering failure"),
        }
        handler.on_complete(CompletionEvent {
            session_id: self.session_id,
            outcome,
            metrics,
        });
    }
}

impl Drop for CompletionNotifier {
    fn drop(&mut self) {
        if !self.fired {
            self.deliver(
                Err(FailureDescriptor {
                    kind: ErrorKind::Cancelled,
                    node: None,
                    message: "session aborted before completion".into(),
                }),
                None,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn slot_with(tx: mpsc::Sender<CompletionEvent>) -> HandlerSlot {
        let tx = Mutex::new(tx);
        let handler = move |event: CompletionEvent| {
            let _ = tx.lock().unwrap().send(event);
        };
        Arc::new(Mutex::new(Some(Arc::new(handler) as Arc<dyn CompletionHandler>)))
    }

    #[test]
    fn test_notify_delivers_once() {
        let (tx, rx) = mpsc::channel();
        let notifier = CompletionNotifier::new(7, slot_with(tx));
        notifier.notify(Ok("1".into()), None);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session_id, 7);
        assert!(event.is_success());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_delivers_abort() {
        let (tx, rx) = mpsc::channel();
        drop(CompletionNotifier::new(3, slot_with(tx)));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.failure_kind(), Some(ErrorKind::Cancelled));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handler_resolved_at_delivery() {
        let (old_tx, old_rx) = mpsc::channel();
        let (new_tx, new_rx) = mpsc::channel();
        let slot = slot_with(old_tx);
        let notifier = CompletionNotifier::new(1, Arc::clone(&slot));

        let replacement = slot_with(new_tx);
        let handler = replacement.lock().unwrap().clone();
        *slot.lock().unwrap() = handler;

        notifier.notify(Ok("0".into()), None);
        assert!(old_rx.try_recv().is_err());
        assert!(new_rx.try_recv().is_ok());
    }

    #[test]
    fn test_missing_handler_is_tolerated() {
        let notifier = CompletionNotifier::new(1, Arc::new(Mutex::new(None)));
        notifier.notify(Ok(String::new()), None);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Initialized.to_string(), "initialized");
        assert_eq!(serde_json::to_string(&SessionState::Running).unwrap(), "\"running\"");
    }
}
