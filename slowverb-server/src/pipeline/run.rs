//! Per-request state machine
//!
//! `Idle → Acquiring → Processing → Streaming → Done`, with `Failed`
//! reachable from `Acquiring` or `Processing` and `Aborted` reachable from
//! `Streaming` once bytes have been committed to the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::error::PipelineError;

/// Lifecycle state of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    Idle,
    /// Retrieval tool running
    Acquiring,
    /// In-process effects, or filter graph starting up
    Processing,
    /// Bytes flowing to the sink
    Streaming,
    /// Stream fully consumed
    Done,
    /// Failed before any output was committed
    Failed,
    /// Failed after output was committed; the client holds a truncated file
    Aborted,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Aborted)
    }

    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Idle, Acquiring)
                | (Acquiring, Processing)
                | (Processing, Streaming)
                | (Streaming, Done)
                | (Acquiring, Failed)
                | (Processing, Failed)
                | (Streaming, Aborted)
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Record of one state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub request_id: Uuid,
    pub old_state: RequestState,
    pub new_state: RequestState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory state of one request
#[derive(Debug, Clone)]
pub struct RequestRun {
    pub request_id: Uuid,
    pub locator: String,
    pub state: RequestState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RequestRun {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            locator: locator.into(),
            state: RequestState::Idle,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_state`, logging the change
    pub fn transition_to(&mut self, new_state: RequestState) -> StateTransition {
        if !self.state.can_transition_to(new_state) {
            tracing::warn!(
                request_id = %self.request_id,
                from = %self.state,
                to = %new_state,
                "Unexpected request state transition"
            );
        }

        let transition = StateTransition {
            request_id: self.request_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        tracing::debug!(
            request_id = %self.request_id,
            from = %transition.old_state,
            to = %transition.new_state,
            "Request state transition"
        );

        transition
    }

    /// Transition to `Failed` and hand the error back for propagation
    pub fn fail(&mut self, error: PipelineError) -> PipelineError {
        tracing::error!(
            request_id = %self.request_id,
            locator = %self.locator,
            stage = %self.state,
            kind = error.kind(),
            error = %error,
            "Request failed"
        );
        self.transition_to(RequestState::Failed);
        error
    }

    /// Wall time since the request started (or until it ended)
    pub fn elapsed(&self) -> Duration {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        end.signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}
