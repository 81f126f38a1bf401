//! Bounded external calls.
//!
//! Every generator and retriever call goes through [`bounded_call`], which
//! races the call against a timeout and the request's cancellation token.
//! The outcome is a value, never a panic or an early return, so the caller
//! decides which neutral result stands in for a failed step.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Outcome of one bounded call.
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// The call returned a value in time
    Completed(T),
    /// The call returned an error
    Failed(Error),
    /// The call ran past its limit and was dropped
    TimedOut(Duration),
    /// The request was cancelled before or during the call
    Cancelled,
}

impl<T> CallOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The value, if the call completed.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(err) => Err(err),
            Self::TimedOut(limit) => Err(Error::timeout(limit.as_millis() as u64)),
            Self::Cancelled => Err(Error::Cancelled),
        }
    }
}

/// Run `call` under `limit`, aborting early if `cancel` fires.
pub async fn bounded_call<T, F>(
    label: &str,
    limit: Duration,
    cancel: &CancellationToken,
    call: F,
) -> CallOutcome<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        debug!(call = label, "Skipping call, request already cancelled");
        return CallOutcome::Cancelled;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(call = label, "Call aborted by cancellation");
            CallOutcome::Cancelled
        }
        result = tokio::time::timeout(limit, call) => match result {
            Ok(Ok(value)) => CallOutcome::Completed(value),
            Ok(Err(err)) => {
                warn!(call = label, error = %err, "Call failed");
                CallOutcome::Failed(err)
            }
            Err(_) => {
                warn!(call = label, limit_ms = limit.as_millis() as u64, "Call timed out");
                CallOutcome::TimedOut(limit)
            }
        }
    }
}
