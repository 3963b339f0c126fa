use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How an abortable wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Sleeps for `duration` unless the token is cancelled first.
///
/// Polling loops use this so an explicit cancellation stops them promptly
/// rather than at the next scheduled tick. A token cancelled before the call
/// returns immediately.
pub async fn sleep_abortable(duration: Duration, cancel: &CancellationToken) -> WaitOutcome {
    if cancel.is_cancelled() {
        return WaitOutcome::Cancelled;
    }
    tokio::select! {
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        _ = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
    }
}
