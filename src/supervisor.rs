//! Reconnect supervision with exponential backoff, grounded in
//! `ReconnectingTCPClientFactory` in
//! `original_source/tcp/tcp_client.py` (`_attempt_reconnect`,
//! `resetDelay`, the `connection_in_progress` single-flight guard) —
//! but replacing the original's fixed 60s `reactor.callLater(60, ...)`
//! retry with exponential backoff (1s → 2s → 4s → ... capped at 60s,
//! reset to the initial delay on a successful connection), per the
//! REDESIGN spec.md calls for.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::session::{Session, SessionContext};

pub struct Supervisor {
    stop: Arc<Notify>,
    stopped: Arc<AtomicBool>,
    command_tx: mpsc::Sender<serde_json::Value>,
    handle: JoinHandle<()>,
}

impl Supervisor {
    /// Spawns the reconnect loop for one device. `build_context` is
    /// called before every connection attempt so a hot reconfigure
    /// (changed ip/port/token) takes effect on the next reconnect
    /// without restarting the supervisor itself.
    pub fn spawn<F, Fut>(
        device_id: i64,
        backoff_initial_ms: u64,
        backoff_max_ms: u64,
        build_context: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SessionContext> + Send,
    {
        let stop = Arc::new(Notify::new());
        let stopped = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = mpsc::channel(32);

        let handle = tokio::spawn(run_loop(
            device_id,
            backoff_initial_ms,
            backoff_max_ms,
            build_context,
            command_rx,
            stop.clone(),
            stopped.clone(),
        ));

        Self {
            stop,
            stopped,
            command_tx,
            handle,
        }
    }

    pub fn command_sender(&self) -> mpsc::Sender<serde_json::Value> {
        self.command_tx.clone()
    }

    /// Signals the reconnect loop to stop after its current attempt,
    /// idempotently — a second call is a no-op.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.stop.notify_waiters();
        }
    }

    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

async fn run_loop<F, Fut>(
    device_id: i64,
    backoff_initial_ms: u64,
    backoff_max_ms: u64,
    build_context: F,
    mut command_rx: mpsc::Receiver<serde_json::Value>,
    stop: Arc<Notify>,
    stopped: Arc<AtomicBool>,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = SessionContext>,
{
    let mut delay_ms = backoff_initial_ms;

    loop {
        if stopped.load(Ordering::SeqCst) {
            break;
        }

        // Single-flight: only one Connecting attempt is outstanding at a
        // time, mirroring the `connection_in_progress` guard in the
        // original's `_attempt_reconnect`.
        let ctx = build_context().await;
        let session = Session::new(ctx);
        let reached_streaming = AtomicBool::new(false);

        tracing::info!(device_id, "attempting connection");
        let result = tokio::select! {
            result = session.run(&mut command_rx, &reached_streaming) => result,
            _ = stop.notified() => {
                tracing::info!(device_id, "supervisor stopped mid-connection");
                break;
            }
        };

        match &result {
            Ok(()) => tracing::info!(device_id, "session closed cleanly"),
            Err(e) => tracing::warn!(device_id, error = %e, delay_ms, "session failed, backing off"),
        }

        if stopped.load(Ordering::SeqCst) {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(delay_ms)) => {}
            _ = stop.notified() => {
                tracing::info!(device_id, "supervisor stopped during backoff");
                break;
            }
        }

        // Reset backoff on reaching Streaming even if the attempt later
        // failed — a device that authenticates fine and then drops mid
        // stream shouldn't be penalized with an ever-growing delay.
        delay_ms = next_delay(
            reached_streaming.load(Ordering::Relaxed),
            delay_ms,
            backoff_initial_ms,
            backoff_max_ms,
        );
    }
}

/// The delay to use for the *next* connection attempt. Reaching
/// Streaming resets to the initial delay regardless of how the attempt
/// ended; otherwise the delay doubles, capped at `max_ms`.
fn next_delay(reached_streaming: bool, current_delay_ms: u64, initial_ms: u64, max_ms: u64) -> u64 {
    if reached_streaming {
        initial_ms
    } else {
        (current_delay_ms * 2).min(max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps_while_streaming_is_never_reached() {
        let mut delay_ms = 1_000;
        let mut seen = vec![delay_ms];
        for _ in 0..6 {
            delay_ms = next_delay(false, delay_ms, 1_000, 60_000);
            seen.push(delay_ms);
        }
        assert_eq!(seen, vec![1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 60_000]);
    }

    #[test]
    fn reaching_streaming_resets_the_delay_even_after_a_later_failure() {
        let delay_ms = next_delay(false, 8_000, 1_000, 60_000);
        assert_eq!(delay_ms, 16_000);

        // Device authenticated, streamed for a while, then dropped: the
        // next delay still resets rather than keeps doubling.
        let delay_ms = next_delay(true, delay_ms, 1_000, 60_000);
        assert_eq!(delay_ms, 1_000);
    }

    #[test]
    fn stop_is_idempotent() {
        let stop = Arc::new(Notify::new());
        let stopped = Arc::new(AtomicBool::new(false));
        assert!(!stopped.swap(true, Ordering::SeqCst));
        assert!(stopped.swap(true, Ordering::SeqCst));
        stop.notify_waiters();
    }
}
