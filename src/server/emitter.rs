//! Per-subscription update emitter.
//!
//! An [`UpdateEmitter`] is a background task that streams incremental
//! updates for one instrument on one connection until it is told to stop or
//! the peer goes away. Stopping is cooperative: the task checks its
//! [`CancellationToken`] at the top of every iteration, again after it has
//! acquired the write gate, and while it waits out the pacing interval. It is
//! never aborted in the middle of a write.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::types::MarketDataUpdate;

use super::gate::{UpdateSink, WriteGate};
use super::generator::UpdateSource;

/// Why an emitter stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterExit {
    /// Stop signal observed (unsubscribe, connection teardown, shutdown)
    Cancelled,
    /// An outbound write failed
    PeerGone,
}

/// Final state of a finished emitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterReport {
    /// Instrument the emitter was streaming
    pub instrument_id: String,
    /// Exit reason
    pub exit: EmitterExit,
    /// Incremental updates written
    pub updates_sent: u64,
}

/// Owner's handle on a running emitter
#[derive(Debug)]
pub struct EmitterHandle {
    instrument_id: String,
    token: CancellationToken,
    task: JoinHandle<EmitterReport>,
}

impl EmitterHandle {
    /// Instrument the emitter streams
    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    /// Signal the emitter to stop. Returns immediately.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Whether the task has already returned
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to finish.
    ///
    /// Returns `None` only if the task panicked.
    pub async fn join(self) -> Option<EmitterReport> {
        match self.task.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(instrument = %self.instrument_id, error = %e, "emitter task failed");
                None
            }
        }
    }

    /// Signal the emitter to stop and wait for it
    pub async fn stop_and_join(self) -> Option<EmitterReport> {
        self.stop();
        self.join().await
    }
}

/// Streams incremental updates for one instrument on one connection
pub struct UpdateEmitter<W> {
    instrument_id: String,
    gate: WriteGate<W>,
    source: Arc<dyn UpdateSource>,
    interval: Duration,
    token: CancellationToken,
    peer_gone: Option<CancellationToken>,
}

impl<W: UpdateSink> UpdateEmitter<W> {
    /// Create an emitter. Nothing runs until [`spawn`](Self::spawn).
    pub fn new(
        instrument_id: impl Into<String>,
        gate: WriteGate<W>,
        source: Arc<dyn UpdateSource>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            gate,
            source,
            interval,
            token,
            peer_gone: None,
        }
    }

    /// Cancel `peer_gone` if a write fails, so the owner can tear the
    /// connection down without waiting for its own next read.
    #[must_use]
    pub fn with_peer_gone(mut self, peer_gone: CancellationToken) -> Self {
        self.peer_gone = Some(peer_gone);
        self
    }

    /// Start the emitter on the Tokio runtime
    pub fn spawn(self) -> EmitterHandle {
        let instrument_id = self.instrument_id.clone();
        let token = self.token.clone();
        let span = info_span!("emitter", instrument = %instrument_id);
        let task = tokio::spawn(self.run().instrument(span));

        EmitterHandle {
            instrument_id,
            token,
            task,
        }
    }

    async fn run(self) -> EmitterReport {
        info!("starting incremental update stream");

        let mut updates_sent = 0u64;
        let exit = loop {
            if self.token.is_cancelled() {
                break EmitterExit::Cancelled;
            }

            let update = MarketDataUpdate::IncrementalUpdate(
                self.source.next_update(&self.instrument_id, updates_sent),
            );
            match self.gate.send_unless_cancelled(update, &self.token).await {
                Ok(true) => updates_sent += 1,
                Ok(false) => break EmitterExit::Cancelled,
                Err(e) => {
                    warn!(error = %e, "failed to write incremental update, peer likely gone");
                    if let Some(peer_gone) = &self.peer_gone {
                        peer_gone.cancel();
                    }
                    break EmitterExit::PeerGone;
                }
            }
            debug!(updates_sent, "sent incremental update");

            tokio::select! {
                _ = self.token.cancelled() => break EmitterExit::Cancelled,
                _ = tokio::time::sleep(self.interval) => {}
            }
        };

        info!(?exit, updates_sent, "stopped incremental update stream");
        EmitterReport {
            instrument_id: self.instrument_id,
            exit,
            updates_sent,
        }
    }
}
