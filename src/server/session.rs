//! Per-connection subscription manager.
//!
//! A [`SubscriptionManager`] owns every emitter of one connection. It reads
//! subscription requests from the inbound half and, per instrument, moves
//! between these states:
//!
//! - **Idle** → SUBSCRIBE: write a snapshot, then spawn an emitter (**Active**).
//! - **Active** → SUBSCRIBE: no-op; never a second emitter for one instrument.
//! - **Active** → UNSUBSCRIBE: signal the emitter, write an empty snapshot as
//!   acknowledgement, and wait for the emitter to finish before the slot is
//!   free again (**Idle**).
//! - Inbound closed, read error, write failure, or shutdown: signal every
//!   emitter, wait for all of them, close the outbound half. This teardown
//!   runs once per connection.
//!
//! UNSUBSCRIBE for an instrument that is not active is still acknowledged.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::types::{Action, MarketDataUpdate, SubscriptionRequest};

use super::emitter::{EmitterHandle, EmitterReport, UpdateEmitter};
use super::gate::{UpdateSink, WriteGate};
use super::generator::UpdateSource;

/// Why a connection's control loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed its sending half
    PeerClosed,
    /// Reading the next request failed
    ReadFailed(String),
    /// A write failed, on the control path or in an emitter
    WriteFailed(String),
    /// The connection token was cancelled (server shutdown)
    Shutdown,
}

/// Outcome of a finished connection
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Connection identifier
    pub connection_id: u64,
    /// Why the control loop ended
    pub reason: CloseReason,
    /// Emitters that were still live at teardown, all joined
    pub stopped: Vec<EmitterReport>,
}

/// Owns the emitters of a single connection
pub struct SubscriptionManager<W: UpdateSink> {
    connection_id: u64,
    gate: WriteGate<W>,
    source: Arc<dyn UpdateSource>,
    update_interval: Duration,
    emitters: FxHashMap<String, EmitterHandle>,
    token: CancellationToken,
    peer_gone: CancellationToken,
}

impl<W: UpdateSink> SubscriptionManager<W> {
    /// Create a manager writing to `sink`.
    ///
    /// Cancelling `token` ends the control loop and, through child tokens,
    /// every emitter of the connection.
    pub fn new(
        connection_id: u64,
        sink: W,
        source: Arc<dyn UpdateSource>,
        update_interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            connection_id,
            gate: WriteGate::new(sink),
            source,
            update_interval,
            emitters: FxHashMap::default(),
            token,
            peer_gone: CancellationToken::new(),
        }
    }

    /// Connection identifier
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Whether an emitter is registered for `instrument_id`
    pub fn is_active(&self, instrument_id: &str) -> bool {
        self.emitters.contains_key(instrument_id)
    }

    /// Number of registered emitters
    pub fn active_count(&self) -> usize {
        self.emitters.len()
    }

    /// Instruments with a registered emitter, sorted
    pub fn active_instruments(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.emitters.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drive the connection until the inbound half ends, an emitter fails to
    /// write or the token is cancelled, then tear everything down.
    pub async fn run<R>(mut self, mut requests: R) -> SessionSummary
    where
        R: Stream<Item = Result<SubscriptionRequest, Error>> + Unpin,
    {
        info!(connection = self.connection_id, "client connected");

        let token = self.token.clone();
        let peer_gone = self.peer_gone.clone();
        let reason = loop {
            tokio::select! {
                _ = token.cancelled() => break CloseReason::Shutdown,
                _ = peer_gone.cancelled() => {
                    warn!(connection = self.connection_id, "update stream write failed, client likely disconnected");
                    break CloseReason::WriteFailed("update stream write failed".to_string());
                }
                next = requests.next() => match next {
                    Some(Ok(request)) => {
                        if let Err(e) = self.handle_request(request).await {
                            warn!(connection = self.connection_id, error = %e, "write failed, client likely disconnected");
                            break CloseReason::WriteFailed(e.to_string());
                        }
                    }
                    Some(Err(e)) => {
                        warn!(connection = self.connection_id, error = %e, "read failed");
                        break CloseReason::ReadFailed(e.to_string());
                    }
                    None => break CloseReason::PeerClosed,
                },
            }
        };

        info!(connection = self.connection_id, ?reason, "client stream closed, stopping all update streams");
        let stopped = self.shutdown().await;
        if let Err(e) = self.gate.close().await {
            debug!(connection = self.connection_id, error = %e, "outbound close failed");
        }
        info!(connection = self.connection_id, emitters = stopped.len(), "all update streams joined");

        SessionSummary {
            connection_id: self.connection_id,
            reason,
            stopped,
        }
    }

    /// Apply one request.
    ///
    /// # Errors
    ///
    /// Returns the transport error if writing the snapshot or the
    /// acknowledgement failed; the connection should then be torn down.
    pub async fn handle_request(&mut self, request: SubscriptionRequest) -> Result<(), Error> {
        info!(
            connection = self.connection_id,
            action = %request.action,
            instrument = %request.instrument_id,
            "received subscription request"
        );
        match request.action {
            Action::Subscribe => self.subscribe(request.instrument_id).await,
            Action::Unsubscribe => self.unsubscribe(&request.instrument_id).await,
        }
    }

    async fn subscribe(&mut self, instrument_id: String) -> Result<(), Error> {
        if let Some(handle) = self.emitters.get(&instrument_id) {
            if !handle.is_finished() {
                debug!(instrument = %instrument_id, "already streaming updates on this connection");
                return Ok(());
            }
            // The previous emitter ended on its own (failed write); reclaim it.
            if let Some(stale) = self.emitters.remove(&instrument_id) {
                stale.join().await;
            }
        }

        let snapshot = self.source.snapshot(&instrument_id);
        self.gate.send(MarketDataUpdate::Snapshot(snapshot)).await?;
        debug!(instrument = %instrument_id, "sent snapshot");

        let handle = UpdateEmitter::new(
            instrument_id.clone(),
            self.gate.clone(),
            Arc::clone(&self.source),
            self.update_interval,
            self.token.child_token(),
        )
        .with_peer_gone(self.peer_gone.clone())
        .spawn();
        self.emitters.insert(instrument_id, handle);
        Ok(())
    }

    async fn unsubscribe(&mut self, instrument_id: &str) -> Result<(), Error> {
        let handle = self.emitters.remove(instrument_id);
        match &handle {
            Some(handle) => {
                debug!(instrument = instrument_id, "signalling stop for update stream");
                handle.stop();
            }
            None => debug!(instrument = instrument_id, "unsubscribe for inactive instrument"),
        }

        let ack = self
            .gate
            .send(MarketDataUpdate::unsubscribe_ack(instrument_id))
            .await;

        if let Some(handle) = handle {
            handle.join().await;
        }

        ack?;
        debug!(instrument = instrument_id, "sent empty snapshot for unsubscription");
        Ok(())
    }

    /// Stop every emitter and wait for each one.
    ///
    /// Emitters are drained from the manager, so a second call returns an
    /// empty list.
    pub async fn shutdown(&mut self) -> Vec<EmitterReport> {
        for handle in self.emitters.values() {
            handle.stop();
        }

        let mut reports = Vec::with_capacity(self.emitters.len());
        for (_, handle) in self.emitters.drain() {
            if let Some(report) = handle.join().await {
                reports.push(report);
            }
        }
        reports.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
        reports
    }
}

impl<W: UpdateSink> Drop for SubscriptionManager<W> {
    fn drop(&mut self) {
        // Joining needs an async context; dropped without `shutdown` the
        // emitters are at least told to stop.
        for handle in self.emitters.values() {
            handle.stop();
        }
    }
}
