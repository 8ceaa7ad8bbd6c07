//! Single-writer gate over a connection's outbound half.
//!
//! The control path and every emitter of a connection write to the same
//! sink. The gate holds the sink behind an async mutex so exactly one
//! message is in flight at a time, and lets emitters re-check their stop
//! signal after they have won the gate.

use std::sync::Arc;

use futures_util::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::types::MarketDataUpdate;

/// Outbound half of a connection, typed to [`MarketDataUpdate`]
pub trait UpdateSink: Sink<MarketDataUpdate, Error = Error> + Send + Unpin + 'static {}

impl<T> UpdateSink for T where T: Sink<MarketDataUpdate, Error = Error> + Send + Unpin + 'static {}

/// Cloneable handle to a connection's outbound sink
#[derive(Debug)]
pub struct WriteGate<W> {
    sink: Arc<Mutex<W>>,
}

impl<W> Clone for WriteGate<W> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<W: UpdateSink> WriteGate<W> {
    /// Wrap a sink
    pub fn new(sink: W) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Write one update, waiting for the gate first
    pub async fn send(&self, update: MarketDataUpdate) -> Result<(), Error> {
        let mut sink = self.sink.lock().await;
        sink.send(update).await
    }

    /// Write one update unless `token` is cancelled once the gate is held.
    ///
    /// Returns `Ok(false)` when the write was skipped.
    pub async fn send_unless_cancelled(
        &self,
        update: MarketDataUpdate,
        token: &CancellationToken,
    ) -> Result<bool, Error> {
        let mut sink = self.sink.lock().await;
        if token.is_cancelled() {
            return Ok(false);
        }
        sink.send(update).await?;
        Ok(true)
    }

    /// Flush and close the sink
    pub async fn close(&self) -> Result<(), Error> {
        let mut sink = self.sink.lock().await;
        sink.close().await
    }
}
