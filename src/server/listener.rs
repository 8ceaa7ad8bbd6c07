//! WebSocket accept loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::transport;
use crate::types::{MarketDataUpdate, SubscriptionRequest};

use super::generator::UpdateSource;
use super::session::{SessionSummary, SubscriptionManager};

/// Market data feed server.
///
/// Every accepted connection gets its own [`SubscriptionManager`]. Cancelling
/// the [`shutdown_token`](Self::shutdown_token) stops accepting, tears down
/// every connection and makes [`run`](Self::run) return once they are gone.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use orderbook_feed::config::ServerConfig;
/// use orderbook_feed::server::{MarketDataServer, StaticSource};
///
/// # async fn example() -> orderbook_feed::Result<()> {
/// let server = MarketDataServer::bind(ServerConfig::default(), Arc::new(StaticSource)).await?;
/// println!("listening on {}", server.local_addr());
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct MarketDataServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    source: Arc<dyn UpdateSource>,
    update_interval: Duration,
    shutdown: CancellationToken,
    next_connection_id: AtomicU64,
}

impl MarketDataServer {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the address cannot be bound.
    pub async fn bind(config: ServerConfig, source: Arc<dyn UpdateSource>) -> Result<Self, Error> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            source,
            update_interval: config.update_interval(),
            shutdown: CancellationToken::new(),
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// Address the listener is bound to (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept connections until shutdown, then wait for every connection to
    /// finish its teardown.
    ///
    /// # Errors
    ///
    /// Accept errors are logged and do not end the loop; this currently
    /// always returns `Ok`.
    pub async fn run(self) -> Result<(), Error> {
        info!("feed server listening on {}", self.local_addr);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested, closing {} connection(s)", connections.len());
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                        let span = info_span!("connection", id = connection_id, %peer);
                        connections.spawn(
                            serve_connection(
                                connection_id,
                                stream,
                                Arc::clone(&self.source),
                                self.update_interval,
                                self.shutdown.child_token(),
                            )
                            .instrument(span),
                        );
                    }
                    Err(e) => error!("accept error: {}", e),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_finished(finished);
                }
            }
        }

        while let Some(finished) = connections.join_next().await {
            log_finished(finished);
        }
        info!("feed server stopped");
        Ok(())
    }
}

async fn serve_connection(
    connection_id: u64,
    stream: TcpStream,
    source: Arc<dyn UpdateSource>,
    update_interval: Duration,
    token: CancellationToken,
) -> Result<SessionSummary, Error> {
    let ws = tokio::select! {
        _ = token.cancelled() => return Err(Error::ConnectionClosed),
        ws = tokio_tungstenite::accept_async(stream) => ws?,
    };
    debug!("websocket handshake complete");

    let (write, read) = ws.split();
    let sink = transport::json_sink::<MarketDataUpdate, _>(write);
    let requests = transport::json_stream::<SubscriptionRequest, _>(read);

    let manager = SubscriptionManager::new(connection_id, sink, source, update_interval, token);
    Ok(manager.run(requests).await)
}

fn log_finished(finished: Result<Result<SessionSummary, Error>, tokio::task::JoinError>) {
    match finished {
        Ok(Ok(summary)) => info!(
            connection = summary.connection_id,
            reason = ?summary.reason,
            emitters = summary.stopped.len(),
            "connection closed"
        ),
        Ok(Err(e)) => warn!("connection failed before session start: {}", e),
        Err(e) => error!("connection task failed: {}", e),
    }
}
