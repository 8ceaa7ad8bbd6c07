//! Client session driver.
//!
//! A [`SubscriptionDriver`] runs one session over one connection with two
//! concurrent activities:
//!
//! - a send task that subscribes to the configured instruments, follows the
//!   unsubscribe schedule, then waits until the session is stopped and
//!   closes the outbound half;
//! - the receive loop, on the caller's task, that folds every update into
//!   the shared [`OrderbookManager`] and hands it to a callback.
//!
//! The session ends when the server stops sending. Stopping the driver (its
//! cancel token or the configured session deadline) closes the outbound
//! half, which makes the server end the session.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::Error;
use crate::orderbook::OrderbookManager;
use crate::types::{MarketDataUpdate, SubscriptionRequest};

use super::websocket::WebSocketClient;

/// How long to keep reading after the outbound half was closed
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Final status of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The server closed the stream normally
    Completed,
    /// The session ended because of an error
    Failed(String),
}

impl SessionOutcome {
    /// Whether the session completed normally
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed)
    }
}

/// Runs subscription sessions and keeps a local order book store
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use orderbook_feed::client::SubscriptionDriver;
/// use orderbook_feed::config::ClientConfig;
/// use orderbook_feed::orderbook::OrderbookManager;
///
/// # async fn example() {
/// let store = Arc::new(OrderbookManager::new());
/// let driver = SubscriptionDriver::new(ClientConfig::default(), Arc::clone(&store));
///
/// let outcome = driver
///     .connect_and_run(|update, store| {
///         if let Some(view) = store.view(update.instrument_id()) {
///             println!("{}", view);
///         }
///     })
///     .await;
/// println!("session finished: {:?}", outcome);
/// # }
/// ```
#[derive(Debug)]
pub struct SubscriptionDriver {
    config: ClientConfig,
    store: Arc<OrderbookManager>,
    cancel: CancellationToken,
}

impl SubscriptionDriver {
    /// Create a driver feeding `store`
    pub fn new(config: ClientConfig, store: Arc<OrderbookManager>) -> Self {
        Self {
            config,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the order book store
    pub fn store(&self) -> &Arc<OrderbookManager> {
        &self.store
    }

    /// Token that stops the driver's sessions when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connect to the configured server and run one session.
    ///
    /// A failed connection is reported as [`SessionOutcome::Failed`].
    pub async fn connect_and_run<F>(&self, on_update: F) -> SessionOutcome
    where
        F: FnMut(&MarketDataUpdate, &OrderbookManager),
    {
        match WebSocketClient::connect(&self.config).await {
            Ok(client) => {
                let (requests, updates) = client.into_parts();
                self.run(requests, updates, on_update).await
            }
            Err(e) => {
                let outcome = SessionOutcome::Failed(format!("connect failed: {}", e));
                warn!(?outcome, "session finished");
                outcome
            }
        }
    }

    /// Run one session over an already established channel.
    ///
    /// Returns once the update stream has ended and the send task has been
    /// joined.
    pub async fn run<S, U, F>(&self, requests: S, mut updates: U, mut on_update: F) -> SessionOutcome
    where
        S: Sink<SubscriptionRequest, Error = Error> + Send + Unpin + 'static,
        U: Stream<Item = Result<MarketDataUpdate, Error>> + Unpin,
        F: FnMut(&MarketDataUpdate, &OrderbookManager),
    {
        let session = self.cancel.child_token();
        let started = Instant::now();

        let sender = tokio::spawn(send_requests(
            requests,
            self.config.clone(),
            started,
            session.clone(),
        ));
        let deadline = self.config.session_deadline().map(|after| {
            let session = session.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = session.cancelled() => {}
                    _ = tokio::time::sleep_until(started + after) => {
                        info!("session deadline reached, closing");
                        session.cancel();
                    }
                }
            })
        });

        let mut failure = None;
        let mut close_by: Option<Instant> = None;
        loop {
            tokio::select! {
                next = updates.next() => match next {
                    Some(Ok(update)) => {
                        let instrument = self.store.process_update(&update);
                        debug!(instrument, snapshot = update.is_snapshot(), "applied update");
                        on_update(&update, &self.store);
                    }
                    Some(Err(e)) => {
                        warn!("receive failed: {}", e);
                        failure = Some(format!("receive failed: {}", e));
                        break;
                    }
                    None => {
                        info!("server closed the stream");
                        break;
                    }
                },
                _ = session.cancelled(), if close_by.is_none() => {
                    close_by = Some(Instant::now() + CLOSE_GRACE);
                }
                _ = tokio::time::sleep_until(close_by.unwrap_or_else(Instant::now)), if close_by.is_some() => {
                    failure = Some("server did not close the stream".to_string());
                    break;
                }
            }
        }

        session.cancel();
        if let Some(deadline) = deadline {
            deadline.abort();
        }
        match sender.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("send failed, stream likely broken: {}", e);
                failure.get_or_insert_with(|| format!("send failed: {}", e));
            }
            Err(e) => {
                failure.get_or_insert_with(|| format!("send task failed: {}", e));
            }
        }

        let outcome = match failure {
            None => SessionOutcome::Completed,
            Some(reason) => SessionOutcome::Failed(reason),
        };
        match &outcome {
            SessionOutcome::Completed => info!(?outcome, "session finished"),
            SessionOutcome::Failed(_) => warn!(?outcome, "session finished"),
        }
        outcome
    }
}

/// Send task: subscribes, unsubscribes on schedule, closes on cancel.
///
/// Only request writes count as failures; the final close is best effort.
async fn send_requests<S>(
    mut requests: S,
    config: ClientConfig,
    started: Instant,
    session: CancellationToken,
) -> Result<(), Error>
where
    S: Sink<SubscriptionRequest, Error = Error> + Unpin,
{
    let result = send_plan(&mut requests, &config, started, &session).await;
    if result.is_ok() {
        session.cancelled().await;
    }

    match tokio::time::timeout(CLOSE_GRACE, requests.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("closing outbound half failed: {}", e),
        Err(_) => debug!("closing outbound half timed out"),
    }
    result
}

async fn send_plan<S>(
    requests: &mut S,
    config: &ClientConfig,
    started: Instant,
    session: &CancellationToken,
) -> Result<(), Error>
where
    S: Sink<SubscriptionRequest, Error = Error> + Unpin,
{
    for (i, instrument_id) in config.instruments().iter().enumerate() {
        if i > 0 && !wait_until(session, Instant::now() + config.subscribe_pacing()).await {
            return Ok(());
        }
        let request = SubscriptionRequest::subscribe(instrument_id.as_str());
        if !send_unless_cancelled(requests, request, session).await? {
            return Ok(());
        }
        info!(instrument = %instrument_id, "sent subscription request");
    }

    let mut schedule = config.unsubscribes().to_vec();
    schedule.sort_by_key(|step| step.after);
    for step in schedule {
        if !wait_until(session, started + step.after).await {
            return Ok(());
        }
        let request = SubscriptionRequest::unsubscribe(step.instrument_id.as_str());
        if !send_unless_cancelled(requests, request, session).await? {
            return Ok(());
        }
        info!(instrument = %step.instrument_id, "sent unsubscribe request");
    }
    Ok(())
}

/// Write one request; `Ok(false)` if the session was cancelled first.
///
/// A write stuck on a sink that no longer drains is abandoned on cancel.
async fn send_unless_cancelled<S>(
    requests: &mut S,
    request: SubscriptionRequest,
    session: &CancellationToken,
) -> Result<bool, Error>
where
    S: Sink<SubscriptionRequest, Error = Error> + Unpin,
{
    if session.is_cancelled() {
        return Ok(false);
    }
    tokio::select! {
        _ = session.cancelled() => Ok(false),
        sent = requests.send(request) => sent.map(|()| true),
    }
}

/// Sleep until `deadline`; `false` if the session was cancelled first
async fn wait_until(session: &CancellationToken, deadline: Instant) -> bool {
    tokio::select! {
        _ = session.cancelled() => false,
        _ = tokio::time::sleep_until(deadline) => true,
    }
}
