//! WebSocket connection to a feed server.
//!
//! [`WebSocketClient`] wraps one connection. It can be used directly
//! (send requests, pull updates one at a time) or split into typed halves
//! with [`into_parts`](WebSocketClient::into_parts) for the
//! [`SubscriptionDriver`](super::SubscriptionDriver).
//!
//! # Example
//!
//! ```rust,no_run
//! use orderbook_feed::client::WebSocketClient;
//! use orderbook_feed::config::ClientConfig;
//!
//! # async fn example() -> orderbook_feed::Result<()> {
//! let mut ws = WebSocketClient::connect(&ClientConfig::default()).await?;
//! ws.subscribe("AAPL").await?;
//!
//! while let Some(update) = ws.next().await {
//!     println!("{:?}", update?);
//! }
//! # Ok(())
//! # }
//! ```

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::info;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::transport;
use crate::types::{MarketDataUpdate, SubscriptionRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client for the market data feed
///
/// # Thread Safety
///
/// This client is NOT thread-safe. To send and receive from different tasks,
/// split it with [`into_parts`](Self::into_parts).
#[derive(Debug)]
pub struct WebSocketClient {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl WebSocketClient {
    /// Connect to the server named in `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the handshake does not finish within
    /// the configured connect timeout, or the URL/transport error otherwise.
    pub async fn connect(config: &ClientConfig) -> Result<Self, Error> {
        let url = config.server_url()?;

        let (ws_stream, _response) =
            tokio::time::timeout(config.connect_timeout(), tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| Error::Timeout)??;
        info!("connected to {}", url);

        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    /// Send one request
    pub async fn send_request(&mut self, request: &SubscriptionRequest) -> Result<(), Error> {
        self.write.send(transport::encode(request)?).await?;
        Ok(())
    }

    /// Request snapshot and updates for an instrument
    pub async fn subscribe(&mut self, instrument_id: &str) -> Result<(), Error> {
        self.send_request(&SubscriptionRequest::subscribe(instrument_id))
            .await
    }

    /// Stop updates for an instrument
    pub async fn unsubscribe(&mut self, instrument_id: &str) -> Result<(), Error> {
        self.send_request(&SubscriptionRequest::unsubscribe(instrument_id))
            .await
    }

    /// Receive the next update
    ///
    /// # Returns
    ///
    /// The next update, or `None` if the connection is closed. Frames that do
    /// not decode are skipped.
    pub async fn next(&mut self) -> Option<Result<MarketDataUpdate, Error>> {
        loop {
            let frame = self.read.next().await?;
            if let Some(update) = transport::decode(frame) {
                return Some(update);
            }
        }
    }

    /// Close the outbound half.
    ///
    /// The server answers by ending the session and closing its side, after
    /// which [`next`](Self::next) returns `None`.
    pub async fn close(&mut self) -> Result<(), Error> {
        self.write.close().await?;
        Ok(())
    }

    /// Split into a typed request sink and update stream
    pub fn into_parts(
        self,
    ) -> (
        impl Sink<SubscriptionRequest, Error = Error> + Send + Unpin + 'static,
        impl Stream<Item = Result<MarketDataUpdate, Error>> + Send + Unpin + 'static,
    ) {
        (
            transport::json_sink(self.write),
            transport::json_stream(self.read),
        )
    }
}
