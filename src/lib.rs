//! # orderbook-feed
//!
//! Order book replication over a duplex WebSocket channel.
//!
//! A server streams, per subscribed instrument, one full snapshot followed by
//! periodic incremental updates. A client folds those messages into a local
//! order book store that always reflects a consistent, ordered view.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use orderbook_feed::client::SubscriptionDriver;
//! use orderbook_feed::config::{ClientConfig, ServerConfig};
//! use orderbook_feed::orderbook::OrderbookManager;
//! use orderbook_feed::server::{MarketDataServer, StaticSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), orderbook_feed::Error> {
//!     let server_config = ServerConfig::default().with_bind_addr("127.0.0.1:0".parse().unwrap());
//!     let server = MarketDataServer::bind(server_config, Arc::new(StaticSource)).await?;
//!     let url = format!("ws://{}", server.local_addr());
//!     tokio::spawn(server.run());
//!
//!     let store = Arc::new(OrderbookManager::new());
//!     let driver = SubscriptionDriver::new(ClientConfig::default().with_server_url(url), Arc::clone(&store));
//!     let outcome = driver.connect_and_run(|_, _| {}).await;
//!
//!     println!("{:?}: {}", outcome, store.view("MSFT").unwrap());
//!     Ok(())
//! }
//! ```
//!
//! ## Wire Format
//!
//! JSON text frames. Requests:
//!
//! ```json
//! {"action": "SUBSCRIBE", "instrument_id": "AAPL"}
//! ```
//!
//! Updates are tagged by `type`:
//!
//! ```json
//! {"type": "snapshot", "instrument_id": "AAPL", "bids": [{"price": 99.5, "quantity": 100.0}], "asks": []}
//! {"type": "incremental_update", "instrument_id": "AAPL", "bid_updates": [], "ask_updates": [{"price": 100.0, "quantity": 0.0}]}
//! ```
//!
//! A delta with quantity `<= 0` deletes its price level. An empty snapshot
//! acknowledges an unsubscription.
//!
//! ## Architecture
//!
//! - [`server`] - accept loop, per-connection subscription manager, update emitters
//! - [`client`] - WebSocket client and session driver
//! - [`orderbook`] - price level tables and the order book store
//! - [`types`] - wire messages
//! - [`transport`] - JSON framing over WebSocket halves
//! - [`config`] - server and client configuration
//! - [`error`] - error types for the crate

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod orderbook;
pub mod server;
pub mod transport;
pub mod types;

// Re-export main types at crate root for convenience
pub use client::{SessionOutcome, SubscriptionDriver};
pub use config::{ClientConfig, ServerConfig};
pub use error::Error;
pub use orderbook::{BookView, OrderbookManager};
pub use server::MarketDataServer;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
