//! Feed client.
//!
//! This module contains:
//!
//! - [`websocket`] - WebSocket connection to a feed server
//! - [`driver`] - session driver feeding the local order book store

pub mod driver;
pub mod websocket;

pub use driver::{SessionOutcome, SubscriptionDriver};
pub use websocket::WebSocketClient;
