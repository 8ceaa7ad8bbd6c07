//! Feed server.
//!
//! - [`listener`] - accept loop, one task per connection
//! - [`session`] - per-connection subscription manager
//! - [`emitter`] - per-subscription incremental update task
//! - [`gate`] - single-writer access to a connection's outbound half
//! - [`generator`] - where snapshot and delta content comes from
//!
//! Cancellation is hierarchical: the server's shutdown token parents each
//! connection token, which parents each emitter token. Tearing down any
//! level stops everything beneath it.

pub mod emitter;
pub mod gate;
pub mod generator;
pub mod listener;
pub mod session;

pub use emitter::{EmitterExit, EmitterHandle, EmitterReport, UpdateEmitter};
pub use gate::{UpdateSink, WriteGate};
pub use generator::{RandomWalkSource, StaticSource, UpdateSource};
pub use listener::MarketDataServer;
pub use session::{CloseReason, SessionSummary, SubscriptionManager};
