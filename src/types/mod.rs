//! Wire types shared by the server and the client.
//!
//! - [`messages`] - Subscription requests and market data updates

pub mod messages;

pub use messages::{
    Action, MarketDataUpdate, OrderBookIncrementalUpdate, OrderBookSnapshot, PriceLevel,
    SubscriptionRequest,
};

/// Level price
///
/// Carried as `f64` on the wire. Inside the order book it is keyed through
/// `OrderedFloat` so that levels have a total order.
pub type Price = f64;

/// Resting quantity at a price level
pub type Quantity = f64;
