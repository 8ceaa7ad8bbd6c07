//! Wire message types.
//!
//! Clients send [`SubscriptionRequest`]s; the server answers with a stream of
//! [`MarketDataUpdate`]s. Both travel as JSON text frames.

use serde::{Deserialize, Deserializer, Serialize};

use super::{Price, Quantity};

/// Subscription action requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Start streaming an instrument
    Subscribe,
    /// Stop streaming an instrument
    Unsubscribe,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Subscribe => f.write_str("SUBSCRIBE"),
            Action::Unsubscribe => f.write_str("UNSUBSCRIBE"),
        }
    }
}

/// Request sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Subscribe or unsubscribe
    pub action: Action,
    /// Instrument the request applies to
    pub instrument_id: String,
}

impl SubscriptionRequest {
    /// Build a SUBSCRIBE request
    pub fn subscribe(instrument_id: impl Into<String>) -> Self {
        Self {
            action: Action::Subscribe,
            instrument_id: instrument_id.into(),
        }
    }

    /// Build an UNSUBSCRIBE request
    pub fn unsubscribe(instrument_id: impl Into<String>) -> Self {
        Self {
            action: Action::Unsubscribe,
            instrument_id: instrument_id.into(),
        }
    }
}

/// A single price level or level delta.
///
/// A missing or `null` price decodes as NaN so that the order book can
/// reject just that level instead of failing the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price
    #[serde(default = "missing_price", deserialize_with = "price_or_nan")]
    pub price: Price,
    /// Resting quantity; `<= 0` in a delta removes the level
    #[serde(default)]
    pub quantity: Quantity,
}

fn missing_price() -> Price {
    Price::NAN
}

fn price_or_nan<'de, D>(deserializer: D) -> Result<Price, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Price>::deserialize(deserializer)?.unwrap_or(Price::NAN))
}

impl PriceLevel {
    /// Create a new price level
    pub const fn new(price: Price, quantity: Quantity) -> Self {
        Self { price, quantity }
    }

    /// Whether the level can be applied at all.
    ///
    /// The price must be finite and non-negative and the quantity finite.
    pub fn is_well_formed(&self) -> bool {
        self.price.is_finite() && self.price >= 0.0 && self.quantity.is_finite()
    }

    /// Whether this level, applied as a delta, deletes its price
    pub fn is_deletion(&self) -> bool {
        self.quantity <= 0.0
    }
}

impl From<(Price, Quantity)> for PriceLevel {
    fn from((price, quantity): (Price, Quantity)) -> Self {
        Self::new(price, quantity)
    }
}

/// Full replacement state for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Instrument this snapshot describes
    pub instrument_id: String,
    /// Complete bid side
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    /// Complete ask side
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

impl OrderBookSnapshot {
    /// Snapshot with no levels.
    ///
    /// The server sends one of these to acknowledge an unsubscription.
    pub fn empty(instrument_id: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Whether both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Per-level changes for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookIncrementalUpdate {
    /// Instrument the deltas apply to
    pub instrument_id: String,
    /// Bid deltas, applied in order
    #[serde(default)]
    pub bid_updates: Vec<PriceLevel>,
    /// Ask deltas, applied in order
    #[serde(default)]
    pub ask_updates: Vec<PriceLevel>,
}

/// Message sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketDataUpdate {
    /// Full book state (also used as the unsubscribe acknowledgement)
    Snapshot(OrderBookSnapshot),
    /// Deltas on top of the current state
    IncrementalUpdate(OrderBookIncrementalUpdate),
}

impl MarketDataUpdate {
    /// Unsubscribe acknowledgement for an instrument
    pub fn unsubscribe_ack(instrument_id: impl Into<String>) -> Self {
        MarketDataUpdate::Snapshot(OrderBookSnapshot::empty(instrument_id))
    }

    /// Instrument this update is about
    pub fn instrument_id(&self) -> &str {
        match self {
            MarketDataUpdate::Snapshot(s) => &s.instrument_id,
            MarketDataUpdate::IncrementalUpdate(u) => &u.instrument_id,
        }
    }

    /// Whether this is a snapshot
    pub fn is_snapshot(&self) -> bool {
        matches!(self, MarketDataUpdate::Snapshot(_))
    }
}

impl From<OrderBookSnapshot> for MarketDataUpdate {
    fn from(snapshot: OrderBookSnapshot) -> Self {
        MarketDataUpdate::Snapshot(snapshot)
    }
}

impl From<OrderBookIncrementalUpdate> for MarketDataUpdate {
    fn from(update: OrderBookIncrementalUpdate) -> Self {
        MarketDataUpdate::IncrementalUpdate(update)
    }
}
