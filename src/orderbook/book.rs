//! Core orderbook data structure.
//!
//! Each side is a [`PriceLevelTable`] backed by a `BTreeMap`, providing:
//!
//! - O(log n) insertion, deletion, and lookup
//! - O(1) access to best bid/ask (via `first_key_value` / `last_key_value`)
//! - Ordered iteration for depth-of-book queries

use crate::types::{OrderBookIncrementalUpdate, OrderBookSnapshot, Price, PriceLevel, Quantity};

use super::table::PriceLevelTable;
use super::view::BookView;

/// Order book for a single instrument.
///
/// # Design Decisions
///
/// 1. **Snapshot swap**: Both replacement tables are built before either side
///    is touched, so a snapshot is all-or-nothing.
///
/// 2. **Deletion rule**: A delta with quantity `<= 0` removes its price; zero
///    and negative quantities are treated the same.
///
/// 3. **Normalize, don't fail**: Malformed levels are skipped and counted.
///
/// # Thread Safety
///
/// This struct is `Send + Sync` but not internally synchronized. For
/// concurrent access, wrap in `parking_lot::RwLock` (see
/// [`OrderbookManager`](super::OrderbookManager)).
#[derive(Debug, Clone, PartialEq)]
pub struct Orderbook {
    /// Instrument identifier
    instrument_id: String,

    /// Bid levels, best = highest price
    bids: PriceLevelTable,

    /// Ask levels, best = lowest price
    asks: PriceLevelTable,

    /// Snapshots and incremental updates applied so far
    updates_applied: u64,
}

impl Orderbook {
    /// Create a new empty orderbook for the given instrument
    #[must_use]
    pub fn new(instrument_id: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            bids: PriceLevelTable::new(),
            asks: PriceLevelTable::new(),
            updates_applied: 0,
        }
    }

    /// Get the instrument identifier
    #[must_use]
    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    /// Number of snapshots and incremental updates applied
    #[must_use]
    pub const fn updates_applied(&self) -> u64 {
        self.updates_applied
    }

    /// Replace both sides wholesale.
    ///
    /// Returns the number of malformed levels that were skipped.
    pub fn apply_snapshot(&mut self, bids: &[PriceLevel], asks: &[PriceLevel]) -> usize {
        let (new_bids, rejected_bids) = PriceLevelTable::from_levels(bids);
        let (new_asks, rejected_asks) = PriceLevelTable::from_levels(asks);

        self.bids = new_bids;
        self.asks = new_asks;
        self.updates_applied += 1;

        rejected_bids + rejected_asks
    }

    /// Apply per-level deltas to both sides, bids first, each in order.
    ///
    /// Returns the number of malformed deltas that were skipped.
    pub fn apply_incremental(
        &mut self,
        bid_updates: &[PriceLevel],
        ask_updates: &[PriceLevel],
    ) -> usize {
        let rejected = self.bids.apply_all(bid_updates) + self.asks.apply_all(ask_updates);
        self.updates_applied += 1;
        rejected
    }

    /// Apply a snapshot message. The instrument id is not checked.
    pub fn apply_snapshot_msg(&mut self, snapshot: &OrderBookSnapshot) -> usize {
        self.apply_snapshot(&snapshot.bids, &snapshot.asks)
    }

    /// Apply an incremental update message. The instrument id is not checked.
    pub fn apply_incremental_msg(&mut self, update: &OrderBookIncrementalUpdate) -> usize {
        self.apply_incremental(&update.bid_updates, &update.ask_updates)
    }

    /// Ordered copy of the current state
    #[must_use]
    pub fn view(&self) -> BookView {
        BookView {
            instrument_id: self.instrument_id.clone(),
            bids: self.bids.descending().collect(),
            asks: self.asks.ascending().collect(),
        }
    }

    /// Get the bid side
    #[must_use]
    pub fn bid_table(&self) -> &PriceLevelTable {
        &self.bids
    }

    /// Get the ask side
    #[must_use]
    pub fn ask_table(&self) -> &PriceLevelTable {
        &self.asks
    }

    /// Get the best bid (highest bid)
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.highest()
    }

    /// Get the best ask (lowest ask)
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.lowest()
    }

    /// Get the mid price
    ///
    /// Returns the average of best bid and best ask, or `None` if either is missing.
    #[must_use]
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            _ => None,
        }
    }

    /// Get the spread (best ask - best bid)
    #[must_use]
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Check if the book is crossed (best bid >= best ask)
    ///
    /// The feed does not prevent this; it is useful for validation.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }

    /// Get all bid levels, sorted by price descending (best first)
    pub fn bids(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.bids.descending()
    }

    /// Get all ask levels, sorted by price ascending (best first)
    pub fn asks(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.asks.ascending()
    }

    /// Get the top N bid levels
    #[must_use]
    pub fn top_bids(&self, n: usize) -> Vec<PriceLevel> {
        self.bids().take(n).collect()
    }

    /// Get the top N ask levels
    #[must_use]
    pub fn top_asks(&self, n: usize) -> Vec<PriceLevel> {
        self.asks().take(n).collect()
    }

    /// Get total bid quantity
    #[must_use]
    pub fn total_bid_quantity(&self) -> Quantity {
        self.bids.total_quantity()
    }

    /// Get total ask quantity
    #[must_use]
    pub fn total_ask_quantity(&self) -> Quantity {
        self.asks.total_quantity()
    }

    /// Clear the orderbook
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.updates_applied = 0;
    }

    /// Check if the orderbook is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Get the number of price levels as `(bids, asks)`
    #[must_use]
    pub fn num_levels(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }
}

impl Default for Orderbook {
    fn default() -> Self {
        Self::new("")
    }
}
