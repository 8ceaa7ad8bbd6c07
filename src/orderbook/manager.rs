//! Order book store for all instruments seen on a feed.
//!
//! This module provides [`OrderbookManager`], a thread-safe container that
//! folds snapshots and incremental updates into one [`Orderbook`] per
//! instrument.
//!
//! # Design
//!
//! The manager uses `parking_lot::RwLock` for each orderbook, allowing
//! concurrent reads while ensuring exclusive write access during updates.
//! Every apply runs entirely under the book's write lock, so readers never
//! observe a torn book.
//!
//! # Unknown instruments
//!
//! An incremental update for an instrument that has no book yet creates an
//! empty book and applies the deltas to it. The book stays in
//! [`BookState::AwaitingSnapshot`] until a snapshot arrives.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::types::{MarketDataUpdate, PriceLevel};

use super::{BookView, Orderbook};

/// State of an orderbook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
    /// At least one snapshot has been applied
    Synchronized,
    /// Book exists (added or created lazily) but has no snapshot yet
    AwaitingSnapshot,
}

/// Entry in the orderbook manager
#[derive(Debug)]
struct BookEntry {
    book: Orderbook,
    state: BookState,
}

impl BookEntry {
    fn new(instrument_id: &str) -> Self {
        Self {
            book: Orderbook::new(instrument_id),
            state: BookState::AwaitingSnapshot,
        }
    }
}

/// Manager for multiple orderbooks.
///
/// # Thread Safety
///
/// The manager is safe to share across threads via `Arc<OrderbookManager>`.
/// Individual orderbooks are protected by `RwLock` for concurrent read access.
///
/// # Example
///
/// ```rust
/// use orderbook_feed::orderbook::OrderbookManager;
/// use orderbook_feed::types::PriceLevel;
///
/// let manager = OrderbookManager::new();
///
/// manager.apply_snapshot(
///     "AAPL",
///     &[PriceLevel::new(99.5, 100.0), PriceLevel::new(99.0, 200.0)],
///     &[PriceLevel::new(100.0, 150.0), PriceLevel::new(100.5, 250.0)],
/// );
/// manager.apply_incremental(
///     "AAPL",
///     &[PriceLevel::new(99.0, 0.0)],
///     &[PriceLevel::new(100.0, 175.0)],
/// );
///
/// let view = manager.view("AAPL").unwrap();
/// assert_eq!(view.bids, vec![PriceLevel::new(99.5, 100.0)]);
/// assert_eq!(view.asks[0], PriceLevel::new(100.0, 175.0));
/// ```
#[derive(Debug, Default)]
pub struct OrderbookManager {
    /// Orderbooks by instrument id
    books: RwLock<FxHashMap<String, RwLock<BookEntry>>>,
}

impl OrderbookManager {
    /// Create a new orderbook manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument to track
    ///
    /// Creates an empty orderbook in `AwaitingSnapshot` state. No-op if the
    /// instrument is already tracked.
    pub fn add_instrument(&self, instrument_id: &str) {
        let mut books = self.books.write();
        books
            .entry(instrument_id.to_string())
            .or_insert_with(|| RwLock::new(BookEntry::new(instrument_id)));
    }

    /// Remove an instrument from tracking
    pub fn remove_instrument(&self, instrument_id: &str) -> Option<Orderbook> {
        let mut books = self.books.write();
        books
            .remove(instrument_id)
            .map(|entry| entry.into_inner().book)
    }

    /// Get the state of an orderbook
    pub fn get_state(&self, instrument_id: &str) -> Option<BookState> {
        let books = self.books.read();
        books.get(instrument_id).map(|e| e.read().state)
    }

    /// Get all instruments still waiting for their first snapshot
    pub fn instruments_awaiting_snapshot(&self) -> Vec<String> {
        let books = self.books.read();
        let mut ids: Vec<String> = books
            .iter()
            .filter(|(_, entry)| entry.read().state == BookState::AwaitingSnapshot)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Replace an instrument's bid and ask sides wholesale
    pub fn apply_snapshot(&self, instrument_id: &str, bids: &[PriceLevel], asks: &[PriceLevel]) {
        self.with_entry(instrument_id, |entry| {
            let rejected = entry.book.apply_snapshot(bids, asks);
            entry.state = BookState::Synchronized;
            if rejected > 0 {
                warn!(instrument = instrument_id, rejected, "skipped malformed snapshot levels");
            }
            debug!(
                instrument = instrument_id,
                bids = bids.len(),
                asks = asks.len(),
                "applied snapshot"
            );
        });
    }

    /// Apply per-level deltas to an instrument's book
    ///
    /// Creates an empty book first if the instrument is unknown.
    pub fn apply_incremental(
        &self,
        instrument_id: &str,
        bid_updates: &[PriceLevel],
        ask_updates: &[PriceLevel],
    ) {
        self.with_entry(instrument_id, |entry| {
            let rejected = entry.book.apply_incremental(bid_updates, ask_updates);
            if rejected > 0 {
                warn!(instrument = instrument_id, rejected, "skipped malformed deltas");
            }
        });
    }

    /// Process a wire update
    ///
    /// Routes snapshots and incremental updates to the appropriate orderbook.
    /// Returns the instrument id that was updated.
    pub fn process_update<'a>(&self, update: &'a MarketDataUpdate) -> &'a str {
        match update {
            MarketDataUpdate::Snapshot(snapshot) => {
                self.apply_snapshot(&snapshot.instrument_id, &snapshot.bids, &snapshot.asks);
            }
            MarketDataUpdate::IncrementalUpdate(delta) => {
                self.apply_incremental(
                    &delta.instrument_id,
                    &delta.bid_updates,
                    &delta.ask_updates,
                );
            }
        }
        update.instrument_id()
    }

    /// Run `f` on the instrument's entry under its write lock, adding the
    /// instrument first if it is not tracked yet.
    fn with_entry<F>(&self, instrument_id: &str, f: F)
    where
        F: FnOnce(&mut BookEntry),
    {
        {
            let books = self.books.read();
            if let Some(entry) = books.get(instrument_id) {
                f(&mut entry.write());
                return;
            }
        }

        debug!(instrument = instrument_id, "creating book on first update");
        let mut books = self.books.write();
        let entry = books
            .entry(instrument_id.to_string())
            .or_insert_with(|| RwLock::new(BookEntry::new(instrument_id)));
        f(entry.get_mut());
    }

    /// Get an ordered read-only view of an orderbook
    pub fn view(&self, instrument_id: &str) -> Option<BookView> {
        let books = self.books.read();
        books.get(instrument_id).map(|e| e.read().book.view())
    }

    /// Get a snapshot of an orderbook
    ///
    /// Returns a cloned copy of the orderbook for safe reading without holding locks.
    pub fn get_orderbook(&self, instrument_id: &str) -> Option<Orderbook> {
        let books = self.books.read();
        books.get(instrument_id).map(|e| e.read().book.clone())
    }

    /// Get best bid for an instrument
    pub fn best_bid(&self, instrument_id: &str) -> Option<PriceLevel> {
        let books = self.books.read();
        books
            .get(instrument_id)
            .and_then(|e| e.read().book.best_bid())
    }

    /// Get best ask for an instrument
    pub fn best_ask(&self, instrument_id: &str) -> Option<PriceLevel> {
        let books = self.books.read();
        books
            .get(instrument_id)
            .and_then(|e| e.read().book.best_ask())
    }

    /// Get mid price for an instrument
    pub fn mid_price(&self, instrument_id: &str) -> Option<f64> {
        let books = self.books.read();
        books
            .get(instrument_id)
            .and_then(|e| e.read().book.mid_price())
    }

    /// Get spread for an instrument
    pub fn spread(&self, instrument_id: &str) -> Option<f64> {
        let books = self.books.read();
        books
            .get(instrument_id)
            .and_then(|e| e.read().book.spread())
    }

    /// Clear all orderbooks
    pub fn clear(&self) {
        let mut books = self.books.write();
        books.clear();
    }

    /// Get number of tracked instruments
    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    /// Check if manager has no instruments
    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }

    /// Get all tracked instrument ids, sorted
    pub fn instruments(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.books.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
