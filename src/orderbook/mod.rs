//! Client-side order book reconstruction.
//!
//! This module folds the feed's snapshots and incremental updates into a
//! local book per instrument:
//!
//! - [`PriceLevelTable`] - one side of a book, ordered by price
//! - [`Orderbook`] - bids and asks for one instrument
//! - [`OrderbookManager`] - thread-safe store of all books on a feed
//! - [`BookView`] - ordered read-only copy for display
//!
//! # Example
//!
//! ```rust
//! use orderbook_feed::orderbook::Orderbook;
//! use orderbook_feed::types::PriceLevel;
//!
//! let mut book = Orderbook::new("AAPL");
//!
//! book.apply_snapshot(&[PriceLevel::new(99.5, 100.0)], &[PriceLevel::new(100.0, 150.0)]);
//! book.apply_incremental(&[PriceLevel::new(99.5, 0.0)], &[]);
//!
//! assert!(book.best_bid().is_none());
//! assert_eq!(book.best_ask(), Some(PriceLevel::new(100.0, 150.0)));
//! ```

pub mod book;
pub mod manager;
pub mod table;
pub mod view;

pub use book::Orderbook;
pub use manager::{BookState, OrderbookManager};
pub use table::{LevelChange, PriceLevelTable};
pub use view::BookView;
