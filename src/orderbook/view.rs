//! Read-only ordered copy of an order book, used for display and inspection.

use std::fmt;

use crate::types::PriceLevel;

/// Ordered, owned copy of one instrument's book.
///
/// Bids are sorted descending by price, asks ascending. A view is taken
/// under the book's lock and never reflects a half-applied update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookView {
    /// Instrument identifier
    pub instrument_id: String,
    /// Bid levels, best (highest) first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best (lowest) first
    pub asks: Vec<PriceLevel>,
}

impl BookView {
    /// Whether both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

// Ladder layout: asks from the top of the book down to the best ask, then
// bids from the best bid down.
impl fmt::Display for BookView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Order Book for {} ---", self.instrument_id)?;
        writeln!(f, "  ASKS:")?;
        for level in self.asks.iter().rev() {
            writeln!(
                f,
                "    Price: {:.2}, Quantity: {:.2}",
                level.price, level.quantity
            )?;
        }
        writeln!(f, "  BIDS:")?;
        for level in &self.bids {
            writeln!(
                f,
                "    Price: {:.2}, Quantity: {:.2}",
                level.price, level.quantity
            )?;
        }
        write!(f, "-----------------------------")
    }
}
