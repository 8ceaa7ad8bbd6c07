//! One side of an order book.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::types::{Price, PriceLevel, Quantity};

/// Result of applying one level to a [`PriceLevelTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    /// A new price was added
    Inserted,
    /// An existing price got a new quantity
    Replaced,
    /// An existing price was deleted
    Removed,
    /// Deletion of a price that was not present
    Unchanged,
    /// Malformed level, skipped
    Rejected,
}

/// Ordered mapping from price to quantity.
///
/// Keys are kept ascending in a `BTreeMap`; callers pick the iteration
/// direction that matches the side (bids descending, asks ascending).
/// The table never holds a level with quantity `<= 0` and never holds two
/// levels at the same price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceLevelTable {
    levels: BTreeMap<OrderedFloat<Price>, Quantity>,
}

impl PriceLevelTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a complete list of levels.
    ///
    /// Levels are folded in order with [`apply`](Self::apply) semantics, so a
    /// repeated price keeps its last quantity and non-positive quantities
    /// never rest. Returns the table and the number of rejected levels.
    #[must_use]
    pub fn from_levels(levels: &[PriceLevel]) -> (Self, usize) {
        let mut table = Self::new();
        let rejected = table.apply_all(levels);
        (table, rejected)
    }

    /// Apply a single delta: upsert when quantity > 0, otherwise delete.
    pub fn apply(&mut self, level: &PriceLevel) -> LevelChange {
        if !level.is_well_formed() {
            return LevelChange::Rejected;
        }

        let key = OrderedFloat(level.price);
        if level.is_deletion() {
            match self.levels.remove(&key) {
                Some(_) => LevelChange::Removed,
                None => LevelChange::Unchanged,
            }
        } else {
            match self.levels.insert(key, level.quantity) {
                Some(_) => LevelChange::Replaced,
                None => LevelChange::Inserted,
            }
        }
    }

    /// Apply a list of deltas in order. Returns how many were rejected.
    pub fn apply_all(&mut self, levels: &[PriceLevel]) -> usize {
        levels
            .iter()
            .filter(|level| self.apply(level) == LevelChange::Rejected)
            .count()
    }

    /// Quantity resting at `price`
    #[must_use]
    pub fn get(&self, price: Price) -> Option<Quantity> {
        self.levels.get(&OrderedFloat(price)).copied()
    }

    /// Lowest-priced level
    #[must_use]
    pub fn lowest(&self) -> Option<PriceLevel> {
        self.levels
            .first_key_value()
            .map(|(p, &q)| PriceLevel::new(p.0, q))
    }

    /// Highest-priced level
    #[must_use]
    pub fn highest(&self) -> Option<PriceLevel> {
        self.levels
            .last_key_value()
            .map(|(p, &q)| PriceLevel::new(p.0, q))
    }

    /// Levels from lowest to highest price
    pub fn ascending(&self) -> impl DoubleEndedIterator<Item = PriceLevel> + '_ {
        self.levels.iter().map(|(p, &q)| PriceLevel::new(p.0, q))
    }

    /// Levels from highest to lowest price
    pub fn descending(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.ascending().rev()
    }

    /// Sum of all resting quantities
    #[must_use]
    pub fn total_quantity(&self) -> Quantity {
        self.levels.values().sum()
    }

    /// Number of price levels
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the table has no levels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Remove every level
    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lvl(price: Price, quantity: Quantity) -> PriceLevel {
        PriceLevel::new(price, quantity)
    }

    #[test]
    fn test_upsert_and_delete() {
        let mut table = PriceLevelTable::new();

        assert_eq!(table.apply(&lvl(99.0, 100.0)), LevelChange::Inserted);
        assert_eq!(table.get(99.0), Some(100.0));

        assert_eq!(table.apply(&lvl(99.0, 150.0)), LevelChange::Replaced);
        assert_eq!(table.get(99.0), Some(150.0));

        assert_eq!(table.apply(&lvl(99.0, 0.0)), LevelChange::Removed);
        assert_eq!(table.get(99.0), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut table = PriceLevelTable::new();
        table.apply(&lvl(100.0, 5.0));

        assert_eq!(table.apply(&lvl(101.0, 0.0)), LevelChange::Unchanged);
        assert_eq!(table.apply(&lvl(101.0, -3.0)), LevelChange::Unchanged);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_negative_quantity_deletes() {
        let mut table = PriceLevelTable::new();
        table.apply(&lvl(100.0, 5.0));
        assert_eq!(table.apply(&lvl(100.0, -1.0)), LevelChange::Removed);
        assert!(table.is_empty());
    }

    #[test]
    fn test_malformed_levels_rejected() {
        let mut table = PriceLevelTable::new();
        assert_eq!(table.apply(&lvl(f64::NAN, 5.0)), LevelChange::Rejected);
        assert_eq!(table.apply(&lvl(f64::INFINITY, 5.0)), LevelChange::Rejected);
        assert_eq!(table.apply(&lvl(-1.0, 5.0)), LevelChange::Rejected);
        assert!(table.is_empty());
    }

    #[test]
    fn test_last_delta_for_price_wins() {
        let mut table = PriceLevelTable::new();
        let rejected = table.apply_all(&[lvl(50.0, 1.0), lvl(50.0, 0.0), lvl(50.0, 7.0)]);
        assert_eq!(rejected, 0);
        assert_eq!(table.get(50.0), Some(7.0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_from_levels_drops_non_positive_and_counts_rejects() {
        let (table, rejected) =
            PriceLevelTable::from_levels(&[lvl(1.0, 10.0), lvl(2.0, 0.0), lvl(f64::NAN, 3.0)]);
        assert_eq!(rejected, 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(2.0), None);
    }

    #[test]
    fn test_iteration_order() {
        let (table, _) =
            PriceLevelTable::from_levels(&[lvl(100.5, 1.0), lvl(99.0, 2.0), lvl(100.0, 3.0)]);

        let asc: Vec<Price> = table.ascending().map(|l| l.price).collect();
        assert_eq!(asc, vec![99.0, 100.0, 100.5]);

        let desc: Vec<Price> = table.descending().map(|l| l.price).collect();
        assert_eq!(desc, vec![100.5, 100.0, 99.0]);

        assert_eq!(table.lowest(), Some(lvl(99.0, 2.0)));
        assert_eq!(table.highest(), Some(lvl(100.5, 1.0)));
        assert!((table.total_quantity() - 6.0).abs() < f64::EPSILON);
    }
}
