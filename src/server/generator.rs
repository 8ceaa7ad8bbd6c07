//! Update sources: where the server's snapshots and deltas come from.
//!
//! The feed core treats the source as opaque. [`StaticSource`] replays a
//! fixed dummy book with a deterministic oscillating delta, and
//! [`RandomWalkSource`] drifts a mid price per instrument.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use crate::types::{OrderBookIncrementalUpdate, OrderBookSnapshot, Price, PriceLevel};

/// Supplies the content of snapshots and incremental updates.
///
/// One source is shared by every emitter of a server, so implementations
/// must be `Send + Sync` and keep any per-instrument state internally
/// synchronized.
pub trait UpdateSource: Send + Sync + 'static {
    /// Initial book sent when an instrument is subscribed
    fn snapshot(&self, instrument_id: &str) -> OrderBookSnapshot;

    /// The `tick`-th incremental update of one subscription (0-based)
    fn next_update(&self, instrument_id: &str, tick: u64) -> OrderBookIncrementalUpdate;
}

/// Deterministic dummy book.
///
/// Snapshot: bids 99.5×100 and 99.0×200, asks 100.0×150 and 100.5×250.
/// Tick `n` updates one bid around 99.0 and one ask around 100.0, shifted by
/// +0.1 / -0.1 on alternate ticks, with sizes growing by 10 and 5 per tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSource;

impl UpdateSource for StaticSource {
    fn snapshot(&self, instrument_id: &str) -> OrderBookSnapshot {
        OrderBookSnapshot {
            instrument_id: instrument_id.to_string(),
            bids: vec![PriceLevel::new(99.5, 100.0), PriceLevel::new(99.0, 200.0)],
            asks: vec![PriceLevel::new(100.0, 150.0), PriceLevel::new(100.5, 250.0)],
        }
    }

    fn next_update(&self, instrument_id: &str, tick: u64) -> OrderBookIncrementalUpdate {
        let shift = if tick % 2 == 0 { 0.1 } else { -0.1 };
        let tick = tick as f64;

        OrderBookIncrementalUpdate {
            instrument_id: instrument_id.to_string(),
            bid_updates: vec![PriceLevel::new(99.0 + shift, 200.0 + tick * 10.0)],
            ask_updates: vec![PriceLevel::new(100.0 - shift, 150.0 + tick * 5.0)],
        }
    }
}

/// Tick size used when the configured one is zero, negative or not finite
pub const FALLBACK_TICK_SIZE: Price = 0.01;

/// Random-walk book per instrument.
///
/// Every instrument starts at `initial_mid`. Each tick moves the mid by one
/// tick in a random direction, re-quotes the touch on both sides and, with
/// some probability, pulls a level further out.
#[derive(Debug)]
pub struct RandomWalkSource {
    initial_mid: Price,
    tick_size: Price,
    depth: usize,
    mids: Mutex<FxHashMap<String, Price>>,
    rng: Mutex<StdRng>,
}

impl RandomWalkSource {
    /// Create a source seeded from OS entropy
    pub fn new(initial_mid: Price, tick_size: Price, depth: usize) -> Self {
        Self::with_rng(initial_mid, tick_size, depth, StdRng::from_entropy())
    }

    /// Create a reproducible source
    pub fn seeded(initial_mid: Price, tick_size: Price, depth: usize, seed: u64) -> Self {
        Self::with_rng(initial_mid, tick_size, depth, StdRng::seed_from_u64(seed))
    }

    fn with_rng(initial_mid: Price, tick_size: Price, depth: usize, rng: StdRng) -> Self {
        let tick_size = if tick_size.is_finite() && tick_size > 0.0 {
            tick_size
        } else {
            FALLBACK_TICK_SIZE
        };
        Self {
            initial_mid,
            tick_size,
            depth: depth.max(1),
            mids: Mutex::new(FxHashMap::default()),
            rng: Mutex::new(rng),
        }
    }

    fn round(&self, price: Price) -> Price {
        (price / self.tick_size).round() * self.tick_size
    }

    fn quantity(rng: &mut StdRng) -> f64 {
        f64::from(rng.gen_range(1u32..=50) * 10)
    }
}

impl Default for RandomWalkSource {
    fn default() -> Self {
        Self::new(100.0, 0.05, 5)
    }
}

impl UpdateSource for RandomWalkSource {
    fn snapshot(&self, instrument_id: &str) -> OrderBookSnapshot {
        let mid = *self
            .mids
            .lock()
            .entry(instrument_id.to_string())
            .or_insert(self.initial_mid);
        let mut rng = self.rng.lock();

        let levels = 1..=self.depth;
        let bids = levels
            .clone()
            .map(|i| PriceLevel::new(self.round(mid - i as f64 * self.tick_size), Self::quantity(&mut rng)))
            .collect();
        let asks = levels
            .map(|i| PriceLevel::new(self.round(mid + i as f64 * self.tick_size), Self::quantity(&mut rng)))
            .collect();

        OrderBookSnapshot {
            instrument_id: instrument_id.to_string(),
            bids,
            asks,
        }
    }

    fn next_update(&self, instrument_id: &str, _tick: u64) -> OrderBookIncrementalUpdate {
        let mut rng = self.rng.lock();
        let mid = {
            let mut mids = self.mids.lock();
            let mid = mids
                .entry(instrument_id.to_string())
                .or_insert(self.initial_mid);
            let step = if rng.gen_bool(0.5) { self.tick_size } else { -self.tick_size };
            *mid = self.round((*mid + step).max(self.tick_size * (self.depth as f64 + 1.0)));
            *mid
        };

        let mut bid_updates = vec![PriceLevel::new(
            self.round(mid - self.tick_size),
            Self::quantity(&mut rng),
        )];
        let mut ask_updates = vec![PriceLevel::new(
            self.round(mid + self.tick_size),
            Self::quantity(&mut rng),
        )];

        if rng.gen_bool(0.3) {
            let far = (self.depth + 1) as f64 * self.tick_size;
            bid_updates.push(PriceLevel::new(self.round(mid - far), 0.0));
            ask_updates.push(PriceLevel::new(self.round(mid + far), 0.0));
        }

        OrderBookIncrementalUpdate {
            instrument_id: instrument_id.to_string(),
            bid_updates,
            ask_updates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_snapshot() {
        let snapshot = StaticSource.snapshot("AAPL");
        assert_eq!(snapshot.instrument_id, "AAPL");
        assert_eq!(snapshot.bids[0], PriceLevel::new(99.5, 100.0));
        assert_eq!(snapshot.asks[1], PriceLevel::new(100.5, 250.0));
    }

    #[test]
    fn test_static_updates_alternate() {
        let first = StaticSource.next_update("AAPL", 0);
        let second = StaticSource.next_update("AAPL", 1);

        assert!((first.bid_updates[0].price - 99.1).abs() < 1e-9);
        assert!((first.ask_updates[0].price - 99.9).abs() < 1e-9);
        assert_eq!(first.bid_updates[0].quantity, 200.0);

        assert!((second.bid_updates[0].price - 98.9).abs() < 1e-9);
        assert!((second.ask_updates[0].price - 100.1).abs() < 1e-9);
        assert_eq!(second.bid_updates[0].quantity, 210.0);
        assert_eq!(second.ask_updates[0].quantity, 155.0);
    }

    #[test]
    fn test_random_walk_snapshot_is_sorted_and_uncrossed() {
        let source = RandomWalkSource::seeded(50.0, 0.5, 4, 7);
        let snapshot = source.snapshot("X");

        assert_eq!(snapshot.bids.len(), 4);
        assert_eq!(snapshot.asks.len(), 4);
        assert!(snapshot.bids.windows(2).all(|w| w[0].price > w[1].price));
        assert!(snapshot.asks.windows(2).all(|w| w[0].price < w[1].price));
        assert!(snapshot.bids[0].price < snapshot.asks[0].price);
    }

    #[test]
    fn test_random_walk_rejects_degenerate_tick_size() {
        for tick_size in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let source = RandomWalkSource::seeded(100.0, tick_size, 3, 1);
            let snapshot = source.snapshot("X");
            let update = source.next_update("X", 0);

            assert!(snapshot
                .bids
                .iter()
                .chain(&snapshot.asks)
                .chain(&update.bid_updates)
                .chain(&update.ask_updates)
                .all(PriceLevel::is_well_formed));
            assert!(snapshot.bids[0].price < snapshot.asks[0].price);
        }
    }

    #[test]
    fn test_random_walk_updates_are_well_formed() {
        let source = RandomWalkSource::seeded(1.0, 0.25, 3, 42);
        for tick in 0..200 {
            let update = source.next_update("X", tick);
            assert!(update
                .bid_updates
                .iter()
                .chain(&update.ask_updates)
                .all(PriceLevel::is_well_formed));
        }
    }
}
