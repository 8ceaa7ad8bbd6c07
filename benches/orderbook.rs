//! Benchmarks for order book operations.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use orderbook_feed::orderbook::{Orderbook, OrderbookManager};
use orderbook_feed::types::{MarketDataUpdate, OrderBookIncrementalUpdate, PriceLevel};

fn ladder(size: usize, start: f64, step: f64) -> Vec<PriceLevel> {
    (0..size)
        .map(|i| PriceLevel::new(start + i as f64 * step, 100.0 + i as f64))
        .collect()
}

fn bench_orderbook_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_delta");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut book = Orderbook::new("BENCH");
            book.apply_snapshot(&ladder(size, 99.0, -0.01), &ladder(size, 100.0, 0.01));

            let deltas = [PriceLevel::new(98.5, 10.0), PriceLevel::new(98.5, 0.0)];
            let none: &[PriceLevel] = &[];
            b.iter(|| {
                // Insert then delete the same level
                book.apply_incremental(black_box(&deltas[..]), black_box(none));
            });
        });
    }

    group.finish();
}

fn bench_orderbook_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_snapshot");

    for size in [10, 100, 1000].iter() {
        let bids = ladder(*size, 99.0, -0.01);
        let asks = ladder(*size, 100.0, 0.01);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut book = Orderbook::new("BENCH");
            b.iter(|| {
                book.apply_snapshot(black_box(&bids), black_box(&asks));
            });
        });
    }

    group.finish();
}

fn bench_orderbook_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_view");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut book = Orderbook::new("BENCH");
            book.apply_snapshot(&ladder(size, 99.0, -0.01), &ladder(size, 100.0, 0.01));

            b.iter(|| {
                black_box(book.view());
            });
        });
    }

    group.finish();
}

fn bench_orderbook_spread(c: &mut Criterion) {
    let mut book = Orderbook::new("BENCH");
    book.apply_snapshot(&ladder(50, 99.0, -0.05), &ladder(50, 100.0, 0.05));

    c.bench_function("orderbook_spread", |b| {
        b.iter(|| {
            black_box(book.spread());
        });
    });
}

fn bench_manager_process_update(c: &mut Criterion) {
    let manager = OrderbookManager::new();
    manager.apply_snapshot("BENCH", &ladder(100, 99.0, -0.01), &ladder(100, 100.0, 0.01));

    let update = MarketDataUpdate::from(OrderBookIncrementalUpdate {
        instrument_id: "BENCH".to_string(),
        bid_updates: vec![PriceLevel::new(99.0, 250.0)],
        ask_updates: vec![PriceLevel::new(100.0, 175.0)],
    });

    c.bench_function("manager_process_update", |b| {
        b.iter(|| {
            black_box(manager.process_update(black_box(&update)));
        });
    });
}

criterion_group!(
    benches,
    bench_orderbook_delta,
    bench_orderbook_snapshot,
    bench_orderbook_view,
    bench_orderbook_spread,
    bench_manager_process_update
);
criterion_main!(benches);
