//! Feed client binary.
//!
//! Subscribes to the configured instruments, prints every book after each
//! update, and exits when the session ends.
//!
//! Usage:
//!   cargo run --bin feed-client
//!
//! Optional:
//!   ORDERBOOK_FEED_URL=ws://localhost:50051
//!   ORDERBOOK_FEED_INSTRUMENTS=AAPL,MSFT
//!   ORDERBOOK_FEED_PACING_MS=100
//!   ORDERBOOK_FEED_UNSUBSCRIBE=AAPL@10000   # empty to disable
//!   ORDERBOOK_FEED_DEADLINE_MS=20000        # 0 runs until the server closes
//!   RUST_LOG=orderbook_feed=debug

use std::sync::Arc;

use orderbook_feed::client::{SessionOutcome, SubscriptionDriver};
use orderbook_feed::config::ClientConfig;
use orderbook_feed::orderbook::OrderbookManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let store = Arc::new(OrderbookManager::new());
    let driver = SubscriptionDriver::new(config, Arc::clone(&store));

    let cancel = driver.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = driver
        .connect_and_run(|update, store| {
            if let Some(view) = store.view(update.instrument_id()) {
                tracing::info!("\n{}", view);
            }
        })
        .await;

    match outcome {
        SessionOutcome::Completed => Ok(()),
        SessionOutcome::Failed(reason) => Err(reason.into()),
    }
}
