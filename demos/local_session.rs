//! Server and client in one process.
//!
//! Starts a feed server on an ephemeral localhost port, runs one client
//! session against it (subscribe AAPL and MSFT, drop AAPL after 3 s, stop
//! after 6 s) and prints the final books.
//!
//! Usage:
//!   cargo run --example local_session
//!
//! Optional:
//!   RUST_LOG=orderbook_feed=debug

use std::sync::Arc;
use std::time::Duration;

use orderbook_feed::client::SubscriptionDriver;
use orderbook_feed::config::{ClientConfig, ServerConfig};
use orderbook_feed::orderbook::OrderbookManager;
use orderbook_feed::server::{MarketDataServer, RandomWalkSource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("orderbook_feed=info")),
        )
        .init();

    let server_config = ServerConfig::default()
        .with_bind_addr(([127, 0, 0, 1], 0).into())
        .with_update_interval(Duration::from_millis(250));
    let server = MarketDataServer::bind(server_config, Arc::new(RandomWalkSource::default())).await?;
    let url = format!("ws://{}", server.local_addr());
    let shutdown = server.shutdown_token();
    let server_task = tokio::spawn(server.run());

    println!("=== Local feed session against {} ===\n", url);

    let client_config = ClientConfig::default()
        .with_server_url(url)
        .with_instruments(["AAPL", "MSFT"])
        .without_unsubscribes()
        .with_unsubscribe_after(Duration::from_secs(3), "AAPL")
        .with_session_deadline(Some(Duration::from_secs(6)));

    let store = Arc::new(OrderbookManager::new());
    let driver = SubscriptionDriver::new(client_config, Arc::clone(&store));

    let mut updates = 0u64;
    let outcome = driver
        .connect_and_run(|update, store| {
            updates += 1;
            if updates % 8 == 0 {
                if let Some(view) = store.view(update.instrument_id()) {
                    println!("{}", view);
                }
            }
        })
        .await;

    println!("\nSession outcome: {:?} after {} updates", outcome, updates);
    for instrument in store.instruments() {
        if let Some(view) = store.view(&instrument) {
            println!("{}", view);
        }
        if let (Some(bid), Some(ask)) = (store.best_bid(&instrument), store.best_ask(&instrument)) {
            println!("{}: best bid {:.2} x {:.2}, best ask {:.2} x {:.2}", instrument, bid.price, bid.quantity, ask.price, ask.quantity);
        }
    }

    shutdown.cancel();
    server_task.await??;
    Ok(())
}
