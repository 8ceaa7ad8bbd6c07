//! Feed server binary.
//!
//! Usage:
//!   cargo run --bin feed-server
//!
//! Optional:
//!   ORDERBOOK_FEED_BIND=0.0.0.0:50051   # listen address
//!   ORDERBOOK_FEED_INTERVAL_MS=1000     # pause between deltas per subscription
//!   ORDERBOOK_FEED_SOURCE=random        # random-walk book instead of the static one
//!   RUST_LOG=orderbook_feed=debug       # log filter

use std::sync::Arc;

use orderbook_feed::config::ServerConfig;
use orderbook_feed::server::{MarketDataServer, RandomWalkSource, StaticSource, UpdateSource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let source: Arc<dyn UpdateSource> = match std::env::var("ORDERBOOK_FEED_SOURCE").as_deref() {
        Ok("random") => Arc::new(RandomWalkSource::default()),
        _ => Arc::new(StaticSource),
    };

    let server = MarketDataServer::bind(config, source).await?;
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received");
        }
        shutdown.cancel();
    });

    server.run().await?;
    Ok(())
}
