//! End-to-end tests over a real localhost WebSocket.
//!
//! Each test starts its own server on an ephemeral port.
//!
//! # Running
//!
//! ```bash
//! cargo test --test integration_websocket
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use orderbook_feed::client::{SessionOutcome, SubscriptionDriver, WebSocketClient};
use orderbook_feed::config::{ClientConfig, ServerConfig};
use orderbook_feed::orderbook::OrderbookManager;
use orderbook_feed::server::{MarketDataServer, StaticSource};
use orderbook_feed::types::{MarketDataUpdate, PriceLevel};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    url: String,
    shutdown: CancellationToken,
    task: JoinHandle<orderbook_feed::Result<()>>,
}

impl TestServer {
    async fn start(update_interval: Duration) -> Self {
        let config = ServerConfig::default()
            .with_bind_addr(([127, 0, 0, 1], 0).into())
            .with_update_interval(update_interval);
        let server = assert_ok!(MarketDataServer::bind(config, Arc::new(StaticSource)).await);

        Self {
            url: format!("ws://{}", server.local_addr()),
            shutdown: server.shutdown_token(),
            task: tokio::spawn(server.run()),
        }
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_server_url(self.url.clone())
            .with_subscribe_pacing(Duration::from_millis(10))
            .without_unsubscribes()
            .with_session_deadline(None)
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let result = timeout(WAIT, self.task).await;
        assert!(result.is_ok(), "server did not stop in time");
        assert_ok!(result.unwrap().unwrap());
    }
}

async fn recv(ws: &mut WebSocketClient) -> MarketDataUpdate {
    let next = timeout(WAIT, ws.next()).await.expect("timed out waiting for update");
    assert_ok!(next.expect("stream ended"))
}

#[tokio::test]
async fn test_snapshot_then_deltas() {
    let server = TestServer::start(Duration::from_millis(20)).await;
    let mut ws = assert_ok!(WebSocketClient::connect(&server.client_config()).await);

    assert_ok!(ws.subscribe("AAPL").await);

    let first = recv(&mut ws).await;
    match &first {
        MarketDataUpdate::Snapshot(snapshot) => {
            assert_eq!(snapshot.instrument_id, "AAPL");
            assert_eq!(snapshot.bids[0], PriceLevel::new(99.5, 100.0));
        }
        other => panic!("expected snapshot first, got {:?}", other),
    }

    for _ in 0..3 {
        let update = recv(&mut ws).await;
        assert!(!update.is_snapshot());
        assert_eq!(update.instrument_id(), "AAPL");
    }

    assert_ok!(ws.close().await);
    server.stop().await;
}

#[tokio::test]
async fn test_unsubscribe_is_acknowledged() {
    let server = TestServer::start(Duration::from_millis(20)).await;
    let mut ws = assert_ok!(WebSocketClient::connect(&server.client_config()).await);

    assert_ok!(ws.subscribe("MSFT").await);
    assert!(recv(&mut ws).await.is_snapshot());
    assert!(!recv(&mut ws).await.is_snapshot());

    assert_ok!(ws.unsubscribe("MSFT").await);
    let ack = loop {
        let update = recv(&mut ws).await;
        if update.is_snapshot() {
            break update;
        }
    };
    assert_eq!(ack, MarketDataUpdate::unsubscribe_ack("MSFT"));

    // Never-subscribed instrument: acknowledged all the same
    assert_ok!(ws.unsubscribe("NVDA").await);
    assert_eq!(recv(&mut ws).await, MarketDataUpdate::unsubscribe_ack("NVDA"));

    // Nothing streams once both are acknowledged
    let quiet = timeout(Duration::from_millis(100), ws.next()).await;
    assert!(quiet.is_err(), "unexpected update after unsubscribe: {:?}", quiet);

    assert_ok!(ws.close().await);
    server.stop().await;
}

#[tokio::test]
async fn test_duplicate_subscribe_yields_one_stream() {
    let server = TestServer::start(Duration::from_millis(200)).await;
    let mut ws = assert_ok!(WebSocketClient::connect(&server.client_config()).await);

    assert_ok!(ws.subscribe("AAPL").await);
    assert_ok!(ws.subscribe("AAPL").await);

    // Over one second at 200 ms spacing a single emitter sends about five
    // deltas; two emitters would send about ten, and a second snapshot.
    let mut snapshots = 0;
    let mut deltas = 0;
    let collect = timeout(Duration::from_secs(1), async {
        while let Some(update) = ws.next().await {
            match assert_ok!(update) {
                MarketDataUpdate::Snapshot(_) => snapshots += 1,
                MarketDataUpdate::IncrementalUpdate(_) => deltas += 1,
            }
        }
    })
    .await;

    assert!(collect.is_err(), "stream ended early");
    assert_eq!(snapshots, 1);
    assert!((3..=7).contains(&deltas), "deltas: {}", deltas);

    server.stop().await;
}

#[tokio::test]
async fn test_undecodable_frame_is_skipped() {
    let server = TestServer::start(Duration::from_millis(20)).await;
    let (mut ws, _) = assert_ok!(tokio_tungstenite::connect_async(server.url.as_str()).await);

    assert_ok!(ws.send(Message::Text("not a request".to_string())).await);
    assert_ok!(
        ws.send(Message::Text(
            r#"{"action":"SUBSCRIBE","instrument_id":"GOOG"}"#.to_string()
        ))
        .await
    );

    let frame = timeout(WAIT, ws.next()).await.unwrap().unwrap();
    let text = match assert_ok!(frame) {
        Message::Text(text) => text,
        other => panic!("expected text frame, got {:?}", other),
    };
    let update: MarketDataUpdate = assert_ok!(serde_json::from_str(&text));
    assert!(update.is_snapshot());
    assert_eq!(update.instrument_id(), "GOOG");

    assert_ok!(ws.close(None).await);
    server.stop().await;
}

#[tokio::test]
async fn test_driver_book_converges() {
    let server = TestServer::start(Duration::from_millis(10)).await;
    let config = server
        .client_config()
        .with_instruments(["AAPL", "MSFT"])
        .with_session_deadline(Some(Duration::from_millis(400)));

    let store = Arc::new(OrderbookManager::new());
    let driver = SubscriptionDriver::new(config, Arc::clone(&store));

    let mut received = Vec::new();
    let outcome = timeout(
        WAIT,
        driver.connect_and_run(|update, _| received.push(update.clone())),
    )
    .await
    .expect("session did not end");
    assert_eq!(outcome, SessionOutcome::Completed);

    // First message per instrument is its snapshot
    for id in ["AAPL", "MSFT"] {
        let first = received.iter().find(|u| u.instrument_id() == id).unwrap();
        assert!(first.is_snapshot(), "first {} message was not a snapshot", id);
    }

    // Replaying the same messages reproduces the driver's books
    let replay = OrderbookManager::new();
    for update in &received {
        replay.process_update(update);
    }
    assert_eq!(store.instruments(), vec!["AAPL", "MSFT"]);
    for id in store.instruments() {
        let view = store.view(&id).unwrap();
        assert_eq!(Some(view.clone()), replay.view(&id));
        assert!(view.bids.windows(2).all(|w| w[0].price > w[1].price));
        assert!(view.asks.windows(2).all(|w| w[0].price < w[1].price));
        assert!(view.bids.iter().chain(&view.asks).all(|l| l.quantity > 0.0));
    }

    server.stop().await;
}

#[tokio::test]
async fn test_driver_unsubscribe_schedule() {
    let server = TestServer::start(Duration::from_millis(10)).await;
    let config = server
        .client_config()
        .with_instruments(["AAPL", "MSFT"])
        .with_unsubscribe_after(Duration::from_millis(150), "AAPL")
        .with_session_deadline(Some(Duration::from_millis(400)));

    let store = Arc::new(OrderbookManager::new());
    let driver = SubscriptionDriver::new(config, Arc::clone(&store));
    let outcome = timeout(WAIT, driver.connect_and_run(|_, _| {}))
        .await
        .expect("session did not end");

    assert!(outcome.is_completed(), "outcome: {:?}", outcome);
    // The acknowledgement emptied AAPL; MSFT kept streaming
    assert!(store.view("AAPL").unwrap().is_empty());
    assert!(!store.view("MSFT").unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_server_shutdown_ends_client_session() {
    let server = TestServer::start(Duration::from_millis(50)).await;
    let config = server.client_config().with_instruments(["AAPL"]);

    let store = Arc::new(OrderbookManager::new());
    let driver = SubscriptionDriver::new(config, Arc::clone(&store));
    let (first_tx, first_rx) = tokio::sync::oneshot::channel();
    let mut first_tx = Some(first_tx);

    let session = tokio::spawn(async move {
        driver
            .connect_and_run(move |_, _| {
                if let Some(tx) = first_tx.take() {
                    let _ = tx.send(());
                }
            })
            .await
    });

    assert_ok!(timeout(WAIT, first_rx).await.unwrap());
    server.stop().await;

    let outcome = timeout(WAIT, session).await.unwrap().unwrap();
    assert_eq!(outcome, SessionOutcome::Completed);
    assert!(store.view("AAPL").is_some());
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    // Bind then drop to get a port with no listener
    let listener = assert_ok!(tokio::net::TcpListener::bind("127.0.0.1:0").await);
    let addr = assert_ok!(listener.local_addr());
    drop(listener);

    let config = ClientConfig::default()
        .with_server_url(format!("ws://{}", addr))
        .with_connect_timeout(Duration::from_secs(2));
    let driver = SubscriptionDriver::new(config, Arc::new(OrderbookManager::new()));

    let outcome = driver.connect_and_run(|_, _| {}).await;
    assert!(
        matches!(&outcome, SessionOutcome::Failed(reason) if reason.starts_with("connect failed")),
        "outcome: {:?}",
        outcome
    );
}
