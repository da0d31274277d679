//! Relay pool tests against in-process mock relays

use futures::{SinkExt, StreamExt};
use nostr::{EventTemplate, KIND_CONTACTS, finalize_event, generate_secret_key};
use nostr_client::{ConnectionState, Filter, PoolConfig, PoolEvent, RelayConfig, RelayPool};
use std::sync::Once;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

/// Accepts one client, answers REQ with `stored` then EOSE, and acks every EVENT.
/// Received EVENT frames are forwarded on the returned channel.
async fn start_mock_relay(
    stored: Vec<nostr::Event>,
) -> (String, mpsc::UnboundedReceiver<serde_json::Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (published_tx, published_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut sink, mut source) = ws.split();

        while let Some(Ok(msg)) = source.next().await {
            let Message::Text(text) = msg else { continue };
            let frame: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            match frame[0].as_str() {
                Some("REQ") => {
                    let sub_id = frame[1].as_str().unwrap().to_string();
                    for event in &stored {
                        let out = serde_json::json!(["EVENT", sub_id, event]).to_string();
                        sink.send(Message::Text(out.into())).await.unwrap();
                    }
                    let eose = serde_json::json!(["EOSE", sub_id]).to_string();
                    sink.send(Message::Text(eose.into())).await.unwrap();
                }
                Some("EVENT") => {
                    let id = frame[1]["id"].as_str().unwrap().to_string();
                    let _ = published_tx.send(frame[1].clone());
                    let ok = serde_json::json!(["OK", id, true, ""]).to_string();
                    sink.send(Message::Text(ok.into())).await.unwrap();
                }
                _ => {}
            }
        }
    });

    (url, published_rx)
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("ws://127.0.0.1:{}", port)
}

fn contact_list() -> nostr::Event {
    let secret_key = generate_secret_key();
    let template = EventTemplate {
        kind: KIND_CONTACTS,
        tags: vec![vec!["p".to_string(), "a".repeat(64)]],
        content: String::new(),
        created_at: 1700000000,
    };
    finalize_event(&template, &secret_key).unwrap()
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<PoolEvent>) -> PoolEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for pool event")
        .expect("pool channel closed")
}

#[tokio::test]
async fn test_pool_delivers_stored_events_then_eose() {
    init_tracing();
    let stored = contact_list();
    let (url, _published) = start_mock_relay(vec![stored.clone()]).await;

    let pool = RelayPool::new();
    let mut rx = pool
        .start(&[url.clone()], vec![Filter::new().kinds(vec![3, 10000])])
        .await;

    assert!(matches!(next_event(&mut rx).await, PoolEvent::Opened { relay_url } if relay_url == url));

    match next_event(&mut rx).await {
        PoolEvent::Event {
            relay_url, event, ..
        } => {
            assert_eq!(relay_url, url);
            assert_eq!(event, stored);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    assert!(matches!(next_event(&mut rx).await, PoolEvent::Eose { .. }));
    assert!(pool.is_open(&url).await);
    assert_eq!(pool.open_relays().await, vec![url.clone()]);

    pool.stop().await;
    assert!(!pool.is_open(&url).await);
}

#[tokio::test]
async fn test_pool_unreachable_relay_does_not_block_others() {
    init_tracing();
    let (good, _published) = start_mock_relay(vec![]).await;
    let bad = closed_port_url();

    let config = PoolConfig {
        relay: RelayConfig {
            connect_timeout: Duration::from_secs(2),
        },
        ..Default::default()
    };
    let pool = RelayPool::with_config(config);
    let mut rx = pool.start(&[bad.clone(), good.clone()], vec![]).await;

    let mut saw_error = false;
    let mut saw_open = false;
    while !(saw_error && saw_open) {
        match next_event(&mut rx).await {
            PoolEvent::Error { relay_url, .. } if relay_url == bad => saw_error = true,
            PoolEvent::Opened { relay_url } if relay_url == good => saw_open = true,
            _ => {}
        }
    }

    let states = pool.states().await;
    assert_eq!(states[0], (bad, ConnectionState::Failed));
    assert_eq!(states[1], (good, ConnectionState::Open));

    pool.stop().await;
}

#[tokio::test]
async fn test_pool_send_event_and_ok() {
    init_tracing();
    let (url, mut published) = start_mock_relay(vec![]).await;

    let pool = RelayPool::new();
    let mut rx = pool.start(&[url.clone()], vec![]).await;
    while !matches!(next_event(&mut rx).await, PoolEvent::Eose { .. }) {}

    let event = contact_list();
    pool.send_event_to(&url, &event).await.unwrap();

    let received = timeout(Duration::from_secs(5), published.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received["id"], event.id);

    match next_event(&mut rx).await {
        PoolEvent::Ok {
            event_id, success, ..
        } => {
            assert_eq!(event_id, event.id);
            assert!(success);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let pings = pool.ping_all().await;
    assert_eq!(pings.len(), 1);
    assert!(pings[0].1.is_ok());

    pool.stop().await;
}

/// Accepts one client and reports every WebSocket ping it receives.
async fn start_ping_counting_relay() -> (String, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (ping_tx, ping_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Ping(_) = msg {
                let _ = ping_tx.send(());
            }
        }
    });

    (url, ping_rx)
}

#[tokio::test]
async fn test_pool_pings_open_relays_every_interval() {
    init_tracing();
    let (url, mut pings) = start_ping_counting_relay().await;

    let config = PoolConfig {
        ping_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let pool = RelayPool::with_config(config);
    let _rx = pool.start(&[url], vec![]).await;

    for _ in 0..2 {
        timeout(Duration::from_secs(5), pings.recv())
            .await
            .expect("no liveness ping within 5s")
            .unwrap();
    }

    pool.stop().await;
}

#[tokio::test]
async fn test_pool_zero_ping_interval_keeps_pinging() {
    init_tracing();
    let (url, mut pings) = start_ping_counting_relay().await;

    let config = PoolConfig {
        ping_interval: Duration::ZERO,
        ..Default::default()
    };
    let pool = RelayPool::with_config(config);
    let _rx = pool.start(&[url], vec![]).await;

    timeout(Duration::from_secs(5), pings.recv())
        .await
        .expect("no liveness ping within 5s")
        .unwrap();

    pool.stop().await;
}
