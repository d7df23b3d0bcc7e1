// Shared primitives for booting hosts and talking to them across
// integration tests.
#![allow(dead_code)]

use bomberman::domain::snapshot::{ControlRecord, WorldSnapshot};
use bomberman::frameworks::assets::AssetBundle;
use bomberman::frameworks::server::{HostSettings, RunningHost};
use bomberman::interface_adapters::protocol::{ClientMessage, ServerMessage};
use bomberman::use_cases::IdleInput;
use futures::{SinkExt, StreamExt};
use std::{
    // `Arc` shares data between threads; `OnceLock` writes a value only once.
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

pub type RawClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const WAIT: Duration = Duration::from_secs(5);

// Shared host address used by every test after the host publishes it.
static SERVER_ADDR: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

/// Starts the shared host once and returns its `host:port`.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published = Arc::new(OnceLock::<String>::new());
        let published_thread = Arc::clone(&published);
        // Own OS thread and runtime so the host outlives each test's runtime.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_thread.set(addr.to_string());
                bomberman::run(listener).await.expect("host failed");
            });
        });
        wait_for_readiness(published);
    });

    SERVER_ADDR
        .get()
        .expect("server address should be initialized")
        .as_str()
}

fn wait_for_readiness(published: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = SERVER_ADDR.set(addr.clone());

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("host did not become ready in time");
}

pub fn assets() -> AssetBundle {
    AssetBundle::load(std::path::Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/levels")))
        .expect("bundled levels")
}

/// A host private to one test; the round never starts on its own.
pub async fn spawn_host() -> RunningHost {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let settings = HostSettings {
        level_id: "level1".to_string(),
        host_name: "Host".to_string(),
        start_with: None,
        seed: Some(17),
        tick_interval: Duration::from_millis(5),
    };
    bomberman::start_host(listener, settings, &assets(), Box::new(IdleInput))
        .await
        .expect("start host")
}

pub async fn raw_connect(addr: &str, name: &str) -> RawClient {
    let url = format!("ws://{addr}/ws?name={name}");
    let (ws, _) = tokio::time::timeout(WAIT, tokio_tungstenite::connect_async(url))
        .await
        .expect("handshake in time")
        .expect("handshake");
    ws
}

#[derive(Debug)]
pub enum Frame {
    Server(ServerMessage),
    Closed(Option<String>),
}

pub async fn next_frame(ws: &mut RawClient) -> Frame {
    loop {
        let next = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("frame in time");
        match next {
            Some(Ok(Message::Text(text))) => {
                return Frame::Server(serde_json::from_str(text.as_str()).expect("server message"));
            }
            Some(Ok(Message::Close(frame))) => {
                return Frame::Closed(frame.map(|f| f.reason.as_str().to_owned()));
            }
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return Frame::Closed(None),
        }
    }
}

pub async fn read_identity(ws: &mut RawClient) -> String {
    match next_frame(ws).await {
        Frame::Server(ServerMessage::Identity { participant_id }) => participant_id,
        other => panic!("expected identity first, got {other:?}"),
    }
}

pub async fn send_text(ws: &mut RawClient, text: impl Into<String>) {
    ws.send(Message::text(text.into())).await.expect("send");
}

/// One control/snapshot exchange.
pub async fn exchange(ws: &mut RawClient, control: ControlRecord) -> WorldSnapshot {
    exchange_reporting(ws, control, None).await
}

/// One exchange that also reports a measured round trip to the host.
pub async fn exchange_reporting(
    ws: &mut RawClient,
    control: ControlRecord,
    latency_ms: Option<u32>,
) -> WorldSnapshot {
    let frame = serde_json::to_string(&ClientMessage::Control {
        control,
        latency_ms,
    })
    .expect("encode control");
    send_text(ws, frame).await;
    match next_frame(ws).await {
        Frame::Server(ServerMessage::Snapshot(snapshot)) => snapshot,
        other => panic!("expected snapshot, got {other:?}"),
    }
}

/// Exchanges until `pred` holds for the returned snapshot.
pub async fn exchange_until(
    ws: &mut RawClient,
    mut pred: impl FnMut(&WorldSnapshot) -> bool,
) -> WorldSnapshot {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let snapshot = exchange(ws, ControlRecord::default()).await;
        if pred(&snapshot) {
            return snapshot;
        }
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
