// Host side of a transport session: accepts a WebSocket, assigns an
// identity and runs the read-control / write-snapshot loop.

use crate::domain::TransportError;
use crate::domain::snapshot::WorldSnapshot;
use crate::interface_adapters::net::session::RETRY_BACKOFF;
use crate::interface_adapters::net::transport::classify;
use crate::interface_adapters::protocol::{ClientMessage, ServerMessage, encode_snapshot};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::conn_id;
use crate::interface_adapters::utils::throttle::{LOG_THROTTLE, should_log};
use crate::use_cases::{GameEvent, SessionRegistry};

use axum::{
    extract::{
        ConnectInfo, Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

const DEFAULT_DISPLAY_NAME: &str = "Player";
const MAX_DISPLAY_NAME_LEN: usize = 32;
// Transient send failures tolerated for one reply before it is given up;
// the client's reply timeout then retries the exchange.
const SEND_ATTEMPTS: u32 = 3;

#[derive(Debug)]
enum NetError {
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    WorldClosed,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct JoinQuery {
    #[serde(default)]
    name: Option<String>,
}

fn display_name(query: JoinQuery) -> String {
    let name: String = query
        .name
        .unwrap_or_default()
        .trim()
        .chars()
        .take(MAX_DISPLAY_NAME_LEN)
        .collect();
    if name.is_empty() {
        DEFAULT_DISPLAY_NAME.to_string()
    } else {
        name
    }
}

/// Serializes each published snapshot once; every connection shares the
/// resulting bytes.
pub async fn snapshot_serializer(
    mut snapshot_rx: watch::Receiver<Arc<WorldSnapshot>>,
    bytes_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        let snapshot = snapshot_rx.borrow_and_update().clone();
        match encode_snapshot(&snapshot) {
            Ok(txt) => {
                let _ = bytes_tx.send(Utf8Bytes::from(txt));
            }
            Err(e) => error!(error = ?e, "failed to serialize snapshot"),
        }
        if snapshot_rx.changed().await.is_err() {
            info!("snapshot channel closed; serializer exiting");
            break;
        }
    }
}

/// Starts the serializer for `snapshot_rx` and returns the shared bytes.
pub fn spawn_snapshot_serializer(
    snapshot_rx: watch::Receiver<Arc<WorldSnapshot>>,
) -> watch::Receiver<Utf8Bytes> {
    let (bytes_tx, bytes_rx) = watch::channel(Utf8Bytes::from(""));
    tokio::spawn(snapshot_serializer(snapshot_rx, bytes_tx));
    bytes_rx
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<JoinQuery>,
) -> impl IntoResponse {
    let name = display_name(query);
    ws.on_upgrade(move |socket| {
        let span = info_span!("conn", conn_id = conn_id(), participant_id = tracing::field::Empty);
        handle_socket(socket, state, name, addr).instrument(span)
    })
}

// Undoes a registration if the handler unwinds before its normal cleanup.
struct RegistrationGuard {
    registry: Arc<SessionRegistry>,
    events_tx: mpsc::Sender<GameEvent>,
    participant_id: String,
    armed: bool,
}

impl RegistrationGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.registry.unregister(&self.participant_id);
        let leave = GameEvent::Leave {
            participant_id: self.participant_id.clone(),
        };
        match self.events_tx.try_send(leave) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(leave)) => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let events_tx = self.events_tx.clone();
                    handle.spawn(async move {
                        let _ = events_tx.send(leave).await;
                    });
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
        warn!(participant_id = %self.participant_id, "connection cleanup ran from guard");
    }
}

struct ConnCtx {
    participant_id: String,
    events_tx: mpsc::Sender<GameEvent>,
    snapshot_bytes_rx: watch::Receiver<Utf8Bytes>,

    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    transient_faults: u32,

    last_input_full_log: Instant,
    last_invalid_input_log: Instant,
    last_fault_log: Instant,

    close_frame: Option<CloseFrame>,
}

enum LoopControl {
    // Reply with the latest snapshot and keep going.
    Reply,
    // Nothing to answer this iteration.
    Continue,
    // Transient fault; pause before the next read.
    Backoff,
    Disconnect,
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, name: String, addr: SocketAddr) {
    let registration = match state.registry.register(name.clone(), Some(addr)) {
        Ok(registration) => registration,
        Err(e) => {
            warn!(error = %e, %addr, "refusing connection");
            let _ = send_close_with_reason(&mut socket, close_code::AGAIN, "host full").await;
            return;
        }
    };
    let participant_id = registration.participant_id.clone();
    tracing::Span::current().record("participant_id", participant_id.as_str());

    let mut guard = RegistrationGuard {
        registry: state.registry.clone(),
        events_tx: state.events_tx.clone(),
        participant_id: participant_id.clone(),
        armed: true,
    };

    let identity = ServerMessage::Identity {
        participant_id: participant_id.clone(),
    };
    if let Err(e) = send_message(&mut socket, &identity).await {
        warn!(error = ?e, "failed to send identity");
        state.registry.unregister(&participant_id);
        guard.disarm();
        return;
    }

    // Join after the identity so the client's first snapshot already holds
    // its own record.
    let join = GameEvent::Join {
        participant_id: participant_id.clone(),
        display_name: name.clone(),
        color: registration.color,
    };
    if state.events_tx.send(join).await.is_err() {
        error!("world task gone; closing connection");
        let _ = send_close_with_reason(&mut socket, close_code::AWAY, "host shutting down").await;
        state.registry.unregister(&participant_id);
        guard.disarm();
        return;
    }

    info!(%participant_id, display_name = %name, %addr, "client connected");

    let now = Instant::now() - LOG_THROTTLE;
    let mut ctx = ConnCtx {
        participant_id: participant_id.clone(),
        events_tx: state.events_tx.clone(),
        snapshot_bytes_rx: state.snapshot_bytes_rx.clone(),
        msgs_in: 0,
        msgs_out: 0,
        bytes_in: 0,
        bytes_out: 0,
        invalid_json: 0,
        transient_faults: 0,
        last_input_full_log: now,
        last_invalid_input_log: now,
        last_fault_log: now,
        close_frame: None,
    };

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }

    disconnect_cleanup(&state, &ctx).await;
    guard.disarm();
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    loop {
        let incoming = socket.recv().await;
        let control = match handle_incoming_ws(incoming, ctx) {
            Ok(control) => control,
            Err(e) => {
                close_socket(socket, ctx).await;
                return Err(e);
            }
        };

        match control {
            LoopControl::Reply => {
                if let LoopControl::Disconnect = forward_snapshot(socket, ctx).await {
                    close_socket(socket, ctx).await;
                    return Ok(());
                }
            }
            LoopControl::Continue => {}
            LoopControl::Backoff => tokio::time::sleep(RETRY_BACKOFF).await,
            LoopControl::Disconnect => {
                close_socket(socket, ctx).await;
                return Ok(());
            }
        }
    }
}

async fn close_socket(socket: &mut WebSocket, ctx: &mut ConnCtx) {
    if let Some(frame) = ctx.close_frame.take() {
        let _ = socket.send(Message::Close(Some(frame))).await;
    }
    if let Err(err) = socket.close().await {
        debug!(error = ?err, "socket close error");
    }
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, axum::Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(Message::Text(text))) => {
            ctx.msgs_in += 1;
            ctx.bytes_in += text.len() as u64;

            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Control {
                    control,
                    latency_ms,
                }) => {
                    let event = GameEvent::Control {
                        participant_id: ctx.participant_id.clone(),
                        control,
                        latency_ms,
                    };
                    match ctx.events_tx.try_send(event) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            if should_log(&mut ctx.last_input_full_log) {
                                warn!("event channel full; dropping control");
                            }
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            return Err(NetError::WorldClosed);
                        }
                    }
                }
                Err(parse_err) => {
                    // A bad frame costs that frame only.
                    ctx.invalid_json += 1;
                    if should_log(&mut ctx.last_invalid_input_log) {
                        warn!(
                            bytes = text.len(),
                            error = %parse_err,
                            "failed to parse client message"
                        );
                    }
                }
            }
            // The client waits for one snapshot per frame it sends.
            Ok(LoopControl::Reply)
        }
        Some(Ok(Message::Binary(_))) => {
            ctx.close_frame = Some(CloseFrame {
                code: close_code::UNSUPPORTED,
                reason: "binary messages not supported".into(),
            });
            Ok(LoopControl::Disconnect)
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => Ok(LoopControl::Continue),
        Some(Ok(Message::Close(_))) => {
            info!("client sent close");
            Ok(LoopControl::Disconnect)
        }
        Some(Err(e)) => match classify(&e) {
            TransportError::Closed(reason) => {
                info!(%reason, "websocket closed");
                Ok(LoopControl::Disconnect)
            }
            TransportError::Transient(reason) => {
                ctx.transient_faults += 1;
                if should_log(&mut ctx.last_fault_log) {
                    warn!(%reason, faults = ctx.transient_faults, "websocket recv fault; retrying");
                }
                Ok(LoopControl::Backoff)
            }
        },
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_snapshot(socket: &mut WebSocket, ctx: &mut ConnCtx) -> LoopControl {
    let Some(bytes) = latest_snapshot_bytes(&mut ctx.snapshot_bytes_rx).await else {
        info!("snapshot feed closed before the first snapshot");
        return LoopControl::Disconnect;
    };
    send_reply(socket, bytes, ctx).await
}

// The first snapshot may still be serializing when the first control frame
// arrives; wait for it rather than leaving the frame unanswered.
async fn latest_snapshot_bytes(rx: &mut watch::Receiver<Utf8Bytes>) -> Option<Utf8Bytes> {
    match rx.wait_for(|bytes| !bytes.is_empty()).await {
        Ok(bytes) => Some(bytes.clone()),
        Err(_) => None,
    }
}

async fn send_reply<S>(sink: &mut S, bytes: Utf8Bytes, ctx: &mut ConnCtx) -> LoopControl
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let len = bytes.len();
    for attempt in 1..=SEND_ATTEMPTS {
        match sink.send(Message::Text(bytes.clone())).await {
            Ok(()) => {
                ctx.msgs_out += 1;
                ctx.bytes_out += len as u64;
                return LoopControl::Continue;
            }
            Err(e) => match classify(&e) {
                TransportError::Closed(reason) => {
                    info!(%reason, "websocket closed during send");
                    return LoopControl::Disconnect;
                }
                TransportError::Transient(reason) => {
                    ctx.transient_faults += 1;
                    if should_log(&mut ctx.last_fault_log) {
                        warn!(%reason, attempt, faults = ctx.transient_faults, "failed to send snapshot; retrying");
                    }
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            },
        }
    }
    warn!(attempts = SEND_ATTEMPTS, "giving up on this reply");
    LoopControl::Continue
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn disconnect_cleanup(state: &AppState, ctx: &ConnCtx) {
    // The record stays in the snapshot, marked dead.
    if state
        .events_tx
        .send(GameEvent::Leave {
            participant_id: ctx.participant_id.clone(),
        })
        .await
        .is_err()
    {
        debug!("world task gone during disconnect cleanup");
    }
    state.registry.unregister(&ctx.participant_id);

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        transient_faults = ctx.transient_faults,
        "connection stats"
    );
    info!(participant_id = %ctx.participant_id, "client disconnected");
}
