use crate::use_cases::{GameEvent, SessionRegistry};
use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Events flowing from the connections into the world task.
    pub events_tx: mpsc::Sender<GameEvent>,
    // Latest serialized snapshot, shared across all connections.
    pub snapshot_bytes_rx: watch::Receiver<Utf8Bytes>,
    pub registry: Arc<SessionRegistry>,
}
