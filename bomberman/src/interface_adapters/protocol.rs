// Wire protocol DTOs for the host/client session. Every frame is one UTF-8
// JSON record tagged by `type` with its payload under `data`.

use crate::domain::snapshot::{ControlRecord, WorldSnapshot};
use serde::{Deserialize, Serialize};

/// Messages the host sends to a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // First frame on every connection.
    Identity { participant_id: String },
    Snapshot(WorldSnapshot),
}

/// Messages a client sends to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    Control {
        control: ControlRecord,
        /// Round trip the client measured for its previous exchange.
        #[serde(default)]
        latency_ms: Option<u32>,
    },
}

// Borrowing twin of `ServerMessage::Snapshot` so the host can encode
// without cloning the world.
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum SnapshotFrame<'a> {
    Snapshot(&'a WorldSnapshot),
}

pub fn encode_snapshot(snapshot: &WorldSnapshot) -> serde_json::Result<String> {
    serde_json::to_string(&SnapshotFrame::Snapshot(snapshot))
}
