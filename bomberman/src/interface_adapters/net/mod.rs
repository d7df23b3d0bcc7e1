// Network adapters: the host's WebSocket handler and the client session.

pub mod host;
pub mod session;
pub mod transport;

pub use host::{spawn_snapshot_serializer, ws_handler};
pub use session::{ConnectionError, Session, SessionTiming};
pub use transport::WsTransport;
