// Domain layer: core simulation types and rules.

pub mod actor;
pub mod collision;
pub mod effects;
pub mod grid;
pub mod level;
pub mod monster;
pub mod ports;
pub mod snapshot;
pub mod state;
pub mod systems;
pub mod tuning;
pub mod world;

#[cfg(test)]
pub(crate) mod test_support;

pub use level::{Level, LevelError};
pub use ports::{Transport, TransportError};
pub use snapshot::{ControlRecord, GameState, ParticipantRecord, WorldSnapshot};
pub use world::World;
