// Use cases layer: host world task, session bookkeeping and client-side
// reconciliation.

pub mod game;
pub mod input;
pub mod reconcile;
pub mod registry;
pub mod types;

pub use game::{HostHandle, WorldTaskConfig};
pub use input::{IdleInput, InputSource, ScriptedInput};
pub use reconcile::ClientScene;
pub use registry::{Registration, RegistryError, SessionRegistry};
pub use types::{GameEvent, SceneStats};
