// Host session registry: live connections, their identities and the display
// colors they hold.

use crate::domain::snapshot::{PALETTE, Rgba};
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

/// Errors returned by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no display colors left for a new participant ({connected} connected)")]
    PaletteExhausted { connected: usize },
}

/// Identity handed to a freshly accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub participant_id: String,
    pub color: Rgba,
}

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub display_name: String,
    pub color: Rgba,
    /// Peer address, kept for diagnostics.
    pub addr: Option<SocketAddr>,
}

#[derive(Debug)]
struct Inner {
    sessions: HashMap<String, SessionEntry>,
    // Colors not currently held by anyone.
    free_colors: Vec<Rgba>,
    rng: StdRng,
}

/// Thread-safe registry of connected participants.
///
/// Critical sections never span an await, so a plain mutex is enough and
/// cleanup can run from a drop guard.
#[derive(Debug)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new(rng: StdRng) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                free_colors: PALETTE.to_vec(),
                rng,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned registry still holds consistent maps; keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Assigns a fresh identity and draws a color without replacement.
    pub fn register(
        &self,
        display_name: impl Into<String>,
        addr: Option<SocketAddr>,
    ) -> Result<Registration, RegistryError> {
        let mut inner = self.lock();
        if inner.free_colors.is_empty() {
            return Err(RegistryError::PaletteExhausted {
                connected: inner.sessions.len(),
            });
        }
        let free = inner.free_colors.len();
        let pick = inner.rng.gen_range(0..free);
        let color = inner.free_colors.remove(pick);
        let participant_id = uuid::Uuid::new_v4().to_string();
        inner.sessions.insert(
            participant_id.clone(),
            SessionEntry {
                display_name: display_name.into(),
                color,
                addr,
            },
        );
        Ok(Registration {
            participant_id,
            color,
        })
    }

    /// Forgets a connection and returns its color to the palette. Calling it
    /// twice for the same id is a no-op.
    pub fn unregister(&self, participant_id: &str) -> Option<SessionEntry> {
        let mut inner = self.lock();
        let entry = inner.sessions.remove(participant_id)?;
        inner.free_colors.push(entry.color);
        Some(entry)
    }

    pub fn get(&self, participant_id: &str) -> Option<SessionEntry> {
        self.lock().sessions.get(participant_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn free_colors(&self) -> usize {
        self.lock().free_colors.len()
    }
}
