//! Game sessions and the registry that owns them.

mod id;
mod registry;
mod session;

pub use id::{GAME_ID_LEN, GameId};
pub use registry::{EngineFactory, SessionRegistry, SharedSession};
pub use session::{EndReason, GameResult, GameSnapshot, Outbox, Session};

/// Identity of one live client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
