use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use position_engine::{ChessEngine, PositionEngine};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use super::id::{GameId, generate_unique};
use super::session::Session;

/// Builds a fresh engine for every new game.
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn PositionEngine> + Send + Sync>;

/// A session behind its exclusive-access region.
pub type SharedSession = Arc<Mutex<Session>>;

/// Owns every live game, keyed by identifier.
///
/// Lock order is session → map. Under the map lock, sessions are only ever
/// `try_lock`ed, so holding a session while deleting it cannot deadlock.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<GameId, SharedSession>>,
    engine_factory: EngineFactory,
    fallback_seq: AtomicU64,
}

impl SessionRegistry {
    /// Registry whose games use standard chess rules.
    pub fn new() -> Self {
        Self::with_engine_factory(Arc::new(|| -> Box<dyn PositionEngine> {
            Box::new(ChessEngine::new())
        }))
    }

    pub fn with_engine_factory(engine_factory: EngineFactory) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            engine_factory,
            fallback_seq: AtomicU64::new(0),
        }
    }

    /// Insert a new empty session under a fresh identifier.
    ///
    /// The session is returned locked, so nothing (including the sweep) can
    /// observe it before the caller has seated its creator.
    pub async fn create(&self) -> OwnedMutexGuard<Session> {
        let mut sessions = self.sessions.write().await;
        let id = generate_unique(|id| sessions.contains_key(id), &self.fallback_seq);
        let session = Arc::new(Mutex::new(Session::new(id.clone(), (self.engine_factory)())));
        // Uncontended: nobody else can reach this session yet
        let guard = Arc::clone(&session).lock_owned().await;
        sessions.insert(id.clone(), session);
        debug!(game_id = %id, live = sessions.len(), "Session registered");
        guard
    }

    pub async fn get(&self, id: &GameId) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove an entry. Returns false if it was already gone.
    pub async fn delete(&self, id: &GameId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(game_id = %id, "Game removed");
        }
        removed
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove and retire every session with no participants.
    ///
    /// Sessions whose lock is held are in use and skipped. Returns the number
    /// of sessions removed.
    pub async fn sweep_empty(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| match session.try_lock() {
            Ok(mut s) if s.is_empty() => {
                s.retire();
                debug!(game_id = %id, "Swept empty game");
                false
            }
            _ => true,
        });
        before - sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
