//! Connection router.
//!
//! Tracks every live connection and its binding to a game, and turns inbound
//! requests into session operations. Replies and broadcasts go out through the
//! per-connection outboxes; the transport layer only feeds text in.

use std::collections::HashMap;
use std::sync::Arc;

use position_engine::{MoveInput, Side};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::game::{ConnectionId, GameId, Outbox, Session, SessionRegistry, SharedSession};
use crate::metrics::ServerMetrics;

use super::protocol::{ClientMessage, ProtocolError, ServerMessage, decode_client_message};

const OPPONENT_DISCONNECTED: &str = "Opponent disconnected";

/// Request failures. The display text is what the client sees in `ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Invalid message format")]
    InvalidFormat,
    #[error("Unknown message type")]
    UnknownType,
    #[error("Game not found")]
    GameNotFound,
    #[error("Game is full")]
    GameFull,
    #[error("Already in a game")]
    AlreadyInGame,
    #[error("Not in a game")]
    NotInGame,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Illegal move")]
    IllegalMove,
    /// The connection is not (or no longer) registered.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<ProtocolError> for RouteError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidFormat => Self::InvalidFormat,
            ProtocolError::UnknownType(_) => Self::UnknownType,
        }
    }
}

/// Seat held by a bound connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub game_id: GameId,
    pub side: Side,
}

#[derive(Debug)]
struct Connection {
    outbox: Outbox,
    binding: Option<Binding>,
}

/// Routes client requests to game sessions.
///
/// The connection table lock is never held while acquiring a session lock.
/// Session locks may be held while touching the table or the registry map.
pub struct ConnectionRouter {
    registry: Arc<SessionRegistry>,
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    metrics: Arc<ServerMetrics>,
}

impl ConnectionRouter {
    pub fn new(registry: Arc<SessionRegistry>, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            registry,
            connections: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Register a new, unbound connection.
    pub async fn connect(&self, conn_id: ConnectionId, outbox: Outbox) {
        self.connections.write().await.insert(
            conn_id,
            Connection {
                outbox,
                binding: None,
            },
        );
        debug!(conn_id = %conn_id, "Connection registered");
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn binding(&self, conn_id: ConnectionId) -> Option<Binding> {
        self.connections
            .read()
            .await
            .get(&conn_id)
            .and_then(|c| c.binding.clone())
    }

    /// Handle one text frame. Failures are reported to the sender only.
    pub async fn handle_text(&self, conn_id: ConnectionId, text: &str) {
        self.metrics.message_received();
        let result = match decode_client_message(text) {
            Ok(msg) => self.dispatch(conn_id, msg).await,
            Err(e) => {
                self.metrics.protocol_error();
                debug!(conn_id = %conn_id, error = ?e, "Rejected inbound frame");
                Err(e.into())
            }
        };
        if let Err(e) = result {
            self.reject(conn_id, e).await;
        }
    }

    /// Handle one binary frame, which must carry UTF-8 JSON.
    pub async fn handle_binary(&self, conn_id: ConnectionId, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_text(conn_id, text).await,
            Err(_) => {
                self.metrics.message_received();
                self.metrics.protocol_error();
                self.reject(conn_id, RouteError::InvalidFormat).await;
            }
        }
    }

    /// Send `ERROR{message}` to one connection.
    pub async fn reject(&self, conn_id: ConnectionId, err: RouteError) {
        if err == RouteError::ConnectionClosed {
            return;
        }
        self.send_to(
            conn_id,
            ServerMessage::Error {
                message: err.to_string(),
            },
        )
        .await;
    }

    pub async fn dispatch(
        &self,
        conn_id: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(), RouteError> {
        match msg {
            ClientMessage::CreateGame => self.create_game(conn_id).await,
            ClientMessage::JoinGame { game_id } => self.join_game(conn_id, game_id).await,
            ClientMessage::Move { mv } => self.make_move(conn_id, mv).await,
            ClientMessage::GetState => self.get_state(conn_id).await,
        }
    }

    async fn create_game(&self, conn_id: ConnectionId) -> Result<(), RouteError> {
        let outbox = self.unbound_outbox(conn_id).await?;

        let mut session = self.registry.create().await;
        let side = Side::White;
        let game_id = session.id().clone();
        self.seat(&mut session, conn_id, side, outbox).await?;
        self.metrics.game_created();

        info!(game_id = %game_id, conn_id = %conn_id, color = %side, "Game created");
        self.send_to(
            conn_id,
            ServerMessage::GameCreated {
                game_id,
                color: side,
                state: session.snapshot(),
            },
        )
        .await;
        Ok(())
    }

    /// Seats the joiner on the first vacant side, White before Black, so a
    /// newcomer replaces whichever player left.
    async fn join_game(&self, conn_id: ConnectionId, game_id: GameId) -> Result<(), RouteError> {
        let outbox = self.unbound_outbox(conn_id).await?;

        let shared = self
            .registry
            .get(&game_id)
            .await
            .ok_or(RouteError::GameNotFound)?;
        let mut session = shared.lock().await;
        if session.is_retired() {
            return Err(RouteError::GameNotFound);
        }
        let side = session.vacant_side().ok_or(RouteError::GameFull)?;
        let game_id = session.id().clone();
        self.seat(&mut session, conn_id, side, outbox).await?;

        info!(game_id = %game_id, conn_id = %conn_id, color = %side, "Player joined");
        self.send_to(
            conn_id,
            ServerMessage::GameJoined {
                game_id: game_id.clone(),
                color: side,
            },
        )
        .await;
        if session.is_full() {
            let delivered = session
                .broadcast(ServerMessage::GameStart {
                    state: session.snapshot(),
                })
                .await;
            debug!(game_id = %game_id, delivered, "Game started");
        }
        Ok(())
    }

    async fn make_move(&self, conn_id: ConnectionId, mv: MoveInput) -> Result<(), RouteError> {
        let (binding, shared) = self.bound_session(conn_id).await?;
        let mut session = shared.lock().await;
        if session.is_retired() {
            return Err(RouteError::NotInGame);
        }

        if session.side_to_move() != binding.side {
            self.metrics.move_rejected();
            return Err(RouteError::NotYourTurn);
        }
        let applied = session.apply_move(&mv).map_err(|e| {
            self.metrics.move_rejected();
            debug!(game_id = %binding.game_id, conn_id = %conn_id, input = %mv, error = %e, "Move rejected");
            RouteError::IllegalMove
        })?;
        self.metrics.move_accepted();

        let state = session.snapshot();
        let outcome = state.outcome();
        debug!(game_id = %binding.game_id, san = %applied.san, "Move accepted");
        session
            .broadcast(ServerMessage::Move { mv: applied, state })
            .await;

        if let Some(outcome) = outcome {
            info!(
                game_id = %binding.game_id,
                result = ?outcome.result,
                reason = ?outcome.reason,
                "Game over"
            );
            session
                .broadcast(ServerMessage::GameOver {
                    result: outcome.result,
                    reason: outcome.reason,
                })
                .await;
        }
        Ok(())
    }

    async fn get_state(&self, conn_id: ConnectionId) -> Result<(), RouteError> {
        let (_, shared) = self.bound_session(conn_id).await?;
        let state = {
            let session = shared.lock().await;
            if session.is_retired() {
                return Err(RouteError::NotInGame);
            }
            session.snapshot()
        };
        self.send_to(conn_id, ServerMessage::State { state }).await;
        Ok(())
    }

    /// Forget a connection. If it was seated, the survivor is told; a session
    /// left empty is retired and removed.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        let Some(connection) = self.connections.write().await.remove(&conn_id) else {
            return;
        };
        let Some(binding) = connection.binding else {
            debug!(conn_id = %conn_id, "Unbound connection closed");
            return;
        };
        let Some(shared) = self.registry.get(&binding.game_id).await else {
            return;
        };

        let mut session = shared.lock().await;
        if session.is_retired() {
            return;
        }
        let was_seated = session.unbind(conn_id);
        if was_seated {
            info!(game_id = %binding.game_id, conn_id = %conn_id, color = %binding.side, "Player left");
        }

        if session.is_empty() {
            session.retire();
            if self.registry.delete(&binding.game_id).await {
                self.metrics.games_closed(1);
                let age = chrono::Utc::now() - session.created_at();
                info!(game_id = %binding.game_id, age_secs = age.num_seconds(), "Game closed");
            }
        } else if was_seated {
            session
                .broadcast(ServerMessage::PlayerDisconnected {
                    message: OPPONENT_DISCONNECTED.to_string(),
                })
                .await;
        }
    }

    /// Remove sessions nobody is seated in.
    pub async fn sweep(&self) -> usize {
        let removed = self.registry.sweep_empty().await;
        if removed > 0 {
            self.metrics.games_closed(removed as u64);
            info!(removed, "Swept empty games");
        }
        removed
    }

    async fn send_to(&self, conn_id: ConnectionId, msg: ServerMessage) {
        let outbox = self
            .connections
            .read()
            .await
            .get(&conn_id)
            .map(|c| c.outbox.clone());
        match outbox {
            Some(outbox) => {
                if outbox.send(msg).await.is_err() {
                    debug!(conn_id = %conn_id, "Outbox closed, dropping message");
                }
            }
            None => warn!(conn_id = %conn_id, "Send to unknown connection"),
        }
    }

    async fn unbound_outbox(&self, conn_id: ConnectionId) -> Result<Outbox, RouteError> {
        let connections = self.connections.read().await;
        let connection = connections
            .get(&conn_id)
            .ok_or(RouteError::ConnectionClosed)?;
        if connection.binding.is_some() {
            return Err(RouteError::AlreadyInGame);
        }
        Ok(connection.outbox.clone())
    }

    async fn bound_session(
        &self,
        conn_id: ConnectionId,
    ) -> Result<(Binding, SharedSession), RouteError> {
        let binding = self.binding(conn_id).await.ok_or(RouteError::NotInGame)?;
        let shared = self
            .registry
            .get(&binding.game_id)
            .await
            .ok_or(RouteError::NotInGame)?;
        Ok((binding, shared))
    }

    /// Record the binding, then take the seat.
    ///
    /// The table write and the seat happen in the same poll, so a request
    /// dropped mid-flight cannot leave a seat the table does not record.
    async fn seat(
        &self,
        session: &mut Session,
        conn_id: ConnectionId,
        side: Side,
        outbox: Outbox,
    ) -> Result<(), RouteError> {
        {
            let mut connections = self.connections.write().await;
            let connection = connections
                .get_mut(&conn_id)
                .ok_or(RouteError::ConnectionClosed)?;
            connection.binding = Some(Binding {
                game_id: session.id().clone(),
                side,
            });
        }
        if session.bind(conn_id, side, outbox).is_err() {
            if let Some(connection) = self.connections.write().await.get_mut(&conn_id) {
                connection.binding = None;
            }
            return Err(RouteError::GameFull);
        }
        Ok(())
    }
}
