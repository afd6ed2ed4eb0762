//! WebSocket Module
//!
//! Wire protocol, per-connection transport, and request routing for games.

mod handler;
mod protocol;
mod router;

#[cfg(test)]
mod e2e_tests;

pub use handler::handle_game_ws;
pub use protocol::ServerMessage;
pub use router::ConnectionRouter;
