//! Game identifiers: short, case-insensitive tokens players type to join.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Length of a normal game identifier.
pub const GAME_ID_LEN: usize = 6;

/// Random draws at normal width before falling back to the wide form.
pub const MAX_GENERATE_ATTEMPTS: usize = 32;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const FALLBACK_SEQ_WIDTH: usize = 6;

/// A game identifier, always stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct GameId(String);

impl GameId {
    /// Normalize a client-supplied identifier. Any string is accepted;
    /// unknown identifiers simply fail lookup.
    pub fn parse(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    fn random(len: usize) -> Self {
        let mut rng = rand::rng();
        let token = (0..len)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for GameId {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<GameId> for String {
    fn from(id: GameId) -> Self {
        id.0
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate an identifier for which `taken` returns false.
///
/// After [`MAX_GENERATE_ATTEMPTS`] collisions this stops drawing and returns a
/// wide identifier: six random characters followed by a base-36 sequence
/// number from `fallback_seq`. Wide identifiers never have the normal length
/// and never repeat each other, so the result is unique without a further check.
pub fn generate_unique(taken: impl Fn(&GameId) -> bool, fallback_seq: &AtomicU64) -> GameId {
    for _ in 0..MAX_GENERATE_ATTEMPTS {
        let id = GameId::random(GAME_ID_LEN);
        if !taken(&id) {
            return id;
        }
    }

    let seq = fallback_seq.fetch_add(1, Ordering::Relaxed);
    let id = GameId(format!(
        "{}{}",
        GameId::random(GAME_ID_LEN),
        base36(seq, FALLBACK_SEQ_WIDTH)
    ));
    warn!(game_id = %id, "Game id space congested, using wide identifier");
    id
}

/// Upper-case base-36, left-padded with zeros to `width`.
fn base36(mut n: u64, width: usize) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut out = Vec::with_capacity(width);
    loop {
        out.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    while out.len() < width {
        out.push('0');
    }
    out.iter().rev().collect()
}
