//! Per-connection player identity and score.

use log::warn;
use shared::wire::{PlayerInfo, MAX_NAME_LEN};

/// Score bounds enforced after every update. The wire format carries scores
/// as a signed byte, and -128 is kept out of range so negation stays safe.
pub const SCORE_MIN: i32 = -127;
pub const SCORE_MAX: i32 = 127;

/// One participant. Created when a client first identifies itself, reused
/// across sessions for the life of the connection, and only ever mutated
/// through the session that currently holds it.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    client_id: u32,
    name: Vec<u8>,
    score: i8,
}

impl PlayerRecord {
    /// Creates a record for a freshly assigned client id.
    ///
    /// Names longer than [`MAX_NAME_LEN`] bytes are silently truncated;
    /// that is observable behavior, not an error.
    pub fn new(client_id: u32, name: &[u8]) -> Self {
        let name = if name.len() > MAX_NAME_LEN {
            warn!(
                "Client {} name of {} bytes truncated to {}",
                client_id,
                name.len(),
                MAX_NAME_LEN
            );
            name[..MAX_NAME_LEN].to_vec()
        } else {
            name.to_vec()
        };

        Self {
            client_id,
            name,
            score: 0,
        }
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    pub fn name(&self) -> &[u8] {
        &self.name
    }

    pub fn score(&self) -> i8 {
        self.score
    }

    /// Zeroes the score; called whenever the player joins a session.
    pub fn reset_score(&mut self) {
        self.score = 0;
    }

    /// Applies a score delta, clamping to [`SCORE_MIN`]..=[`SCORE_MAX`].
    pub fn apply_delta(&mut self, delta: i32) {
        self.score = (self.score as i32 + delta).clamp(SCORE_MIN, SCORE_MAX) as i8;
    }

    /// The wire-facing view of this record.
    pub fn to_wire(&self) -> PlayerInfo {
        PlayerInfo {
            client_id: self.client_id,
            score: self.score,
            name: self.name.clone(),
        }
    }
}
