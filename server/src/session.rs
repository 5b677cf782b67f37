//! Game session lifecycle, roster management, and state broadcasts
//!
//! A [`GameSession`] owns one puzzle board and an ordered roster of seated
//! players. It drives the Waiting -> Active -> Ended state machine and pushes
//! every state change to its members as [`Packet`] notifications.
//!
//! Concurrency contract: the caller wraps each session in a `tokio::sync::Mutex`
//! and serializes all roster, score, and board mutations through it. The
//! methods here never touch the network; notifications are pushed onto each
//! seat's outbound queue and drained by that connection's own writer task,
//! so a stalled client cannot stall another player's move. Because the queue
//! push happens while the session lock is still held, every member observes
//! roster, score, and board changes in the same relative order.

use crate::player::PlayerRecord;
use crate::puzzle::{EntryOutcome, PuzzleBoard};
use crate::utils::epoch_secs;
use log::{debug, info, warn};
use shared::wire::{self, GRID_SIZE};
use shared::Packet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Handle to one connection's outbound packet queue.
pub type Outbox = mpsc::UnboundedSender<Packet>;

/// Derived lifecycle state; `Ended` requires a start time to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Waiting,
    Active,
    Ended,
}

/// Result of an [`GameSession::add_player`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The player was appended to the roster and notified.
    Joined,
    /// The player was already seated; a fresh full-state snapshot was sent.
    Resynced,
    /// The session is full or already over; the caller reports gid 0.
    Rejected,
}

/// Result of a [`GameSession::remove_player`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The player was not in the roster; nothing happened.
    NotMember,
    Removed,
    /// The roster is now empty; the caller must drop the session from the
    /// registry (registry lock is acquired before the session lock).
    Destroyed,
}

/// One roster entry: the shared player record plus that player's send path.
struct Seat {
    cid: u32,
    player: Arc<Mutex<PlayerRecord>>,
    outbox: Outbox,
}

/// One shared-puzzle game room.
pub struct GameSession {
    gid: u32,
    capacity: u8,
    board: PuzzleBoard,
    roster: Vec<Seat>,
    start_time: Option<u32>,
    end_time: Option<u32>,
}

impl GameSession {
    /// Creates a waiting session with a randomly drawn puzzle.
    pub fn new(gid: u32, capacity: u8) -> Self {
        Self::with_board(gid, capacity, PuzzleBoard::random())
    }

    /// Creates a session with a specific board; used by tests that need a
    /// deterministic puzzle.
    pub fn with_board(gid: u32, capacity: u8, board: PuzzleBoard) -> Self {
        Self {
            gid,
            capacity,
            board,
            roster: Vec::new(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    pub fn state(&self) -> SessionState {
        if self.end_time.is_some() {
            SessionState::Ended
        } else if self.start_time.is_some() {
            SessionState::Active
        } else {
            SessionState::Waiting
        }
    }

    pub fn start_time(&self) -> Option<u32> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<u32> {
        self.end_time
    }

    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }

    pub fn board(&self) -> &PuzzleBoard {
        &self.board
    }

    /// Seats a player, or resyncs them if they are already here.
    ///
    /// On a fresh join the player's score is reset, the joiner alone gets
    /// `GameJoined` plus the full snapshot, and every member (joiner
    /// included) gets the updated roster. Filling the last seat of a
    /// waiting session starts the game.
    pub async fn add_player(&mut self, player: Arc<Mutex<PlayerRecord>>, outbox: Outbox) -> JoinOutcome {
        let cid = player.lock().await.client_id();

        if let Some(seat) = self.roster.iter().find(|s| s.cid == cid) {
            debug!("Game {}: client {} already seated, resyncing", self.gid, cid);
            let state = self.full_state().await;
            Self::send_to(seat, Packet::GameJoined { gid: self.gid });
            Self::send_to(seat, Packet::GameStateSnapshot { state });
            return JoinOutcome::Resynced;
        }

        if self.roster.len() >= self.capacity as usize || self.state() == SessionState::Ended {
            debug!("Game {}: rejecting join of client {}", self.gid, cid);
            return JoinOutcome::Rejected;
        }

        player.lock().await.reset_score();
        self.roster.push(Seat {
            cid,
            player,
            outbox,
        });
        info!(
            "Game {}: client {} joined ({}/{})",
            self.gid,
            cid,
            self.roster.len(),
            self.capacity
        );

        let state = self.full_state().await;
        if let Some(seat) = self.roster.last() {
            Self::send_to(seat, Packet::GameJoined { gid: self.gid });
            Self::send_to(seat, Packet::GameStateSnapshot { state });
        }

        let players = self.players_wire().await;
        self.broadcast(Packet::PlayersUpdated { players });

        if self.roster.len() == self.capacity as usize && self.state() == SessionState::Waiting {
            let now = epoch_secs();
            self.start_time = Some(now);
            info!("Game {}: roster full, starting", self.gid);
            self.broadcast(Packet::GameStarted { start_time: now });
        }

        JoinOutcome::Joined
    }

    /// Unseats a player and notifies everyone affected.
    ///
    /// Dropping to one player mid-game ends the session (forfeit by
    /// depopulation). Dropping to zero asks the caller to destroy it.
    pub async fn remove_player(&mut self, cid: u32) -> RemoveOutcome {
        let Some(index) = self.roster.iter().position(|s| s.cid == cid) else {
            warn!(
                "Game {}: asked to remove client {} who is not in the roster",
                self.gid, cid
            );
            return RemoveOutcome::NotMember;
        };

        let seat = self.roster.remove(index);
        info!(
            "Game {}: client {} left ({} remaining)",
            self.gid,
            cid,
            self.roster.len()
        );
        Self::send_to(&seat, Packet::GameJoined { gid: 0 });

        let players = self.players_wire().await;
        self.broadcast(Packet::PlayersUpdated { players });

        if self.roster.len() == 1 && self.state() == SessionState::Active {
            self.end("forfeit by depopulation").await;
        }

        if self.roster.is_empty() {
            // A waiting session is torn down without ever having ended;
            // an active one records its end time first.
            if self.state() == SessionState::Active {
                self.end_time = Some(epoch_secs());
            }
            info!("Game {}: roster empty, destroying", self.gid);
            return RemoveOutcome::Destroyed;
        }

        RemoveOutcome::Removed
    }

    /// Applies one number entry for a seated player.
    ///
    /// Ignored (with a warning) outside the `Active` state or for malformed
    /// coordinates, since a well-behaved client cannot produce either.
    /// Returns the board outcome when the move was processed.
    pub async fn enter_number(
        &mut self,
        cid: u32,
        row: usize,
        col: usize,
        value: u8,
    ) -> Option<EntryOutcome> {
        if self.state() != SessionState::Active {
            warn!(
                "Game {}: entry from client {} while {:?}, ignoring",
                self.gid,
                cid,
                self.state()
            );
            return None;
        }
        if row >= GRID_SIZE || col >= GRID_SIZE || value > 9 {
            warn!(
                "Game {}: out-of-range entry ({}, {}) = {} from client {}",
                self.gid, row, col, value, cid
            );
            return None;
        }
        let Some(index) = self.roster.iter().position(|s| s.cid == cid) else {
            warn!(
                "Game {}: entry from client {} who is not in the roster",
                self.gid, cid
            );
            return None;
        };

        let outcome = self.board.enter_number(row, col, value);
        let delta = outcome.score_delta();
        if delta != 0 {
            self.roster[index].player.lock().await.apply_delta(delta);
        }
        debug!(
            "Game {}: client {} entered {} at ({}, {}) -> {:?}",
            self.gid, cid, value, row, col, outcome
        );

        let board = wire::encode_board_current(self.board.current());
        self.broadcast(Packet::BoardUpdated { board });
        let players = self.players_wire().await;
        self.broadcast(Packet::PlayersUpdated { players });

        if self.board.is_solved() {
            self.end("solved").await;
        }

        Some(outcome)
    }

    /// The session summary used in game listings.
    pub async fn summary(&self) -> wire::GameInfo {
        wire::GameInfo {
            gid: self.gid,
            start_time: self.start_time.unwrap_or(0),
            max_players: self.capacity,
            players: self.player_infos().await,
        }
    }

    async fn player_infos(&self) -> Vec<wire::PlayerInfo> {
        let mut infos = Vec::with_capacity(self.roster.len());
        for seat in &self.roster {
            infos.push(seat.player.lock().await.to_wire());
        }
        infos
    }

    async fn players_wire(&self) -> Vec<u8> {
        wire::encode_player_list(&self.player_infos().await)
    }

    /// Full replication payload for a (re)joining player. Note that this
    /// includes the solution block; clients have always received it and the
    /// protocol keeps that shape, cheatable as it is.
    async fn full_state(&self) -> Vec<u8> {
        let players = self.player_infos().await;
        wire::encode_full_state(
            self.gid,
            self.board.solution(),
            &self.board.fixed_mask(),
            self.board.current(),
            &players,
        )
    }

    /// Records the end time, announces the winner, and tells the roster.
    async fn end(&mut self, reason: &str) {
        let now = epoch_secs();
        self.end_time = Some(now);

        let mut winner: Option<(u32, i8)> = None;
        for seat in &self.roster {
            let score = seat.player.lock().await.score();
            // Strict comparison keeps the first roster member on ties.
            if winner.map_or(true, |(_, best)| score > best) {
                winner = Some((seat.cid, score));
            }
        }
        match winner {
            Some((cid, score)) => info!(
                "Game {} ended ({}); winner: client {} with score {}",
                self.gid, reason, cid, score
            ),
            None => info!("Game {} ended ({})", self.gid, reason),
        }

        self.broadcast(Packet::GameEnded { end_time: now });
    }

    fn broadcast(&self, packet: Packet) {
        for seat in &self.roster {
            Self::send_to(seat, packet.clone());
        }
    }

    fn send_to(seat: &Seat, packet: Packet) {
        // A closed queue means the connection is already gone; disconnect
        // cleanup will remove the seat shortly.
        if seat.outbox.send(packet).is_err() {
            debug!("Client {}: outbound queue closed, dropping packet", seat.cid);
        }
    }
}
