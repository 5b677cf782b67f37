//! Types shared between the sudoku server and its clients.
//!
//! [`Packet`] is the transport envelope: a serde enum moved over the socket
//! with bincode. Payloads that have a contractual byte layout (game listings,
//! board snapshots, player lists) are carried as opaque byte vectors produced
//! by the [`wire`] module, so the transport encoding can change without
//! touching the replicated record formats.

use serde::{Deserialize, Serialize};

pub mod wire;

pub use wire::MAX_NAME_LEN;

/// Every message exchanged between a client and the server.
///
/// The first group is client requests, the second server notifications.
/// Opcode assignment is left to bincode's enum tagging; the session engine
/// only deals in these variants.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    /// First packet from a client; carries the raw display name bytes.
    /// Names longer than [`MAX_NAME_LEN`] are truncated server-side.
    Connect { name: Vec<u8> },
    Disconnect,
    RequestGameList,
    RequestNewGame { max_players: u8 },
    RequestJoinGame { gid: u32 },
    RequestLeaveGame,
    RequestEnterNumber { row: u8, col: u8, value: u8 },

    /// Handshake reply with the server-assigned client id (never 0).
    Connected { client_id: u32 },
    /// Server-initiated disconnect; the client should close its socket.
    Bye,
    /// Payload is a [`wire`] game info list.
    GameListUpdated { games: Vec<u8> },
    /// gid 0 means the join was rejected or the player was ejected.
    GameJoined { gid: u32 },
    /// Payload is a [`wire`] full state record (gid, board snapshot, roster).
    GameStateSnapshot { state: Vec<u8> },
    /// Payload is a concatenated [`wire::PlayerInfo`] list.
    PlayersUpdated { players: Vec<u8> },
    /// Payload is the 81-byte `current` block.
    BoardUpdated { board: Vec<u8> },
    /// Epoch seconds at which the session went active.
    GameStarted { start_time: u32 },
    /// Epoch seconds at which the session ended.
    GameEnded { end_time: u32 },
}
