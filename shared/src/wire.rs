//! Binary wire records shared between server and clients.
//!
//! Everything here is big-endian with explicit lengths and no padding:
//!
//! - `PlayerInfo`: `u32 client_id | i8 score | u8 name_len | name bytes`
//! - `GameInfo`: `u32 gid | u32 start_time | u8 max_players | PlayerInfo*`
//! - game info list: repeated `u32 record_len | GameInfo bytes`
//! - board snapshot: three 81-byte row-major blocks (solution, fixed mask,
//!   current), one byte per cell
//! - board update: a single 81-byte `current` block
//! - full game state: `u32 gid | board snapshot | PlayerInfo*`
//!
//! These layouts are the protocol contract; they are encoded by hand rather
//! than through a serialization framework so the byte stream stays stable.

use thiserror::Error;

/// A 9x9 cell block, one byte per cell, row major.
pub type Grid = [[u8; 9]; 9];

/// Cells per board side.
pub const GRID_SIZE: usize = 9;
/// Bytes in one encoded cell block.
pub const GRID_BYTES: usize = GRID_SIZE * GRID_SIZE;
/// Bytes in a full snapshot (solution + fixed mask + current).
pub const SNAPSHOT_BYTES: usize = 3 * GRID_BYTES;
/// Longest player name carried on the wire.
pub const MAX_NAME_LEN: usize = 255;

/// Fixed-size prefix of an encoded `PlayerInfo` (client id, score, name length).
const PLAYER_INFO_HEADER: usize = 6;
/// Fixed-size prefix of an encoded `GameInfo` (gid, start time, max players).
const GAME_INFO_HEADER: usize = 9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("record truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("{0} unexpected trailing bytes after record")]
    TrailingBytes(usize),
}

/// One participant as replicated to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub client_id: u32,
    pub score: i8,
    /// Raw name bytes, at most [`MAX_NAME_LEN`]; longer names are truncated
    /// at encode time.
    pub name: Vec<u8>,
}

/// One session summary as shown in game listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub gid: u32,
    /// Epoch seconds; 0 while the session is still waiting for players.
    pub start_time: u32,
    pub max_players: u8,
    pub players: Vec<PlayerInfo>,
}

fn take(buf: &[u8], at: usize, needed: usize) -> Result<&[u8], WireError> {
    let remaining = buf.len().saturating_sub(at);
    if remaining < needed {
        return Err(WireError::Truncated { needed, remaining });
    }
    Ok(&buf[at..at + needed])
}

fn read_u32(buf: &[u8], at: usize) -> Result<u32, WireError> {
    let bytes = take(buf, at, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Appends an encoded `PlayerInfo` to `out`.
pub fn encode_player_info(info: &PlayerInfo, out: &mut Vec<u8>) {
    let name = &info.name[..info.name.len().min(MAX_NAME_LEN)];
    out.extend_from_slice(&info.client_id.to_be_bytes());
    out.push(info.score as u8);
    out.push(name.len() as u8);
    out.extend_from_slice(name);
}

/// Decodes one `PlayerInfo` from the front of `buf`.
///
/// Returns the record and the number of bytes it occupied, so callers can
/// walk a concatenated list.
pub fn decode_player_info(buf: &[u8]) -> Result<(PlayerInfo, usize), WireError> {
    let client_id = read_u32(buf, 0)?;
    let score = take(buf, 4, 1)?[0] as i8;
    let name_len = take(buf, 5, 1)?[0] as usize;
    let name = take(buf, PLAYER_INFO_HEADER, name_len)?.to_vec();
    Ok((
        PlayerInfo {
            client_id,
            score,
            name,
        },
        PLAYER_INFO_HEADER + name_len,
    ))
}

/// Encodes a concatenated `PlayerInfo` list (the `playersUpdated` payload).
pub fn encode_player_list(players: &[PlayerInfo]) -> Vec<u8> {
    let mut out = Vec::new();
    for p in players {
        encode_player_info(p, &mut out);
    }
    out
}

/// Decodes a concatenated `PlayerInfo` list, consuming the whole buffer.
pub fn decode_player_list(buf: &[u8]) -> Result<Vec<PlayerInfo>, WireError> {
    let mut players = Vec::new();
    let mut at = 0;
    while at < buf.len() {
        let (info, used) = decode_player_info(&buf[at..])?;
        players.push(info);
        at += used;
    }
    Ok(players)
}

/// Encodes one session summary record.
pub fn encode_game_info(info: &GameInfo) -> Vec<u8> {
    let mut out = Vec::with_capacity(GAME_INFO_HEADER);
    out.extend_from_slice(&info.gid.to_be_bytes());
    out.extend_from_slice(&info.start_time.to_be_bytes());
    out.push(info.max_players);
    for p in &info.players {
        encode_player_info(p, &mut out);
    }
    out
}

/// Decodes one session summary record, consuming the whole buffer.
///
/// The player list has no count field; it runs to the end of the record,
/// which is why listings carry an explicit length per entry.
pub fn decode_game_info(buf: &[u8]) -> Result<GameInfo, WireError> {
    let gid = read_u32(buf, 0)?;
    let start_time = read_u32(buf, 4)?;
    let max_players = take(buf, 8, 1)?[0];
    let players = decode_player_list(&buf[GAME_INFO_HEADER..])?;
    Ok(GameInfo {
        gid,
        start_time,
        max_players,
        players,
    })
}

/// Encodes a game listing: `u32 record_len | GameInfo` repeated.
pub fn encode_game_info_list(games: &[GameInfo]) -> Vec<u8> {
    let mut out = Vec::new();
    for game in games {
        let record = encode_game_info(game);
        out.extend_from_slice(&(record.len() as u32).to_be_bytes());
        out.extend_from_slice(&record);
    }
    out
}

/// Decodes a game listing produced by [`encode_game_info_list`].
pub fn decode_game_info_list(buf: &[u8]) -> Result<Vec<GameInfo>, WireError> {
    let mut games = Vec::new();
    let mut at = 0;
    while at < buf.len() {
        let record_len = read_u32(buf, at)? as usize;
        let record = take(buf, at + 4, record_len)?;
        games.push(decode_game_info(record)?);
        at += 4 + record_len;
    }
    Ok(games)
}

fn encode_grid(grid: &Grid, out: &mut Vec<u8>) {
    for row in grid {
        out.extend_from_slice(row);
    }
}

fn decode_grid(buf: &[u8], at: usize) -> Result<Grid, WireError> {
    let bytes = take(buf, at, GRID_BYTES)?;
    let mut grid = [[0u8; GRID_SIZE]; GRID_SIZE];
    for (row, chunk) in grid.iter_mut().zip(bytes.chunks_exact(GRID_SIZE)) {
        row.copy_from_slice(chunk);
    }
    Ok(grid)
}

/// Encodes the three-block board snapshot: solution, fixed mask, current.
pub fn encode_board_snapshot(solution: &Grid, fixed: &Grid, current: &Grid) -> Vec<u8> {
    let mut out = Vec::with_capacity(SNAPSHOT_BYTES);
    encode_grid(solution, &mut out);
    encode_grid(fixed, &mut out);
    encode_grid(current, &mut out);
    out
}

/// Decodes a board snapshot into (solution, fixed mask, current).
pub fn decode_board_snapshot(buf: &[u8]) -> Result<(Grid, Grid, Grid), WireError> {
    let solution = decode_grid(buf, 0)?;
    let fixed = decode_grid(buf, GRID_BYTES)?;
    let current = decode_grid(buf, 2 * GRID_BYTES)?;
    if buf.len() > SNAPSHOT_BYTES {
        return Err(WireError::TrailingBytes(buf.len() - SNAPSHOT_BYTES));
    }
    Ok((solution, fixed, current))
}

/// Encodes the 81-byte delta update carrying only the `current` block.
pub fn encode_board_current(current: &Grid) -> Vec<u8> {
    let mut out = Vec::with_capacity(GRID_BYTES);
    encode_grid(current, &mut out);
    out
}

/// Decodes an 81-byte `current` block.
pub fn decode_board_current(buf: &[u8]) -> Result<Grid, WireError> {
    let grid = decode_grid(buf, 0)?;
    if buf.len() > GRID_BYTES {
        return Err(WireError::TrailingBytes(buf.len() - GRID_BYTES));
    }
    Ok(grid)
}

/// Encodes the full game state pushed to a newly joined player:
/// `u32 gid | board snapshot | PlayerInfo*`.
pub fn encode_full_state(
    gid: u32,
    solution: &Grid,
    fixed: &Grid,
    current: &Grid,
    players: &[PlayerInfo],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + SNAPSHOT_BYTES);
    out.extend_from_slice(&gid.to_be_bytes());
    encode_grid(solution, &mut out);
    encode_grid(fixed, &mut out);
    encode_grid(current, &mut out);
    for p in players {
        encode_player_info(p, &mut out);
    }
    out
}

/// Decoded counterpart of [`encode_full_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullState {
    pub gid: u32,
    pub solution: Grid,
    pub fixed: Grid,
    pub current: Grid,
    pub players: Vec<PlayerInfo>,
}

/// Decodes a full game state payload.
pub fn decode_full_state(buf: &[u8]) -> Result<FullState, WireError> {
    let gid = read_u32(buf, 0)?;
    let solution = decode_grid(buf, 4)?;
    let fixed = decode_grid(buf, 4 + GRID_BYTES)?;
    let current = decode_grid(buf, 4 + 2 * GRID_BYTES)?;
    let players = decode_player_list(&buf[4 + SNAPSHOT_BYTES..])?;
    Ok(FullState {
        gid,
        solution,
        fixed,
        current,
        players,
    })
}
