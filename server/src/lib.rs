//! # Sudoku Game Server Library
//!
//! This library implements the authoritative server for a multiplayer
//! cooperative sudoku game. Every connected player shares one puzzle board
//! per game: all of them fill the same grid, the server scores every move,
//! and all state changes are pushed to each member as they happen.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The server holds the canonical copy of every board, roster, and score.
//! Clients never compute game outcomes themselves; they render the
//! notifications the server sends.
//!
//! ### Game Lifecycle
//! Games are created on request with a fixed player capacity. A game waits
//! until its roster fills, runs until the board is solved or all but one
//! player leave, and is destroyed the moment its last member departs. Game
//! ids are handed out once and never reused.
//!
//! ### Scoring
//! Each correct entry earns a point, each wrong entry or erased correct
//! entry costs one. Scores are clamped to the range a signed byte can
//! carry on the wire and reset whenever a player takes a seat in a game.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! All requests flow through one event queue into the main server loop,
//! which serializes every roster, score, and board mutation. Auxiliary
//! tasks (the socket receiver, the timeout checker, one writer per
//! connection) communicate with the loop over channels only.
//!
//! ### UDP-Based Communication
//! Uses UDP sockets for communication with clients. Requests and
//! notifications travel as a serialized packet envelope; game listings,
//! rosters, and board state are carried as compact fixed-layout byte
//! payloads inside it.
//!
//! ### Non-Blocking Broadcasts
//! Session code never performs network I/O. Notifications are pushed onto
//! per-connection queues while the session lock is held, which fixes the
//! order every member observes, and each connection's writer task drains
//! its own queue onto the socket.
//!
//! ## Module Organization
//!
//! - [`puzzle`]: sudoku boards, the clue pool, and per-move scoring outcomes
//! - [`player`]: player identity and score bookkeeping
//! - [`session`]: game rooms, rosters, the lifecycle state machine, broadcasts
//! - [`registry`]: the server-wide directory of active games
//! - [`connection`]: connected-client tracking, capacity, and timeouts
//! - [`network`]: the UDP transport, event loop, and request dispatch
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind the server and allow up to 64 concurrent connections
//!     let mut server = Server::new("127.0.0.1:8080", 64).await?;
//!
//!     // Run the main loop: accept connections, route requests into the
//!     // game engine, and push notifications back out
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod network;
pub mod player;
pub mod puzzle;
pub mod registry;
pub mod session;
pub mod utils;
