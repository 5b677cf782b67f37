//! Connection bookkeeping for the multiplayer sudoku server
//!
//! This module tracks every connected client: their server-assigned id and
//! player record, the network address used for routing, which game they are
//! currently in, and connection health for timeout cleanup. The manager
//! enforces the server's connection capacity and assigns client ids that
//! start from 1 and are never reused (0 is reserved for "unassigned").

use crate::player::PlayerRecord;
use crate::session::Outbox;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// One connected client.
///
/// The player record is shared with whichever session currently seats the
/// player; the outbox is cloned into that session's roster so broadcasts
/// reach this connection's writer task.
pub struct Connection {
    /// Unique client identifier assigned by the server.
    pub id: u32,
    /// Network address for routing inbound packets to this connection.
    pub addr: SocketAddr,
    /// Last time we received any packet from this client.
    pub last_seen: Instant,
    /// Identity and score, reused across sessions for the connection's life.
    pub player: Arc<Mutex<PlayerRecord>>,
    /// Handle to this connection's outbound packet queue.
    pub outbox: Outbox,
    /// gid of the session the player is seated in, if any.
    pub game: Option<u32>,
}

impl Connection {
    pub fn new(id: u32, addr: SocketAddr, name: &[u8], outbox: Outbox) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            player: Arc::new(Mutex::new(PlayerRecord::new(id, name))),
            outbox,
            game: None,
        }
    }

    /// Marks the connection as recently active.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// True if no packet has arrived within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients.
pub struct ConnectionManager {
    connections: HashMap<u32, Connection>,
    next_client_id: u32,
    max_connections: usize,
}

impl ConnectionManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_client_id: 1,
            max_connections,
        }
    }

    /// Registers a new connection.
    ///
    /// Returns the assigned client id, or None when the server is at
    /// capacity.
    pub fn add_connection(&mut self, addr: SocketAddr, name: &[u8], outbox: Outbox) -> Option<u32> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let connection = Connection::new(client_id, addr, name, outbox);
        info!("Client {} connected from {}", client_id, addr);
        self.connections.insert(client_id, connection);

        Some(client_id)
    }

    /// Drops a connection, returning its state so the caller can finish
    /// cleanup (leaving the player's current game, in particular).
    pub fn remove_connection(&mut self, client_id: u32) -> Option<Connection> {
        let connection = self.connections.remove(&client_id);
        if connection.is_some() {
            info!("Client {} disconnected", client_id);
        }
        connection
    }

    /// Associates an incoming packet's source address with a client.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.connections
            .iter()
            .find(|(_, connection)| connection.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, client_id: u32) -> Option<&Connection> {
        self.connections.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: u32) -> Option<&mut Connection> {
        self.connections.get_mut(&client_id)
    }

    /// Collects clients that have exceeded the timeout.
    ///
    /// The connections are left in place: the caller runs the full
    /// disconnect path (leave game, drop connection) for each id, which
    /// needs the connection's state.
    pub fn check_timeouts(&self, timeout: Duration) -> Vec<u32> {
        self.connections
            .iter()
            .filter(|(_, connection)| connection.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
