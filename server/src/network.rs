//! Server network layer handling UDP transport and request dispatch
//!
//! Inbound packets are funneled through a single event queue into the main
//! server loop, which routes each request into the registry/session engine.
//! Outbound traffic never happens under an engine lock: every connection
//! gets its own writer task draining an unbounded queue, so one stalled
//! client cannot hold up another player's move.

use crate::connection::ConnectionManager;
use crate::player::PlayerRecord;
use crate::registry::SessionRegistry;
use crate::session::{GameSession, JoinOutcome, Outbox, RemoveOutcome};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::Packet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::interval;

/// Connections silent for this long are dropped.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Messages sent from auxiliary tasks to the main server loop
#[derive(Debug)]
pub enum ServerEvent {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    /// A payload from `addr` failed to decode; that connection is ended.
    MalformedPacket {
        addr: SocketAddr,
    },
    ConnectionTimeout {
        client_id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Main server coordinating the transport and the session engine.
///
/// Lock order everywhere: connections or registry first, then a session;
/// never two sessions at once (a player sits in at most one).
pub struct Server {
    socket: Arc<UdpSocket>,
    connections: Arc<RwLock<ConnectionManager>>,
    registry: Arc<Mutex<SessionRegistry>>,

    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_connections: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            connections: Arc::new(RwLock::new(ConnectionManager::new(max_connections))),
            registry: Arc::new(Mutex::new(SessionRegistry::new())),
            event_tx,
            event_rx,
        })
    }

    /// Spawns the task that continuously listens for incoming packets.
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let event = match deserialize::<Packet>(&buffer[0..len]) {
                            Ok(packet) => ServerEvent::PacketReceived { packet, addr },
                            Err(_) => {
                                warn!("Failed to decode packet from {}", addr);
                                ServerEvent::MalformedPacket { addr }
                            }
                        };
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that monitors connection timeouts.
    async fn spawn_timeout_checker(&self) {
        let connections = Arc::clone(&self.connections);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(5));

            loop {
                interval.tick().await;

                let timed_out = {
                    let connections = connections.read().await;
                    connections.check_timeouts(CONNECTION_TIMEOUT)
                };

                for client_id in timed_out {
                    if event_tx
                        .send(ServerEvent::ConnectionTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    /// Creates the outbound queue for one connection and spawns the writer
    /// task that drains it onto the socket.
    fn spawn_outbox_writer(&self, addr: SocketAddr) -> Outbox {
        let socket = Arc::clone(&self.socket);
        let (tx, mut rx) = mpsc::unbounded_channel::<Packet>();

        tokio::spawn(async move {
            while let Some(packet) = rx.recv().await {
                match serialize(&packet) {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, addr).await {
                            error!("Failed to send to {}: {}", addr, e);
                        }
                    }
                    Err(e) => error!("Failed to serialize packet for {}: {}", addr, e),
                }
            }
            debug!("Writer for {} finished", addr);
        });

        tx
    }

    /// One-off send used before a connection (and its writer) exists.
    async fn send_direct(&self, packet: &Packet, addr: SocketAddr) {
        match serialize(packet) {
            Ok(data) => {
                if let Err(e) = self.socket.send_to(&data, addr).await {
                    error!("Failed to send to {}: {}", addr, e);
                }
            }
            Err(e) => error!("Failed to serialize packet for {}: {}", addr, e),
        }
    }

    /// Routes one decoded request into the engine.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let cid = {
            let connections = self.connections.read().await;
            connections.find_by_addr(addr)
        };

        match packet {
            Packet::Connect { name } => self.handle_connect(addr, &name, cid).await,
            other => {
                let Some(cid) = cid else {
                    warn!("Packet from unknown address {}, ignoring", addr);
                    return;
                };
                {
                    let mut connections = self.connections.write().await;
                    if let Some(connection) = connections.get_mut(cid) {
                        connection.touch();
                    }
                }

                match other {
                    Packet::RequestGameList => self.send_game_list(cid).await,
                    Packet::RequestNewGame { max_players } => {
                        self.new_game(cid, max_players).await
                    }
                    Packet::RequestJoinGame { gid } => self.join_game(cid, gid).await,
                    Packet::RequestLeaveGame => self.leave_game(cid).await,
                    Packet::RequestEnterNumber { row, col, value } => {
                        self.enter_number(cid, row, col, value).await
                    }
                    Packet::Disconnect => self.disconnect(cid, false).await,
                    _ => warn!("Unexpected packet type from client {} at {}", cid, addr),
                }
            }
        }
    }

    async fn handle_connect(&mut self, addr: SocketAddr, name: &[u8], existing: Option<u32>) {
        // A reconnect from a known address replaces the old connection.
        if let Some(old) = existing {
            info!("Replacing existing client {} from {}", old, addr);
            self.disconnect(old, true).await;
        }

        let outbox = self.spawn_outbox_writer(addr);
        let client_id = {
            let mut connections = self.connections.write().await;
            connections.add_connection(addr, name, outbox.clone())
        };

        match client_id {
            Some(client_id) => {
                let _ = outbox.send(Packet::Connected { client_id });
            }
            None => {
                warn!("Connection from {} rejected: server full", addr);
                self.send_direct(&Packet::Bye, addr).await;
            }
        }
    }

    /// Ends a connection: drops it from the manager and leaves its game.
    /// Safe to call for ids that are already gone.
    async fn disconnect(&mut self, cid: u32, notify: bool) {
        let connection = {
            let mut connections = self.connections.write().await;
            connections.remove_connection(cid)
        };
        let Some(connection) = connection else {
            return;
        };

        if notify {
            let _ = connection.outbox.send(Packet::Bye);
        }
        if let Some(gid) = connection.game {
            self.leave_session(gid, cid).await;
        }
        // Dropping `connection` releases the last engine-side outbox clone;
        // the writer task exits once the queue drains.
    }

    async fn drop_malformed(&mut self, addr: SocketAddr) {
        let cid = {
            let connections = self.connections.read().await;
            connections.find_by_addr(addr)
        };
        if let Some(cid) = cid {
            warn!("Dropping client {} after malformed payload", cid);
            self.disconnect(cid, true).await;
        }
    }

    async fn send_game_list(&self, cid: u32) {
        let games = {
            let registry = self.registry.lock().await;
            registry.serialize_summaries().await
        };
        self.send_to_client(cid, Packet::GameListUpdated { games })
            .await;
    }

    async fn new_game(&self, cid: u32, max_players: u8) {
        if max_players == 0 {
            warn!("Client {} requested a zero-capacity game", cid);
            self.send_to_client(cid, Packet::GameJoined { gid: 0 }).await;
            return;
        }

        // A client already seated somewhere gets resynced there instead.
        if let Some(current) = self.current_game(cid).await {
            debug!("Client {} requested a new game while in game {}", cid, current);
            self.join_game(cid, current).await;
            return;
        }

        let Some((player, outbox)) = self.seat_handles(cid).await else {
            return;
        };

        let (gid, outcome) = {
            let mut registry = self.registry.lock().await;
            let (gid, session) = registry.create_session(max_players);
            let outcome = session.lock().await.add_player(player, outbox).await;
            (gid, outcome)
        };

        match outcome {
            JoinOutcome::Joined | JoinOutcome::Resynced => {
                self.set_current_game(cid, Some(gid)).await;
            }
            JoinOutcome::Rejected => {
                self.send_to_client(cid, Packet::GameJoined { gid: 0 }).await;
            }
        }
    }

    async fn join_game(&self, cid: u32, gid: u32) {
        // Already seated: answer with the current session, not the requested
        // one.
        let target = match self.current_game(cid).await {
            Some(current) => current,
            None => gid,
        };

        let Some((player, outbox)) = self.seat_handles(cid).await else {
            return;
        };

        let session = {
            let registry = self.registry.lock().await;
            registry.get_session(target)
        };
        let Some(session) = session else {
            debug!("Client {} asked to join missing game {}", cid, target);
            self.send_to_client(cid, Packet::GameJoined { gid: 0 }).await;
            return;
        };

        let outcome = session.lock().await.add_player(player, outbox).await;
        match outcome {
            JoinOutcome::Joined | JoinOutcome::Resynced => {
                self.set_current_game(cid, Some(target)).await;
            }
            JoinOutcome::Rejected => {
                self.send_to_client(cid, Packet::GameJoined { gid: 0 }).await;
            }
        }
    }

    async fn leave_game(&self, cid: u32) {
        let gid = {
            let mut connections = self.connections.write().await;
            connections.get_mut(cid).and_then(|c| c.game.take())
        };
        match gid {
            Some(gid) => self.leave_session(gid, cid).await,
            None => warn!("Client {} asked to leave but is not in a game", cid),
        }
    }

    /// Removes `cid` from session `gid`, destroying the session if it
    /// empties. Holds the registry lock across the session call, which is
    /// the required acquisition order.
    async fn leave_session(&self, gid: u32, cid: u32) {
        let mut registry = self.registry.lock().await;
        let Some(session) = registry.get_session(gid) else {
            return;
        };
        let outcome = session.lock().await.remove_player(cid).await;
        if outcome == RemoveOutcome::Destroyed {
            registry.remove_session(gid);
        }
    }

    async fn enter_number(&self, cid: u32, row: u8, col: u8, value: u8) {
        let Some(gid) = self.current_game(cid).await else {
            warn!("Client {} sent an entry while not in a game", cid);
            return;
        };
        let session = {
            let registry = self.registry.lock().await;
            registry.get_session(gid)
        };
        if let Some(session) = session {
            session
                .lock()
                .await
                .enter_number(cid, row as usize, col as usize, value)
                .await;
        }
    }

    async fn current_game(&self, cid: u32) -> Option<u32> {
        let connections = self.connections.read().await;
        connections.get(cid).and_then(|c| c.game)
    }

    async fn set_current_game(&self, cid: u32, game: Option<u32>) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(cid) {
            connection.game = game;
        }
    }

    async fn seat_handles(&self, cid: u32) -> Option<(Arc<Mutex<PlayerRecord>>, Outbox)> {
        let connections = self.connections.read().await;
        connections
            .get(cid)
            .map(|c| (Arc::clone(&c.player), c.outbox.clone()))
    }

    async fn send_to_client(&self, cid: u32, packet: Packet) {
        let outbox = {
            let connections = self.connections.read().await;
            connections.get(cid).map(|c| c.outbox.clone())
        };
        if let Some(outbox) = outbox {
            let _ = outbox.send(packet);
        }
    }

    /// The address the server socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Number of live connections; exposed for tests and monitoring.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Handle to a registered session; exposed for tests and monitoring.
    pub async fn session_handle(&self, gid: u32) -> Option<Arc<Mutex<GameSession>>> {
        self.registry.lock().await.get_session(gid)
    }

    /// Main server loop coordinating all operations.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_timeout_checker().await;

        let mut stats_interval = interval(Duration::from_secs(60));
        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.event_rx.recv() => {
                    match message {
                        Some(ServerEvent::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerEvent::MalformedPacket { addr }) => {
                            self.drop_malformed(addr).await;
                        }
                        Some(ServerEvent::ConnectionTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.disconnect(client_id, false).await;
                        }
                        Some(ServerEvent::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = stats_interval.tick() => {
                    let connections = self.connections.read().await.len();
                    let sessions = self.registry.lock().await.len();
                    if connections > 0 || sessions > 0 {
                        debug!("{} connections, {} sessions", connections, sessions);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::wire;

    async fn test_server() -> Server {
        Server::new("127.0.0.1:0", 8).await.unwrap()
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[tokio::test]
    async fn connect_registers_connection() {
        let mut server = test_server().await;

        server
            .handle_packet(
                Packet::Connect {
                    name: b"Johan".to_vec(),
                },
                addr(40001),
            )
            .await;

        assert_eq!(server.connection_count().await, 1);
    }

    #[tokio::test]
    async fn reconnect_replaces_connection() {
        let mut server = test_server().await;
        let a = addr(40002);

        server
            .handle_packet(Packet::Connect { name: b"a".to_vec() }, a)
            .await;
        server
            .handle_packet(Packet::Connect { name: b"a".to_vec() }, a)
            .await;

        assert_eq!(server.connection_count().await, 1);
    }

    #[tokio::test]
    async fn packets_from_unknown_address_ignored() {
        let mut server = test_server().await;

        server
            .handle_packet(Packet::RequestGameList, addr(40003))
            .await;
        server
            .handle_packet(Packet::RequestNewGame { max_players: 2 }, addr(40003))
            .await;

        assert_eq!(server.connection_count().await, 0);
        assert!(server.registry.lock().await.is_empty());
    }

    #[tokio::test]
    async fn new_game_creates_and_seats() {
        let mut server = test_server().await;
        let a = addr(40004);

        server
            .handle_packet(Packet::Connect { name: b"a".to_vec() }, a)
            .await;
        server
            .handle_packet(Packet::RequestNewGame { max_players: 2 }, a)
            .await;

        assert_eq!(server.registry.lock().await.len(), 1);
        let session = server.session_handle(1).await.unwrap();
        assert_eq!(session.lock().await.roster_len(), 1);
    }

    #[tokio::test]
    async fn leave_destroys_empty_session() {
        let mut server = test_server().await;
        let a = addr(40005);

        server
            .handle_packet(Packet::Connect { name: b"a".to_vec() }, a)
            .await;
        server
            .handle_packet(Packet::RequestNewGame { max_players: 2 }, a)
            .await;
        server.handle_packet(Packet::RequestLeaveGame, a).await;

        assert!(server.session_handle(1).await.is_none());
        assert!(server.registry.lock().await.is_empty());
    }

    #[tokio::test]
    async fn disconnect_leaves_game_implicitly() {
        let mut server = test_server().await;
        let a = addr(40006);

        server
            .handle_packet(Packet::Connect { name: b"a".to_vec() }, a)
            .await;
        server
            .handle_packet(Packet::RequestNewGame { max_players: 3 }, a)
            .await;
        server.handle_packet(Packet::Disconnect, a).await;

        assert_eq!(server.connection_count().await, 0);
        assert!(server.registry.lock().await.is_empty());
    }

    #[tokio::test]
    async fn zero_capacity_game_rejected() {
        let mut server = test_server().await;
        let a = addr(40007);

        server
            .handle_packet(Packet::Connect { name: b"a".to_vec() }, a)
            .await;
        server
            .handle_packet(Packet::RequestNewGame { max_players: 0 }, a)
            .await;

        assert!(server.registry.lock().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_ends_connection() {
        let mut server = test_server().await;
        let a = addr(40008);

        server
            .handle_packet(Packet::Connect { name: b"a".to_vec() }, a)
            .await;
        assert_eq!(server.connection_count().await, 1);

        server.drop_malformed(a).await;
        assert_eq!(server.connection_count().await, 0);
    }

    #[tokio::test]
    async fn game_list_round_trips_through_registry() {
        let server = test_server().await;
        {
            let mut registry = server.registry.lock().await;
            registry.create_session(2);
            registry.create_session(3);
        }

        let bytes = {
            let registry = server.registry.lock().await;
            registry.serialize_summaries().await
        };
        let games = wire::decode_game_info_list(&bytes).unwrap();
        assert_eq!(games.len(), 2);
    }
}
