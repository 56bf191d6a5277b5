//! Room session: the task that owns one room's relay sockets.
//!
//! ```text
//! Waiting ──(all seats connected)──▶ Starting ──(grace)──▶ Relaying ──(any disconnect)──▶ Closed
//!    └──────────────(nobody connected for empty_timeout)──────────────────────────────────▲
//! ```
//!
//! Every task belonging to the room watches the same `running` flag (a
//! `watch` channel). Whoever first sees the room end flips it to `false`;
//! everyone else notices and winds down.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use playhub_protocol::{JsonCodec, RoomId, RoomNotice, is_ping, send_message};
use playhub_transport::{Connection, ConnectionId, TcpConnection, TcpTransport, Transport};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

use crate::{RoomEvent, RoomInfo, RoomRegistry, RoomState};

type Player = Arc<TcpConnection>;

/// The role token announced to the player in seat `index` (0-based).
///
/// Two-seat rooms use `black` / `white`; larger rooms number their seats
/// `P1`, `P2`, ...
pub fn role_token(index: usize, max_participants: u32) -> String {
    match (max_participants, index) {
        (2, 0) => "black".to_string(),
        (2, 1) => "white".to_string(),
        _ => format!("P{}", index + 1),
    }
}

pub(crate) fn spawn_session(
    registry: RoomRegistry,
    info: &RoomInfo,
    primary: TcpTransport,
    side: TcpTransport,
) {
    let (running, _) = watch::channel(true);
    let running = Arc::new(running);
    let session = RoomSession {
        room_id: info.id,
        artifact_id: info.artifact_id.clone(),
        seats: info.max_participants,
        primary,
        registry,
        running,
    };
    let side_running = session.running.subscribe();
    let room_id = info.id;
    tokio::spawn(run_side_channel(room_id, side, side_running));
    tokio::spawn(session.run());
}

struct RoomSession {
    room_id: RoomId,
    artifact_id: String,
    seats: u32,
    primary: TcpTransport,
    registry: RoomRegistry,
    running: Arc<watch::Sender<bool>>,
}

impl RoomSession {
    async fn run(mut self) {
        let room_id = self.room_id;
        tracing::info!(%room_id, seats = self.seats, "room session started");

        let players = match self.wait_for_players().await {
            Some(players) => {
                self.start(&players).await;
                self.relay(&players).await;
                players
            }
            None => {
                tracing::info!(%room_id, "nobody connected, closing room");
                Vec::new()
            }
        };

        self.close(&players).await;
    }

    /// Waiting: accept until every seat is connected.
    ///
    /// Returns `None` if the room sat empty for `empty_timeout`.
    async fn wait_for_players(&mut self) -> Option<Vec<Player>> {
        let config = self.registry.config().clone();
        let codec = JsonCodec;
        let mut players: Vec<Player> = Vec::new();
        let mut empty_since = Instant::now();

        while players.len() < self.seats as usize {
            match timeout(config.liveness_interval, self.primary.accept()).await {
                Ok(Ok(conn)) => {
                    let role = role_token(players.len(), self.seats);
                    let init = RoomNotice::Init {
                        role: role.clone(),
                        msg: "Waiting...".into(),
                    };
                    if let Err(e) = send_message(&conn, &codec, &init).await {
                        tracing::debug!(room_id = %self.room_id, error = %e, "player left before init");
                        continue;
                    }
                    tracing::info!(room_id = %self.room_id, conn_id = %conn.id(), %role, "player connected");
                    players.push(Arc::new(conn));
                    sleep(config.init_settle).await;
                }
                Ok(Err(e)) => {
                    tracing::warn!(room_id = %self.room_id, error = %e, "relay accept failed");
                }
                Err(_) => {
                    let before = players.len();
                    prune_dead(&mut players, &codec).await;
                    if players.len() < before {
                        tracing::info!(
                            room_id = %self.room_id,
                            dropped = before - players.len(),
                            "pruned dead players"
                        );
                    }
                    if !players.is_empty() {
                        empty_since = Instant::now();
                    } else if empty_since.elapsed() >= config.empty_timeout {
                        return None;
                    }
                }
            }
        }
        Some(players)
    }

    /// Starting: report participation, wait out the grace, send `gamestart`.
    async fn start(&self, players: &[Player]) {
        let room_id = self.room_id;
        self.registry.set_state(room_id, RoomState::Starting).await;
        let participants = self
            .registry
            .get(room_id)
            .await
            .map(|room| room.participants)
            .unwrap_or_default();
        tracing::info!(%room_id, players = players.len(), "room full, starting");
        self.registry.notify(RoomEvent::Started {
            room_id,
            artifact_id: self.artifact_id.clone(),
            participants,
        });

        sleep(self.registry.config().start_grace).await;
        broadcast(
            players,
            &RoomNotice::GameStart {
                msg: "Game Start!".into(),
            },
        )
        .await;
        self.registry.set_state(room_id, RoomState::Relaying).await;
    }

    /// Relaying: one forwarding task per player until any of them stops.
    async fn relay(&self, players: &[Player]) {
        let peers: Arc<Vec<Player>> = Arc::new(players.to_vec());
        for seat in 0..peers.len() {
            let peers = Arc::clone(&peers);
            let running = Arc::clone(&self.running);
            let room_id = self.room_id;
            tokio::spawn(async move {
                forward(room_id, seat, &peers, &running).await;
                running.send_replace(false);
            });
        }
        stopped(&mut self.running.subscribe()).await;
    }

    /// Closed: tell whoever is left, close everything, leave the table.
    async fn close(&self, players: &[Player]) {
        self.running.send_replace(false);
        broadcast(players, &RoomNotice::room_closed()).await;
        for player in players {
            let _ = player.close().await;
        }
        self.registry.remove(self.room_id).await;
        self.registry.notify(RoomEvent::Closed {
            room_id: self.room_id,
        });
        tracing::info!(room_id = %self.room_id, "room closed");
    }
}

/// Forwards frames from `peers[seat]` to every other peer, verbatim.
/// Liveness probes are dropped.
async fn forward(room_id: RoomId, seat: usize, peers: &[Player], running: &watch::Sender<bool>) {
    let source = &peers[seat];
    let mut stop = running.subscribe();
    loop {
        let frame = tokio::select! {
            frame = source.recv() => frame,
            _ = stopped(&mut stop) => return,
        };
        match frame {
            Ok(Some(body)) => {
                if is_ping(&body) {
                    continue;
                }
                for (i, peer) in peers.iter().enumerate() {
                    if i != seat {
                        let _ = peer.send(&body).await;
                    }
                }
            }
            Ok(None) => {
                tracing::info!(%room_id, seat, "player disconnected");
                return;
            }
            Err(e) => {
                tracing::info!(%room_id, seat, error = %e, "player connection failed");
                return;
            }
        }
    }
}

/// Resolves once the room's running flag is `false`.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|running| !*running).await;
}

async fn broadcast(players: &[Player], notice: &RoomNotice) {
    let codec = JsonCodec;
    for player in players {
        let _ = send_message(player.as_ref(), &codec, notice).await;
    }
}

async fn prune_dead(players: &mut Vec<Player>, codec: &JsonCodec) {
    let mut alive = Vec::with_capacity(players.len());
    for player in players.drain(..) {
        if send_message(player.as_ref(), codec, &RoomNotice::Ping).await.is_ok() {
            alive.push(player);
        }
    }
    *players = alive;
}

// ---------------------------------------------------------------------------
// Side channel
// ---------------------------------------------------------------------------

/// Connections on a room's side channel.
#[derive(Default)]
struct SidePeers(Mutex<Vec<Player>>);

impl SidePeers {
    fn lock(&self) -> MutexGuard<'_, Vec<Player>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, peer: Player) {
        self.lock().push(peer);
    }

    fn remove(&self, id: ConnectionId) {
        self.lock().retain(|p| p.id() != id);
    }

    fn others(&self, id: ConnectionId) -> Vec<Player> {
        self.lock().iter().filter(|p| p.id() != id).cloned().collect()
    }

    fn take_all(&self) -> Vec<Player> {
        std::mem::take(&mut *self.lock())
    }
}

/// Accepts side channel connections until the room stops; each one gets a
/// fan-out relay task.
async fn run_side_channel(room_id: RoomId, mut transport: TcpTransport, mut running: watch::Receiver<bool>) {
    let peers = Arc::new(SidePeers::default());
    loop {
        let accepted = tokio::select! {
            accepted = transport.accept() => accepted,
            _ = stopped(&mut running) => break,
        };
        match accepted {
            Ok(conn) => {
                let conn = Arc::new(conn);
                tracing::debug!(%room_id, conn_id = %conn.id(), "side channel connected");
                peers.add(Arc::clone(&conn));
                tokio::spawn(side_relay(conn, Arc::clone(&peers), running.clone()));
            }
            Err(e) => {
                tracing::debug!(%room_id, error = %e, "side channel accept failed");
            }
        }
    }
    for peer in peers.take_all() {
        let _ = peer.close().await;
    }
}

/// Rebroadcasts every frame from `conn` to every other side connection.
async fn side_relay(conn: Player, peers: Arc<SidePeers>, mut running: watch::Receiver<bool>) {
    let id = conn.id();
    loop {
        let frame = tokio::select! {
            frame = conn.recv() => frame,
            _ = stopped(&mut running) => break,
        };
        let Ok(Some(body)) = frame else {
            break;
        };
        for peer in peers.others(id) {
            if peer.send(&body).await.is_err() {
                peers.remove(peer.id());
            }
        }
    }
    peers.remove(id);
    let _ = conn.close().await;
}
