//! Integration tests for the room system over real sockets.
//!
//! Every test uses its own relay port range on loopback and shortened
//! timings, then plays the part of the clients connecting to the relays.

use std::time::Duration;

use playhub_protocol::RoomId;
use playhub_room::{NewRoom, RoomConfig, RoomError, RoomEvent, RoomEvents, RoomRegistry, RoomState};
use playhub_transport::{Connection, TcpConnection};
use serde_json::{Value, json};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn config(first_port: u16) -> RoomConfig {
    RoomConfig {
        bind_host: "127.0.0.1".into(),
        host_address: "127.0.0.1".into(),
        relay_ports: first_port..first_port + 40,
        side_port_offset: 1000,
        liveness_interval: Duration::from_millis(50),
        empty_timeout: Duration::from_secs(30),
        start_grace: Duration::from_millis(50),
        init_settle: Duration::from_millis(5),
        ..RoomConfig::default()
    }
}

fn new_room(host: &str, seats: u32) -> NewRoom {
    NewRoom {
        artifact_id: "1".into(),
        artifact_name: "Gomoku".into(),
        host: host.into(),
        max_participants: seats,
    }
}

async fn recv_json(conn: &TcpConnection) -> Value {
    let body = timeout(WAIT, conn.recv())
        .await
        .expect("frame in time")
        .expect("recv")
        .expect("open connection");
    serde_json::from_slice(&body).expect("json frame")
}

/// Reads frames until one that is not a liveness probe.
async fn recv_non_ping(conn: &TcpConnection) -> Value {
    loop {
        let v = recv_json(conn).await;
        if v["type"] != "ping" {
            return v;
        }
    }
}

async fn next_event(events: &mut RoomEvents) -> RoomEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("event in time")
        .expect("event channel open")
}

async fn connect(port: u16) -> TcpConnection {
    TcpConnection::connect(&format!("127.0.0.1:{port}"))
        .await
        .expect("connect to relay")
}

#[tokio::test]
async fn test_create_room_allocates_ports_and_seats_host() {
    let (rooms, _events) = RoomRegistry::new(config(41000));

    let info = rooms.create(new_room("alice", 2)).await.unwrap();

    assert_eq!(info.participants, vec!["alice".to_string()]);
    assert_eq!(info.max_participants, 2);
    assert_eq!(info.state, RoomState::Waiting);
    assert!((41000..41040).contains(&info.relay_port));
    assert_eq!(info.side_port, info.relay_port + 1000);
    assert_eq!(rooms.get(info.id).await, Some(info.clone()));

    let listed = serde_json::to_value(&rooms.list().await).unwrap();
    assert_eq!(listed[0]["artifact_name"], "Gomoku");
    assert_eq!(listed[0]["state"], "waiting");
}

#[tokio::test]
async fn test_join_rules() {
    let (rooms, _events) = RoomRegistry::new(config(41100));
    let info = rooms.create(new_room("alice", 2)).await.unwrap();

    let joined = rooms.join(info.id, "bob").await.unwrap();
    assert_eq!(joined.participants, vec!["alice", "bob"]);

    // Already seated: no-op.
    let again = rooms.join(info.id, "bob").await.unwrap();
    assert_eq!(again.participants.len(), 2);

    let full = rooms.join(info.id, "carol").await.unwrap_err();
    assert!(matches!(full, RoomError::RoomFull(id) if id == info.id));
    assert!(full.is_capacity());

    let missing = rooms.join(RoomId(999), "carol").await.unwrap_err();
    assert!(matches!(missing, RoomError::NotFound(RoomId(999))));
}

#[tokio::test]
async fn test_room_limit() {
    let (rooms, _events) = RoomRegistry::new(RoomConfig {
        max_rooms: 1,
        ..config(41200)
    });
    rooms.create(new_room("alice", 2)).await.unwrap();

    let err = rooms.create(new_room("bob", 2)).await.unwrap_err();
    assert!(matches!(err, RoomError::TooManyRooms { max: 1 }));
}

#[tokio::test]
async fn test_relay_ports_unique_among_live_rooms() {
    let (rooms, _events) = RoomRegistry::new(RoomConfig {
        relay_ports: 41300..41301,
        ..config(41300)
    });
    let first = rooms.create(new_room("alice", 2)).await.unwrap();
    assert_eq!(first.relay_port, 41300);

    let err = rooms.create(new_room("bob", 2)).await.unwrap_err();
    assert!(matches!(err, RoomError::PortsExhausted));
}

#[tokio::test]
async fn test_zero_seats_rejected() {
    let (rooms, _events) = RoomRegistry::new(config(41800));
    let err = rooms.create(new_room("alice", 0)).await.unwrap_err();
    assert!(matches!(err, RoomError::InvalidCapacity(0)));
    assert!(rooms.is_empty().await);
}

#[tokio::test]
async fn test_full_lifecycle_two_players() {
    let (rooms, mut events) = RoomRegistry::new(config(41400));
    let info = rooms.create(new_room("alice", 2)).await.unwrap();
    rooms.join(info.id, "bob").await.unwrap();

    let black = connect(info.relay_port).await;
    let init = recv_json(&black).await;
    assert_eq!(init["type"], "init");
    assert_eq!(init["role"], "black");

    let white = connect(info.relay_port).await;
    let init = recv_non_ping(&white).await;
    assert_eq!(init["role"], "white");

    // Full: participation is reported before gamestart.
    match next_event(&mut events).await {
        RoomEvent::Started {
            room_id,
            artifact_id,
            participants,
        } => {
            assert_eq!(room_id, info.id);
            assert_eq!(artifact_id, "1");
            assert_eq!(participants, vec!["alice", "bob"]);
        }
        other => panic!("expected Started, got {other:?}"),
    }
    assert_eq!(recv_non_ping(&black).await["type"], "gamestart");
    assert_eq!(recv_non_ping(&white).await["type"], "gamestart");

    // Pings are swallowed; everything else reaches the other seat verbatim.
    black.send(br#"{"type":"ping"}"#).await.unwrap();
    black
        .send(br#"{"type":"move","x":3,"y":4}"#)
        .await
        .unwrap();
    let moved = recv_json(&white).await;
    assert_eq!(moved, json!({"type": "move", "x": 3, "y": 4}));

    white.send(br#"{"type":"move","x":5,"y":5}"#).await.unwrap();
    assert_eq!(recv_json(&black).await["x"], 5);

    let state = rooms.get(info.id).await.map(|r| r.state);
    assert_eq!(state, Some(RoomState::Relaying));

    // One player leaves: the room closes for everyone.
    black.close().await.unwrap();
    drop(black);
    let closing = recv_json(&white).await;
    assert_eq!(closing, json!({"type": "error", "msg": "Room closed."}));

    assert_eq!(
        next_event(&mut events).await,
        RoomEvent::Closed { room_id: info.id }
    );
    assert!(rooms.get(info.id).await.is_none());
}

#[tokio::test]
async fn test_larger_rooms_number_roles() {
    let (rooms, _events) = RoomRegistry::new(config(41500));
    let info = rooms.create(new_room("alice", 3)).await.unwrap();

    let p1 = connect(info.relay_port).await;
    assert_eq!(recv_json(&p1).await["role"], "P1");
    let p2 = connect(info.relay_port).await;
    assert_eq!(recv_non_ping(&p2).await["role"], "P2");
}

#[tokio::test]
async fn test_side_channel_fans_out_to_others_only() {
    let (rooms, _events) = RoomRegistry::new(config(41600));
    let info = rooms.create(new_room("alice", 2)).await.unwrap();

    let a = connect(info.side_port).await;
    let b = connect(info.side_port).await;
    let c = connect(info.side_port).await;
    // Let the acceptor register all three before anyone speaks.
    tokio::time::sleep(Duration::from_millis(100)).await;

    a.send(br#"{"type":"chat","text":"hi"}"#).await.unwrap();
    assert_eq!(recv_json(&b).await["text"], "hi");
    assert_eq!(recv_json(&c).await["text"], "hi");

    b.send(br#"{"type":"chat","text":"yo"}"#).await.unwrap();
    // `a` sees b's message, never its own.
    assert_eq!(recv_json(&a).await["text"], "yo");
}

#[tokio::test]
async fn test_empty_room_times_out() {
    let (rooms, mut events) = RoomRegistry::new(RoomConfig {
        empty_timeout: Duration::from_millis(200),
        ..config(41700)
    });
    let info = rooms.create(new_room("alice", 2)).await.unwrap();

    assert_eq!(
        next_event(&mut events).await,
        RoomEvent::Closed { room_id: info.id }
    );
    assert!(rooms.is_empty().await);

    // The port is free for the next room.
    let again = rooms.create(new_room("bob", 2)).await.unwrap();
    assert_ne!(again.id, info.id);
}
