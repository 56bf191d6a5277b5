//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on a random port and drive both ends
//! over loopback, including writes split into tiny pieces and raw
//! transfers that follow a frame in the same TCP segment.

use std::time::Duration;

use playhub_transport::{
    Connection, TcpConnection, TcpTransport, Transport, TransportError, encode_frame,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

async fn listener() -> (TcpTransport, String) {
    let transport = TcpTransport::bind("127.0.0.1:0").await.expect("should bind");
    let addr = transport.local_addr().expect("local addr").to_string();
    (transport, addr)
}

#[tokio::test]
async fn test_accept_and_send_receive() {
    let (mut transport, addr) = listener().await;

    let client = tokio::spawn(async move {
        let conn = TcpConnection::connect(&addr).await.expect("connect");
        conn.send(b"{\"action\":\"ping\"}").await.expect("send");
        conn.recv().await.expect("recv").expect("frame")
    });

    let server = transport.accept().await.expect("accept");
    let got = server.recv().await.expect("recv").expect("frame");
    assert_eq!(got, b"{\"action\":\"ping\"}");
    server.send(b"{\"status\":\"ok\"}").await.expect("send");

    let reply = client.await.expect("join");
    assert_eq!(reply, b"{\"status\":\"ok\"}");
}

#[tokio::test]
async fn test_clean_close_yields_none() {
    let (mut transport, addr) = listener().await;

    let client = TcpConnection::connect(&addr).await.expect("connect");
    let server = transport.accept().await.expect("accept");

    client.close().await.expect("close");
    drop(client);
    assert!(server.recv().await.expect("recv").is_none());
}

#[tokio::test]
async fn test_close_mid_frame_is_an_error() {
    let (mut transport, addr) = listener().await;

    let mut raw = TcpStream::connect(&addr).await.expect("connect");
    let server = transport.accept().await.expect("accept");

    // Header promises 10 bytes, only 3 arrive.
    raw.write_all(&[0, 0, 0, 10, b'a', b'b', b'c']).await.unwrap();
    raw.shutdown().await.unwrap();
    drop(raw);

    let result = server.recv().await;
    assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
}

#[tokio::test]
async fn test_frames_split_into_tiny_writes() {
    let (mut transport, addr) = listener().await;

    let mut raw = TcpStream::connect(&addr).await.expect("connect");
    raw.set_nodelay(true).unwrap();
    let server = transport.accept().await.expect("accept");

    let mut wire = Vec::new();
    wire.extend(encode_frame(b"{\"n\":1}").unwrap());
    wire.extend(encode_frame(b"").unwrap());
    wire.extend(encode_frame("{\"s\":\"ünïcødé\"}".as_bytes()).unwrap());

    let writer = tokio::spawn(async move {
        for piece in wire.chunks(3) {
            raw.write_all(piece).await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        raw
    });

    assert_eq!(server.recv().await.unwrap().unwrap(), b"{\"n\":1}");
    assert_eq!(server.recv().await.unwrap().unwrap(), b"");
    assert_eq!(
        server.recv().await.unwrap().unwrap(),
        "{\"s\":\"ünïcødé\"}".as_bytes()
    );
    let _raw = writer.await.unwrap();
}

#[tokio::test]
async fn test_raw_transfer_after_frame_in_same_write() {
    let (mut transport, addr) = listener().await;

    let mut raw = TcpStream::connect(&addr).await.expect("connect");
    let server = transport.accept().await.expect("accept");

    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let mut wire = encode_frame(b"{\"file_size\":10000}").unwrap();
    wire.extend_from_slice(&payload);
    wire.extend(encode_frame(b"{\"after\":true}").unwrap());
    raw.write_all(&wire).await.unwrap();

    let announce = server.recv().await.unwrap().unwrap();
    assert_eq!(announce, b"{\"file_size\":10000}");

    let mut received = Vec::new();
    server
        .recv_raw(&mut received, payload.len() as u64)
        .await
        .expect("raw recv");
    assert_eq!(received, payload);

    // Framing resumes exactly after the raw bytes.
    assert_eq!(server.recv().await.unwrap().unwrap(), b"{\"after\":true}");
}

#[tokio::test]
async fn test_send_raw_round_trip() {
    let (mut transport, addr) = listener().await;

    let client = TcpConnection::connect(&addr).await.expect("connect");
    let server = transport.accept().await.expect("accept");

    let payload: Vec<u8> = (0..9_000u32).map(|i| (i % 7) as u8).collect();
    let expected = payload.clone();
    let sender = tokio::spawn(async move {
        client.send(b"{\"file_size\":9000}").await.unwrap();
        client
            .send_raw(&mut payload.as_slice(), 9_000)
            .await
            .unwrap();
        client.send(b"{\"done\":1}").await.unwrap();
        client
    });

    assert_eq!(server.recv().await.unwrap().unwrap(), b"{\"file_size\":9000}");
    let mut got = Vec::new();
    server.recv_raw(&mut got, 9_000).await.unwrap();
    assert_eq!(got, expected);
    assert_eq!(server.recv().await.unwrap().unwrap(), b"{\"done\":1}");
    let _client = sender.await.unwrap();
}

#[tokio::test]
async fn test_short_raw_source_is_incomplete() {
    let (mut transport, addr) = listener().await;
    let client = TcpConnection::connect(&addr).await.expect("connect");
    let _server = transport.accept().await.expect("accept");

    let short = vec![1u8; 10];
    let err = client
        .send_raw(&mut short.as_slice(), 100)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransportError::TransferIncomplete {
            expected: 100,
            transferred: 10
        }
    ));
}

#[tokio::test]
async fn test_peer_closing_during_raw_recv_is_incomplete() {
    let (mut transport, addr) = listener().await;

    let mut raw = TcpStream::connect(&addr).await.expect("connect");
    let server = transport.accept().await.expect("accept");

    raw.write_all(&[9u8; 40]).await.unwrap();
    raw.shutdown().await.unwrap();
    drop(raw);

    let mut sink = Vec::new();
    let err = server.recv_raw(&mut sink, 100).await.unwrap_err();
    assert!(matches!(
        err,
        TransportError::TransferIncomplete {
            expected: 100,
            transferred: 40
        }
    ));
}
