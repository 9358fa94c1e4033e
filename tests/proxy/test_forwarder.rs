// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::U256;
use proxy_router::proxy::{encode_handshake, ForwarderConfig};
use proxy_router::utils::Hash;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::common::{harness, spawn_echo_provider, start_router};

async fn read_until_eof(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut out))
        .await
        .expect("connection should be closed")
        .unwrap_or_default();
    out
}

#[tokio::test]
async fn test_payload_after_handshake_is_relayed() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_echo_provider().await;
    let (_, bid_id) = h.provider_with_bid(&provider.to_string(), "m1", 100).await;
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();
    let router = start_router(sessions, ForwarderConfig::default()).await;

    let mut client = TcpStream::connect(router.addr).await.unwrap();
    let mut first = encode_handshake(&session.id);
    first.extend_from_slice(b"hello");
    client.write_all(&first).await.unwrap();

    let mut reply = [0u8; 5];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"hello");

    client.write_all(b" world").await.unwrap();
    let mut reply = [0u8; 6];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b" world");

    router.cancel.cancel();
    router.task.await.unwrap().unwrap_err();
}

#[tokio::test]
async fn test_malformed_handshake_closes_connection() {
    let h = harness();
    let router = start_router(h.sessions(), ForwarderConfig::default()).await;

    let mut client = TcpStream::connect(router.addr).await.unwrap();
    client.write_all(b"not-a-session\npayload").await.unwrap();

    assert!(read_until_eof(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_unknown_session_closes_connection() {
    let h = harness();
    let router = start_router(h.sessions(), ForwarderConfig::default()).await;

    let mut client = TcpStream::connect(router.addr).await.unwrap();
    client
        .write_all(&encode_handshake(&Hash::random()))
        .await
        .unwrap();

    assert!(read_until_eof(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let h = harness();
    let config = ForwarderConfig {
        handshake_timeout: Duration::from_millis(50),
        ..ForwarderConfig::default()
    };
    let router = start_router(h.sessions(), config).await;

    let mut client = TcpStream::connect(router.addr).await.unwrap();
    assert!(read_until_eof(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_closing_session_tears_down_relay() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_echo_provider().await;
    let (_, bid_id) = h.provider_with_bid(&provider.to_string(), "m1", 100).await;
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();
    let router = start_router(sessions.clone(), ForwarderConfig::default()).await;

    let mut client = TcpStream::connect(router.addr).await.unwrap();
    let mut first = encode_handshake(&session.id);
    first.extend_from_slice(b"ping");
    client.write_all(&first).await.unwrap();
    let mut reply = [0u8; 4];
    client.read_exact(&mut reply).await.unwrap();

    sessions.close_session(session.id).await.unwrap();

    assert!(read_until_eof(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_shutdown_ends_active_relays() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_echo_provider().await;
    let (_, bid_id) = h.provider_with_bid(&provider.to_string(), "m1", 100).await;
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();
    let router = start_router(sessions, ForwarderConfig::default()).await;

    let mut client = TcpStream::connect(router.addr).await.unwrap();
    let mut first = encode_handshake(&session.id);
    first.extend_from_slice(b"ping");
    client.write_all(&first).await.unwrap();
    let mut reply = [0u8; 4];
    client.read_exact(&mut reply).await.unwrap();

    router.cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), router.task)
        .await
        .expect("server should stop")
        .unwrap();
    assert!(result.unwrap_err().is_listener_closed());
    assert!(read_until_eof(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_shutdown_reaches_connection_awaiting_handshake() {
    let h = harness();
    let config = ForwarderConfig {
        handshake_timeout: Duration::from_secs(5),
        ..ForwarderConfig::default()
    };
    let router = start_router(h.sessions(), config).await;

    let mut client = TcpStream::connect(router.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    router.cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), router.task)
        .await
        .expect("server should not wait out the handshake timeout")
        .unwrap();
    assert!(result.unwrap_err().is_listener_closed());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(read_until_eof(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_session_expiry_tears_down_relay() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_echo_provider().await;
    let (_, bid_id) = h.provider_with_bid(&provider.to_string(), "m1", 100).await;
    h.chain.set_session_duration(Some(2)).await;
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();
    let router = start_router(sessions, ForwarderConfig::default()).await;

    let mut client = TcpStream::connect(router.addr).await.unwrap();
    let mut first = encode_handshake(&session.id);
    first.extend_from_slice(b"ping");
    client.write_all(&first).await.unwrap();
    let mut reply = [0u8; 4];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"ping");

    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(4), client.read_to_end(&mut rest))
        .await
        .expect("relay should end at the session deadline")
        .unwrap_or_default();
    assert!(rest.is_empty());
}
