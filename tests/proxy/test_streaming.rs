// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use bytes::Bytes;
use ethers::types::U256;
use proxy_router::errors::RouterError;
use proxy_router::proxy::{ForwarderConfig, SessionForwarder};
use proxy_router::utils::Hash;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::{harness, spawn_chunked_provider, spawn_echo_provider, spawn_silent_provider};

#[tokio::test]
async fn test_chunks_delivered_as_they_arrive() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_chunked_provider(
        vec!["data: one\n", "data: two\n", "data: [DONE]\n"],
        Duration::from_millis(30),
    )
    .await;
    let (_, bid_id) = h.provider_with_bid(&provider.to_string(), "m1", 100).await;
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();
    let forwarder = SessionForwarder::new(sessions, ForwarderConfig::default());

    let (tx, mut rx) = mpsc::channel::<Bytes>(16);
    let collector = tokio::spawn(async move {
        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.extend_from_slice(&chunk);
        }
        received
    });

    let mut sink = tx;
    let delivered = forwarder
        .forward_streaming(
            session.id,
            Bytes::from_static(b"{\"prompt\":\"hi\"}"),
            &mut sink,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    drop(sink);

    let received = collector.await.unwrap();
    assert_eq!(received, b"data: one\ndata: two\ndata: [DONE]\n".to_vec());
    assert_eq!(delivered, received.len() as u64);
}

#[tokio::test]
async fn test_request_reaches_provider() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_echo_provider().await;
    let (_, bid_id) = h.provider_with_bid(&provider.to_string(), "m1", 100).await;
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();
    let forwarder = SessionForwarder::new(sessions, ForwarderConfig::default());

    let mut chunks: Vec<Bytes> = Vec::new();
    let delivered = forwarder
        .forward_streaming(
            session.id,
            Bytes::from_static(b"echo me"),
            &mut chunks,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(delivered, 7);
    assert_eq!(chunks.concat(), b"echo me".to_vec());
}

#[tokio::test]
async fn test_cancellation_stops_streaming() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_chunked_provider(
        vec!["first", "second", "third"],
        Duration::from_millis(200),
    )
    .await;
    let (_, bid_id) = h.provider_with_bid(&provider.to_string(), "m1", 100).await;
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();
    let forwarder = SessionForwarder::new(sessions, ForwarderConfig::default());

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };

    let mut chunks: Vec<Bytes> = Vec::new();
    let delivered = tokio::time::timeout(
        Duration::from_secs(1),
        forwarder.forward_streaming(session.id, Bytes::from_static(b"go"), &mut chunks, cancel),
    )
    .await
    .expect("streaming should stop on cancel")
    .unwrap();
    canceller.await.unwrap();

    assert_eq!(chunks.concat(), b"first".to_vec());
    assert_eq!(delivered, 5);
}

#[tokio::test]
async fn test_streaming_requires_open_session() {
    let h = harness();
    let forwarder = SessionForwarder::new(h.sessions(), ForwarderConfig::default());

    let mut chunks: Vec<Bytes> = Vec::new();
    let err = forwarder
        .forward_streaming(
            Hash::random(),
            Bytes::from_static(b"x"),
            &mut chunks,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::SessionNotFound(_)));
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn test_session_expiry_stops_streaming() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_silent_provider().await;
    let (_, bid_id) = h.provider_with_bid(&provider.to_string(), "m1", 100).await;
    h.chain.set_session_duration(Some(2)).await;
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();
    let forwarder = SessionForwarder::new(sessions, ForwarderConfig::default());

    let mut chunks: Vec<Bytes> = Vec::new();
    let delivered = tokio::time::timeout(
        Duration::from_secs(4),
        forwarder.forward_streaming(
            session.id,
            Bytes::from_static(b"go"),
            &mut chunks,
            CancellationToken::new(),
        ),
    )
    .await
    .expect("streaming should stop at the session deadline")
    .unwrap();

    assert_eq!(delivered, 0);
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn test_cancellation_before_first_chunk() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_silent_provider().await;
    let (_, bid_id) = h.provider_with_bid(&provider.to_string(), "m1", 100).await;
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();
    let forwarder = SessionForwarder::new(sessions, ForwarderConfig::default());

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let mut chunks: Vec<Bytes> = Vec::new();
    let delivered = tokio::time::timeout(
        Duration::from_secs(1),
        forwarder.forward_streaming(session.id, Bytes::from_static(b"go"), &mut chunks, cancel),
    )
    .await
    .expect("streaming should stop on cancel")
    .unwrap();
    canceller.await.unwrap();

    assert_eq!(delivered, 0);
}
