// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::U256;
use proxy_router::errors::RouterError;
use proxy_router::proxy::{encode_handshake, ForwarderConfig};
use proxy_router::session::SessionStatus;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::common::{harness, model_id, spawn_echo_provider, start_router, PROVIDER, ROUTER};

#[tokio::test]
async fn test_bid_to_relay_scenario() {
    let h = harness();
    let sessions = h.sessions();
    let provider = spawn_echo_provider().await;

    // Provider and model are registered, then the bid is posted through the router
    let model = model_id("m1");
    h.chain
        .register_provider(PROVIDER, &provider.to_string(), U256::from(1_000u64))
        .await;
    h.chain
        .register_model(model, "m1", PROVIDER, U256::from(100u64))
        .await;
    let bid_id = h
        .marketplace
        .post_bid(PROVIDER, model, U256::from(100u64))
        .await
        .unwrap();

    let listed = h
        .marketplace
        .get_bids_by_model(model, U256::zero(), 10)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, bid_id);

    // Escrow is funded and the session opened
    h.chain.mint(ROUTER, U256::from(1_000_000u64)).await;
    h.token
        .approve(h.marketplace.address(), U256::from(100_000u64))
        .await
        .unwrap();
    let session = sessions
        .open_session(bid_id, U256::from(100_000u64))
        .await
        .unwrap();

    let resolved = sessions.resolve_session(session.id).await.unwrap();
    assert_eq!(resolved.endpoint, provider.to_string());

    let router = start_router(sessions.clone(), ForwarderConfig::default()).await;

    let mut client = TcpStream::connect(router.addr).await.unwrap();
    client.write_all(&encode_handshake(&session.id)).await.unwrap();
    client.write_all(&[0xde, 0xad, 0xbe, 0xef]).await.unwrap();

    let mut reply = [0u8; 4];
    tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut reply))
        .await
        .expect("relay should answer")
        .unwrap();
    assert_eq!(reply, [0xde, 0xad, 0xbe, 0xef]);

    // Closing settles on chain and ends the relay
    sessions.close_session(session.id).await.unwrap();
    let mut rest = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut rest)).await;
    assert!(rest.is_empty());
    assert_eq!(
        sessions.get_session(session.id).await.unwrap().status,
        SessionStatus::Closed
    );

    // Nonces were assigned in order across every write
    let nonces: Vec<u64> = h
        .chain
        .submitted_nonces()
        .await
        .iter()
        .map(|(_, n)| n.as_u64())
        .collect();
    assert_eq!(nonces, vec![0, 1, 2, 3]);

    router.cancel.cancel();
    let result = router.task.await.unwrap();
    assert!(matches!(result, Err(RouterError::ListenerClosed)));
}
