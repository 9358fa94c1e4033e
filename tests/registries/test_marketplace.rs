// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::{Address, U256};
use proxy_router::errors::RouterError;
use proxy_router::utils::Hash;

use crate::common::{harness, model_id, PROVIDER};

async fn post_bids(h: &crate::common::Harness, model: Hash, count: u64) -> Vec<Hash> {
    let mut ids = Vec::new();
    for price in 1..=count {
        ids.push(
            h.marketplace
                .post_bid(PROVIDER, model, U256::from(price * 10))
                .await
                .unwrap(),
        );
    }
    ids
}

#[tokio::test]
async fn test_post_and_read_bid() {
    let h = harness();
    let model = model_id("m1");

    let bid_id = h
        .marketplace
        .post_bid(PROVIDER, model, U256::from(100u64))
        .await
        .unwrap();

    let bid = h.marketplace.get_bid(bid_id).await.unwrap();
    assert_eq!(bid.id, bid_id);
    assert_eq!(bid.provider, PROVIDER);
    assert_eq!(bid.model_id, model);
    assert_eq!(bid.price_per_second, U256::from(100u64));
    assert!(!bid.is_withdrawn());
}

#[tokio::test]
async fn test_unknown_bid_is_not_found() {
    let h = harness();
    let missing = Hash::random();

    let err = h.marketplace.get_bid(missing).await.unwrap_err();
    assert!(matches!(err, RouterError::BidNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_first_page_of_bids_by_model() {
    let h = harness();
    let model = model_id("m1");
    let ids = post_bids(&h, model, 5).await;

    let page = h
        .marketplace
        .get_bids_by_model(model, U256::zero(), 2)
        .await
        .unwrap();

    let page_ids: Vec<Hash> = page.iter().map(|b| b.id).collect();
    assert_eq!(page_ids, ids[..2].to_vec());
}

#[tokio::test]
async fn test_offset_pages_by_provider() {
    let h = harness();
    let ids = post_bids(&h, model_id("m1"), 5).await;

    let page = h
        .marketplace
        .get_bids_by_provider(PROVIDER, U256::from(3u64), 10)
        .await
        .unwrap();
    let page_ids: Vec<Hash> = page.iter().map(|b| b.id).collect();
    assert_eq!(page_ids, ids[3..].to_vec());

    let past_end = h
        .marketplace
        .get_bids_by_provider(PROVIDER, U256::from(5u64), 10)
        .await
        .unwrap();
    assert!(past_end.is_empty());

    let other = h
        .marketplace
        .get_bids_by_provider(Address::repeat_byte(0x42), U256::zero(), 10)
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn test_zero_limit_rejected_before_chain_call() {
    let h = harness();
    let before = h.chain.requests();

    let err = h
        .marketplace
        .get_bids_by_model(model_id("m1"), U256::zero(), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidArgument(_)));

    let err = h
        .marketplace
        .get_bids_by_provider(PROVIDER, U256::zero(), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::InvalidArgument(_)));

    assert_eq!(h.chain.requests(), before);
}

#[tokio::test]
async fn test_withdrawn_bids_stay_listed() {
    let h = harness();
    let model = model_id("m1");
    let ids = post_bids(&h, model, 2).await;

    h.marketplace.delete_bid(ids[0]).await.unwrap();

    let page = h
        .marketplace
        .get_bids_by_model(model, U256::zero(), 10)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert!(page[0].is_withdrawn());
    assert!(!page[1].is_withdrawn());
}

#[tokio::test]
async fn test_providers_and_models() {
    let h = harness();
    let model = model_id("llama-3");
    h.chain
        .register_provider(PROVIDER, "10.0.0.1:3333", U256::from(500u64))
        .await;
    h.chain
        .register_model(model, "llama-3", PROVIDER, U256::from(50u64))
        .await;

    let providers = h.marketplace.get_all_providers().await.unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].address, PROVIDER);
    assert_eq!(providers[0].endpoint, "10.0.0.1:3333");

    let provider = h.marketplace.get_provider(PROVIDER).await.unwrap().unwrap();
    assert_eq!(provider.stake, U256::from(500u64));
    assert!(h
        .marketplace
        .get_provider(Address::repeat_byte(0x01))
        .await
        .unwrap()
        .is_none());

    let models = h.marketplace.get_all_models().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].id, model);
    assert_eq!(models[0].name, "llama-3");
}
