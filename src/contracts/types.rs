// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::prelude::*;

// Marketplace facet: bids, provider/model registries and sessions
abigen!(
    Marketplace,
    r#"[
        {
            "anonymous": false,
            "inputs": [
                {"indexed": true, "internalType": "address", "name": "provider", "type": "address"},
                {"indexed": true, "internalType": "bytes32", "name": "modelId", "type": "bytes32"},
                {"indexed": false, "internalType": "bytes32", "name": "bidId", "type": "bytes32"},
                {"indexed": false, "internalType": "uint256", "name": "nonce", "type": "uint256"}
            ],
            "name": "BidPosted",
            "type": "event"
        },
        {
            "anonymous": false,
            "inputs": [
                {"indexed": true, "internalType": "address", "name": "provider", "type": "address"},
                {"indexed": true, "internalType": "bytes32", "name": "modelId", "type": "bytes32"},
                {"indexed": false, "internalType": "bytes32", "name": "bidId", "type": "bytes32"}
            ],
            "name": "BidDeleted",
            "type": "event"
        },
        {
            "anonymous": false,
            "inputs": [
                {"indexed": true, "internalType": "address", "name": "user", "type": "address"},
                {"indexed": true, "internalType": "bytes32", "name": "sessionId", "type": "bytes32"},
                {"indexed": true, "internalType": "address", "name": "providerId", "type": "address"},
                {"indexed": false, "internalType": "bytes32", "name": "bidId", "type": "bytes32"},
                {"indexed": false, "internalType": "uint256", "name": "openedAt", "type": "uint256"},
                {"indexed": false, "internalType": "uint256", "name": "endsAt", "type": "uint256"}
            ],
            "name": "SessionOpened",
            "type": "event"
        },
        {
            "anonymous": false,
            "inputs": [
                {"indexed": true, "internalType": "address", "name": "user", "type": "address"},
                {"indexed": true, "internalType": "bytes32", "name": "sessionId", "type": "bytes32"},
                {"indexed": true, "internalType": "address", "name": "providerId", "type": "address"}
            ],
            "name": "SessionClosed",
            "type": "event"
        },
        {
            "inputs": [
                {"internalType": "address", "name": "provider", "type": "address"},
                {"internalType": "bytes32", "name": "modelId", "type": "bytes32"},
                {"internalType": "uint256", "name": "pricePerSecond", "type": "uint256"}
            ],
            "name": "postModelBid",
            "outputs": [{"internalType": "bytes32", "name": "bidId", "type": "bytes32"}],
            "stateMutability": "nonpayable",
            "type": "function"
        },
        {
            "inputs": [{"internalType": "bytes32", "name": "bidId", "type": "bytes32"}],
            "name": "deleteModelBid",
            "outputs": [],
            "stateMutability": "nonpayable",
            "type": "function"
        },
        {
            "inputs": [{"internalType": "bytes32", "name": "bidId", "type": "bytes32"}],
            "name": "getBidById",
            "outputs": [
                {
                    "components": [
                        {"internalType": "address", "name": "provider", "type": "address"},
                        {"internalType": "bytes32", "name": "modelId", "type": "bytes32"},
                        {"internalType": "uint256", "name": "pricePerSecond", "type": "uint256"},
                        {"internalType": "uint256", "name": "nonce", "type": "uint256"},
                        {"internalType": "uint256", "name": "createdAt", "type": "uint256"},
                        {"internalType": "uint256", "name": "deletedAt", "type": "uint256"}
                    ],
                    "internalType": "struct Marketplace.BidRecord",
                    "name": "bid",
                    "type": "tuple"
                }
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "address", "name": "provider", "type": "address"},
                {"internalType": "uint256", "name": "offset", "type": "uint256"},
                {"internalType": "uint8", "name": "limit", "type": "uint8"}
            ],
            "name": "getBidsByProvider",
            "outputs": [
                {"internalType": "bytes32[]", "name": "ids", "type": "bytes32[]"},
                {
                    "components": [
                        {"internalType": "address", "name": "provider", "type": "address"},
                        {"internalType": "bytes32", "name": "modelId", "type": "bytes32"},
                        {"internalType": "uint256", "name": "pricePerSecond", "type": "uint256"},
                        {"internalType": "uint256", "name": "nonce", "type": "uint256"},
                        {"internalType": "uint256", "name": "createdAt", "type": "uint256"},
                        {"internalType": "uint256", "name": "deletedAt", "type": "uint256"}
                    ],
                    "internalType": "struct Marketplace.BidRecord[]",
                    "name": "bids",
                    "type": "tuple[]"
                }
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "bytes32", "name": "modelId", "type": "bytes32"},
                {"internalType": "uint256", "name": "offset", "type": "uint256"},
                {"internalType": "uint8", "name": "limit", "type": "uint8"}
            ],
            "name": "getBidsByModelAgent",
            "outputs": [
                {"internalType": "bytes32[]", "name": "ids", "type": "bytes32[]"},
                {
                    "components": [
                        {"internalType": "address", "name": "provider", "type": "address"},
                        {"internalType": "bytes32", "name": "modelId", "type": "bytes32"},
                        {"internalType": "uint256", "name": "pricePerSecond", "type": "uint256"},
                        {"internalType": "uint256", "name": "nonce", "type": "uint256"},
                        {"internalType": "uint256", "name": "createdAt", "type": "uint256"},
                        {"internalType": "uint256", "name": "deletedAt", "type": "uint256"}
                    ],
                    "internalType": "struct Marketplace.BidRecord[]",
                    "name": "bids",
                    "type": "tuple[]"
                }
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "getAllProviders",
            "outputs": [
                {"internalType": "address[]", "name": "addresses", "type": "address[]"},
                {
                    "components": [
                        {"internalType": "string", "name": "endpoint", "type": "string"},
                        {"internalType": "uint256", "name": "stake", "type": "uint256"},
                        {"internalType": "uint256", "name": "createdAt", "type": "uint256"},
                        {"internalType": "bool", "name": "isDeleted", "type": "bool"}
                    ],
                    "internalType": "struct Marketplace.ProviderRecord[]",
                    "name": "providers",
                    "type": "tuple[]"
                }
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [{"internalType": "address", "name": "provider", "type": "address"}],
            "name": "getProvider",
            "outputs": [
                {
                    "components": [
                        {"internalType": "string", "name": "endpoint", "type": "string"},
                        {"internalType": "uint256", "name": "stake", "type": "uint256"},
                        {"internalType": "uint256", "name": "createdAt", "type": "uint256"},
                        {"internalType": "bool", "name": "isDeleted", "type": "bool"}
                    ],
                    "internalType": "struct Marketplace.ProviderRecord",
                    "name": "record",
                    "type": "tuple"
                }
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "getAllModels",
            "outputs": [
                {"internalType": "bytes32[]", "name": "ids", "type": "bytes32[]"},
                {
                    "components": [
                        {"internalType": "string", "name": "name", "type": "string"},
                        {"internalType": "address", "name": "owner", "type": "address"},
                        {"internalType": "uint256", "name": "stake", "type": "uint256"},
                        {"internalType": "uint256", "name": "createdAt", "type": "uint256"},
                        {"internalType": "bool", "name": "isDeleted", "type": "bool"}
                    ],
                    "internalType": "struct Marketplace.ModelRecord[]",
                    "name": "models",
                    "type": "tuple[]"
                }
            ],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "bytes32", "name": "bidId", "type": "bytes32"},
                {"internalType": "uint256", "name": "stake", "type": "uint256"}
            ],
            "name": "openSession",
            "outputs": [{"internalType": "bytes32", "name": "sessionId", "type": "bytes32"}],
            "stateMutability": "nonpayable",
            "type": "function"
        },
        {
            "inputs": [{"internalType": "bytes32", "name": "sessionId", "type": "bytes32"}],
            "name": "closeSession",
            "outputs": [],
            "stateMutability": "nonpayable",
            "type": "function"
        },
        {
            "inputs": [{"internalType": "bytes32", "name": "sessionId", "type": "bytes32"}],
            "name": "getSession",
            "outputs": [
                {
                    "components": [
                        {"internalType": "address", "name": "user", "type": "address"},
                        {"internalType": "address", "name": "provider", "type": "address"},
                        {"internalType": "bytes32", "name": "bidId", "type": "bytes32"},
                        {"internalType": "uint256", "name": "stake", "type": "uint256"},
                        {"internalType": "uint256", "name": "pricePerSecond", "type": "uint256"},
                        {"internalType": "uint256", "name": "openedAt", "type": "uint256"},
                        {"internalType": "uint256", "name": "endsAt", "type": "uint256"},
                        {"internalType": "uint256", "name": "closedAt", "type": "uint256"}
                    ],
                    "internalType": "struct Marketplace.SessionRecord",
                    "name": "session",
                    "type": "tuple"
                }
            ],
            "stateMutability": "view",
            "type": "function"
        }
    ]"#
);

// ERC20 staking token
abigen!(
    MorToken,
    r#"[
        {
            "anonymous": false,
            "inputs": [
                {"indexed": true, "internalType": "address", "name": "from", "type": "address"},
                {"indexed": true, "internalType": "address", "name": "to", "type": "address"},
                {"indexed": false, "internalType": "uint256", "name": "value", "type": "uint256"}
            ],
            "name": "Transfer",
            "type": "event"
        },
        {
            "anonymous": false,
            "inputs": [
                {"indexed": true, "internalType": "address", "name": "owner", "type": "address"},
                {"indexed": true, "internalType": "address", "name": "spender", "type": "address"},
                {"indexed": false, "internalType": "uint256", "name": "value", "type": "uint256"}
            ],
            "name": "Approval",
            "type": "event"
        },
        {
            "inputs": [{"internalType": "address", "name": "account", "type": "address"}],
            "name": "balanceOf",
            "outputs": [{"internalType": "uint256", "name": "balance", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "address", "name": "owner", "type": "address"},
                {"internalType": "address", "name": "spender", "type": "address"}
            ],
            "name": "allowance",
            "outputs": [{"internalType": "uint256", "name": "remaining", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "address", "name": "spender", "type": "address"},
                {"internalType": "uint256", "name": "amount", "type": "uint256"}
            ],
            "name": "approve",
            "outputs": [{"internalType": "bool", "name": "success", "type": "bool"}],
            "stateMutability": "nonpayable",
            "type": "function"
        },
        {
            "inputs": [
                {"internalType": "address", "name": "to", "type": "address"},
                {"internalType": "uint256", "name": "value", "type": "uint256"}
            ],
            "name": "transfer",
            "outputs": [{"internalType": "bool", "name": "success", "type": "bool"}],
            "stateMutability": "nonpayable",
            "type": "function"
        },
        {
            "inputs": [],
            "name": "totalSupply",
            "outputs": [{"internalType": "uint256", "name": "supply", "type": "uint256"}],
            "stateMutability": "view",
            "type": "function"
        }
    ]"#
);
