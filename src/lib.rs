// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod config;
pub mod contracts;
pub mod errors;
pub mod proxy;
pub mod registries;
pub mod session;
pub mod transport;
pub mod utils;
pub mod version;

pub use config::{ChainConfig, RouterConfig};
pub use contracts::{ContractBackend, EthersBackend, MockChain, TxIssuer};
pub use errors::{RejectReason, RouterError, RouterResult};
pub use proxy::{ChunkSink, ForwarderConfig, SessionForwarder};
pub use registries::{MarketplaceRegistry, MorTokenRegistry};
pub use session::{SessionConfig, SessionManager, SessionStatus};
pub use transport::{ConnectionHandler, TcpServer};
pub use utils::Hash;
