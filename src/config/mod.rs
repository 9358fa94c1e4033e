pub mod chains;
pub mod router;

pub use chains::{ChainConfig, ContractAddresses};
pub use router::RouterConfig;
