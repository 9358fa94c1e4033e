pub mod backend;
pub mod events;
pub mod issuer;
pub mod mock;
pub mod types;

pub use backend::{ContractBackend, EthersBackend, TxRequest};
pub use issuer::{PendingTransaction, TxIssuer, DEFAULT_INCLUSION_TIMEOUT};
pub use mock::MockChain;
