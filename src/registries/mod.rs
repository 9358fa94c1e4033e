pub mod marketplace;
pub mod mor_token;
pub mod types;

pub use marketplace::MarketplaceRegistry;
pub use mor_token::MorTokenRegistry;
pub use types::{Bid, ChainSession, Model, Provider, SessionOpened};
