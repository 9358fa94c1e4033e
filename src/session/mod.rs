pub mod manager;
pub mod types;

pub use manager::SessionManager;
pub use types::{ReconcileReport, ResolvedSession, Session, SessionConfig, SessionStatus};
