// Version information for the proxy router

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-session-proxy-2025-10-20";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-10-20";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "session-proxy",
    "nonce-serialized-writes",
    "event-confirmed-writes",
    "session-reconciliation",
    "streaming-relay",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Proxy Router {} ({})", VERSION_NUMBER, BUILD_DATE)
}
