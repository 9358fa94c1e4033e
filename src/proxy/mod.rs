pub mod forwarder;
pub mod handshake;
pub mod streaming;

pub use forwarder::{ForwarderConfig, RelayEnd, RelayStats, SessionForwarder};
pub use handshake::{encode_handshake, read_session_id};
pub use streaming::ChunkSink;
