//! Log streaming from containers to connected viewers.

pub mod bridge;
pub mod frame;
pub mod message;

pub use bridge::{BridgeOutcome, stream_container_logs};
pub use message::OutboundMessage;
