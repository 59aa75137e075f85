//! Handoff Transport - Relay pub/sub channel wrapper
//!
//! A thin client over the relay's websocket endpoint: connect once, subscribe
//! to a single topic, receive messages, keep the connection alive with
//! one-directional pings, and disconnect idempotently. There is no reconnect
//! loop; a failed connect is terminal for the pairing attempt that owns it.

pub mod relay;

pub use relay::{
    RelayChannel, RelayConnection, RelayError, RelayResult, WebSocketRelay,
    HEARTBEAT_INTERVAL_SECS,
};
