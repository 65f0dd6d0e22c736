//! Live WebSocket connections and event fan-out.

pub mod connection;
pub mod registry;

pub use registry::{BroadcastReport, Connection, ConnectionId, Registry, SendFailure};
