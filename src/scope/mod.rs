pub mod client;
#[cfg(test)]
pub(crate) mod mock;
pub mod protocol;
pub mod transport;

// Re-export the main types from client
pub use client::{InstrumentHandle, ScopeSession};
pub use protocol::{Command, Protocol, Query};
pub use transport::{ConnectionConfig, InstrumentLink, SocketResource, TcpLink, TcpTransport, Transport};
