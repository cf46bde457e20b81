//! OBS WebSocket transport, connection management and batching

pub mod batch;
mod client;
pub mod connection;
#[cfg(test)]
pub(crate) mod mock;
pub mod transport;
pub mod types;

pub use client::{ObwsConnector, ObwsTransport};
pub use connection::{ConnectionManager, Endpoint};
pub use transport::{
    BatchRequest, BatchResponse, Connector, EngineEvent, Request, Response, Transport,
};
pub use types::*;
