// =====================================================
// DATABASE MODULE
// Engine adapters, per-request connection lifecycle, result shaping
// =====================================================

pub mod connections;
pub mod crypto;
pub mod engine;
pub mod query_execution;

pub use connections::{ConnectionBroker, ConnectionRegistry};
pub use engine::{ConnectionHandle, Connector, EngineClient, EngineConnector};
