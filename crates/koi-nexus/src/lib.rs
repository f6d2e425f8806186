//! Composition root: owns the transport, cluster layer, elector, and
//! runner, and routes every inbound message and RPC between them
//! (spec §4.9).

mod config;
mod nexus;
mod observer;
mod rpc;

pub use config::NexusConfig;
pub use nexus::Nexus;
pub use observer::LoggingObserver;
pub use rpc::RpcHandler;
