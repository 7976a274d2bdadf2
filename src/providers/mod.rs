//! Providers Module - External Data Sources
//!
//! Chain JSON-RPC, the trace simulation service and the HTTP price API.

pub mod price_api;
pub mod rpc;
pub mod trace_service;

pub use price_api::*;
pub use rpc::*;
pub use trace_service::*;
