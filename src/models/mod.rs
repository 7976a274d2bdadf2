//! Models Module - Data Structures & Configuration
//!
//! Shared data model for every pipeline stage.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
