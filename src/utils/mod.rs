//! Utils Module - Helper Functions & Shared Utilities
//!
//! Constants, call-data decoding, the price cache and the clock it reads.

pub mod cache;
pub mod clock;
pub mod constants;
pub mod decoder;

pub use cache::*;
pub use clock::*;
pub use constants::*;
pub use decoder::*;
