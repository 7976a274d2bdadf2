//! Core Module - Classification, Pricing, Scoring & Validation
//!
//! Leaf-first: classifier and price oracle feed the risk scorer; the
//! validator combines scorer and simulator into a verdict.

pub mod classifier;
pub mod price_oracle;
pub mod price_sources;
pub mod risk_score;
pub mod simulator;
pub mod tokens;
pub mod validator;

pub use classifier::*;
pub use price_oracle::*;
pub use price_sources::*;
pub use risk_score::*;
pub use simulator::*;
pub use tokens::*;
pub use validator::*;
