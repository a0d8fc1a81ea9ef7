//! Context Policy Module
//!
//! Declarative per-file policies constraining which contexts may access a
//! file, and the pure evaluator that checks them.
//!
//! - `types` - data structures only, no logic
//! - `engine` - the decision logic

pub mod engine;
pub mod types;

pub use engine::evaluate;
pub use types::{FilePolicy, PolicyReason, PolicyVerdict, TimeWindow};
