//! Features Module - Context Feature Engineering
//!
//! Transforms raw access contexts into the fixed-order numeric vectors the
//! ensemble consumes. Column order is part of the model contract and must
//! match between training and inference.
//!
//! - `layout` - authoritative column order, version, layout hash
//! - `encoders` - persisted categorical encoding tables
//! - `engine` - the batch transform itself

pub mod encoders;
pub mod engine;
pub mod layout;

#[cfg(test)]
mod tests;

pub use encoders::{EncoderTables, LabelTable};
pub use engine::{fit_transform, transform};
pub use layout::{layout_hash, validate_layout, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
