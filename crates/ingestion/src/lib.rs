//! Data ingestion and normalization for the Le Mans results dashboard.
//!
//! This crate handles:
//! - Delimited source reading (ISO-8859-1, administrative column removal)
//! - Per-field parsing of times, speeds and counts
//! - Canonical table construction (one-hot, median-fill, pit signal)
//! - Content-addressed table caching

pub mod source;
pub mod fields;
pub mod normalizer;
pub mod cache;

pub use source::RawTable;
pub use normalizer::{derive_pit_signal, Normalizer};
pub use cache::{source_digest, TableCache};
