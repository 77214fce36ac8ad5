//! Core types and configuration for the Le Mans results dashboard.
//!
//! This crate provides shared types used across all other crates:
//! - Canonical race records and the immutable canonical table
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
