//! # Landfall Domain
//!
//! Business domain types and models for Landfall.
//!
//! This crate contains:
//! - Meteorite landing records, upstream and persisted
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants and the lenient field parser
//!
//! ## Architecture
//! - No dependencies on other Landfall crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::field_parser;
