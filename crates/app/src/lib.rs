//! # Landfall Application
//!
//! Wires the SQLite store, the upstream catalogue client, the query cache and
//! the reconciliation worker into one daemon.

pub mod context;
pub mod utils;

pub use context::AppContext;
