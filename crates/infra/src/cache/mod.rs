//! Read-side caching

pub mod query_cache;

pub use query_cache::LandingQueryCache;
