//! Database implementations

pub mod landing_repository;
pub mod manager;

pub use landing_repository::*;
pub use manager::*;
