//! Domain types and models

pub mod landing;

pub use landing::{ExternalLanding, GeoLocation, MeteoriteLanding};
