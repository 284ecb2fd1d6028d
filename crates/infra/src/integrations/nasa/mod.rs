//! Meteorite-landings catalogue published by NASA's open data portal

pub mod client;

pub use client::NasaLandingsClient;
