//! Shared test helpers for `landfall-core` integration tests.
//!
//! These helpers provide in-memory implementations of the sync ports, with
//! knobs for injecting failures and counters for asserting on interactions.

#![allow(dead_code)]

pub mod ports;

use landfall_domain::ExternalLanding;

/// Minimal valid upstream item
pub fn item(id: &str, name: &str) -> ExternalLanding {
    ExternalLanding {
        id: Some(id.into()),
        name: Some(name.into()),
        name_type: Some("Valid".into()),
        rec_class: Some("L5".into()),
        mass: Some("21".into()),
        fall: Some("Fell".into()),
        year: Some("1880-01-01T00:00:00.000".into()),
        reclat: Some("50.775".into()),
        reclong: Some("6.08333".into()),
        geolocation: None,
    }
}
