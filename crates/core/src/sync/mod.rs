//! Reconciliation of the local landing store against the upstream catalogue

pub mod diff;
pub mod errors;
pub mod ports;
pub mod service;
pub mod validator;
