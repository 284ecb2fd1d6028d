//! External service integrations

pub mod nasa;
