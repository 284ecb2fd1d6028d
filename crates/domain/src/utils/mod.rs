//! Domain utilities

pub mod field_parser;
