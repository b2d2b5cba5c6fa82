//! Serialization integration tests: JSON in and out, schema introspection,
//! catalog loading and configuration files.

#[path = "../common/mod.rs"]
mod common;

mod describe;
mod import_errors;
