//! Resolution integration tests: how strata combine into effective values.

#[path = "../common/mod.rs"]
mod common;

mod identity;
mod nested_objects;
mod object_arrays;
