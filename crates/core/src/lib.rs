//! Core types for the stratum engine
//!
//! This crate defines the foundational types used by every other crate:
//! - TraitValue: value a stratum holds for one trait
//! - Stratum: sparse partial value bag
//! - ModelReference: entry of a reference-array trait
//! - StratumOrder / CommonStrata: global top-to-bottom ranking of stratum names
//! - StrataError: error type hierarchy
//! - Limits: import size limits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod order;
pub mod value;

pub use error::{StrataError, StrataResult};
pub use limits::{LimitError, Limits, MAX_ARRAY_LEN, MAX_NESTING_DEPTH, MAX_STRING_BYTES};
pub use order::{CommonStrata, StratumOrder};
pub use value::{ModelReference, Stratum, TraitValue};
