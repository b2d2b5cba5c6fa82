//! Error types for the stratum engine
//!
//! This module defines all error types surfaced by schema definition, stratum
//! registration, JSON import/export and entity mutation.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Resolution never fails: a trait with no value in any stratum resolves to its
//! default (or nothing). Only writes, imports and schema composition return errors.

use crate::limits::LimitError;
use std::io;
use thiserror::Error;

/// Result type alias for stratum engine operations
pub type StrataResult<T> = std::result::Result<T, StrataError>;

/// Error types for the stratum engine
#[derive(Debug, Error)]
pub enum StrataError {
    /// JSON import named a property the schema does not declare
    #[error("Unknown property '{property}' in schema '{schema}' (stratum '{stratum}')")]
    UnknownProperty {
        /// Schema the property was looked up in
        schema: String,
        /// Offending property name
        property: String,
        /// Stratum being written
        stratum: String,
    },

    /// Value does not match the declared trait type
    #[error(
        "Type mismatch for '{property}' in schema '{schema}' (stratum '{stratum}'): expected {expected}, got {actual}"
    )]
    TypeMismatch {
        /// Schema declaring the trait
        schema: String,
        /// Trait id
        property: String,
        /// Stratum being written
        stratum: String,
        /// Declared type
        expected: String,
        /// Type actually supplied
        actual: String,
    },

    /// Two mixed schema fragments declare the same id with incompatible kinds
    #[error(
        "Schema composition error in '{schema}': trait '{trait_id}' declared as {existing} and as {incoming}"
    )]
    SchemaComposition {
        /// Schema being composed
        schema: String,
        /// Conflicting trait id
        trait_id: String,
        /// Kind already declared
        existing: String,
        /// Kind of the conflicting declaration
        incoming: String,
    },

    /// Stratum name was never registered with the stratum order
    #[error("Stratum '{name}' is not registered in the stratum order")]
    UnregisteredStratum {
        /// Stratum name
        name: String,
    },

    /// Stratum name re-registered with a different priority
    #[error("Stratum '{name}' already registered with priority {existing}, cannot re-register with {requested}")]
    StratumOrderConflict {
        /// Stratum name
        name: String,
        /// Priority already registered
        existing: i32,
        /// Priority requested by the second registration
        requested: i32,
    },

    /// No schema registered for an entity kind
    #[error("Unknown entity kind: {kind}")]
    UnknownEntityKind {
        /// Entity kind (the JSON `type` field)
        kind: String,
    },

    /// Entity id not present in the registry
    #[error("Entity not found: {id}")]
    EntityNotFound {
        /// Entity id
        id: String,
    },

    /// Entity id already registered with a different kind
    #[error("Entity '{id}' already exists")]
    DuplicateEntity {
        /// Entity id
        id: String,
    },

    /// Operation is not valid for the trait or entity
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Import limit exceeded
    #[error("Limit exceeded: {0}")]
    LimitExceeded(#[from] LimitError),

    /// Configuration could not be parsed or is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error (configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for StrataError {
    fn from(e: serde_json::Error) -> Self {
        StrataError::Serialization(e.to_string())
    }
}

impl StrataError {
    /// Build an `UnknownProperty` error
    pub fn unknown_property(
        schema: impl Into<String>,
        property: impl Into<String>,
        stratum: impl Into<String>,
    ) -> Self {
        StrataError::UnknownProperty {
            schema: schema.into(),
            property: property.into(),
            stratum: stratum.into(),
        }
    }

    /// Build a `TypeMismatch` error
    pub fn type_mismatch(
        schema: impl Into<String>,
        property: impl Into<String>,
        stratum: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        StrataError::TypeMismatch {
            schema: schema.into(),
            property: property.into(),
            stratum: stratum.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Build an `InvalidOperation` error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        StrataError::InvalidOperation(message.into())
    }

    /// True for `UnknownProperty`
    pub fn is_unknown_property(&self) -> bool {
        matches!(self, StrataError::UnknownProperty { .. })
    }

    /// True for `TypeMismatch`
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, StrataError::TypeMismatch { .. })
    }

    /// True for `SchemaComposition`
    pub fn is_schema_composition(&self) -> bool {
        matches!(self, StrataError::SchemaComposition { .. })
    }

    /// Property id the error refers to, if any
    pub fn property(&self) -> Option<&str> {
        match self {
            StrataError::UnknownProperty { property, .. }
            | StrataError::TypeMismatch { property, .. } => Some(property),
            StrataError::SchemaComposition { trait_id, .. } => Some(trait_id),
            _ => None,
        }
    }
}
