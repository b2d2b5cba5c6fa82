//! Size limits for imported catalog JSON
//!
//! Catalog files come from users and remote servers. These limits are checked
//! before a JSON document is turned into stratum values, so a hostile or broken
//! document fails with a `LimitError` instead of exhausting the stack.

use thiserror::Error;

/// Maximum nesting depth of an imported JSON value (default)
pub const MAX_NESTING_DEPTH: usize = 64;

/// Maximum elements in one imported array (default)
pub const MAX_ARRAY_LEN: usize = 100_000;

/// Maximum length of one imported string in bytes (default)
pub const MAX_STRING_BYTES: usize = 4 * 1024 * 1024;

/// Size limits for JSON import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum nesting depth (default: 64)
    pub max_nesting_depth: usize,

    /// Maximum array length (default: 100k elements)
    pub max_array_len: usize,

    /// Maximum string length in bytes (default: 4MB)
    pub max_string_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_nesting_depth: MAX_NESTING_DEPTH,
            max_array_len: MAX_ARRAY_LEN,
            max_string_bytes: MAX_STRING_BYTES,
        }
    }
}

impl Limits {
    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        Limits {
            max_nesting_depth: 4,
            max_array_len: 8,
            max_string_bytes: 64,
        }
    }

    /// Validate a JSON value against these limits
    ///
    /// Walks the whole value. Does not look at the schema: type checking is
    /// the importer's job.
    pub fn validate_json(&self, value: &serde_json::Value) -> Result<(), LimitError> {
        self.validate_json_impl(value, 0)
    }

    fn validate_json_impl(&self, value: &serde_json::Value, depth: usize) -> Result<(), LimitError> {
        if depth > self.max_nesting_depth {
            return Err(LimitError::NestingTooDeep {
                actual: depth,
                max: self.max_nesting_depth,
            });
        }

        match value {
            serde_json::Value::Null | serde_json::Value::Bool(_) | serde_json::Value::Number(_) => {
                Ok(())
            }
            serde_json::Value::String(s) => {
                if s.len() > self.max_string_bytes {
                    return Err(LimitError::ValueTooLarge {
                        reason: "string_too_long".to_string(),
                        actual: s.len(),
                        max: self.max_string_bytes,
                    });
                }
                Ok(())
            }
            serde_json::Value::Array(arr) => {
                if arr.len() > self.max_array_len {
                    return Err(LimitError::ValueTooLarge {
                        reason: "array_too_long".to_string(),
                        actual: arr.len(),
                        max: self.max_array_len,
                    });
                }
                for v in arr {
                    self.validate_json_impl(v, depth + 1)?;
                }
                Ok(())
            }
            serde_json::Value::Object(obj) => {
                for v in obj.values() {
                    self.validate_json_impl(v, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Limit validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    /// Value exceeds size limits
    #[error("Value too large ({reason}): {actual} exceeds maximum {max}")]
    ValueTooLarge {
        /// Reason code for the violation
        reason: String,
        /// Actual size
        actual: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Value nesting exceeds maximum depth
    #[error("Nesting too deep: {actual} levels exceeds maximum {max}")]
    NestingTooDeep {
        /// Actual nesting depth
        actual: usize,
        /// Maximum allowed depth
        max: usize,
    },
}
