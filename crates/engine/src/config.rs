//! Catalog configuration via `catalog.toml`
//!
//! Everything has a default, so an empty file (or no file at all) gives a
//! catalog with the common strata registered and strict imports. Extra
//! stratum roles are declared as `[[strata]]` tables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_core::{StrataError, StrataResult};
use strata_schema::DEFAULT_SCHEMA_URI;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "catalog.toml";

/// An extra stratum role and its priority
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StratumConfig {
    /// Stratum name
    pub name: String,
    /// Priority, higher sorts nearer the top
    pub priority: i32,
}

/// `[describe]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescribeConfig {
    /// Value written to `$schema` in schema descriptions
    #[serde(default = "default_schema_uri")]
    pub schema_uri: String,
}

fn default_schema_uri() -> String {
    DEFAULT_SCHEMA_URI.to_string()
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            schema_uri: default_schema_uri(),
        }
    }
}

/// Catalog configuration loaded from `catalog.toml`.
///
/// # Example
///
/// ```toml
/// strict_import = false
///
/// [[strata]]
/// name = "fromServer"
/// priority = 120
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Fail a JSON import on its first problem (`true`) or keep the valid subset.
    #[serde(default = "default_true")]
    pub strict_import: bool,
    /// Register `defaults`, `definition`, `user`, ... at startup.
    #[serde(default = "default_true")]
    pub register_common_strata: bool,
    /// Extra stratum roles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strata: Vec<StratumConfig>,
    /// Schema description settings.
    #[serde(default)]
    pub describe: DescribeConfig,
}

fn default_true() -> bool {
    true
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            strict_import: true,
            register_common_strata: true,
            strata: Vec::new(),
            describe: DescribeConfig::default(),
        }
    }
}

impl CatalogConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Catalog configuration
#
# strict_import = true   -> the first unknown key or type mismatch fails the load
# strict_import = false  -> offending keys are dropped and logged, the rest loads
strict_import = true

# Register the common strata (defaults, underride, definition, user, override, ...)
register_common_strata = true

# Extra stratum roles. Higher priority sorts nearer the top.
# [[strata]]
# name = "fromServer"
# priority = 120

[describe]
schema_uri = "http://json-schema.org/draft-07/schema#"
"#
    }

    /// Parse config from TOML text, rejecting duplicate stratum names.
    pub fn from_toml_str(content: &str) -> StrataResult<Self> {
        let config: CatalogConfig = toml::from_str(content)
            .map_err(|e| StrataError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            StrataError::InvalidConfig(msg) => {
                StrataError::InvalidConfig(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StrataResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StrataResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StrataError::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> StrataResult<()> {
        for (i, stratum) in self.strata.iter().enumerate() {
            if stratum.name.is_empty() {
                return Err(StrataError::InvalidConfig(format!(
                    "[[strata]] entry {} has an empty name",
                    i
                )));
            }
            if let Some(other) = self.strata[..i].iter().find(|s| s.name == stratum.name) {
                if other.priority != stratum.priority {
                    return Err(StrataError::InvalidConfig(format!(
                        "Stratum '{}' listed with priorities {} and {}",
                        stratum.name, other.priority, stratum.priority
                    )));
                }
            }
        }
        Ok(())
    }
}
