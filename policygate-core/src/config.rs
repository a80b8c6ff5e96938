//! Configuration types

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// How list quantifiers name the per-item variable when no alias is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasStrategy {
    /// Always use [`EngineConfig::default_item_alias`]
    Fixed,
    /// Derive a unique alias from the element type and nesting depth
    #[default]
    Generated,
}

/// Engine-wide settings read by filter providers during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Alias for list items under [`AliasStrategy::Fixed`]
    pub default_item_alias: String,
    pub alias_strategy: AliasStrategy,
    /// Compiled size limit handed to the regex builder, in bytes
    pub regex_size_limit: usize,
    /// Maximum nesting of list quantifiers
    pub max_scope_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_item_alias: "item".to_string(),
            alias_strategy: AliasStrategy::Generated,
            regex_size_limit: 1 << 20,
            max_scope_depth: 16,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// Omitted fields take their default values.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(source).map_err(|e| ConfigError::Malformed {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field for a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let alias = self.default_item_alias.as_str();
        if alias.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "default_item_alias".to_string(),
            });
        }
        let valid_identifier = alias
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_identifier {
            return Err(ConfigError::InvalidValue {
                field: "default_item_alias".to_string(),
                value: alias.to_string(),
                reason: "must be an identifier".to_string(),
            });
        }
        if self.regex_size_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "regex_size_limit".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.max_scope_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_scope_depth".to_string(),
                value: "0".to_string(),
                reason: "must allow at least one nested scope".to_string(),
            });
        }
        Ok(())
    }
}
