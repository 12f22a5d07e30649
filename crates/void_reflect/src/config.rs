//! Registry configuration
//!
//! Tunables for a [`ContextRegistry`](crate::ContextRegistry), loadable from
//! TOML and overridable from the environment.
//!
//! # Example Config File
//!
//! ```toml
//! [reflect]
//! max_parameters = 32          # native parameters per signature
//! class_method_overloads = true
//! deprecated_name_lookup = true
//! ```
//!
//! # Environment Overrides
//!
//! - `VOID_REFLECT_MAX_PARAMETERS=16`
//! - `VOID_REFLECT_DEPRECATED_LOOKUP=0`

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReflectError, Result};

/// Default upper bound on native parameters per reflected signature
pub const DEFAULT_MAX_PARAMETERS: usize = 32;

/// Reflection registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectConfig {
    /// Maximum number of native parameters a signature may declare,
    /// counting the this pointer and bus address
    pub max_parameters: usize,
    /// Chain same-named class methods as overloads instead of rejecting them
    pub class_method_overloads: bool,
    /// Let lookups by name also match deprecated names
    pub deprecated_name_lookup: bool,
}

impl Default for ReflectConfig {
    fn default() -> Self {
        Self {
            max_parameters: DEFAULT_MAX_PARAMETERS,
            class_method_overloads: true,
            deprecated_name_lookup: true,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    reflect: ReflectConfig,
}

impl ReflectConfig {
    /// Parse a `[reflect]` table from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ReflectError::Config(e.to_string()))?;
        file.reflect.validated()
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReflectError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&content)?;
        log::info!("Loaded reflect config from {}", path.display());
        config.apply_env();
        config.validated()
    }

    /// Override fields from `VOID_REFLECT_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("VOID_REFLECT_MAX_PARAMETERS") {
            match value.parse() {
                Ok(max) => self.max_parameters = max,
                Err(_) => log::warn!("Ignoring VOID_REFLECT_MAX_PARAMETERS={}", value),
            }
        }
        if let Ok(value) = std::env::var("VOID_REFLECT_DEPRECATED_LOOKUP") {
            self.deprecated_name_lookup = value == "1" || value == "true";
        }
    }

    fn validated(self) -> Result<Self> {
        if self.max_parameters == 0 {
            return Err(ReflectError::Config(
                "max_parameters must be at least 1".into(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReflectConfig::default();
        assert_eq!(config.max_parameters, 32);
        assert!(config.class_method_overloads);
        assert!(config.deprecated_name_lookup);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ReflectConfig::from_toml_str(
            r#"
            [reflect]
            max_parameters = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.max_parameters, 8);
        assert!(config.class_method_overloads);

        let empty = ReflectConfig::from_toml_str("").unwrap();
        assert_eq!(empty, ReflectConfig::default());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            ReflectConfig::from_toml_str("[reflect]\nmax_parameters = 0"),
            Err(ReflectError::Config(_))
        ));
        assert!(matches!(
            ReflectConfig::from_toml_str("[reflect]\nmax_parameters = \"many\""),
            Err(ReflectError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(ReflectConfig::load("/nonexistent/reflect.toml").is_err());
    }
}
