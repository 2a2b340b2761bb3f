//! Resolver configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file (or no
//! file at all) yields the standard core class names.
//!
//! ```toml
//! max_depth = 256
//!
//! [core]
//! object = "Object"
//! basic_object = "BasicObject"
//!
//! [log]
//! level = "debug"
//! format = "json"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ast::QualifiedName;
use crate::error::{Result, SigError};

/// Names of the classes the resolver and checker treat specially
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreNames {
    pub object: String,
    pub basic_object: String,
    pub class: String,
    pub module: String,
    pub nil_class: String,
    pub true_class: String,
    pub false_class: String,
    pub integer: String,
    pub string: String,
    pub symbol: String,
    pub array: String,
    pub hash: String,
    #[serde(rename = "proc")]
    pub proc_class: String,
}

impl Default for CoreNames {
    fn default() -> Self {
        Self {
            object: "Object".into(),
            basic_object: "BasicObject".into(),
            class: "Class".into(),
            module: "Module".into(),
            nil_class: "NilClass".into(),
            true_class: "TrueClass".into(),
            false_class: "FalseClass".into(),
            integer: "Integer".into(),
            string: "String".into(),
            symbol: "Symbol".into(),
            array: "Array".into(),
            hash: "Hash".into(),
            proc_class: "Proc".into(),
        }
    }
}

impl CoreNames {
    /// Absolute name for one of the configured entries
    pub fn name(text: &str) -> QualifiedName {
        QualifiedName::parse(text).to_absolute()
    }
}

/// Logging overrides from the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub core: CoreNames,
    /// Recursion budget for subtyping checks; unbounded when absent
    pub max_depth: Option<usize>,
    pub log: LogConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SigError::io_error(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SigError::config_error(e.to_string()))
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_core(mut self, core: CoreNames) -> Self {
        self.core = core;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log.level = Some(level.into());
        self
    }

    pub fn with_log_format(mut self, format: impl Into<String>) -> Self {
        self.log.format = Some(format.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.core.object, "Object");
        assert_eq!(config.max_depth, None);
    }

    #[test]
    fn test_partial_core_override() {
        let config = Config::from_toml("max_depth = 32\n[core]\nobject = \"Root\"\nproc = \"Lambda\"\n").unwrap();
        assert_eq!(config.max_depth, Some(32));
        assert_eq!(config.core.object, "Root");
        assert_eq!(config.core.proc_class, "Lambda");
        assert_eq!(config.core.basic_object, "BasicObject");
    }

    #[test]
    fn test_log_section() {
        let config = Config::from_toml("[log]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(config.log.level.as_deref(), Some("debug"));
        assert_eq!(config.log.format, None);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("max_depth = \"deep\"").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_builders() {
        let config = Config::default().with_max_depth(8).with_log_format("json");
        assert_eq!(config.max_depth, Some(8));
        assert_eq!(config.log.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_core_name_is_absolute() {
        assert_eq!(CoreNames::name("Object").to_string(), "::Object");
    }
}
