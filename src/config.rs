//! Configuration for schema processing and the command-line tools
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (scheme.toml)
//! - Environment variables (SCHEME__*)
//!
//! ## Example config file (scheme.toml):
//! ```toml
//! [engine]
//! max_depth = 128
//! serialized = false
//!
//! [describe]
//! verbose = false
//!
//! [format]
//! default = "yaml"
//! output = "compact"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::field::{Phase, ProcessOptions, DEFAULT_MAX_DEPTH};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemeConfig {
    /// Processing settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Description settings
    #[serde(default)]
    pub describe: DescribeConfig,

    /// Wire format settings
    #[serde(default)]
    pub format: FormatConfig,
}

/// Processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deepest value nesting processed before failing
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Treat incoming scalars as wire text
    #[serde(default)]
    pub serialized: bool,
}

/// Description configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescribeConfig {
    /// Include attributes that hold their default values
    #[serde(default)]
    pub verbose: bool,
}

/// Format configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatConfig {
    /// Format used when a file extension does not name one
    #[serde(default = "default_format")]
    pub default: String,

    /// Layout of JSON printed by the tools
    #[serde(default)]
    pub output: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_format() -> String {
    "json".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            serialized: false,
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            default: default_format(),
            output: OutputFormat::Pretty,
        }
    }
}

impl SchemeConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file that must exist
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["scheme.toml", ".scheme.toml", "config/scheme.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "scheme") {
            let xdg_config = config_dir.config_dir().join("scheme.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHEME")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Processing options for `phase` under this configuration
    pub fn process_options(&self, phase: Phase) -> ProcessOptions {
        ProcessOptions::new(phase)
            .serialized(self.engine.serialized)
            .max_depth(self.engine.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchemeConfig::default();
        assert_eq!(config.engine.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!config.describe.verbose);
        assert_eq!(config.format.default, "json");
    }

    #[test]
    fn test_serialize_config() {
        let config = SchemeConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[engine]"));
        assert!(toml_str.contains("[format]"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheme.toml");

        let mut config = SchemeConfig::default();
        config.engine.max_depth = 12;
        config.describe.verbose = true;
        config.format.output = OutputFormat::Compact;
        config.save(&path).unwrap();

        let loaded = SchemeConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.engine.max_depth, 12);
        assert!(loaded.describe.verbose);
        assert_eq!(loaded.format.output, OutputFormat::Compact);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[engine]\nserialized = true\n").unwrap();

        let loaded = SchemeConfig::load_from(Some(&path)).unwrap();
        assert!(loaded.engine.serialized);
        assert_eq!(loaded.engine.max_depth, DEFAULT_MAX_DEPTH);

        let options = loaded.process_options(Phase::Outbound);
        assert_eq!(options.phase, Phase::Outbound);
        assert!(options.serialized);
    }

    #[test]
    fn test_missing_required_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SchemeConfig::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
