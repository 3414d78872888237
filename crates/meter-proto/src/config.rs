use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Where level measurements come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Spawn ffmpeg with the astats filter on a capture device, file or URL.
    #[default]
    Ffmpeg,
    /// Read an already-running `ametadata=mode=print` stream from stdin.
    Stdin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// ffmpeg `-f` demuxer for the input. Empty means let ffmpeg probe it
    /// (files and URLs).
    #[serde(default = "default_input_format")]
    pub input_format: String,
    /// ffmpeg `-i` argument: capture device, file path or URL.
    #[serde(default = "default_input")]
    pub input: String,
    /// Measurement window of the astats filter, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Log file for tracing output; the terminal itself belongs to the meter.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            input_format: default_input_format(),
            input: default_input(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
        }
    }
}

fn default_input_format() -> String {
    platform::default_input_format().to_string()
}

fn default_input() -> String {
    platform::default_input_device().to_string()
}

fn default_interval_ms() -> u64 {
    50
}

fn default_log_file() -> PathBuf {
    platform::data_dir().join("lvl.log")
}

impl Config {
    /// Load from the default location, writing defaults there on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source.kind, SourceKind::Ffmpeg);
        assert_eq!(config.source.interval_ms, 50);
        assert_eq!(config.source.input_format, platform::default_input_format());
        assert!(config.paths.log_file.ends_with("lvl.log"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[source]\nkind = \"stdin\"\n").unwrap();
        assert_eq!(config.source.kind, SourceKind::Stdin);
        assert_eq!(config.source.interval_ms, 50);
        assert_eq!(config.source.input, platform::default_input_device());
    }
}
