use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bridge config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Inserts between sweeps of dead proxy cache entries. Zero disables sweeping.
    pub sweep_interval: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { sweep_interval: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub max_pending_jobs: usize,
    pub run_inline_scripts: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_pending_jobs: 1000,
            run_inline_scripts: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub log_filter: String,
    pub cache: CacheConfig,
    pub script: ScriptConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            cache: CacheConfig::default(),
            script: ScriptConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load from a YAML file, falling back to defaults when no path is given
    /// or the file does not exist.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&contents)?)
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_default() {
        let config = BridgeConfig::load(None).unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.cache.sweep_interval, 64);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = BridgeConfig::load(Some(PathBuf::from("/nonexistent/svgbridge.yaml"))).unwrap();
        assert_eq!(config.script.max_pending_jobs, 1000);
    }

    #[test]
    fn loads_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "log_filter: debug\ncache:\n  sweep_interval: 8").unwrap();
        let config = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.cache.sweep_interval, 8);
        assert!(config.script.run_inline_scripts);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "cache: [unclosed").unwrap();
        assert!(matches!(
            BridgeConfig::load(Some(file.path().to_path_buf())),
            Err(ConfigError::Yaml(_))
        ));
    }
}
