use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{LlamaTuneError, Result};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlamaTuneConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub results: ResultsConfig,
}

impl LlamaTuneConfig {
    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let body = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&body)
            .map_err(|e| LlamaTuneError::Config(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `OLLAMA_HOST` wins over the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var(OLLAMA_HOST_ENV) {
            if !host.trim().is_empty() {
                self.ollama.host = host;
            }
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub repetitions: u32,
    pub step_delay_ms: u64,
    pub preset: String,
}

impl DefaultsConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            repetitions: 3,
            step_delay_ms: 100,
            preset: "Default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: Option<String>,
    pub request_timeout_secs: u64,
}

impl OllamaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OLLAMA_HOST.to_string(),
            model: None,
            request_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LlamaTuneConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.ollama.host, DEFAULT_OLLAMA_HOST);
        assert_eq!(config.defaults.repetitions, 3);
    }

    #[test]
    fn test_partial_file_fills_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ollama": {"host": "http://gpu:11434", "request_timeout_secs": 30}}"#)
            .unwrap();

        let config = LlamaTuneConfig::load(&path).unwrap();
        assert_eq!(config.ollama.host, "http://gpu:11434");
        assert_eq!(config.ollama.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.defaults.preset, "Default");
    }

    #[test]
    fn test_partial_section_keeps_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"defaults": {"repetitions": 5}, "ollama": {"model": "llama3"}}"#,
        )
        .unwrap();

        let config = LlamaTuneConfig::load(&path).unwrap();
        assert_eq!(config.defaults.repetitions, 5);
        assert_eq!(config.defaults.step_delay_ms, 100);
        assert_eq!(config.defaults.preset, "Default");
        assert_eq!(config.ollama.model.as_deref(), Some("llama3"));
        assert_eq!(config.ollama.host, DEFAULT_OLLAMA_HOST);
        assert_eq!(config.ollama.request_timeout_secs, 300);
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            LlamaTuneConfig::load(&path),
            Err(LlamaTuneError::Config(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = LlamaTuneConfig::default();
        config.defaults.step_delay_ms = 0;
        config.save(&path).unwrap();

        let loaded = LlamaTuneConfig::load(&path).unwrap();
        assert_eq!(loaded.defaults.step_delay(), Duration::ZERO);
    }
}
