use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use llamatune_core::BenchmarkResult;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No data directory available")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A saved result plus where it lives on disk.
#[derive(Debug, Clone)]
pub struct StoredResult {
    pub path: PathBuf,
    pub result: BenchmarkResult,
}

/// JSON files of finished benchmark results, one per run.
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: Option<PathBuf>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => default_results_dir().ok_or(StoreError::NoDataDir)?,
        };
        std::fs::create_dir_all(&dir)?;
        tracing::debug!("Result store at {:?}", dir);
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save under `benchmark_results_<YYYYmmdd_HHMMSS>.json`, suffixing the
    /// run id if two results share a second.
    pub fn save(&self, result: &BenchmarkResult) -> Result<PathBuf> {
        let stamp = local_time(result.timestamp).format("%Y%m%d_%H%M%S");
        let mut path = self.dir.join(format!("benchmark_results_{}.json", stamp));
        if path.exists() {
            let short_id: String = result.id.chars().take(8).collect();
            path = self
                .dir
                .join(format!("benchmark_results_{}_{}.json", stamp, short_id));
        }

        export(result, &path)?;
        tracing::info!("Saved benchmark result {} to {:?}", result.id, path);
        Ok(path)
    }

    /// Every readable result, newest first. Unparseable files are skipped.
    pub fn list(&self) -> Result<Vec<StoredResult>> {
        let mut entries = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match import(&path) {
                Ok(result) => entries.push(StoredResult { path, result }),
                Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
            }
        }

        entries.sort_by(|a, b| b.result.timestamp.cmp(&a.result.timestamp));
        Ok(entries)
    }

    /// Look a result up by id or id prefix.
    pub fn get(&self, id: &str) -> Result<Option<StoredResult>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|s| s.result.id.starts_with(id)))
    }
}

/// Write a result as pretty JSON to an explicit path.
pub fn export(result: &BenchmarkResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(result)?)?;
    Ok(())
}

pub fn import(path: &Path) -> Result<BenchmarkResult> {
    let body = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&body)?)
}

pub fn default_results_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("llamatune").join("results"))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("llamatune").join("config.json"))
}

pub fn local_time(timestamp: i64) -> DateTime<Local> {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .unwrap_or_else(Local::now)
}
