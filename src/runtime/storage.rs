//! Filesystem layout helpers and atomic write operations
//!
//! Finished execution histories are stored as JSON lines, one file per
//! execution, under `<root>/history/`. Files are written to a temporary path,
//! synced, then renamed into place.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::RuntimeConfig;
use super::environment::ExecutionId;
use super::error::{StorageError, StorageResult};
use super::history::HistoryEvent;

/// Storage manager for persisted execution histories
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the history directory path
    pub fn history_dir(&self) -> PathBuf {
        self.root.join("history")
    }

    /// Get the history file of one execution
    pub fn history_path(&self, execution: &ExecutionId) -> PathBuf {
        self.history_dir().join(format!("{}.jsonl", execution))
    }

    /// Create the directory layout
    pub fn init(&self) -> StorageResult<()> {
        fs::create_dir_all(self.history_dir())?;
        Ok(())
    }

    /// Write data atomically to a file
    ///
    /// Creates a temporary file, writes the data, syncs, then renames
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let temp_path = path.with_extension("tmp");
        let failed = |detail: String| StorageError::AtomicWriteFailed {
            path: path.to_path_buf(),
            detail,
        };

        let mut file = File::create(&temp_path)
            .map_err(|e| failed(format!("create {:?}: {}", temp_path, e)))?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)
            .map_err(|e| failed(format!("rename {:?}: {}", temp_path, e)))?;

        // Sync parent directory so the rename is durable
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let dir = OpenOptions::new().read(true).open(parent)?;
            dir.sync_all()?;
        }

        Ok(())
    }

    /// Persist a finished execution's history
    pub fn write_history(
        &self,
        execution: &ExecutionId,
        events: &[HistoryEvent],
    ) -> StorageResult<PathBuf> {
        let mut data = Vec::new();
        for event in events {
            serde_json::to_writer(&mut data, event)?;
            data.push(b'\n');
        }

        fs::create_dir_all(self.history_dir())?;
        let path = self.history_path(execution);
        self.write_atomic(&path, &data)?;
        Ok(path)
    }

    /// Load a persisted history
    pub fn read_history(&self, execution: &ExecutionId) -> StorageResult<Vec<HistoryEvent>> {
        let data = fs::read_to_string(self.history_path(execution))?;
        data.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }
}

/// Write runtime configuration
pub fn write_config(path: &Path, config: &RuntimeConfig) -> Result<()> {
    let json = serde_json::to_vec_pretty(config).context("Failed to serialize config")?;
    let storage = Storage::new(path.parent().unwrap_or(Path::new(".")).to_path_buf());
    storage
        .write_atomic(path, &json)
        .with_context(|| format!("Failed to write config: {:?}", path))?;
    Ok(())
}

/// Load runtime configuration
pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let data = fs::read(path).with_context(|| format!("Failed to read config: {:?}", path))?;
    let config: RuntimeConfig =
        serde_json::from_slice(&data).context("Failed to deserialize config")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::history::{EventDetails, EventHistory, HistoryEventType};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");

        let config = RuntimeConfig {
            history_root: Some(temp.path().join("runs")),
            max_concurrent_executions: 8,
            debug: true,
        };

        write_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.history_root, config.history_root);
        assert_eq!(loaded.max_concurrent_executions, 8);
        assert!(loaded.debug);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, br#"{ "debug": true }"#).unwrap();

        let loaded = load_config(&path).unwrap();
        assert!(loaded.debug);
        assert_eq!(
            loaded.max_concurrent_executions,
            RuntimeConfig::default().max_concurrent_executions
        );
        assert!(loaded.history_root.is_none());
    }

    #[test]
    fn test_atomic_write() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());
        let test_file = temp.path().join("test.dat");

        let data = b"Hello, world!";
        storage.write_atomic(&test_file, data).unwrap();

        assert_eq!(fs::read(&test_file).unwrap(), data);
        assert!(!temp.path().join("test.tmp").exists());
    }

    #[test]
    fn test_history_round_trip() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());
        storage.init().unwrap();

        let mut history = EventHistory::new();
        history.append(
            HistoryEventType::ExecutionStarted,
            EventDetails::execution_started(&json!({"wait": 1})),
            Utc::now(),
        );
        history.append(
            HistoryEventType::ExecutionSucceeded,
            EventDetails::execution_succeeded(&json!({"wait": 1})),
            Utc::now(),
        );

        let execution = ExecutionId::new();
        let path = storage.write_history(&execution, history.events()).unwrap();
        assert!(path.ends_with(format!("history/{}.jsonl", execution)));

        let loaded = storage.read_history(&execution).unwrap();
        assert_eq!(loaded, history.events());
    }
}
