//! Runtime orchestrator and public API
//!
//! This module provides the main `Runtime` struct that hosts concurrent
//! executions and exposes the public interface for embedding the engine. Each
//! execution runs as its own tokio task with its own [`Environment`]; the
//! state machine it evaluates is shared read-only.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// Submodules
pub mod environment;
pub mod error;
pub mod executor;
pub mod history;
pub mod storage;

use crate::asl::StateMachine;
use error::RuntimeError;
use executor::{Executor, stop_channel};

pub use environment::{Environment, ExecutionId, VariableStore};
pub use executor::{ExecutionReport, ExecutionStatus, StopHandle};
pub use storage::Storage;

/// Configuration for the execution runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory receiving finished execution histories (disabled when unset)
    pub history_root: Option<PathBuf>,

    /// Maximum number of executions evaluated at the same time
    pub max_concurrent_executions: usize,

    /// Enable debug tracing
    pub debug: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            history_root: None,
            max_concurrent_executions: 64,
            debug: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        storage::load_config(path)
    }
}

/// Handle to a running execution
#[derive(Debug)]
pub struct ExecutionHandle {
    id: ExecutionId,
    stop: StopHandle,
    task: JoinHandle<ExecutionReport>,
}

impl ExecutionHandle {
    /// Execution identifier
    pub fn id(&self) -> &ExecutionId {
        &self.id
    }

    /// Request the execution to stop
    ///
    /// A pending wait is cut short and the execution ends as aborted.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// A handle that can stop the execution after this one is consumed
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Wait for the execution to finish
    pub async fn join(self) -> error::Result<ExecutionReport> {
        self.task
            .await
            .map_err(|e| RuntimeError::ExecutionLost(self.id.to_string(), e.to_string()))
    }
}

/// The main runtime orchestrator
pub struct Runtime {
    config: RuntimeConfig,
    storage: Option<Storage>,
    permits: Arc<Semaphore>,
    statuses: Arc<Mutex<HashMap<ExecutionId, ExecutionStatus>>>,
}

impl Runtime {
    /// Create a new runtime with the given configuration
    pub fn new(config: RuntimeConfig) -> anyhow::Result<Self> {
        if config.max_concurrent_executions == 0 {
            return Err(RuntimeError::Config(
                "max_concurrent_executions must be at least 1".to_string(),
            )
            .into());
        }

        let storage = match &config.history_root {
            Some(root) => {
                let storage = Storage::new(root.clone());
                storage.init().map_err(RuntimeError::from)?;
                Some(storage)
            }
            None => None,
        };
        let permits = Arc::new(Semaphore::new(config.max_concurrent_executions));

        Ok(Self {
            config,
            storage,
            permits,
            statuses: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Create a runtime from a configuration file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Self::new(RuntimeConfig::load(path)?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the history storage, when persistence is enabled
    pub fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    /// Start an execution of `machine` with `input`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_execution(&self, machine: Arc<StateMachine>, input: Value) -> ExecutionHandle {
        let id = ExecutionId::new();
        let (stop, signal) = stop_channel();
        self.statuses
            .lock()
            .insert(id.clone(), ExecutionStatus::Running);

        let permits = self.permits.clone();
        let statuses = self.statuses.clone();
        let storage = self.storage.clone();
        let execution_id = id.clone();

        let task = tokio::spawn(async move {
            let executor = Executor::new(machine);
            let env = Environment::new(execution_id.clone(), input);

            // A queued execution can be stopped before it gets a permit.
            let mut queued = signal.clone();
            let report = tokio::select! {
                permit = permits.acquire_owned() => {
                    // The semaphore is never closed.
                    let _permit = permit.ok();
                    debug!(execution_id = %execution_id, "execution admitted");
                    executor.run(env, signal).await
                }
                _ = queued.stopped() => {
                    debug!(execution_id = %execution_id, "execution stopped while queued");
                    executor.abort_unstarted(env)
                }
            };
            statuses.lock().insert(execution_id.clone(), report.status);

            if let Some(storage) = storage {
                let events = report.history.clone();
                let written = tokio::task::spawn_blocking(move || {
                    storage.write_history(&execution_id, &events)
                })
                .await;
                match written {
                    Ok(Ok(path)) => debug!(path = ?path, "history persisted"),
                    Ok(Err(e)) => warn!(error = %e, "failed to persist history"),
                    Err(e) => warn!(error = %e, "history writer did not finish"),
                }
            }

            report
        });

        ExecutionHandle { id, stop, task }
    }

    /// Current status of an execution started by this runtime
    pub fn status(&self, id: &ExecutionId) -> Option<ExecutionStatus> {
        self.statuses.lock().get(id).copied()
    }

    /// Remove a finished execution from the registry
    ///
    /// Returns its final status. Running executions are kept and yield `None`.
    pub fn forget(&self, id: &ExecutionId) -> Option<ExecutionStatus> {
        let mut statuses = self.statuses.lock();
        match statuses.get(id) {
            Some(ExecutionStatus::Running) | None => None,
            Some(_) => statuses.remove(id),
        }
    }

    /// Remove every finished execution from the registry, returning how many
    pub fn prune_finished(&self) -> usize {
        let mut statuses = self.statuses.lock();
        let before = statuses.len();
        statuses.retain(|_, status| *status == ExecutionStatus::Running);
        before - statuses.len()
    }

    /// Every execution started by this runtime with its status
    ///
    /// Finished executions stay listed until [`Runtime::forget`] or
    /// [`Runtime::prune_finished`] removes them.
    pub fn executions(&self) -> Vec<(ExecutionId, ExecutionStatus)> {
        self.statuses
            .lock()
            .iter()
            .map(|(id, status)| (id.clone(), *status))
            .collect()
    }
}
