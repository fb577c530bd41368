//! Per-execution evaluation environment
//!
//! The environment owns the evaluation stack, the variable store and the
//! history log of exactly one execution. Components receive it by exclusive
//! borrow; nothing in here is shared between executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::history::{EventDetails, EventHistory, HistoryEventType};

/// Execution identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    /// Create a new random ExecutionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution-scoped variables assigned by states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    values: HashMap<String, Value>,
}

impl VariableStore {
    /// Read a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Create or overwrite a variable.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Whether no variable is defined.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Runtime context of a single execution.
#[derive(Debug)]
pub struct Environment {
    execution_id: ExecutionId,
    stack: Vec<Value>,
    variables: VariableStore,
    history: EventHistory,
    pinned_now: Option<DateTime<Utc>>,
}

impl Environment {
    /// Create an environment whose stack holds `input` as its only value.
    pub fn new(execution_id: ExecutionId, input: Value) -> Self {
        Self {
            execution_id,
            stack: vec![input],
            variables: VariableStore::default(),
            history: EventHistory::new(),
            pinned_now: None,
        }
    }

    /// Execution this environment belongs to.
    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    /// Push an intermediate value.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop the most recent value.
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Borrow the top-of-stack value without removing it.
    pub fn peek(&self) -> Option<&Value> {
        self.stack.last()
    }

    /// Current number of stacked values.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Execution variables.
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Mutable execution variables.
    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    /// Recorded history.
    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    /// Append a history event stamped with [`Environment::now`].
    pub fn record(&mut self, event_type: HistoryEventType, details: EventDetails) -> u64 {
        let now = self.now();
        self.history.append(event_type, details, now)
    }

    /// Consume the environment, returning its history.
    pub fn into_history(self) -> EventHistory {
        self.history
    }

    /// Current time, or the pinned instant when one is set.
    pub fn now(&self) -> DateTime<Utc> {
        self.pinned_now.unwrap_or_else(Utc::now)
    }

    /// Pin the clock to a fixed instant.
    pub fn pin_clock(&mut self, now: DateTime<Utc>) {
        self.pinned_now = Some(now);
    }
}
