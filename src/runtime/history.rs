//! Append-only execution history
//!
//! Every execution owns one [`EventHistory`]. Events are numbered from 1 and
//! link back to their predecessor, matching the shape returned by the
//! execution-history APIs of the hosted service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a recorded history event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryEventType {
    /// The execution started with its input.
    ExecutionStarted,
    /// The execution finished successfully.
    ExecutionSucceeded,
    /// The execution terminated with a failure.
    ExecutionFailed,
    /// The execution was stopped by its host.
    ExecutionAborted,
    /// A wait state was entered.
    WaitStateEntered,
    /// A wait state completed its delay.
    WaitStateExited,
    /// A pass state was entered.
    PassStateEntered,
    /// A pass state produced its output.
    PassStateExited,
    /// A succeed state was entered.
    SucceedStateEntered,
    /// A succeed state produced its output.
    SucceedStateExited,
    /// A fail state was entered.
    FailStateEntered,
}

/// Details of an `ExecutionStarted` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStartedEventDetails {
    /// Execution input, serialized as JSON text.
    pub input: String,
}

/// Details of an `ExecutionSucceeded` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSucceededEventDetails {
    /// Execution output, serialized as JSON text.
    pub output: String,
}

/// Details of an `ExecutionFailed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailedEventDetails {
    /// Canonical error name.
    pub error: String,
    /// Human-readable cause.
    pub cause: String,
}

/// Details of an `ExecutionAborted` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAbortedEventDetails {
    /// Reason supplied by the host, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Details of a `*StateEntered` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEnteredEventDetails {
    /// State name.
    pub name: String,
    /// State input, serialized as JSON text.
    pub input: String,
}

/// Details of a `*StateExited` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateExitedEventDetails {
    /// State name.
    pub name: String,
    /// State output, serialized as JSON text.
    pub output: String,
}

/// Event payload. At most one field is populated for any given event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    /// Populated for `ExecutionStarted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_started_event_details: Option<ExecutionStartedEventDetails>,
    /// Populated for `ExecutionSucceeded`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_succeeded_event_details: Option<ExecutionSucceededEventDetails>,
    /// Populated for `ExecutionFailed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_failed_event_details: Option<ExecutionFailedEventDetails>,
    /// Populated for `ExecutionAborted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_aborted_event_details: Option<ExecutionAbortedEventDetails>,
    /// Populated for `*StateEntered`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_entered_event_details: Option<StateEnteredEventDetails>,
    /// Populated for `*StateExited`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_exited_event_details: Option<StateExitedEventDetails>,
}

impl EventDetails {
    /// Details for an execution start.
    pub fn execution_started(input: &Value) -> Self {
        Self {
            execution_started_event_details: Some(ExecutionStartedEventDetails {
                input: input.to_string(),
            }),
            ..Default::default()
        }
    }

    /// Details for a successful execution.
    pub fn execution_succeeded(output: &Value) -> Self {
        Self {
            execution_succeeded_event_details: Some(ExecutionSucceededEventDetails {
                output: output.to_string(),
            }),
            ..Default::default()
        }
    }

    /// Details for a failed execution.
    pub fn execution_failed(details: ExecutionFailedEventDetails) -> Self {
        Self {
            execution_failed_event_details: Some(details),
            ..Default::default()
        }
    }

    /// Details for an aborted execution.
    pub fn execution_aborted(cause: Option<String>) -> Self {
        Self {
            execution_aborted_event_details: Some(ExecutionAbortedEventDetails { cause }),
            ..Default::default()
        }
    }

    /// Details for entering a state.
    pub fn state_entered(name: &str, input: &Value) -> Self {
        Self {
            state_entered_event_details: Some(StateEnteredEventDetails {
                name: name.to_string(),
                input: input.to_string(),
            }),
            ..Default::default()
        }
    }

    /// Details for leaving a state.
    pub fn state_exited(name: &str, output: &Value) -> Self {
        Self {
            state_exited_event_details: Some(StateExitedEventDetails {
                name: name.to_string(),
                output: output.to_string(),
            }),
            ..Default::default()
        }
    }
}

/// A single recorded history event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    /// 1-based position in the history.
    pub id: u64,
    /// Id of the preceding event (0 for the first event).
    pub previous_event_id: u64,
    /// Wall-clock time the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: HistoryEventType,
    /// Event payload.
    #[serde(flatten)]
    pub details: EventDetails,
}

/// Append-only history log owned by one execution.
#[derive(Debug, Clone, Default)]
pub struct EventHistory {
    events: Vec<HistoryEvent>,
}

impl EventHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its id.
    pub fn append(
        &mut self,
        event_type: HistoryEventType,
        details: EventDetails,
        timestamp: DateTime<Utc>,
    ) -> u64 {
        let previous_event_id = self.events.last().map(|event| event.id).unwrap_or(0);
        let id = previous_event_id + 1;
        self.events.push(HistoryEvent {
            id,
            previous_event_id,
            timestamp,
            event_type,
            details,
        });
        id
    }

    /// All recorded events in order.
    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    /// Consume the log and return its events.
    pub fn into_events(self) -> Vec<HistoryEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_links_previous_event() {
        let mut history = EventHistory::new();
        let now = Utc::now();
        let first = history.append(
            HistoryEventType::ExecutionStarted,
            EventDetails::execution_started(&json!({})),
            now,
        );
        let second = history.append(
            HistoryEventType::WaitStateEntered,
            EventDetails::state_entered("Pause", &json!({})),
            now,
        );

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(history.events()[0].previous_event_id, 0);
        assert_eq!(history.events()[1].previous_event_id, 1);
    }

    #[test]
    fn test_failed_event_serializes_in_service_shape() {
        let mut history = EventHistory::new();
        history.append(
            HistoryEventType::ExecutionFailed,
            EventDetails::execution_failed(ExecutionFailedEventDetails {
                error: "States.Runtime".to_string(),
                cause: "boom".to_string(),
            }),
            Utc::now(),
        );

        let encoded = serde_json::to_value(&history.events()[0]).unwrap();
        assert_eq!(encoded["type"], json!("ExecutionFailed"));
        assert_eq!(
            encoded["executionFailedEventDetails"],
            json!({ "error": "States.Runtime", "cause": "boom" })
        );
        assert!(encoded.get("stateEnteredEventDetails").is_none());
    }
}
