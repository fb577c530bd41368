//! Failure events raised by runtime validation.
//!
//! A [`FailureEvent`] is built at the point a violation is detected and travels
//! up to the evaluator inside [`EvalError::Failure`](super::EvalError::Failure).
//! The evaluator is the only place that turns it into a history record.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error_name::{ErrorName, StatesErrorName};
use crate::runtime::environment::ExecutionId;
use crate::runtime::history::{EventDetails, ExecutionFailedEventDetails, HistoryEventType};

/// A single abortive failure observed during an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEvent {
    /// Execution the failure belongs to.
    #[serde(skip)]
    pub execution_id: Option<ExecutionId>,
    /// Failure category.
    pub error_name: ErrorName,
    /// History event kind the failure is recorded as.
    pub event_type: HistoryEventType,
    /// Error code and cause recorded in the history.
    pub details: ExecutionFailedEventDetails,
}

impl FailureEvent {
    /// Build an `ExecutionFailed` event for `error_name` with the given cause.
    pub fn new(
        execution_id: &ExecutionId,
        error_name: impl Into<ErrorName>,
        cause: impl Into<String>,
    ) -> Self {
        let error_name = error_name.into();
        Self {
            execution_id: Some(execution_id.clone()),
            details: ExecutionFailedEventDetails {
                error: error_name.to_string(),
                cause: cause.into(),
            },
            error_name,
            event_type: HistoryEventType::ExecutionFailed,
        }
    }

    /// Shorthand for a `States.Runtime` failure.
    pub fn runtime(execution_id: &ExecutionId, cause: impl Into<String>) -> Self {
        Self::new(execution_id, StatesErrorName::Runtime, cause)
    }

    /// Error code recorded in the history.
    pub fn error(&self) -> &str {
        &self.details.error
    }

    /// Cause recorded in the history.
    pub fn cause(&self) -> &str {
        &self.details.cause
    }

    /// History payload for the terminal record.
    pub fn event_details(&self) -> EventDetails {
        EventDetails::execution_failed(self.details.clone())
    }
}

impl fmt::Display for FailureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.details.error, self.details.cause)
    }
}

impl std::error::Error for FailureEvent {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_runtime_failure_shape() {
        let execution_id = ExecutionId::new();
        let event = FailureEvent::runtime(&execution_id, "bad value");

        assert_eq!(event.error(), "States.Runtime");
        assert_eq!(event.cause(), "bad value");
        assert_eq!(event.execution_id.as_ref(), Some(&execution_id));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "errorName": "States.Runtime",
                "eventType": "ExecutionFailed",
                "details": { "error": "States.Runtime", "cause": "bad value" }
            })
        );
    }

    #[test]
    fn test_custom_error_name() {
        let event = FailureEvent::new(
            &ExecutionId::new(),
            ErrorName::parse("OrderRejected"),
            "no stock",
        );
        assert_eq!(event.to_string(), "OrderRejected: no stock");
    }
}
