//! Error-name taxonomy shared by every state type.
//!
//! Runtime failures are classified by a canonical name. Names in the `States.`
//! namespace are reserved by the language; anything else is a user-defined name
//! raised from a `Fail` state.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Reserved `States.*` error names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatesErrorName {
    /// Wildcard matching any error name.
    All,
    /// A task heartbeat was not received in time.
    HeartbeatTimeout,
    /// A task or execution ran longer than its timeout.
    Timeout,
    /// A task failed during execution.
    TaskFailed,
    /// Insufficient privileges to run a task.
    Permissions,
    /// `ResultPath` could not be applied to the state input.
    ResultPathMatchFailure,
    /// A field in `Parameters` referenced a missing path.
    ParameterPathFailure,
    /// A branch of a parallel state failed.
    BranchFailed,
    /// No rule of a choice state matched.
    NoChoiceMatched,
    /// An intrinsic function call failed.
    IntrinsicFailure,
    /// A map state exceeded its tolerated failure threshold.
    ExceedToleratedFailureThreshold,
    /// Reading map items failed.
    ItemReaderFailed,
    /// Writing map results failed.
    ResultWriterFailed,
    /// A query expression could not be evaluated.
    QueryEvaluationError,
    /// Generic runtime failure (invalid data-derived values and similar).
    Runtime,
    /// Default name of a `Fail` state that does not declare one.
    Fail,
}

impl StatesErrorName {
    const ALL_NAMES: [StatesErrorName; 16] = [
        StatesErrorName::All,
        StatesErrorName::HeartbeatTimeout,
        StatesErrorName::Timeout,
        StatesErrorName::TaskFailed,
        StatesErrorName::Permissions,
        StatesErrorName::ResultPathMatchFailure,
        StatesErrorName::ParameterPathFailure,
        StatesErrorName::BranchFailed,
        StatesErrorName::NoChoiceMatched,
        StatesErrorName::IntrinsicFailure,
        StatesErrorName::ExceedToleratedFailureThreshold,
        StatesErrorName::ItemReaderFailed,
        StatesErrorName::ResultWriterFailed,
        StatesErrorName::QueryEvaluationError,
        StatesErrorName::Runtime,
        StatesErrorName::Fail,
    ];

    /// Canonical name as it appears in history records.
    pub fn to_name(self) -> &'static str {
        match self {
            StatesErrorName::All => "States.ALL",
            StatesErrorName::HeartbeatTimeout => "States.HeartbeatTimeout",
            StatesErrorName::Timeout => "States.Timeout",
            StatesErrorName::TaskFailed => "States.TaskFailed",
            StatesErrorName::Permissions => "States.Permissions",
            StatesErrorName::ResultPathMatchFailure => "States.ResultPathMatchFailure",
            StatesErrorName::ParameterPathFailure => "States.ParameterPathFailure",
            StatesErrorName::BranchFailed => "States.BranchFailed",
            StatesErrorName::NoChoiceMatched => "States.NoChoiceMatched",
            StatesErrorName::IntrinsicFailure => "States.IntrinsicFailure",
            StatesErrorName::ExceedToleratedFailureThreshold => {
                "States.ExceedToleratedFailureThreshold"
            }
            StatesErrorName::ItemReaderFailed => "States.ItemReaderFailed",
            StatesErrorName::ResultWriterFailed => "States.ResultWriterFailed",
            StatesErrorName::QueryEvaluationError => "States.QueryEvaluationError",
            StatesErrorName::Runtime => "States.Runtime",
            StatesErrorName::Fail => "States.Fail",
        }
    }

    /// Look up a reserved name from its canonical string.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL_NAMES
            .iter()
            .copied()
            .find(|candidate| candidate.to_name() == name)
    }
}

impl fmt::Display for StatesErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

/// Category of a runtime failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorName {
    /// One of the reserved `States.*` names.
    States(StatesErrorName),
    /// A user-defined name.
    Custom(String),
}

impl ErrorName {
    /// Classify a raw name, mapping reserved strings onto [`StatesErrorName`].
    pub fn parse(name: impl Into<String>) -> Self {
        let name = name.into();
        match StatesErrorName::from_name(&name) {
            Some(states) => ErrorName::States(states),
            None => ErrorName::Custom(name),
        }
    }

    /// Canonical string for this name.
    pub fn as_str(&self) -> &str {
        match self {
            ErrorName::States(states) => states.to_name(),
            ErrorName::Custom(name) => name,
        }
    }
}

impl From<StatesErrorName> for ErrorName {
    fn from(value: StatesErrorName) -> Self {
        ErrorName::States(value)
    }
}

impl fmt::Display for ErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ErrorName::parse(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names_round_trip() {
        for name in StatesErrorName::ALL_NAMES {
            assert_eq!(StatesErrorName::from_name(name.to_name()), Some(name));
        }
    }

    #[test]
    fn test_parse_classifies_custom_names() {
        assert_eq!(
            ErrorName::parse("States.Runtime"),
            ErrorName::States(StatesErrorName::Runtime)
        );
        assert_eq!(
            ErrorName::parse("OrderRejected"),
            ErrorName::Custom("OrderRejected".to_string())
        );
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let name = ErrorName::from(StatesErrorName::Runtime);
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"States.Runtime\"");
    }
}
