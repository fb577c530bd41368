//! Error types for definition loading and state evaluation.

use thiserror::Error;

use super::failure::FailureEvent;

/// Errors raised while extracting a value from a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path is syntactically valid but selects nothing.
    #[error("Invalid path '{path}': no value at segment '{segment}'")]
    NotFound {
        /// Full path expression.
        path: String,
        /// Segment that failed to match.
        segment: String,
    },

    /// The path expression could not be parsed.
    #[error("Invalid path '{path}': {reason}")]
    Invalid {
        /// Full path expression.
        path: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors raised while evaluating a component against an environment.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A validation failure that terminates the execution.
    #[error("{0}")]
    Failure(Box<FailureEvent>),

    /// The value extractor could not resolve a path.
    #[error(transparent)]
    Path(#[from] PathError),

    /// A variable sample referenced a variable that was never assigned.
    #[error("The variable '{0}' is not defined")]
    UndefinedVariable(String),

    /// A component expected a value on the evaluation stack.
    #[error("Evaluation stack is empty")]
    StackUnderflow,
}

impl From<FailureEvent> for EvalError {
    fn from(event: FailureEvent) -> Self {
        EvalError::Failure(Box::new(event))
    }
}

/// Convenience result alias for evaluation.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Errors raised while loading a state machine definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The document is not valid JSON or does not match the expected shape.
    #[error("invalid definition document: {0}")]
    Json(#[from] serde_json::Error),

    /// `StartAt` names a state that does not exist.
    #[error("StartAt references unknown state '{0}'")]
    UnknownStartState(String),

    /// `Next` names a state that does not exist.
    #[error("state '{state}' transitions to unknown state '{next}'")]
    UnknownNextState {
        /// State declaring the transition.
        state: String,
        /// Missing target.
        next: String,
    },

    /// A state declares both or neither of `Next` and `End`, or a terminal
    /// state declares either.
    #[error("state '{0}' has an invalid Next/End transition")]
    InvalidTransition(String),

    /// A wait state does not declare exactly one duration field.
    #[error("wait state '{state}': {reason}")]
    InvalidWait {
        /// State name.
        state: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An `Assign` block is malformed.
    #[error("state '{state}' has an invalid Assign entry '{key}': {reason}")]
    InvalidAssign {
        /// State name.
        state: String,
        /// Offending key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The definition has no states.
    #[error("definition declares no states")]
    NoStates,
}
