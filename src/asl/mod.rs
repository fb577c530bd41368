//! Component tree of a parsed workflow.
//!
//! Definitions are loaded once into a [`StateMachine`] and shared by every
//! execution. Components evaluate against a per-execution
//! [`Environment`](crate::runtime::environment::Environment) and report
//! violations as [`FailureEvent`]s wrapped in [`EvalError`].

/// State machine definitions and their loader.
pub mod definition;
/// Evaluation and definition errors.
pub mod error;
/// Reserved and custom error names.
pub mod error_name;
/// Failure events raised by runtime validation.
pub mod failure;
/// Reference-path extraction.
pub mod json_path;
/// Supported state types.
pub mod state;
/// Variable samples over execution variables.
pub mod variable;
/// Wait-duration resolvers.
pub mod wait;

pub use definition::StateMachine;
pub use error::{DefinitionError, EvalError, EvalResult, PathError};
pub use error_name::{ErrorName, StatesErrorName};
pub use failure::FailureEvent;
pub use json_path::extract_json;
pub use state::{State, Transition};
pub use variable::VariableSample;
pub use wait::{
    Seconds, SecondsPath, SecondsPathVar, Timestamp, TimestampPath, TimestampPathVar,
    WaitDurationResolver, validate_seconds_value, validate_timestamp_value,
};
