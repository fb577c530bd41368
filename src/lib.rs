//! ASL Runtime – An execution engine for Amazon States Language workflows
//!
//! This crate evaluates state machine definitions with:
//! - Wait states whose duration comes from literals, reference paths, or
//!   execution variables, all validated by one shared rule
//! - Pass, Succeed and Fail states with variable assignment
//! - `States.*` error names and `ExecutionFailed` history events
//! - Concurrent executions with cooperative, cancellable waits
//! - JSON-lines persistence of finished execution histories

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Workflow definitions, components and their evaluation errors
pub mod asl;

/// Execution hosting, history and storage
pub mod runtime;

// Re-export key types for convenience
pub use asl::{ErrorName, FailureEvent, StateMachine, StatesErrorName};
pub use runtime::{ExecutionHandle, ExecutionReport, ExecutionStatus, Runtime, RuntimeConfig};

/// Current version of the ASL runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
