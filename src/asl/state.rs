//! Component tree for the supported state types.

use serde_json::Value;
use std::sync::Arc;

use super::error::{EvalError, EvalResult};
use super::json_path::extract_json;
use super::variable::VariableSample;
use super::wait::WaitDurationResolver;
use crate::runtime::environment::Environment;
use crate::runtime::history::HistoryEventType;

/// Where control goes after a state completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Continue with the named state.
    Next(String),
    /// The execution ends successfully after this state.
    End,
}

/// Source of one assigned variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
    /// A literal value.
    Literal(Value),
    /// A reference path into the state input.
    Path(String),
    /// A variable sample.
    Variable(VariableSample),
}

/// Variable assignments applied when a state completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assign {
    entries: Vec<(String, AssignValue)>,
}

impl Assign {
    /// Build from `(variable, source)` pairs.
    pub fn new(entries: Vec<(String, AssignValue)>) -> Self {
        Self { entries }
    }

    /// Evaluate every entry against `input`, then store the results.
    ///
    /// Entries read the variable values from before this block, so the order
    /// of entries does not matter. Nothing is stored if any entry fails.
    pub fn apply(&self, env: &mut Environment, input: &Value) -> EvalResult<()> {
        let mut resolved = Vec::with_capacity(self.entries.len());
        for (name, source) in &self.entries {
            let value = match source {
                AssignValue::Literal(value) => value.clone(),
                AssignValue::Path(path) => extract_json(path, input)?,
                AssignValue::Variable(sample) => {
                    sample.eval(env)?;
                    env.pop().ok_or(EvalError::StackUnderflow)?
                }
            };
            resolved.push((name.clone(), value));
        }
        for (name, value) in resolved {
            env.variables_mut().set(name, value);
        }
        Ok(())
    }
}

/// Fields shared by every state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateCommon {
    /// State name, unique within the machine.
    pub name: String,
    /// Free-form description.
    pub comment: Option<String>,
    /// Follow-up transition.
    pub transition: Transition,
    /// Variables assigned on completion.
    pub assign: Option<Assign>,
}

/// `Wait`: delays the transition by a resolved number of seconds.
#[derive(Debug, Clone)]
pub struct WaitState {
    /// Shared fields.
    pub common: StateCommon,
    /// Delay strategy, shared by every execution of the machine.
    pub wait: Arc<dyn WaitDurationResolver>,
}

/// `Pass`: forwards its input, or a fixed result.
#[derive(Debug, Clone)]
pub struct PassState {
    /// Shared fields.
    pub common: StateCommon,
    /// Replacement output.
    pub result: Option<Value>,
}

/// `Succeed`: ends the execution successfully.
#[derive(Debug, Clone)]
pub struct SucceedState {
    /// Shared fields.
    pub common: StateCommon,
}

/// `Fail`: ends the execution with a user-defined error.
#[derive(Debug, Clone)]
pub struct FailState {
    /// Shared fields.
    pub common: StateCommon,
    /// Error name; `States.Fail` when absent.
    pub error: Option<String>,
    /// Error cause.
    pub cause: Option<String>,
}

/// A state of the machine.
#[derive(Debug, Clone)]
pub enum State {
    /// See [`WaitState`].
    Wait(WaitState),
    /// See [`PassState`].
    Pass(PassState),
    /// See [`SucceedState`].
    Succeed(SucceedState),
    /// See [`FailState`].
    Fail(FailState),
}

impl State {
    /// Shared fields.
    pub fn common(&self) -> &StateCommon {
        match self {
            State::Wait(state) => &state.common,
            State::Pass(state) => &state.common,
            State::Succeed(state) => &state.common,
            State::Fail(state) => &state.common,
        }
    }

    /// State name.
    pub fn name(&self) -> &str {
        &self.common().name
    }

    /// History event recorded on entry.
    pub fn entered_event_type(&self) -> HistoryEventType {
        match self {
            State::Wait(_) => HistoryEventType::WaitStateEntered,
            State::Pass(_) => HistoryEventType::PassStateEntered,
            State::Succeed(_) => HistoryEventType::SucceedStateEntered,
            State::Fail(_) => HistoryEventType::FailStateEntered,
        }
    }

    /// History event recorded on exit. `Fail` states never exit.
    pub fn exited_event_type(&self) -> Option<HistoryEventType> {
        match self {
            State::Wait(_) => Some(HistoryEventType::WaitStateExited),
            State::Pass(_) => Some(HistoryEventType::PassStateExited),
            State::Succeed(_) => Some(HistoryEventType::SucceedStateExited),
            State::Fail(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::environment::ExecutionId;
    use serde_json::json;

    #[test]
    fn test_assign_reads_previous_values() {
        let mut env = Environment::new(ExecutionId::new(), Value::Null);
        env.variables_mut().set("a", json!(1));

        let assign = Assign::new(vec![
            ("a".to_string(), AssignValue::Literal(json!(2))),
            (
                "b".to_string(),
                AssignValue::Variable(VariableSample::parse("$a").unwrap()),
            ),
            ("c".to_string(), AssignValue::Path("$.delay".to_string())),
        ]);
        assign.apply(&mut env, &json!({"delay": 9})).unwrap();

        assert_eq!(env.variables().get("a"), Some(&json!(2)));
        assert_eq!(env.variables().get("b"), Some(&json!(1)));
        assert_eq!(env.variables().get("c"), Some(&json!(9)));
        assert_eq!(env.stack_depth(), 1);
    }

    #[test]
    fn test_assign_is_all_or_nothing() {
        let mut env = Environment::new(ExecutionId::new(), Value::Null);
        let assign = Assign::new(vec![
            ("a".to_string(), AssignValue::Literal(json!(2))),
            ("b".to_string(), AssignValue::Path("$.missing".to_string())),
        ]);

        assert!(assign.apply(&mut env, &json!({})).is_err());
        assert!(env.variables().is_empty());
    }
}
