//! State machine definitions loaded from their JSON document form.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::DefinitionError;
use super::json_path::parse_path;
use super::state::{
    Assign, AssignValue, FailState, PassState, State, StateCommon, SucceedState, Transition,
    WaitState,
};
use super::variable::{VariableSample, is_variable_reference};
use super::wait::{
    Seconds, SecondsPath, SecondsPathVar, Timestamp, TimestampPath, TimestampPathVar,
    WaitDurationResolver,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDefinition {
    comment: Option<String>,
    start_at: String,
    states: BTreeMap<String, RawState>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
enum RawStateType {
    Wait,
    Pass,
    Succeed,
    Fail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawState {
    #[serde(rename = "Type")]
    state_type: RawStateType,
    comment: Option<String>,
    next: Option<String>,
    end: Option<bool>,
    assign: Option<Map<String, Value>>,
    seconds: Option<Value>,
    timestamp: Option<String>,
    seconds_path: Option<String>,
    timestamp_path: Option<String>,
    result: Option<Value>,
    error: Option<String>,
    cause: Option<String>,
}

/// A validated, immutable state machine.
///
/// Definitions are shared read-only by every execution started from them.
#[derive(Debug, Clone)]
pub struct StateMachine {
    comment: Option<String>,
    start_at: String,
    states: BTreeMap<String, State>,
}

impl StateMachine {
    /// Parse and validate a definition document.
    pub fn from_json(source: &str) -> Result<Self, DefinitionError> {
        let raw: RawDefinition = serde_json::from_str(source)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDefinition) -> Result<Self, DefinitionError> {
        if raw.states.is_empty() {
            return Err(DefinitionError::NoStates);
        }
        if !raw.states.contains_key(&raw.start_at) {
            return Err(DefinitionError::UnknownStartState(raw.start_at));
        }

        let mut states = BTreeMap::new();
        for (name, raw_state) in raw.states.iter() {
            let state = build_state(name, raw_state)?;
            if let Transition::Next(next) = &state.common().transition {
                if !raw.states.contains_key(next) {
                    return Err(DefinitionError::UnknownNextState {
                        state: name.clone(),
                        next: next.clone(),
                    });
                }
            }
            states.insert(name.clone(), state);
        }

        Ok(Self {
            comment: raw.comment,
            start_at: raw.start_at,
            states,
        })
    }

    /// Definition comment.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Name of the first state.
    pub fn start_at(&self) -> &str {
        &self.start_at
    }

    /// Look up a state by name.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// All states, ordered by name.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }
}

fn build_state(name: &str, raw: &RawState) -> Result<State, DefinitionError> {
    let terminal = matches!(raw.state_type, RawStateType::Succeed | RawStateType::Fail);
    let transition = if terminal {
        // Succeed and Fail end the execution on their own.
        if raw.next.is_some() || raw.end.is_some() {
            return Err(DefinitionError::InvalidTransition(name.to_string()));
        }
        Transition::End
    } else {
        match (&raw.next, raw.end.unwrap_or(false)) {
            (Some(next), false) => Transition::Next(next.clone()),
            (None, true) => Transition::End,
            _ => return Err(DefinitionError::InvalidTransition(name.to_string())),
        }
    };
    let assign = raw
        .assign
        .as_ref()
        .map(|entries| build_assign(name, entries))
        .transpose()?;
    let common = StateCommon {
        name: name.to_string(),
        comment: raw.comment.clone(),
        transition,
        assign,
    };

    Ok(match raw.state_type {
        RawStateType::Wait => State::Wait(WaitState {
            wait: build_wait(name, raw)?,
            common,
        }),
        RawStateType::Pass => State::Pass(PassState {
            common,
            result: raw.result.clone(),
        }),
        RawStateType::Succeed => State::Succeed(SucceedState { common }),
        RawStateType::Fail => State::Fail(FailState {
            common,
            error: raw.error.clone(),
            cause: raw.cause.clone(),
        }),
    })
}

fn build_wait(
    name: &str,
    raw: &RawState,
) -> Result<Arc<dyn WaitDurationResolver>, DefinitionError> {
    let invalid = |reason: String| DefinitionError::InvalidWait {
        state: name.to_string(),
        reason,
    };

    let declared = [
        raw.seconds.is_some(),
        raw.timestamp.is_some(),
        raw.seconds_path.is_some(),
        raw.timestamp_path.is_some(),
    ]
    .iter()
    .filter(|present| **present)
    .count();
    if declared != 1 {
        return Err(invalid(
            "exactly one of Seconds, Timestamp, SecondsPath or TimestampPath is required"
                .to_string(),
        ));
    }

    if let Some(seconds) = &raw.seconds {
        let seconds = seconds.as_u64().ok_or_else(|| {
            invalid(format!(
                "Seconds must be a non-negative integer, got {}",
                seconds
            ))
        })?;
        return Ok(Arc::new(Seconds::new(seconds)));
    }
    if let Some(timestamp) = &raw.timestamp {
        let timestamp = Timestamp::parse(timestamp).ok_or_else(|| {
            invalid(format!(
                "Timestamp '{}' is not a valid RFC 3339 date-time",
                timestamp
            ))
        })?;
        return Ok(Arc::new(timestamp));
    }
    if let Some(path) = &raw.seconds_path {
        if is_variable_reference(path) {
            let sample = VariableSample::parse(path).map_err(|err| invalid(err.to_string()))?;
            return Ok(Arc::new(SecondsPathVar::new(sample)));
        }
        let resolver = SecondsPath::new(path.clone()).map_err(|err| invalid(err.to_string()))?;
        return Ok(Arc::new(resolver));
    }

    // Only TimestampPath remains.
    let path = raw.timestamp_path.as_deref().unwrap_or_default();
    if is_variable_reference(path) {
        let sample = VariableSample::parse(path).map_err(|err| invalid(err.to_string()))?;
        return Ok(Arc::new(TimestampPathVar::new(sample)));
    }
    let resolver = TimestampPath::new(path).map_err(|err| invalid(err.to_string()))?;
    Ok(Arc::new(resolver))
}

fn build_assign(state: &str, entries: &Map<String, Value>) -> Result<Assign, DefinitionError> {
    let invalid = |key: &str, reason: &str| DefinitionError::InvalidAssign {
        state: state.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let mut assignments = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let (variable, dynamic) = match key.strip_suffix(".$") {
            Some(variable) => (variable, true),
            None => (key.as_str(), false),
        };
        let valid_name = variable
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && variable.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(invalid(key, "variable names must be identifiers"));
        }

        let source = if !dynamic {
            AssignValue::Literal(value.clone())
        } else {
            let expression = value
                .as_str()
                .ok_or_else(|| invalid(key, "dynamic values must be path strings"))?;
            if is_variable_reference(expression) {
                let sample = VariableSample::parse(expression)
                    .map_err(|err| invalid(key, &err.to_string()))?;
                AssignValue::Variable(sample)
            } else {
                parse_path(expression).map_err(|err| invalid(key, &err.to_string()))?;
                AssignValue::Path(expression.to_string())
            }
        };
        assignments.push((variable.to_string(), source));
    }

    Ok(Assign::new(assignments))
}
