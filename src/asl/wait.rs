//! Wait-duration resolution
//!
//! A wait state names exactly one way of computing its delay. Every strategy
//! implements [`WaitDurationResolver`], producing a whole number of seconds or
//! an [`EvalError`]. Data-derived values go through one of two shared
//! validators, [`validate_seconds_value`] and [`validate_timestamp_value`], so
//! the path-based and variable-based variants classify and describe bad values
//! identically.
//!
//! Resolution is synchronous. Suspending the execution for the returned
//! duration belongs to the evaluator.

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use super::error::{EvalError, EvalResult, PathError};
use super::error_name::StatesErrorName;
use super::failure::FailureEvent;
use super::json_path::{extract_json, parse_path};
use super::variable::VariableSample;
use crate::runtime::environment::Environment;

/// Computes how many seconds a wait state pauses before its transition.
pub trait WaitDurationResolver: fmt::Debug + Send + Sync {
    /// Resolve the delay for the current execution.
    fn resolve(&self, env: &mut Environment) -> EvalResult<u64>;
}

/// Validate a data-derived `SecondsPath` value.
///
/// Only JSON integers representable as a signed 64-bit value pass; floats
/// (even `3.0`), booleans, strings, arrays, objects and null are rejected, as
/// are negative integers.
pub fn validate_seconds_value(env: &Environment, path: &str, value: &Value) -> EvalResult<u64> {
    let cause = match value {
        Value::Number(number) => match number.as_i64() {
            Some(seconds) if seconds >= 0 => return Ok(seconds as u64),
            Some(_) => format!(
                "The SecondsPath parameter references a negative value: {}",
                assignment_description(path, value)
            ),
            None => parse_failure_cause(path, value),
        },
        _ => parse_failure_cause(path, value),
    };

    Err(FailureEvent::new(env.execution_id(), StatesErrorName::Runtime, cause).into())
}

fn parse_failure_cause(path: &str, value: &Value) -> String {
    format!(
        "The SecondsPath parameter cannot be parsed as a long value: {}",
        assignment_description(path, value)
    )
}

/// Validate a data-derived `TimestampPath` value.
pub fn validate_timestamp_value(
    env: &Environment,
    path: &str,
    value: &Value,
) -> EvalResult<DateTime<FixedOffset>> {
    if let Some(timestamp) = value.as_str().and_then(parse_timestamp) {
        return Ok(timestamp);
    }

    let cause = format!(
        "The TimestampPath parameter does not reference a valid ISO-8601 extended offset date-time format string: {}",
        assignment_description(path, value)
    );
    Err(FailureEvent::new(env.execution_id(), StatesErrorName::Runtime, cause).into())
}

/// Parse an RFC 3339 timestamp with a mandatory `T` separator.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    if !text.contains('T') {
        return None;
    }
    DateTime::parse_from_rfc3339(text).ok()
}

/// Whole seconds from `now` until `timestamp`, rounded up; zero when past.
pub fn seconds_until(now: DateTime<Utc>, timestamp: DateTime<FixedOffset>) -> u64 {
    let millis = (timestamp.with_timezone(&Utc) - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis as u64).div_ceil(1000)
    }
}

fn assignment_description(path: &str, value: &Value) -> String {
    format!("{} == {}", path, render_value(value))
}

/// Render a value the way causes quote it: strings bare, everything else as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn current_input(env: &Environment) -> EvalResult<&Value> {
    env.peek().ok_or(EvalError::StackUnderflow)
}

fn sample_value(env: &mut Environment, sample: &VariableSample) -> EvalResult<Value> {
    sample.eval(env)?;
    env.pop().ok_or(EvalError::StackUnderflow)
}

/// `Seconds`: a literal delay from the definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seconds {
    seconds: u64,
}

impl Seconds {
    /// Wrap a literal delay.
    pub fn new(seconds: u64) -> Self {
        Self { seconds }
    }
}

impl WaitDurationResolver for Seconds {
    fn resolve(&self, _env: &mut Environment) -> EvalResult<u64> {
        Ok(self.seconds)
    }
}

/// `Timestamp`: wait until a literal instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    timestamp: DateTime<FixedOffset>,
}

impl Timestamp {
    /// Parse a literal timestamp.
    pub fn parse(text: &str) -> Option<Self> {
        parse_timestamp(text).map(|timestamp| Self { timestamp })
    }
}

impl WaitDurationResolver for Timestamp {
    fn resolve(&self, env: &mut Environment) -> EvalResult<u64> {
        Ok(seconds_until(env.now(), self.timestamp))
    }
}

/// `SecondsPath`: a delay read from the state input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondsPath {
    path: String,
}

impl SecondsPath {
    /// Build a resolver for a reference path, checking its syntax.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        parse_path(&path)?;
        Ok(Self { path })
    }

    /// Configured path expression.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl WaitDurationResolver for SecondsPath {
    fn resolve(&self, env: &mut Environment) -> EvalResult<u64> {
        let seconds = extract_json(&self.path, current_input(env)?)?;
        let seconds = validate_seconds_value(env, &self.path, &seconds)?;
        debug!(path = %self.path, seconds, "resolved SecondsPath");
        Ok(seconds)
    }
}

/// `SecondsPath` referencing a variable (`$name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondsPathVar {
    sample: VariableSample,
}

impl SecondsPathVar {
    /// Wrap a variable sample.
    pub fn new(sample: VariableSample) -> Self {
        Self { sample }
    }

    /// The sampled expression.
    pub fn sample(&self) -> &VariableSample {
        &self.sample
    }
}

impl WaitDurationResolver for SecondsPathVar {
    fn resolve(&self, env: &mut Environment) -> EvalResult<u64> {
        let seconds = sample_value(env, &self.sample)?;
        let seconds = validate_seconds_value(env, self.sample.expression(), &seconds)?;
        debug!(expression = %self.sample.expression(), seconds, "resolved SecondsPath variable");
        Ok(seconds)
    }
}

/// `TimestampPath`: a deadline read from the state input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampPath {
    path: String,
}

impl TimestampPath {
    /// Build a resolver for a reference path, checking its syntax.
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        parse_path(&path)?;
        Ok(Self { path })
    }
}

impl WaitDurationResolver for TimestampPath {
    fn resolve(&self, env: &mut Environment) -> EvalResult<u64> {
        let raw = extract_json(&self.path, current_input(env)?)?;
        let timestamp = validate_timestamp_value(env, &self.path, &raw)?;
        Ok(seconds_until(env.now(), timestamp))
    }
}

/// `TimestampPath` referencing a variable (`$name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampPathVar {
    sample: VariableSample,
}

impl TimestampPathVar {
    /// Wrap a variable sample.
    pub fn new(sample: VariableSample) -> Self {
        Self { sample }
    }
}

impl WaitDurationResolver for TimestampPathVar {
    fn resolve(&self, env: &mut Environment) -> EvalResult<u64> {
        let raw = sample_value(env, &self.sample)?;
        let timestamp = validate_timestamp_value(env, self.sample.expression(), &raw)?;
        Ok(seconds_until(env.now(), timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::environment::ExecutionId;
    use serde_json::json;

    fn env_with(input: Value) -> Environment {
        Environment::new(ExecutionId::new(), input)
    }

    fn instant(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_literal_seconds() {
        let mut env = env_with(Value::Null);
        assert_eq!(Seconds::new(12).resolve(&mut env).unwrap(), 12);
    }

    #[test]
    fn test_seconds_path_leaves_input_on_stack() {
        let mut env = env_with(json!({"wait": 5}));
        let resolver = SecondsPath::new("$.wait").unwrap();

        assert_eq!(resolver.resolve(&mut env).unwrap(), 5);
        assert_eq!(env.stack_depth(), 1);
        assert_eq!(env.peek(), Some(&json!({"wait": 5})));
    }

    #[test]
    fn test_seconds_path_rejects_bad_syntax_at_construction() {
        assert!(SecondsPath::new("wait").is_err());
    }

    #[test]
    fn test_extraction_error_is_not_wrapped() {
        let mut env = env_with(json!({}));
        let err = SecondsPath::new("$.wait")
            .unwrap()
            .resolve(&mut env)
            .unwrap_err();
        assert!(matches!(err, EvalError::Path(PathError::NotFound { .. })));
    }

    #[test]
    fn test_u64_beyond_long_range_is_not_a_long() {
        let env = env_with(Value::Null);
        let err = validate_seconds_value(&env, "$.wait", &json!(u64::MAX)).unwrap_err();
        match err {
            EvalError::Failure(event) => {
                assert!(event.cause().contains("cannot be parsed as a long value"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_failure_carries_execution_id() {
        let env = env_with(Value::Null);
        match validate_seconds_value(&env, "$.wait", &json!(-3)).unwrap_err() {
            EvalError::Failure(event) => {
                assert_eq!(event.execution_id.as_ref(), Some(env.execution_id()));
                assert_eq!(event.error(), "States.Runtime");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_rounds_up_partial_seconds() {
        let now = instant("2024-05-01T10:00:00.250Z");
        let deadline = DateTime::parse_from_rfc3339("2024-05-01T10:00:03Z").unwrap();
        assert_eq!(seconds_until(now, deadline), 3);
        assert_eq!(seconds_until(instant("2024-05-01T11:00:00Z"), deadline), 0);
    }

    #[test]
    fn test_literal_timestamp_uses_environment_clock() {
        let mut env = env_with(Value::Null);
        env.pin_clock(instant("2024-05-01T10:00:00Z"));
        let resolver = Timestamp::parse("2024-05-01T10:01:00+00:00").unwrap();
        assert_eq!(resolver.resolve(&mut env).unwrap(), 60);
        assert!(Timestamp::parse("2024-05-01 10:01:00Z").is_none());
    }

    #[test]
    fn test_timestamp_path_accepts_offsets() {
        let mut env = env_with(json!({"until": "2024-05-01T12:00:10+02:00"}));
        env.pin_clock(instant("2024-05-01T10:00:00Z"));
        let resolver = TimestampPath::new("$.until").unwrap();
        assert_eq!(resolver.resolve(&mut env).unwrap(), 10);
    }

    #[test]
    fn test_timestamp_path_rejects_non_timestamps() {
        let mut env = env_with(json!({"until": "tomorrow"}));
        let err = TimestampPath::new("$.until")
            .unwrap()
            .resolve(&mut env)
            .unwrap_err();
        match err {
            EvalError::Failure(event) => {
                assert_eq!(
                    event.cause(),
                    "The TimestampPath parameter does not reference a valid ISO-8601 extended offset date-time format string: $.until == tomorrow"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_path_var_keeps_stack_depth() {
        let mut env = env_with(Value::Null);
        env.pin_clock(instant("2024-05-01T10:00:00Z"));
        env.variables_mut()
            .set("deadline", json!("2024-05-01T10:00:30Z"));
        let resolver = TimestampPathVar::new(VariableSample::parse("$deadline").unwrap());

        assert_eq!(resolver.resolve(&mut env).unwrap(), 30);
        assert_eq!(env.stack_depth(), 1);
    }

    #[test]
    fn test_timestamp_path_var_rejects_non_timestamps() {
        let resolver = TimestampPathVar::new(VariableSample::parse("$deadline").unwrap());
        for value in [json!("2024-05-01 10:00:30Z"), json!(1714557630), json!(null)] {
            let mut env = env_with(json!({}));
            env.variables_mut().set("deadline", value.clone());

            match resolver.resolve(&mut env).unwrap_err() {
                EvalError::Failure(event) => {
                    assert_eq!(event.error(), "States.Runtime");
                    assert_eq!(
                        event.cause(),
                        format!(
                            "The TimestampPath parameter does not reference a valid ISO-8601 extended offset date-time format string: $deadline == {}",
                            render_value(&value)
                        )
                    );
                }
                other => panic!("unexpected error: {other:?}"),
            }
            assert_eq!(env.stack_depth(), 1);
            assert_eq!(env.peek(), Some(&json!({})));
        }
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("soon")), "soon");
        assert_eq!(render_value(&json!(3.0)), "3.0");
        assert_eq!(render_value(&json!(null)), "null");
        assert_eq!(render_value(&json!([1, 2])), "[1,2]");
    }
}
