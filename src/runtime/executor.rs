//! State machine evaluator
//!
//! Drives one execution from its start state to a terminal outcome, recording
//! every step in the environment's history. Wait states resolve their delay
//! exactly once and then suspend cooperatively, racing the delay against the
//! execution's stop signal. Any evaluation error is terminal: it is recorded
//! as an `ExecutionFailed` event and never retried.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::environment::{Environment, ExecutionId};
use super::history::{EventDetails, ExecutionFailedEventDetails, HistoryEvent, HistoryEventType};
use crate::asl::error_name::{ErrorName, StatesErrorName};
use crate::asl::{EvalError, EvalResult, FailureEvent, State, StateMachine, Transition};

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Still being evaluated.
    Running,
    /// Reached a terminal success.
    Succeeded,
    /// Terminated by a failure event.
    Failed,
    /// Stopped by its host.
    Aborted,
}

/// Final outcome of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// Execution identifier.
    pub execution_id: ExecutionId,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Output of a successful execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Error and cause of a failed execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionFailedEventDetails>,
    /// Complete history.
    pub history: Vec<HistoryEvent>,
}

/// Host-side half of a stop channel.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Request the execution to stop. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Execution-side half of a stop channel.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Complete once a stop is requested.
    ///
    /// Never completes if every [`StopHandle`] is dropped without stopping.
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// Create a connected stop handle and signal.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

enum StepOutcome {
    Continue,
    Stopped,
}

/// Evaluates executions of one state machine.
#[derive(Debug, Clone)]
pub struct Executor {
    machine: Arc<StateMachine>,
}

impl Executor {
    /// Create an evaluator for `machine`.
    pub fn new(machine: Arc<StateMachine>) -> Self {
        Self { machine }
    }

    /// Run an execution to completion.
    ///
    /// `env` must hold the execution input as its only stacked value.
    pub async fn run(&self, mut env: Environment, mut stop: StopSignal) -> ExecutionReport {
        self.start(&mut env);

        let mut current = self.machine.start_at().to_string();
        loop {
            if stop.is_stopped() {
                return abort(env);
            }

            let Some(state) = self.machine.state(&current) else {
                let event = FailureEvent::runtime(
                    env.execution_id(),
                    format!("State '{}' does not exist", current),
                );
                return fail(env, event);
            };

            let state_input = env.peek().cloned().unwrap_or(Value::Null);
            env.record(
                state.entered_event_type(),
                EventDetails::state_entered(state.name(), &state_input),
            );
            debug!(execution_id = %env.execution_id(), state = %state.name(), "state entered");

            match self.eval_state(state, &mut env, &state_input, &mut stop).await {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Stopped) => return abort(env),
                Err(err) => {
                    let event = into_failure(&env, err);
                    return fail(env, event);
                }
            }

            let output = env.peek().cloned().unwrap_or(Value::Null);
            if let Some(exited) = state.exited_event_type() {
                env.record(exited, EventDetails::state_exited(state.name(), &output));
            }

            match &state.common().transition {
                Transition::Next(next) => current = next.clone(),
                Transition::End => return succeed(env, output),
            }
        }
    }

    /// Abort an execution that was stopped before it could start evaluating.
    ///
    /// The history still opens with `ExecutionStarted`, so every history has
    /// the same shape.
    pub fn abort_unstarted(&self, mut env: Environment) -> ExecutionReport {
        self.start(&mut env);
        abort(env)
    }

    fn start(&self, env: &mut Environment) {
        let input = env.peek().cloned().unwrap_or(Value::Null);
        env.record(
            HistoryEventType::ExecutionStarted,
            EventDetails::execution_started(&input),
        );
        info!(
            execution_id = %env.execution_id(),
            start_at = %self.machine.start_at(),
            "execution started"
        );
    }

    async fn eval_state(
        &self,
        state: &State,
        env: &mut Environment,
        state_input: &Value,
        stop: &mut StopSignal,
    ) -> EvalResult<StepOutcome> {
        match state {
            State::Wait(wait) => {
                let seconds = wait.wait.resolve(env)?;
                info!(
                    execution_id = %env.execution_id(),
                    state = %state.name(),
                    seconds,
                    "waiting"
                );
                if !sleep_or_stop(seconds, stop).await {
                    return Ok(StepOutcome::Stopped);
                }
            }
            State::Pass(pass) => {
                if let Some(result) = &pass.result {
                    env.pop().ok_or(EvalError::StackUnderflow)?;
                    env.push(result.clone());
                }
            }
            State::Succeed(_) => {}
            State::Fail(fail) => {
                let error_name = match &fail.error {
                    Some(name) => ErrorName::parse(name.clone()),
                    None => ErrorName::from(StatesErrorName::Fail),
                };
                let cause = fail.cause.clone().unwrap_or_default();
                return Err(FailureEvent::new(env.execution_id(), error_name, cause).into());
            }
        }

        if let Some(assign) = &state.common().assign {
            assign.apply(env, state_input)?;
        }
        Ok(StepOutcome::Continue)
    }
}

async fn sleep_or_stop(seconds: u64, stop: &mut StopSignal) -> bool {
    if seconds == 0 {
        return !stop.is_stopped();
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => true,
        _ = stop.stopped() => false,
    }
}

fn into_failure(env: &Environment, err: EvalError) -> FailureEvent {
    match err {
        EvalError::Failure(event) => *event,
        other => FailureEvent::runtime(env.execution_id(), other.to_string()),
    }
}

fn succeed(mut env: Environment, output: Value) -> ExecutionReport {
    env.record(
        HistoryEventType::ExecutionSucceeded,
        EventDetails::execution_succeeded(&output),
    );
    info!(execution_id = %env.execution_id(), "execution succeeded");
    report(env, ExecutionStatus::Succeeded, Some(output), None)
}

fn fail(mut env: Environment, event: FailureEvent) -> ExecutionReport {
    env.record(event.event_type, event.event_details());
    warn!(
        execution_id = %env.execution_id(),
        error = %event.error(),
        cause = %event.cause(),
        "execution failed"
    );
    report(env, ExecutionStatus::Failed, None, Some(event.details))
}

fn abort(mut env: Environment) -> ExecutionReport {
    env.record(
        HistoryEventType::ExecutionAborted,
        EventDetails::execution_aborted(None),
    );
    warn!(execution_id = %env.execution_id(), "execution aborted");
    report(env, ExecutionStatus::Aborted, None, None)
}

fn report(
    env: Environment,
    status: ExecutionStatus,
    output: Option<Value>,
    error: Option<ExecutionFailedEventDetails>,
) -> ExecutionReport {
    let execution_id = env.execution_id().clone();
    ExecutionReport {
        execution_id,
        status,
        output,
        error,
        history: env.into_history().into_events(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn machine(source: &str) -> Arc<StateMachine> {
        Arc::new(StateMachine::from_json(source).unwrap())
    }

    fn event_types(report: &ExecutionReport) -> Vec<HistoryEventType> {
        report.history.iter().map(|event| event.event_type).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_result_and_assign() {
        let machine = machine(
            r#"{
                "StartAt": "Set",
                "States": {
                    "Set": {
                        "Type": "Pass",
                        "Result": { "ok": true },
                        "Assign": { "delay.$": "$.delay" },
                        "Next": "Pause"
                    },
                    "Pause": { "Type": "Wait", "SecondsPath": "$delay", "End": true }
                }
            }"#,
        );
        let env = Environment::new(ExecutionId::new(), json!({"delay": 2}));
        let (_handle, signal) = stop_channel();

        let report = Executor::new(machine).run(env, signal).await;

        assert_eq!(report.status, ExecutionStatus::Succeeded);
        assert_eq!(report.output, Some(json!({"ok": true})));
        assert_eq!(
            event_types(&report),
            vec![
                HistoryEventType::ExecutionStarted,
                HistoryEventType::PassStateEntered,
                HistoryEventType::PassStateExited,
                HistoryEventType::WaitStateEntered,
                HistoryEventType::WaitStateExited,
                HistoryEventType::ExecutionSucceeded,
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_state_uses_custom_error() {
        let machine = machine(
            r#"{
                "StartAt": "Reject",
                "States": {
                    "Reject": { "Type": "Fail", "Error": "OrderRejected", "Cause": "no stock" }
                }
            }"#,
        );
        let env = Environment::new(ExecutionId::new(), json!({}));
        let (_handle, signal) = stop_channel();

        let report = Executor::new(machine).run(env, signal).await;

        assert_eq!(report.status, ExecutionStatus::Failed);
        let error = report.error.unwrap();
        assert_eq!(error.error, "OrderRejected");
        assert_eq!(error.cause, "no stock");
        assert_eq!(
            report.history.last().unwrap().event_type,
            HistoryEventType::ExecutionFailed
        );
    }

    #[tokio::test]
    async fn test_fail_state_defaults_to_states_fail() {
        let machine = machine(r#"{ "StartAt": "F", "States": { "F": { "Type": "Fail" } } }"#);
        let env = Environment::new(ExecutionId::new(), json!({}));
        let (_handle, signal) = stop_channel();

        let report = Executor::new(machine).run(env, signal).await;
        assert_eq!(report.error.unwrap().error, "States.Fail");
    }

    #[tokio::test]
    async fn test_extraction_error_becomes_runtime_failure() {
        let machine = machine(
            r#"{ "StartAt": "W", "States": { "W": { "Type": "Wait", "SecondsPath": "$.missing", "End": true } } }"#,
        );
        let env = Environment::new(ExecutionId::new(), json!({}));
        let (_handle, signal) = stop_channel();

        let report = Executor::new(machine).run(env, signal).await;

        let error = report.error.unwrap();
        assert_eq!(error.error, "States.Runtime");
        assert!(error.cause.contains("$.missing"));
    }

    #[tokio::test]
    async fn test_stop_before_start_aborts() {
        let machine = machine(r#"{ "StartAt": "S", "States": { "S": { "Type": "Succeed" } } }"#);
        let env = Environment::new(ExecutionId::new(), json!({}));
        let (handle, signal) = stop_channel();
        handle.stop();

        let report = Executor::new(machine).run(env, signal).await;
        assert_eq!(report.status, ExecutionStatus::Aborted);
        assert_eq!(
            event_types(&report),
            vec![
                HistoryEventType::ExecutionStarted,
                HistoryEventType::ExecutionAborted
            ]
        );
    }

    #[test]
    fn test_abort_unstarted_records_start_and_abort() {
        let machine = machine(r#"{ "StartAt": "S", "States": { "S": { "Type": "Succeed" } } }"#);
        let env = Environment::new(ExecutionId::new(), json!({"queued": true}));

        let report = Executor::new(machine).abort_unstarted(env);

        assert_eq!(report.status, ExecutionStatus::Aborted);
        assert_eq!(
            event_types(&report),
            vec![
                HistoryEventType::ExecutionStarted,
                HistoryEventType::ExecutionAborted
            ]
        );
    }

    #[tokio::test]
    async fn test_dropped_stop_handle_never_fires() {
        let (handle, mut signal) = stop_channel();
        drop(handle);
        let stopped = tokio::time::timeout(Duration::from_millis(20), signal.stopped()).await;
        assert!(stopped.is_err());
    }
}
