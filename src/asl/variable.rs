//! Variable samples: `$name` expressions over execution variables.
//!
//! A sample names a variable and an optional reference path into its value
//! (`$order.items[0]`). Evaluating a sample follows the shared expression
//! protocol: the result is pushed onto the environment stack and the caller
//! pops it.

use super::error::{EvalError, EvalResult, PathError};
use super::json_path::{extract_json, parse_path};
use crate::runtime::environment::Environment;

/// A parsed `$name[.path]` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSample {
    expression: String,
    name: String,
    tail: String,
}

impl VariableSample {
    /// Parse a variable expression.
    pub fn parse(expression: &str) -> Result<Self, PathError> {
        let invalid = |reason: &str| PathError::Invalid {
            path: expression.to_string(),
            reason: reason.to_string(),
        };
        if !is_variable_reference(expression) {
            return Err(invalid("variable references must look like '$name'"));
        }

        let body = &expression[1..];
        let name_len = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(body.len());
        let (name, tail) = body.split_at(name_len);
        if !tail.is_empty() {
            parse_path(&format!("${}", tail))
                .map_err(|_| invalid("invalid path after variable name"))?;
        }

        Ok(Self {
            expression: expression.to_string(),
            name: name.to_string(),
            tail: tail.to_string(),
        })
    }

    /// Original expression text.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Referenced variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the sample and push exactly one value onto the stack.
    ///
    /// On error nothing is pushed.
    pub fn eval(&self, env: &mut Environment) -> EvalResult<()> {
        let value = env
            .variables()
            .get(&self.name)
            .ok_or_else(|| EvalError::UndefinedVariable(self.name.clone()))?;
        let selected = if self.tail.is_empty() {
            value.clone()
        } else {
            extract_json(&format!("${}", self.tail), value).map_err(|err| match err {
                PathError::NotFound { segment, .. } => PathError::NotFound {
                    path: self.expression.clone(),
                    segment,
                },
                other => other,
            })?
        };
        env.push(selected);
        Ok(())
    }
}

/// Whether `text` names a variable (`$name…`) rather than an input path (`$.…`).
pub fn is_variable_reference(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some('$')
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::environment::ExecutionId;
    use serde_json::{Value, json};

    #[test]
    fn test_distinguishes_variables_from_paths() {
        assert!(is_variable_reference("$delay"));
        assert!(is_variable_reference("$_x.y"));
        assert!(!is_variable_reference("$.delay"));
        assert!(!is_variable_reference("$$.Execution"));
        assert!(!is_variable_reference("$"));
    }

    #[test]
    fn test_eval_pushes_selected_value() {
        let mut env = Environment::new(ExecutionId::new(), Value::Null);
        env.variables_mut()
            .set("config", json!({"retry": {"delay": 4}}));

        let sample = VariableSample::parse("$config.retry.delay").unwrap();
        assert_eq!(sample.name(), "config");
        sample.eval(&mut env).unwrap();

        assert_eq!(env.stack_depth(), 2);
        assert_eq!(env.pop(), Some(json!(4)));
    }

    #[test]
    fn test_eval_undefined_variable_pushes_nothing() {
        let mut env = Environment::new(ExecutionId::new(), Value::Null);
        let sample = VariableSample::parse("$missing").unwrap();

        let err = sample.eval(&mut env).unwrap_err();
        assert!(matches!(err, EvalError::UndefinedVariable(name) if name == "missing"));
        assert_eq!(env.stack_depth(), 1);
    }

    #[test]
    fn test_missing_member_reports_full_expression() {
        let mut env = Environment::new(ExecutionId::new(), Value::Null);
        env.variables_mut().set("config", json!({}));
        let sample = VariableSample::parse("$config.delay").unwrap();

        match sample.eval(&mut env).unwrap_err() {
            EvalError::Path(PathError::NotFound { path, .. }) => {
                assert_eq!(path, "$config.delay")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
