//! Structural modules: identity and key selection

use std::sync::Arc;

use serde_json::Value;

use crate::effect::Effect;
use crate::error::Error;
use crate::module::options::Options;
use crate::module::{DynModule, Module};

/// Identity module: forwards its input untouched.
///
/// Useful as a fan-out branch that keeps the original input alongside
/// derived branches.
pub struct Passthrough;

impl Module for Passthrough {
    fn effect(&self, input: Value, _options: &Options) -> Effect<Value> {
        Effect::value(input)
    }

    fn name(&self) -> Option<String> {
        Some("passthrough".to_string())
    }
}

/// Shared handle to a [`Passthrough`].
pub fn passthrough() -> DynModule {
    Arc::new(Passthrough)
}

/// Selects one key out of an object input, e.g. a fan-out result.
pub struct Pick {
    key: String,
}

impl Pick {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Module for Pick {
    fn effect(&self, input: Value, _options: &Options) -> Effect<Value> {
        let key = self.key.clone();
        Effect::from_blocking(move || match input {
            Value::Object(mut map) => match map.remove(&key) {
                Some(value) => Ok(value),
                None => Err(Error::validation(
                    format!("key '{key}' not found in input"),
                    key,
                )),
            },
            other => Err(Error::validation(
                format!("expected an object to pick '{key}' from, got {}", kind_of(&other)),
                key,
            )),
        })
    }

    fn name(&self) -> Option<String> {
        Some(format!("pick({})", self.key))
    }
}

/// Shared handle to a [`Pick`].
pub fn pick(key: impl Into<String>) -> DynModule {
    Arc::new(Pick::new(key))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_passthrough_forwards_input() {
        let module = passthrough();
        let input = json!({"k": [1, 2]});
        let output = module.blocking_invoke(input.clone(), &Options::new()).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_pick_selects_key() {
        let module = pick("summary");
        let output = module
            .blocking_invoke(json!({"summary": "short", "body": "long"}), &Options::new())
            .unwrap();
        assert_eq!(output, json!("short"));
    }

    #[test]
    fn test_pick_missing_key_fails_validation() {
        let module = pick("summary");
        let err = module
            .blocking_invoke(json!({"body": "long"}), &Options::new())
            .unwrap_err();
        match err {
            Error::Validation { field, .. } => assert_eq!(field.as_deref(), Some("summary")),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_pick_non_object_fails_validation() {
        let module = pick("summary");
        let err = module
            .blocking_invoke(json!("scalar"), &Options::new())
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_pick_reports_name() {
        assert_eq!(Pick::new("x").name().as_deref(), Some("pick(x)"));
    }
}
