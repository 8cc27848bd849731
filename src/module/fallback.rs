//! Ordered fallback chains
//!
//! A fallback chain tries the bound module first, then each alternative in
//! order, always at the suspending level. Every candidate receives the
//! original input and options plus two context entries (the earliest and
//! most recent recoverable errors seen so far) so later candidates can
//! adapt to prior failures. Non-recoverable errors abandon the chain
//! immediately; an exhausted chain fails with the first recorded error.

use serde_json::Value;
use tracing::warn;

use crate::effect::Effect;
use crate::error::{Error, ErrorMatcher};
use crate::module::options::Options;
use crate::module::DynModule;

/// Option key carrying the earliest recoverable error seen so far.
pub const FIRST_ERROR_KEY: &str = "first_error";

/// Option key carrying the most recent recoverable error.
pub const LAST_ERROR_KEY: &str = "last_error";

/// Ordered alternatives plus the recoverable-error filter.
#[derive(Clone)]
pub struct FallbackChain {
    fallbacks: Vec<DynModule>,
    recoverable: Vec<ErrorMatcher>,
}

impl FallbackChain {
    /// A chain over the given alternatives treating every error as
    /// recoverable.
    pub fn new(fallbacks: Vec<DynModule>) -> Self {
        Self {
            fallbacks,
            recoverable: Vec::new(),
        }
    }

    /// Restrict the recoverable errors; an empty list keeps every error
    /// recoverable.
    pub fn recoverable_on(mut self, matchers: Vec<ErrorMatcher>) -> Self {
        self.recoverable = matchers;
        self
    }

    /// The ordered alternatives.
    pub fn fallbacks(&self) -> &[DynModule] {
        &self.fallbacks
    }

    /// True when the chain intercepts this failure.
    pub fn is_recoverable(&self, error: &Error) -> bool {
        ErrorMatcher::any_match(&self.recoverable, error)
    }
}

/// The suspending candidate loop over a bound module and its alternatives.
pub(crate) fn fallback_effect(
    bound: DynModule,
    chain: FallbackChain,
    input: Value,
    options: Options,
) -> Effect<Value> {
    Effect::from_future(async move {
        let mut first_error: Option<Error> = None;
        let mut last_error_text: Option<String> = None;

        let candidates: Vec<DynModule> =
            std::iter::once(bound).chain(chain.fallbacks.iter().cloned()).collect();
        for (index, candidate) in candidates.iter().enumerate() {
            let mut candidate_options = options.clone();
            candidate_options.insert(
                FIRST_ERROR_KEY,
                first_error
                    .as_ref()
                    .map(|err| Value::String(err.to_string()))
                    .unwrap_or(Value::Null),
            );
            candidate_options.insert(
                LAST_ERROR_KEY,
                last_error_text
                    .as_ref()
                    .map(|text| Value::String(text.clone()))
                    .unwrap_or(Value::Null),
            );

            match candidate.effect(input.clone(), &candidate_options).resolve().await {
                Ok(value) => return Ok(value),
                Err(err) if chain.is_recoverable(&err) => {
                    warn!(candidate = index, error = %err, "fallback candidate failed");
                    last_error_text = Some(err.to_string());
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Err(Error::internal(
                "fallback chain exhausted with no recorded error",
            )),
        }
    })
}
