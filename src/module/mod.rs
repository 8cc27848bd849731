//! Executable units and their composition surface
//!
//! A [`Module`] is a stateless-or-configuration-only capability exposing one
//! operation: `effect(input, options)`, returning a deferred [`Effect`].
//! Everything else (the four invocation entry points, chaining, fan-out,
//! option binding, fault handling) is built generically on top of that one
//! operation and never reimplemented per module.
//!
//! Modules are immutable after construction and shared as `Arc<dyn Module>`;
//! configuration changes always produce a new value.

pub mod builders;
pub mod decorator;
pub mod fallback;
pub mod options;
pub mod parallel;
pub mod passthrough;
pub mod retry;
pub mod sequential;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::effect::{Effect, EffectIter, EffectStream};
use crate::error::{ErrorMatcher, Result};

use decorator::{Decorator, Policy};
use fallback::FallbackChain;
use options::Options;
use retry::RetryPolicy;
use sequential::Sequential;

/// Shared handle to any module.
pub type DynModule = Arc<dyn Module>;

/// An executable unit producing a deferred effect per invocation.
#[async_trait]
pub trait Module: Send + Sync {
    /// Produce a fresh effect for the given input and options.
    ///
    /// This is the only operation implementors define; the entry points
    /// below derive from it.
    fn effect(&self, input: Value, options: &Options) -> Effect<Value>;

    /// Optional human-readable name.
    fn name(&self) -> Option<String> {
        None
    }

    /// Optional input type descriptor for external tooling; never read
    /// during execution.
    fn input_type(&self) -> Option<TypeInfo> {
        None
    }

    /// Optional output type descriptor for external tooling; never read
    /// during execution.
    fn output_type(&self) -> Option<TypeInfo> {
        None
    }

    /// Structural hook used for chain splicing.
    #[doc(hidden)]
    fn as_sequential(&self) -> Option<&Sequential> {
        None
    }

    /// Structural hook used for decorator merging.
    #[doc(hidden)]
    fn as_decorator(&self) -> Option<&Decorator> {
        None
    }

    /// Blocking scalar invocation. Must not be called from an async context.
    fn blocking_invoke(&self, input: Value, options: &Options) -> Result<Value> {
        self.effect(input, options).blocking_resolve()
    }

    /// Suspending scalar invocation.
    async fn invoke(&self, input: Value, options: &Options) -> Result<Value> {
        self.effect(input, options).resolve().await
    }

    /// Blocking lazy iteration. Must not be called from an async context.
    fn blocking_iter(&self, input: Value, options: &Options) -> Result<EffectIter<Value>> {
        self.effect(input, options).blocking_iter()
    }

    /// Suspension-driven lazy iteration.
    fn stream(&self, input: Value, options: &Options) -> Result<EffectStream<Value>> {
        self.effect(input, options).stream()
    }
}

/// Combinators available on any shared module handle.
pub trait ModuleExt {
    /// Sequential-combine: run `self`, then feed its output to `next`.
    ///
    /// If either operand is already a chain its step list is spliced rather
    /// than nested, so combination is associative.
    fn then(&self, next: DynModule) -> Sequential;

    /// Bind default options, merged under call-time options on invocation.
    ///
    /// Binding an already-bound module merges into its defaults; the
    /// original is never mutated.
    fn bind(&self, defaults: Options) -> Decorator;

    /// Override the input/output type descriptors.
    fn with_types(&self, input_type: Option<TypeInfo>, output_type: Option<TypeInfo>)
        -> Decorator;

    /// Wrap with a retry policy.
    fn with_retry(&self, policy: RetryPolicy) -> Decorator;

    /// Wrap with an ordered fallback chain. An empty `recoverable` list
    /// treats every error as recoverable.
    fn with_fallbacks(&self, fallbacks: Vec<DynModule>, recoverable: Vec<ErrorMatcher>)
        -> Decorator;
}

impl ModuleExt for DynModule {
    fn then(&self, next: DynModule) -> Sequential {
        Sequential::join(Arc::clone(self), next)
    }

    fn bind(&self, defaults: Options) -> Decorator {
        match self.as_decorator() {
            Some(decorator) => decorator.bind(defaults),
            None => Decorator::new(Arc::clone(self)).bind(defaults),
        }
    }

    fn with_types(
        &self,
        input_type: Option<TypeInfo>,
        output_type: Option<TypeInfo>,
    ) -> Decorator {
        match self.as_decorator() {
            Some(decorator) => decorator.with_types(input_type, output_type),
            None => Decorator::new(Arc::clone(self)).with_types(input_type, output_type),
        }
    }

    fn with_retry(&self, policy: RetryPolicy) -> Decorator {
        match self.as_decorator() {
            Some(decorator) => decorator.with_retry(policy),
            None => Decorator::with_policy(Arc::clone(self), Policy::Retry(policy)),
        }
    }

    fn with_fallbacks(
        &self,
        fallbacks: Vec<DynModule>,
        recoverable: Vec<ErrorMatcher>,
    ) -> Decorator {
        let chain = FallbackChain::new(fallbacks).recoverable_on(recoverable);
        match self.as_decorator() {
            Some(decorator) => decorator.with_fallbacks(chain),
            None => Decorator::with_policy(Arc::clone(self), Policy::Fallbacks(chain)),
        }
    }
}

/// Type descriptor attached to modules for external documentation tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    name: String,
}

impl TypeInfo {
    /// Descriptor derived from a Rust type name.
    pub fn of<T>() -> Self {
        Self {
            name: std::any::type_name::<T>().to_string(),
        }
    }

    /// Descriptor with an explicit name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The described type's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn increment() -> DynModule {
        builders::from_blocking(|input: Value, _options| {
            Ok(json!(input.as_i64().unwrap_or(0) + 1))
        })
    }

    #[test]
    fn test_blocking_invoke_matches_plain_function() {
        let module = increment();
        let output = module.blocking_invoke(json!(1), &Options::new()).unwrap();
        assert_eq!(output, json!(2));
    }

    #[tokio::test]
    async fn test_invoke_matches_plain_function() {
        let module = increment();
        let output = module.invoke(json!(1), &Options::new()).await.unwrap();
        assert_eq!(output, json!(2));
    }

    #[tokio::test]
    async fn test_stream_entry_point_wraps_scalar() {
        let module = builders::from_blocking(|input: Value, _options| Ok(input));
        let mut stream = module.stream(json!("x"), &Options::new()).unwrap();
        use futures::StreamExt;
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, json!("x"));
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_type_info_of() {
        let info = TypeInfo::of::<String>();
        assert!(info.name().contains("String"));
        assert_eq!(TypeInfo::named("Document").name(), "Document");
    }
}
