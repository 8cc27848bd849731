//! Generic wrapping of a bound module
//!
//! A decorator holds exactly one bound module, a default-options bag merged
//! under call-time options, optional type-descriptor overrides, and a tagged
//! fault policy. A passthrough decorator is a transparent conduit; retry and
//! fallback policies intercept failures. All configuration methods return a
//! new decorator; existing instances are never mutated.

use std::sync::Arc;

use serde_json::Value;

use crate::effect::Effect;
use crate::module::fallback::{self, FallbackChain};
use crate::module::options::Options;
use crate::module::retry::{self, RetryPolicy};
use crate::module::{DynModule, Module, TypeInfo};

/// A module wrapping another module with merged configuration.
#[derive(Clone)]
pub struct Decorator {
    bound: DynModule,
    defaults: Options,
    input_type: Option<TypeInfo>,
    output_type: Option<TypeInfo>,
    policy: Policy,
}

/// Fault-handling behavior attached to a decorator.
#[derive(Clone)]
pub(crate) enum Policy {
    Passthrough,
    Retry(RetryPolicy),
    Fallbacks(FallbackChain),
}

impl Decorator {
    /// A transparent decorator around the given module.
    pub fn new(bound: DynModule) -> Self {
        Self::with_policy(bound, Policy::Passthrough)
    }

    pub(crate) fn with_policy(bound: DynModule, policy: Policy) -> Self {
        Self {
            bound,
            defaults: Options::new(),
            input_type: None,
            output_type: None,
            policy,
        }
    }

    /// The wrapped module.
    pub fn bound(&self) -> &DynModule {
        &self.bound
    }

    /// Convert into a shared module handle.
    pub fn into_dyn(self) -> DynModule {
        Arc::new(self)
    }

    /// The default options merged under call-time options.
    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    /// A new decorator whose defaults are this decorator's defaults merged
    /// with `options` (new entries win).
    pub fn bind(&self, options: Options) -> Decorator {
        Decorator {
            bound: Arc::clone(&self.bound),
            defaults: self.defaults.merged(&options),
            input_type: self.input_type.clone(),
            output_type: self.output_type.clone(),
            policy: self.policy.clone(),
        }
    }

    /// A new decorator with type-descriptor overrides; `None` keeps the
    /// existing override.
    pub fn with_types(
        &self,
        input_type: Option<TypeInfo>,
        output_type: Option<TypeInfo>,
    ) -> Decorator {
        Decorator {
            bound: Arc::clone(&self.bound),
            defaults: self.defaults.clone(),
            input_type: input_type.or_else(|| self.input_type.clone()),
            output_type: output_type.or_else(|| self.output_type.clone()),
            policy: self.policy.clone(),
        }
    }

    /// A new decorator applying a retry policy.
    ///
    /// On a passthrough decorator the policy wraps the *bound* module and the
    /// current option/type overrides are re-applied on top, so the stack is
    /// rebuilt without losing outer configuration. A decorator already
    /// carrying a fault policy is wrapped as a whole.
    pub fn with_retry(&self, policy: RetryPolicy) -> Decorator {
        self.with_fault_policy(Policy::Retry(policy))
    }

    /// A new decorator applying a fallback chain; same rebuild rules as
    /// [`Decorator::with_retry`].
    pub fn with_fallbacks(&self, chain: FallbackChain) -> Decorator {
        self.with_fault_policy(Policy::Fallbacks(chain))
    }

    fn with_fault_policy(&self, policy: Policy) -> Decorator {
        let bound: DynModule = match &self.policy {
            Policy::Passthrough => Arc::new(Self::with_policy(Arc::clone(&self.bound), policy)),
            _ => Arc::new(Self::with_policy(
                Arc::new(self.clone()) as DynModule,
                policy,
            )),
        };
        Decorator {
            bound,
            defaults: self.defaults.clone(),
            input_type: self.input_type.clone(),
            output_type: self.output_type.clone(),
            policy: Policy::Passthrough,
        }
    }
}

impl Module for Decorator {
    fn effect(&self, input: Value, options: &Options) -> Effect<Value> {
        let merged = self.defaults.merged(options);
        match &self.policy {
            Policy::Passthrough => self.bound.effect(input, &merged),
            Policy::Retry(policy) => {
                retry::retry_effect(Arc::clone(&self.bound), policy.clone(), input, merged)
            }
            Policy::Fallbacks(chain) => {
                fallback::fallback_effect(Arc::clone(&self.bound), chain.clone(), input, merged)
            }
        }
    }

    fn name(&self) -> Option<String> {
        self.bound.name()
    }

    fn input_type(&self) -> Option<TypeInfo> {
        self.input_type
            .clone()
            .or_else(|| self.bound.input_type())
    }

    fn output_type(&self) -> Option<TypeInfo> {
        self.output_type
            .clone()
            .or_else(|| self.bound.output_type())
    }

    fn as_decorator(&self) -> Option<&Decorator> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::builders::from_blocking;
    use crate::module::ModuleExt;
    use serde_json::json;

    fn echo_options() -> DynModule {
        from_blocking(|_, options: Options| Ok(serde_json::to_value(options)?))
    }

    #[test]
    fn test_bind_merges_and_never_mutates() {
        let module = echo_options();
        let bound = module.bind(Options::new().with("x", 1));
        let rebound = bound.bind(Options::new().with("y", 2));

        assert_eq!(bound.defaults().len(), 1);
        assert_eq!(rebound.defaults().len(), 2);
        assert_eq!(rebound.defaults().get("x"), Some(&json!(1)));
        assert_eq!(rebound.defaults().get("y"), Some(&json!(2)));
    }

    #[test]
    fn test_call_time_options_win() {
        let module = echo_options();
        let bound = module.bind(Options::new().with("mode", "default"));
        let output = bound
            .blocking_invoke(json!(null), &Options::new().with("mode", "override"))
            .unwrap();
        assert_eq!(output, json!({"mode": "override"}));
    }

    #[test]
    fn test_bind_through_dyn_handle_merges() {
        let module = echo_options();
        let bound: DynModule = Arc::new(module.bind(Options::new().with("x", 1)));
        let rebound = bound.bind(Options::new().with("y", 2));
        // Merged rather than nested: one decorator with both defaults.
        assert_eq!(rebound.defaults().len(), 2);
    }

    #[test]
    fn test_type_overrides_delegate_and_override() {
        let module = echo_options();
        let decorator = module.with_types(Some(TypeInfo::named("Query")), None);
        assert_eq!(decorator.input_type().unwrap().name(), "Query");
        assert!(decorator.output_type().is_none());

        let widened = decorator.with_types(None, Some(TypeInfo::named("Report")));
        assert_eq!(widened.input_type().unwrap().name(), "Query");
        assert_eq!(widened.output_type().unwrap().name(), "Report");
    }

    #[test]
    fn test_name_delegates_to_bound() {
        let module = crate::module::passthrough::passthrough();
        let decorator = module.bind(Options::new());
        assert_eq!(decorator.name().as_deref(), Some("passthrough"));
    }

    #[test]
    fn test_with_retry_rebuilds_around_bound() {
        let module = echo_options();
        let configured = module
            .bind(Options::new().with("mode", "strict"))
            .with_types(Some(TypeInfo::named("Query")), None);
        let retried = configured.with_retry(RetryPolicy::default());

        // Outer configuration survives the rebuild.
        assert_eq!(retried.defaults().get("mode"), Some(&json!("strict")));
        assert_eq!(retried.input_type().unwrap().name(), "Query");
        // The retry policy sits between the outer decorator and the module.
        assert!(retried.bound().as_decorator().is_some());
    }

    #[test]
    fn test_decorated_output_still_sees_defaults() {
        let module = echo_options();
        let retried = module
            .bind(Options::new().with("mode", "strict"))
            .with_retry(RetryPolicy::default());
        let output = retried
            .blocking_invoke(json!(null), &Options::new())
            .unwrap();
        assert_eq!(output, json!({"mode": "strict"}));
    }
}
