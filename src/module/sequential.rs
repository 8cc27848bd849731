//! Ordered chains of modules
//!
//! A chain runs its first step on the pipeline input and feeds each step's
//! output to the next via effect composition. Options are passed unchanged
//! to every step; intermediate outputs never rewrite them. Construction
//! flattens nested chains, so combining chains in any grouping yields the
//! same step list.

use std::sync::Arc;

use serde_json::Value;

use crate::effect::Effect;
use crate::error::{Error, Result};
use crate::module::options::Options;
use crate::module::{DynModule, Module, TypeInfo};

/// An ordered chain of at least two modules.
pub struct Sequential {
    name: Option<String>,
    steps: Vec<DynModule>,
}

impl Sequential {
    /// Build a chain from the given steps, splicing any nested chains.
    ///
    /// Fails when fewer than two steps remain after flattening.
    pub fn new(steps: Vec<DynModule>) -> Result<Self> {
        let steps = Self::flatten(steps);
        if steps.len() < 2 {
            return Err(Error::construction(format!(
                "sequential requires at least 2 steps, got {}",
                steps.len()
            )));
        }
        Ok(Self { name: None, steps })
    }

    /// Combine two modules into a chain, splicing either side's steps.
    pub(crate) fn join(first: DynModule, second: DynModule) -> Sequential {
        Sequential {
            name: None,
            steps: Self::flatten(vec![first, second]),
        }
    }

    fn flatten(steps: Vec<DynModule>) -> Vec<DynModule> {
        let mut flat = Vec::with_capacity(steps.len());
        for step in steps {
            match step.as_sequential() {
                Some(inner) => flat.extend(inner.steps.iter().cloned()),
                None => flat.push(step),
            }
        }
        flat
    }

    /// Set an explicit name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The flattened step list.
    pub fn steps(&self) -> &[DynModule] {
        &self.steps
    }

    /// Convert into a shared module handle.
    pub fn into_dyn(self) -> DynModule {
        Arc::new(self)
    }

    /// Append another module, splicing if it is itself a chain.
    pub fn then(&self, next: DynModule) -> Sequential {
        let mut steps = self.steps.clone();
        match next.as_sequential() {
            Some(inner) => steps.extend(inner.steps.iter().cloned()),
            None => steps.push(next),
        }
        Sequential {
            name: self.name.clone(),
            steps,
        }
    }
}

impl Module for Sequential {
    fn effect(&self, input: Value, options: &Options) -> Effect<Value> {
        let mut effect = match self.steps.first() {
            Some(first) => first.effect(input, options),
            None => return Effect::failure(Error::internal("sequential chain with no steps")),
        };
        for step in &self.steps[1..] {
            let step = Arc::clone(step);
            let options = options.clone();
            effect = effect.flat_map(move |output| step.effect(output, &options));
        }
        effect
    }

    fn name(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.steps.first().and_then(|step| step.name()))
            .or_else(|| self.steps.last().and_then(|step| step.name()))
    }

    fn input_type(&self) -> Option<TypeInfo> {
        self.steps.first().and_then(|step| step.input_type())
    }

    fn output_type(&self) -> Option<TypeInfo> {
        self.steps.last().and_then(|step| step.output_type())
    }

    fn as_sequential(&self) -> Option<&Sequential> {
        Some(self)
    }
}
