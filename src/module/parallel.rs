//! Named concurrent fan-out over a shared input
//!
//! Every branch receives a clone of the same input and options; branches run
//! concurrently on the ambient scheduler and are joined with join-all
//! semantics. Branches are never cancelled: on failure every sibling still
//! runs to completion and the reported error is the first failing branch in
//! declared key order, independent of completion timing.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::warn;

use crate::effect::Effect;
use crate::error::{Error, Result};
use crate::module::options::Options;
use crate::module::{DynModule, Module, TypeInfo};

/// A named fan-out of modules over one input snapshot.
pub struct Parallel {
    name: Option<String>,
    branches: Vec<(String, DynModule)>,
}

impl Parallel {
    /// Build a fan-out from named branches. Branch names must be unique;
    /// their order fixes the key order of the result object.
    pub fn new<S: Into<String>>(branches: Vec<(S, DynModule)>) -> Result<Self> {
        let branches: Vec<(String, DynModule)> = branches
            .into_iter()
            .map(|(name, module)| (name.into(), module))
            .collect();
        let mut seen = HashSet::new();
        for (name, _) in &branches {
            if !seen.insert(name.clone()) {
                return Err(Error::construction(format!(
                    "duplicate parallel branch name: {name}"
                )));
            }
        }
        Ok(Self {
            name: None,
            branches,
        })
    }

    /// Set an explicit name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The named branches in declared order.
    pub fn branches(&self) -> &[(String, DynModule)] {
        &self.branches
    }

    /// Convert into a shared module handle.
    pub fn into_dyn(self) -> DynModule {
        Arc::new(self)
    }
}

impl Module for Parallel {
    fn effect(&self, input: Value, options: &Options) -> Effect<Value> {
        let branches = self.branches.clone();
        let options = options.clone();
        Effect::from_future(async move {
            let tasks = branches.iter().map(|(name, module)| {
                let module = Arc::clone(module);
                let input = input.clone();
                let options = options.clone();
                let name = name.clone();
                async move {
                    let result = module.effect(input, &options).resolve().await;
                    if let Err(err) = &result {
                        warn!(branch = %name, error = %err, "parallel branch failed");
                    }
                    result
                }
            });
            let results = join_all(tasks).await;

            let mut object = Map::new();
            let mut first_error = None;
            for ((name, _), result) in branches.iter().zip(results) {
                match result {
                    Ok(value) => {
                        object.insert(name.clone(), value);
                    }
                    Err(err) => {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
            }
            match first_error {
                Some(err) => Err(err),
                None => Ok(Value::Object(object)),
            }
        })
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone().unwrap_or_else(|| {
            let keys: Vec<&str> = self.branches.iter().map(|(name, _)| name.as_str()).collect();
            format!("parallel<{}>", keys.join(", "))
        }))
    }

    fn input_type(&self) -> Option<TypeInfo> {
        self.branches
            .iter()
            .find_map(|(_, module)| module.input_type())
    }
}
