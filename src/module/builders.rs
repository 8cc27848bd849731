//! Tagged builders turning plain closures into modules
//!
//! Each builder declares the execution style of the wrapped closure up
//! front (blocking, suspending, sequence-producing, stream-producing, or
//! effect-returning) instead of inspecting the callable at runtime. The
//! closure receives the input value and an owned copy of the call options.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::effect::Effect;
use crate::error::{Error, Result};
use crate::module::options::Options;
use crate::module::{DynModule, Module, TypeInfo};

/// Module from a blocking function.
pub fn from_blocking<F>(f: F) -> DynModule
where
    F: Fn(Value, Options) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(BlockingFn { f: Arc::new(f) })
}

/// Module from a suspending function.
pub fn from_future<F, Fut>(f: F) -> DynModule
where
    F: Fn(Value, Options) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FutureFn { f: Arc::new(f) })
}

/// Module from a function producing a lazy blocking sequence.
pub fn from_sequence<F, I>(f: F) -> DynModule
where
    F: Fn(Value, Options) -> I + Send + Sync + 'static,
    I: Iterator<Item = Result<Value>> + Send + 'static,
{
    Arc::new(SequenceFn { f: Arc::new(f) })
}

/// Module from a function producing a lazy suspension-driven sequence.
pub fn from_stream<F, S>(f: F) -> DynModule
where
    F: Fn(Value, Options) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<Value>> + Send + 'static,
{
    Arc::new(StreamFn { f: Arc::new(f) })
}

/// Module from a function that builds its own effect.
pub fn from_effect<F>(f: F) -> DynModule
where
    F: Fn(Value, Options) -> Effect<Value> + Send + Sync + 'static,
{
    Arc::new(EffectFn { f: Arc::new(f) })
}

/// Module from a typed blocking function.
///
/// The input value is deserialized into `I` and the output serialized back
/// into a value; a shape mismatch on either side fails with a coercion
/// error. Type descriptors are populated from the Rust type names.
pub fn from_typed<I, O, F>(f: F) -> DynModule
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(I) -> Result<O> + Send + Sync + 'static,
{
    Arc::new(TypedFn {
        f: Arc::new(f),
        marker: PhantomData,
    })
}

struct BlockingFn<F> {
    f: Arc<F>,
}

impl<F> Module for BlockingFn<F>
where
    F: Fn(Value, Options) -> Result<Value> + Send + Sync + 'static,
{
    fn effect(&self, input: Value, options: &Options) -> Effect<Value> {
        let f = Arc::clone(&self.f);
        let options = options.clone();
        Effect::from_blocking(move || (*f)(input, options))
    }
}

struct FutureFn<F> {
    f: Arc<F>,
}

impl<F, Fut> Module for FutureFn<F>
where
    F: Fn(Value, Options) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
{
    fn effect(&self, input: Value, options: &Options) -> Effect<Value> {
        let f = Arc::clone(&self.f);
        let options = options.clone();
        Effect::from_future(async move { (*f)(input, options).await })
    }
}

struct SequenceFn<F> {
    f: Arc<F>,
}

impl<F, I> Module for SequenceFn<F>
where
    F: Fn(Value, Options) -> I + Send + Sync + 'static,
    I: Iterator<Item = Result<Value>> + Send + 'static,
{
    fn effect(&self, input: Value, options: &Options) -> Effect<Value> {
        let f = Arc::clone(&self.f);
        let options = options.clone();
        // Defer the producing call itself until the first pull.
        Effect::from_sequence(DeferredIter {
            seed: Some((f, input, options)),
            iter: None,
        })
    }
}

struct StreamFn<F> {
    f: Arc<F>,
}

impl<F, S> Module for StreamFn<F>
where
    F: Fn(Value, Options) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<Value>> + Send + 'static,
{
    fn effect(&self, input: Value, options: &Options) -> Effect<Value> {
        let f = Arc::clone(&self.f);
        let options = options.clone();
        // Defer the producing call until the stream is first polled.
        Effect::from_stream(stream::once(async move { (*f)(input, options) }).flatten())
    }
}

struct EffectFn<F> {
    f: Arc<F>,
}

impl<F> Module for EffectFn<F>
where
    F: Fn(Value, Options) -> Effect<Value> + Send + Sync + 'static,
{
    fn effect(&self, input: Value, options: &Options) -> Effect<Value> {
        (*self.f)(input, options.clone())
    }
}

struct TypedFn<F, I, O> {
    f: Arc<F>,
    marker: PhantomData<fn(I) -> O>,
}

impl<I, O, F> Module for TypedFn<F, I, O>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(I) -> Result<O> + Send + Sync + 'static,
{
    fn effect(&self, input: Value, _options: &Options) -> Effect<Value> {
        let f = Arc::clone(&self.f);
        Effect::from_blocking(move || {
            let typed: I = serde_json::from_value(input).map_err(|err| {
                Error::coercion_with_source(
                    format!("input does not match {}", std::any::type_name::<I>()),
                    err,
                )
            })?;
            let output = (*f)(typed)?;
            serde_json::to_value(output).map_err(|err| {
                Error::coercion_with_source(
                    format!("output {} is not serializable", std::any::type_name::<O>()),
                    err,
                )
            })
        })
    }

    fn input_type(&self) -> Option<TypeInfo> {
        Some(TypeInfo::of::<I>())
    }

    fn output_type(&self) -> Option<TypeInfo> {
        Some(TypeInfo::of::<O>())
    }
}

/// Iterator that calls its producing function on first pull.
struct DeferredIter<F, I> {
    seed: Option<(Arc<F>, Value, Options)>,
    iter: Option<I>,
}

impl<F, I> Iterator for DeferredIter<F, I>
where
    F: Fn(Value, Options) -> I,
    I: Iterator<Item = Result<Value>>,
{
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.iter.is_none() {
            let (f, input, options) = self.seed.take()?;
            self.iter = Some((*f)(input, options));
        }
        self.iter.as_mut()?.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleExt;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_from_blocking() {
        let module = from_blocking(|input: Value, _| Ok(json!([input, "tail"])));
        let output = module.blocking_invoke(json!("head"), &Options::new()).unwrap();
        assert_eq!(output, json!(["head", "tail"]));
    }

    #[tokio::test]
    async fn test_from_future() {
        let module = from_future(|input: Value, _| async move { Ok(input) });
        let output = module.invoke(json!(9), &Options::new()).await.unwrap();
        assert_eq!(output, json!(9));
    }

    #[test]
    fn test_from_sequence_is_lazy_and_iterates() {
        let module = from_sequence(|input: Value, _| {
            let n = input.as_u64().unwrap_or(0);
            (0..n).map(|i| Ok(json!(i)))
        });
        let items: Vec<Value> = module
            .blocking_iter(json!(3), &Options::new())
            .unwrap()
            .map(|item| item.unwrap())
            .collect();
        assert_eq!(items, vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_sequence_scalar_invoke_yields_final_element() {
        let module = from_sequence(|_, _| vec![Ok(json!("a")), Ok(json!("b"))].into_iter());
        let output = module.blocking_invoke(Value::Null, &Options::new()).unwrap();
        assert_eq!(output, json!("b"));
    }

    #[tokio::test]
    async fn test_from_stream() {
        use futures::StreamExt;
        let module = from_stream(|input: Value, _| {
            stream::iter(vec![Ok(input.clone()), Ok(json!("next"))])
        });
        let items: Vec<Value> = module
            .stream(json!("first"), &Options::new())
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![json!("first"), json!("next")]);
    }

    #[test]
    fn test_from_effect() {
        let module = from_effect(|input: Value, _| Effect::value(input).map(|v| json!([v])));
        let output = module.blocking_invoke(json!(1), &Options::new()).unwrap();
        assert_eq!(output, json!([1]));
    }

    #[test]
    fn test_options_reach_the_closure() {
        let module = from_blocking(|_, options: Options| {
            Ok(options.get("suffix").cloned().unwrap_or(Value::Null))
        });
        let bound: DynModule = Arc::new(module.bind(Options::new().with("suffix", "!")));
        let output = bound.blocking_invoke(json!("in"), &Options::new()).unwrap();
        assert_eq!(output, json!("!"));
    }

    #[derive(Deserialize)]
    struct Greeting {
        name: String,
    }

    #[derive(Serialize)]
    struct Greeted {
        message: String,
    }

    #[test]
    fn test_from_typed_round_trip() {
        let module = from_typed(|input: Greeting| {
            Ok(Greeted {
                message: format!("hello {}", input.name),
            })
        });
        let output = module
            .blocking_invoke(json!({"name": "ada"}), &Options::new())
            .unwrap();
        assert_eq!(output, json!({"message": "hello ada"}));
        assert!(module.input_type().unwrap().name().contains("Greeting"));
        assert!(module.output_type().unwrap().name().contains("Greeted"));
    }

    #[test]
    fn test_from_typed_coercion_error() {
        let module = from_typed(|input: Greeting| {
            Ok(Greeted {
                message: input.name,
            })
        });
        let err = module
            .blocking_invoke(json!({"wrong": true}), &Options::new())
            .unwrap_err();
        assert!(matches!(err, Error::Coercion { .. }));
    }
}
