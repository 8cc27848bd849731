//! Deferred-value effects with a unified composition operator
//!
//! An [`Effect`] decouples how a value becomes available from how a caller
//! wants to consume it. Every effect carries one of four execution styles
//! (blocking thunk, suspending future, lazy iterator, lazy stream) and every
//! style supports all four execution operations through defined adaptation:
//!
//! - [`Effect::blocking_resolve`]: blocking scalar resolve
//! - [`Effect::resolve`]: suspending scalar resolve
//! - [`Effect::blocking_iter`]: blocking lazy iteration
//! - [`Effect::stream`]: suspension-driven lazy iteration
//!
//! Scalar resolves over a sequence-style effect drain the sequence and yield
//! its final element, failing with [`Error::Exhausted`] when the sequence is
//! empty. Blocking operations over suspending effects run a private
//! current-thread scheduler and must not be called from inside an async
//! context.
//!
//! [`Effect::flat_map`] is the composition primitive. It never forces the
//! source eagerly, and the composed effect behaves as the "higher" of the two
//! execution styles in the ordering blocking < iterator < future < stream:
//! sequence-ness and async-ness of either side survive composition.
//!
//! Effects are single-use. Driving an already-consumed effect fails with
//! [`Error::Consumption`].

mod bridge;

use std::fmt;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::{Error, Result};

/// Boxed fallible iterator produced by blocking iteration.
pub type EffectIter<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// Boxed fallible stream produced by suspending iteration.
pub type EffectStream<T> = BoxStream<'static, Result<T>>;

type Thunk<T> = Box<dyn FnOnce() -> Result<T> + Send>;

/// A deferred value with exactly one active execution style.
pub struct Effect<T> {
    inner: Option<Inner<T>>,
}

enum Inner<T> {
    Blocking(Thunk<T>),
    Future(BoxFuture<'static, Result<T>>),
    Sequence(EffectIter<T>),
    Stream(EffectStream<T>),
    Bound(Box<dyn DynBound<T>>),
}

impl<T> Inner<T> {
    fn kind_name(&self) -> &'static str {
        match self {
            Inner::Blocking(_) => "blocking",
            Inner::Future(_) => "future",
            Inner::Sequence(_) => "sequence",
            Inner::Stream(_) => "stream",
            Inner::Bound(_) => "bound",
        }
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self
            .inner
            .as_ref()
            .map(Inner::kind_name)
            .unwrap_or("consumed");
        write!(f, "Effect<{kind}>")
    }
}

impl<T: Send + 'static> Effect<T> {
    /// Wrap a blocking thunk.
    pub fn from_blocking(thunk: impl FnOnce() -> Result<T> + Send + 'static) -> Self {
        Self {
            inner: Some(Inner::Blocking(Box::new(thunk))),
        }
    }

    /// Wrap a suspending computation.
    pub fn from_future(future: impl Future<Output = Result<T>> + Send + 'static) -> Self {
        Self {
            inner: Some(Inner::Future(future.boxed())),
        }
    }

    /// Wrap a finite, single-pass, blocking-driven sequence.
    pub fn from_sequence(iter: impl Iterator<Item = Result<T>> + Send + 'static) -> Self {
        Self {
            inner: Some(Inner::Sequence(Box::new(iter))),
        }
    }

    /// Wrap a finite, single-pass, suspension-driven sequence.
    pub fn from_stream(stream: impl Stream<Item = Result<T>> + Send + 'static) -> Self {
        Self {
            inner: Some(Inner::Stream(stream.boxed())),
        }
    }

    /// An effect that yields an already-available value.
    pub fn value(value: T) -> Self {
        Self::from_blocking(move || Ok(value))
    }

    /// An effect that fails with the given error when driven.
    pub fn failure(error: Error) -> Self {
        Self::from_blocking(move || Err(error))
    }

    /// Compose this effect with a continuation producing another effect.
    ///
    /// The source is not forced until the composed effect is driven. Over
    /// sequence-style sources the continuation runs once per element and the
    /// produced sequences are flattened in order; the first error ends the
    /// composed sequence.
    pub fn flat_map<U: Send + 'static>(
        mut self,
        f: impl FnMut(T) -> Effect<U> + Send + 'static,
    ) -> Effect<U> {
        match self.inner.take() {
            Some(inner) => Effect {
                inner: Some(Inner::Bound(Box::new(Bound {
                    source: Effect { inner: Some(inner) },
                    f: Box::new(f),
                }))),
            },
            None => Effect::failure(Error::Consumption),
        }
    }

    /// Transform every produced value. Defined via [`Effect::flat_map`].
    pub fn map<U: Send + 'static>(self, mut f: impl FnMut(T) -> U + Send + 'static) -> Effect<U> {
        self.flat_map(move |value| Effect::value(f(value)))
    }

    /// Blocking scalar resolve.
    ///
    /// Suspending styles are driven on a private scheduler; sequence styles
    /// are drained to their final element. Must not be called from inside an
    /// async context.
    pub fn blocking_resolve(&mut self) -> Result<T> {
        self.take_inner()?.blocking_resolve()
    }

    /// Suspending scalar resolve.
    ///
    /// Blocking styles run inline without real suspension; sequence styles
    /// are drained to their final element.
    pub async fn resolve(&mut self) -> Result<T> {
        self.take_inner()?.resolve().await
    }

    /// Blocking lazy iteration.
    ///
    /// Scalar styles yield a one-element sequence. Suspending styles are
    /// driven element-by-element on a private scheduler; must not be called
    /// from inside an async context.
    pub fn blocking_iter(&mut self) -> Result<EffectIter<T>> {
        Ok(self.take_inner()?.into_iter())
    }

    /// Suspension-driven lazy iteration.
    ///
    /// Scalar styles yield a one-element stream.
    pub fn stream(&mut self) -> Result<EffectStream<T>> {
        Ok(self.take_inner()?.into_stream())
    }

    fn take_inner(&mut self) -> Result<Inner<T>> {
        self.inner.take().ok_or(Error::Consumption)
    }

    pub(crate) fn into_iter_unchecked(mut self) -> EffectIter<T> {
        match self.inner.take() {
            Some(inner) => inner.into_iter(),
            None => Box::new(std::iter::once(Err(Error::Consumption))),
        }
    }

    pub(crate) fn into_stream_unchecked(mut self) -> EffectStream<T> {
        match self.inner.take() {
            Some(inner) => inner.into_stream(),
            None => stream::once(async { Err(Error::Consumption) }).boxed(),
        }
    }
}

impl<T: Send + 'static> Inner<T> {
    fn blocking_resolve(self) -> Result<T> {
        match self {
            Inner::Blocking(thunk) => thunk(),
            Inner::Future(future) => bridge::block_on(future),
            Inner::Sequence(iter) => drain_last(iter),
            Inner::Stream(stream) => bridge::block_on(drain_stream_last(stream)),
            Inner::Bound(bound) => drain_last(bound.into_iter()),
        }
    }

    async fn resolve(self) -> Result<T> {
        match self {
            Inner::Blocking(thunk) => thunk(),
            Inner::Future(future) => future.await,
            Inner::Sequence(iter) => drain_last(iter),
            Inner::Stream(stream) => drain_stream_last(stream).await,
            Inner::Bound(bound) => drain_stream_last(bound.into_stream()).await,
        }
    }

    fn into_iter(self) -> EffectIter<T> {
        match self {
            Inner::Blocking(thunk) => Box::new(std::iter::once_with(move || thunk())),
            Inner::Future(future) => {
                Box::new(std::iter::once_with(move || bridge::block_on(future)))
            }
            Inner::Sequence(iter) => iter,
            Inner::Stream(stream) => match bridge::BlockingStreamIter::new(stream) {
                Ok(iter) => Box::new(iter),
                Err(err) => Box::new(std::iter::once(Err(err))),
            },
            Inner::Bound(bound) => bound.into_iter(),
        }
    }

    fn into_stream(self) -> EffectStream<T> {
        match self {
            Inner::Blocking(thunk) => stream::once(async move { thunk() }).boxed(),
            Inner::Future(future) => stream::once(future).boxed(),
            Inner::Sequence(iter) => stream::iter(iter).boxed(),
            Inner::Stream(stream) => stream,
            Inner::Bound(bound) => bound.into_stream(),
        }
    }
}

fn drain_last<T>(iter: EffectIter<T>) -> Result<T> {
    let mut last = None;
    for item in iter {
        last = Some(item?);
    }
    last.ok_or(Error::Exhausted)
}

async fn drain_stream_last<T>(mut stream: EffectStream<T>) -> Result<T> {
    let mut last = None;
    while let Some(item) = stream.next().await {
        last = Some(item?);
    }
    last.ok_or(Error::Exhausted)
}

/// Type-erased composition node: a source effect bound to a continuation.
///
/// Both execution families derive from the source's corresponding view, so
/// the composed effect inherits sequence-ness and async-ness from whichever
/// side carries them.
trait DynBound<U>: Send {
    fn into_iter(self: Box<Self>) -> EffectIter<U>;
    fn into_stream(self: Box<Self>) -> EffectStream<U>;
}

struct Bound<T, U> {
    source: Effect<T>,
    f: Box<dyn FnMut(T) -> Effect<U> + Send>,
}

impl<T: Send + 'static, U: Send + 'static> DynBound<U> for Bound<T, U> {
    fn into_iter(self: Box<Self>) -> EffectIter<U> {
        Box::new(BindIter {
            source: self.source.into_iter_unchecked(),
            f: self.f,
            current: None,
            done: false,
        })
    }

    fn into_stream(self: Box<Self>) -> EffectStream<U> {
        bind_stream(self.source.into_stream_unchecked(), self.f)
    }
}

/// Blocking flattening of `source` through `f`, fused after the first error.
struct BindIter<T, U> {
    source: EffectIter<T>,
    f: Box<dyn FnMut(T) -> Effect<U> + Send>,
    current: Option<EffectIter<U>>,
    done: bool,
}

impl<T: Send + 'static, U: Send + 'static> Iterator for BindIter<T, U> {
    type Item = Result<U>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(Ok(value)) => return Some(Ok(value)),
                    Some(Err(err)) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                    None => self.current = None,
                }
            }
            match self.source.next() {
                Some(Ok(value)) => {
                    self.current = Some((self.f)(value).into_iter_unchecked());
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => return None,
            }
        }
    }
}

fn bind_stream<T, U>(
    source: EffectStream<T>,
    f: Box<dyn FnMut(T) -> Effect<U> + Send>,
) -> EffectStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    struct BindState<T, U> {
        source: EffectStream<T>,
        f: Box<dyn FnMut(T) -> Effect<U> + Send>,
        current: Option<EffectStream<U>>,
        done: bool,
    }

    let state = BindState {
        source,
        f,
        current: None,
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            if let Some(current) = state.current.as_mut() {
                match current.next().await {
                    Some(Ok(value)) => return Some((Ok(value), state)),
                    Some(Err(err)) => {
                        state.done = true;
                        return Some((Err(err), state));
                    }
                    None => state.current = None,
                }
            }
            match state.source.next().await {
                Some(Ok(value)) => {
                    let next = (state.f)(value);
                    state.current = Some(next.into_stream_unchecked());
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
                None => return None,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_blocking(mut effect: Effect<i32>) -> Vec<i32> {
        effect
            .blocking_iter()
            .expect("fresh effect")
            .map(|item| item.expect("ok item"))
            .collect()
    }

    #[test]
    fn test_blocking_effect_resolves() {
        let mut effect = Effect::from_blocking(|| Ok(41));
        assert_eq!(effect.blocking_resolve().unwrap(), 41);
    }

    #[test]
    fn test_effect_is_single_use() {
        let mut effect = Effect::value(1);
        assert_eq!(effect.blocking_resolve().unwrap(), 1);
        assert!(effect.blocking_resolve().unwrap_err().is_consumption());
    }

    #[test]
    fn test_mixed_operations_after_consumption_fail() {
        let mut effect = Effect::value(1);
        let _ = effect.blocking_iter().expect("first drive");
        assert!(effect.stream().err().unwrap().is_consumption());
    }

    #[tokio::test]
    async fn test_blocking_effect_resolves_async() {
        let mut effect = Effect::from_blocking(|| Ok("hello"));
        assert_eq!(effect.resolve().await.unwrap(), "hello");
    }

    #[test]
    fn test_future_effect_blocking_resolve() {
        let mut effect = Effect::from_future(async { Ok(7) });
        assert_eq!(effect.blocking_resolve().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_future_effect_resolve() {
        let mut effect = Effect::from_future(async { Ok(7) });
        assert_eq!(effect.resolve().await.unwrap(), 7);
    }

    #[test]
    fn test_scalar_effect_iterates_as_single_element() {
        let effect = Effect::value(5);
        assert_eq!(collect_blocking(effect), vec![5]);
    }

    #[test]
    fn test_sequence_scalar_resolve_takes_final_element() {
        let mut effect = Effect::from_sequence(vec![Ok(1), Ok(2), Ok(3)].into_iter());
        assert_eq!(effect.blocking_resolve().unwrap(), 3);
    }

    #[test]
    fn test_empty_sequence_scalar_resolve_is_exhausted() {
        let mut effect = Effect::<i32>::from_sequence(std::iter::empty());
        assert!(effect.blocking_resolve().unwrap_err().is_exhausted());
    }

    #[tokio::test]
    async fn test_empty_stream_scalar_resolve_is_exhausted() {
        let mut effect = Effect::<i32>::from_stream(stream::iter(std::iter::empty()));
        assert!(effect.resolve().await.unwrap_err().is_exhausted());
    }

    #[test]
    fn test_stream_effect_blocking_iteration() {
        let effect = Effect::from_stream(stream::iter(vec![Ok(1), Ok(2)]));
        assert_eq!(collect_blocking(effect), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_sequence_effect_streams() {
        let mut effect = Effect::from_sequence(vec![Ok(1), Ok(2)].into_iter());
        let values: Vec<i32> = effect
            .stream()
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_flat_map_is_lazy() {
        let effect = Effect::from_blocking(|| -> Result<i32> { panic!("forced eagerly") });
        // Composing must not force the source; dropping the composed effect
        // never runs the thunk.
        let composed = effect.flat_map(|value| Effect::value(value + 1));
        drop(composed);
    }

    #[test]
    fn test_flat_map_blocking_chain() {
        let mut composed =
            Effect::value(2).flat_map(|value| Effect::from_blocking(move || Ok(value * 10)));
        assert_eq!(composed.blocking_resolve().unwrap(), 20);
    }

    #[tokio::test]
    async fn test_flat_map_promotes_to_future() {
        let mut composed =
            Effect::value(2).flat_map(|value| Effect::from_future(async move { Ok(value * 10) }));
        assert_eq!(composed.resolve().await.unwrap(), 20);
    }

    #[test]
    fn test_flat_map_preserves_inner_sequence() {
        let composed = Effect::value(3)
            .flat_map(|n| Effect::from_sequence((0..n).map(Ok).collect::<Vec<_>>().into_iter()));
        assert_eq!(collect_blocking(composed), vec![0, 1, 2]);
    }

    #[test]
    fn test_flat_map_flattens_sequences() {
        let composed = Effect::from_sequence(vec![Ok(1), Ok(2)].into_iter())
            .flat_map(|n| Effect::from_sequence(vec![Ok(n), Ok(n * 10)].into_iter()));
        assert_eq!(collect_blocking(composed), vec![1, 10, 2, 100]);
    }

    #[tokio::test]
    async fn test_flat_map_sequence_over_future_streams() {
        let mut composed = Effect::from_sequence(vec![Ok(1), Ok(2)].into_iter())
            .flat_map(|n| Effect::from_future(async move { Ok(n * 2) }));
        let values: Vec<i32> = composed
            .stream()
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(values, vec![2, 4]);
    }

    #[test]
    fn test_flat_map_error_short_circuits() {
        let source = Effect::from_sequence(
            vec![Ok(1), Err(Error::other("boom")), Ok(3)].into_iter(),
        );
        let composed = source.flat_map(Effect::value);
        let items: Vec<Result<i32>> = composed.into_iter_unchecked().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &1);
        assert!(items[1].is_err());
    }

    #[test]
    fn test_map_over_sequence_maps_each_element() {
        let mapped = Effect::from_sequence(vec![Ok(1), Ok(2)].into_iter()).map(|n| n * 3);
        assert_eq!(collect_blocking(mapped), vec![3, 6]);
    }

    #[test]
    fn test_failure_effect() {
        let mut effect = Effect::<i32>::failure(Error::other("nope"));
        assert_eq!(effect.blocking_resolve().unwrap_err().to_string(), "nope");
    }

    #[test]
    fn test_debug_reports_kind() {
        let effect = Effect::value(1);
        assert_eq!(format!("{effect:?}"), "Effect<blocking>");
        let mut effect = effect;
        let _ = effect.blocking_resolve();
        assert_eq!(format!("{effect:?}"), "Effect<consumed>");
    }
}
