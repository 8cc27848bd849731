//! # Headwater
//!
//! Composable deferred-effect pipelines: combine independently-authored
//! units of work (blocking, async, iterator-producing, or stream-producing)
//! into sequential chains, named parallel fan-outs, and retry/fallback
//! overlays, and invoke the result uniformly regardless of each unit's
//! native execution style.
//!
//! ## Modules
//!
//! - `effect` - Deferred values with four execution styles and a unified
//!   composition operator
//! - `error` - Unified error taxonomy and error classification for
//!   fault-handling filters
//! - `module` - The executable-unit contract, closure builders, chains,
//!   fan-outs, and configuration/fault-handling decorators
//!
//! ## Example
//!
//! ```
//! use headwater::{from_blocking, Module, Options, Sequential};
//! use serde_json::{json, Value};
//!
//! # fn main() -> headwater::Result<()> {
//! let tokenize = from_blocking(|input: Value, _| {
//!     let words: Vec<&str> = input.as_str().unwrap_or_default().split(' ').collect();
//!     Ok(json!(words))
//! });
//! let count = from_blocking(|input: Value, _| {
//!     Ok(json!(input.as_array().map(Vec::len).unwrap_or(0)))
//! });
//!
//! let pipeline = Sequential::new(vec![tokenize, count])?;
//! let output = pipeline.blocking_invoke(json!("a b c"), &Options::new())?;
//! assert_eq!(output, json!(3));
//! # Ok(())
//! # }
//! ```

pub mod effect;
pub mod error;
pub mod module;

pub use effect::{Effect, EffectIter, EffectStream};
pub use error::{Error, ErrorMatcher, Result};
pub use module::builders::{
    from_blocking, from_effect, from_future, from_sequence, from_stream, from_typed,
};
pub use module::decorator::Decorator;
pub use module::fallback::{FallbackChain, FIRST_ERROR_KEY, LAST_ERROR_KEY};
pub use module::options::Options;
pub use module::parallel::Parallel;
pub use module::passthrough::{passthrough, pick, Passthrough, Pick};
pub use module::retry::{AfterAttempt, BackoffStrategy, RetryPolicy};
pub use module::sequential::Sequential;
pub use module::{DynModule, Module, ModuleExt, TypeInfo};
