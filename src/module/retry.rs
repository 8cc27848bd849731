//! Retry policies with configurable backoff
//!
//! A retry policy re-attempts a failing module per a backoff strategy. The
//! retry loop always runs at the suspending level, even over a purely
//! blocking module, because waiting between attempts requires suspension.
//! Non-retryable failures propagate immediately without consuming budget;
//! an exhausted budget fails with the last observed error wrapped in
//! [`Error::RetryExhausted`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::effect::Effect;
use crate::error::{Error, ErrorMatcher};
use crate::module::options::Options;
use crate::module::DynModule;

/// Hook run after a retryable failure, before the backoff wait.
///
/// Receives the failure and the 1-based attempt number; useful for side
/// effects such as rotating a credential.
pub type AfterAttempt = Arc<dyn Fn(&Error, u32) + Send + Sync>;

/// Retry configuration with backoff strategies.
#[derive(Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Backoff strategy.
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Initial delay between attempts.
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between attempts.
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Add jitter to delays.
    #[serde(default)]
    pub jitter: bool,

    /// Jitter factor (0.0 to 1.0).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Only retry errors matching one of these; empty retries everything.
    #[serde(default)]
    pub retry_on: Vec<ErrorMatcher>,

    /// Hook run between attempts.
    #[serde(skip)]
    pub after: Option<AfterAttempt>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff: BackoffStrategy::default(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter: false,
            jitter_factor: default_jitter_factor(),
            retry_on: Vec::new(),
            after: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("attempts", &self.attempts)
            .field("backoff", &self.backoff)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("jitter_factor", &self.jitter_factor)
            .field("retry_on", &self.retry_on)
            .field("after", &self.after.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

/// Backoff strategies for retry delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Linear increase in delay
    Linear {
        #[serde(with = "humantime_serde")]
        increment: Duration,
    },
    /// Exponential increase in delay
    Exponential {
        #[serde(default = "default_exponential_base")]
        base: f64,
    },
    /// Fibonacci sequence delays
    Fibonacci,
    /// Custom delay sequence
    Custom { delays: Vec<Duration> },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            base: default_exponential_base(),
        }
    }
}

impl RetryPolicy {
    /// True when the policy reacts to this failure.
    pub fn is_retryable(&self, error: &Error) -> bool {
        ErrorMatcher::any_match(&self.retry_on, error)
    }

    /// Calculate the delay for the given 1-based attempt.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = match &self.backoff {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Linear { increment } => self.initial_delay + *increment * (attempt - 1),
            BackoffStrategy::Exponential { base } => {
                let multiplier = base.powi(attempt as i32 - 1);
                Duration::from_secs_f64(self.initial_delay.as_secs_f64() * multiplier)
            }
            BackoffStrategy::Fibonacci => {
                let fib = fibonacci(attempt);
                self.initial_delay * fib
            }
            BackoffStrategy::Custom { delays } => delays
                .get(attempt as usize - 1)
                .copied()
                .unwrap_or(self.max_delay),
        };

        base_delay.min(self.max_delay)
    }

    /// Apply jitter to a delay.
    pub fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }

        let mut rng = rand::rng();
        let jitter_range = delay.as_secs_f64() * self.jitter_factor;
        let jitter = rng.random_range(-jitter_range / 2.0..=jitter_range / 2.0);
        Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
    }
}

/// The suspending retry loop over a bound module.
pub(crate) fn retry_effect(
    bound: DynModule,
    policy: RetryPolicy,
    input: Value,
    options: Options,
) -> Effect<Value> {
    Effect::from_future(async move {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match bound.effect(input.clone(), &options).resolve().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "attempt succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !policy.is_retryable(&err) {
                        return Err(err);
                    }
                    if attempt >= policy.attempts {
                        return Err(Error::RetryExhausted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    if let Some(after) = &policy.after {
                        (**after)(&err, attempt);
                    }
                    let delay = policy.apply_jitter(policy.calculate_delay(attempt));
                    info!(
                        attempt,
                        max = policy.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after failure"
                    );
                    sleep(delay).await;
                }
            }
        }
    })
}

/// Calculate fibonacci number.
fn fibonacci(n: u32) -> u32 {
    match n {
        0 => 0,
        1 => 1,
        _ => {
            let mut a = 0;
            let mut b = 1;
            for _ in 2..=n {
                let temp = a + b;
                a = b;
                b = temp;
            }
            b
        }
    }
}

// Default functions for serde
fn default_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_jitter_factor() -> f64 {
    0.3
}

fn default_exponential_base() -> f64 {
    2.0
}
