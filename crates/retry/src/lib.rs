//! Exponential backoff for futures which may fail transiently.
//!
//! The backoff for the `N`-th consecutive retry is
//!
//! `delay = min(base ^ N * factor, max_delay)`
//!
//! and retrying stops either when the retry condition yields `false`, or when
//! the maximum number of retries has been exhausted.
use std::future::Future;
use std::num::NonZeroU64;
use std::time::Duration;

use tokio_retry::strategy::ExponentialBackoff;

/// Builder for an exponentially backed-off retry of a fallible future.
#[derive(Debug, Clone)]
pub struct Retry<FutureFactory> {
    future_factory: FutureFactory,
    base: NonZeroU64,
    factor: Duration,
    max_delay: Option<Duration>,
    max_num_retries: Option<usize>,
}

impl<FutureFactory> Retry<FutureFactory> {
    /// Retries with a delay of `base ^ N` seconds.
    pub fn exponential(future_factory: FutureFactory, base: NonZeroU64) -> Self {
        Self {
            future_factory,
            base,
            factor: Duration::from_secs(1),
            max_delay: None,
            max_num_retries: None,
        }
    }

    /// Multiplies every delay by `factor` seconds.
    pub fn factor(mut self, factor: NonZeroU64) -> Self {
        self.factor = Duration::from_secs(factor.get());
        self
    }

    /// Saturates the delay at `max_delay`.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Gives up after `max_num_retries` retries. Zero disables retrying.
    pub fn max_num_retries(mut self, max_num_retries: usize) -> Self {
        self.max_num_retries = Some(max_num_retries);
        self
    }

    /// Runs the future, retrying for as long as `retry_condition` yields `true` for
    /// the error and retries remain.
    pub async fn when<T, E, Fut, RetryCondition>(
        self,
        retry_condition: RetryCondition,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        FutureFactory: FnMut() -> Fut,
        RetryCondition: FnMut(&E) -> bool,
    {
        let factor = u64::try_from(self.factor.as_millis()).unwrap_or(u64::MAX);
        let mut strategy = ExponentialBackoff::from_millis(self.base.get()).factor(factor);
        if let Some(max_delay) = self.max_delay {
            strategy = strategy.max_delay(max_delay);
        }
        let strategy = strategy.take(self.max_num_retries.unwrap_or(usize::MAX));

        tokio_retry::RetryIf::start(strategy, self.future_factory, retry_condition).await
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let attempts = Cell::new(0);

        let result: Result<u32, &str> = Retry::exponential(
            || {
                attempts.set(attempts.get() + 1);
                let attempt = attempts.get();
                async move {
                    if attempt < 3 {
                        Err("transient")
                    } else {
                        Ok(attempt)
                    }
                }
            },
            NonZeroU64::new(2).unwrap(),
        )
        .when(|_| true)
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_condition_rejects() {
        let attempts = Cell::new(0);

        let result: Result<(), &str> = Retry::exponential(
            || {
                attempts.set(attempts.get() + 1);
                async { Err("fatal") }
            },
            NonZeroU64::new(2).unwrap(),
        )
        .when(|e| *e != "fatal")
        .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_num_retries() {
        let attempts = Cell::new(0);

        let result: Result<(), &str> = Retry::exponential(
            || {
                attempts.set(attempts.get() + 1);
                async { Err("transient") }
            },
            NonZeroU64::new(2).unwrap(),
        )
        .max_delay(Duration::from_secs(5))
        .max_num_retries(4)
        .when(|_| true)
        .await;

        assert_eq!(result, Err("transient"));
        assert_eq!(attempts.get(), 5);
    }

    #[tokio::test]
    async fn zero_retries_fails_immediately() {
        let attempts = Cell::new(0);

        let result: Result<(), &str> = Retry::exponential(
            || {
                attempts.set(attempts.get() + 1);
                async { Err("transient") }
            },
            NonZeroU64::new(2).unwrap(),
        )
        .max_num_retries(0)
        .when(|_| true)
        .await;

        assert_eq!(result, Err("transient"));
        assert_eq!(attempts.get(), 1);
    }
}
