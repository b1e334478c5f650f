use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::QueueConfig;

/// Decides how long an item waits before it is re-added
pub trait RateLimiter<T>: Send + Sync + 'static {
    /// Delay for the next attempt of `item`; records the attempt
    fn when(
        &self,
        item: &T,
    ) -> Duration;

    /// Stops tracking `item`, resetting its backoff
    fn forget(
        &self,
        item: &T,
    );

    /// Number of delayed re-adds recorded for `item` since the last forget
    fn num_requeues(
        &self,
        item: &T,
    ) -> usize;
}

/// Per-item exponential backoff: `base * 2^failures`, capped at `max`
pub struct ItemExponentialFailureRateLimiter<T>
where
    T: Eq + Hash,
{
    failures: DashMap<T, u32>,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> ItemExponentialFailureRateLimiter<T>
where
    T: Eq + Hash,
{
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            failures: DashMap::new(),
            base_delay,
            max_delay,
        }
    }
}

impl<T> RateLimiter<T> for ItemExponentialFailureRateLimiter<T>
where
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    fn when(
        &self,
        item: &T,
    ) -> Duration {
        let exp = {
            let mut count = self.failures.entry(item.clone()).or_insert(0);
            let exp = *count;
            *count = count.saturating_add(1);
            exp
        };

        let factor = 1u32.checked_shl(exp).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    fn forget(
        &self,
        item: &T,
    ) {
        self.failures.remove(item);
    }

    fn num_requeues(
        &self,
        item: &T,
    ) -> usize {
        self.failures.get(item).map(|c| *c as usize).unwrap_or(0)
    }
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Overall token bucket shared by every item.
///
/// Each call reserves one token; once the bucket is drained the returned
/// delay is the time until the reserved token is refilled.
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl BucketRateLimiter {
    pub fn new(
        qps: f64,
        burst: u32,
    ) -> Self {
        Self {
            qps,
            burst: burst as f64,
            bucket: Mutex::new(Bucket {
                tokens: burst as f64,
                last: Instant::now(),
            }),
        }
    }
}

impl<T> RateLimiter<T> for BucketRateLimiter
where
    T: Send + Sync + 'static,
{
    fn when(
        &self,
        _item: &T,
    ) -> Duration {
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(self.burst);
        bucket.last = now;

        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.qps)
        }
    }

    fn forget(
        &self,
        _item: &T,
    ) {
    }

    fn num_requeues(
        &self,
        _item: &T,
    ) -> usize {
        0
    }
}

/// Combines limiters; the longest delay wins
pub struct MaxOfRateLimiter<T> {
    limiters: Vec<Box<dyn RateLimiter<T>>>,
}

impl<T> MaxOfRateLimiter<T> {
    pub fn new(limiters: Vec<Box<dyn RateLimiter<T>>>) -> Self {
        Self { limiters }
    }
}

impl<T> RateLimiter<T> for MaxOfRateLimiter<T>
where
    T: 'static,
{
    fn when(
        &self,
        item: &T,
    ) -> Duration {
        self.limiters
            .iter()
            .map(|l| l.when(item))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(
        &self,
        item: &T,
    ) {
        for limiter in &self.limiters {
            limiter.forget(item);
        }
    }

    fn num_requeues(
        &self,
        item: &T,
    ) -> usize {
        self.limiters
            .iter()
            .map(|l| l.num_requeues(item))
            .max()
            .unwrap_or(0)
    }
}

/// Per-item exponential backoff combined with the overall bucket
pub fn default_controller_rate_limiter<T>(config: &QueueConfig) -> MaxOfRateLimiter<T>
where
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    MaxOfRateLimiter::new(vec![
        Box::new(ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(config.backoff.base_delay_ms),
            Duration::from_millis(config.backoff.max_delay_ms),
        )),
        Box::new(BucketRateLimiter::new(config.bucket_qps, config.bucket_burst)),
    ])
}
