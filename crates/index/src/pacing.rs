use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::debug;

/// Decides how long the uploader waits around each request and batch.
#[async_trait]
pub trait Pacer: Send {
    async fn before_request(&mut self) {}

    async fn between_batches(&mut self) {}
}

/// Sleeps a fixed delay between consecutive batches.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn between_batches(&mut self) {
        if !self.delay.is_zero() {
            debug!(delay_ms = self.delay.as_millis() as u64, "pausing between batches");
            sleep(self.delay).await;
        }
    }
}

/// Sliding-window limiter: at most `max_requests` requests start within any
/// `interval`.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    interval: Duration,
    sent: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, interval: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            interval,
            sent: VecDeque::with_capacity(max_requests),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.sent.front() {
            if now.duration_since(*front) >= self.interval {
                self.sent.pop_front();
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl Pacer for RateLimiter {
    async fn before_request(&mut self) {
        self.prune(Instant::now());
        if self.sent.len() >= self.max_requests {
            if let Some(oldest) = self.sent.front().copied() {
                sleep_until(oldest + self.interval).await;
            }
            self.prune(Instant::now());
        }
        self.sent.push_back(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_sleeps_once_per_call() {
        let start = Instant::now();
        let mut pacer = FixedDelay::new(Duration::from_secs(3));
        pacer.before_request().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        pacer.between_batches().await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
