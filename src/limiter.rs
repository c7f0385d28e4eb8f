//! Non-blocking token bucket.
//!
//! The bucket starts full, refills one token per `every`, and holds at most
//! `burst` tokens. Callers that are denied simply try again on a later cycle.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    every: Duration,
    burst: u32,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

impl RateLimiter {
    /// A zero `every` means an unlimited rate.
    pub fn new(every: Duration, burst: u32) -> Self {
        Self {
            every,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last: Instant::now(),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, u32::MAX)
    }

    pub fn is_unlimited(&self) -> bool {
        self.every.is_zero()
    }

    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Take one token as of `now` if one is available.
    pub fn allow_at(&self, now: Instant) -> bool {
        if self.is_unlimited() {
            return true;
        }
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, now);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens available as of `now`, without consuming any.
    pub fn tokens_at(&self, now: Instant) -> f64 {
        if self.is_unlimited() {
            return f64::INFINITY;
        }
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, now);
        bucket.tokens
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        // `now` may lag behind a reading taken on another thread.
        let Some(elapsed) = now.checked_duration_since(bucket.last) else {
            return;
        };
        let gained = elapsed.as_secs_f64() / self.every.as_secs_f64();
        bucket.tokens = (bucket.tokens + gained).min(f64::from(self.burst));
        bucket.last = now;
    }
}
