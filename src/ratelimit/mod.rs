//! 限流模块
//!
//! 服务端侧的令牌桶准入：固定容量、固定速率补充。取不到令牌的
//! 请求立即拒绝并附带建议的重试间隔，从不排队或阻塞。限额是
//! 进程本地的，没有全局配额协调。

use crate::config::RateLimitConfig;
use crate::error::CoreError;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// 令牌桶限流器
pub struct RateLimiter {
    capacity: u64,
    refill_per_sec: f64,
    retry_after: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            capacity: config.capacity,
            refill_per_sec: config.refill_per_sec,
            retry_after: Duration::from_secs(config.retry_after_secs),
            bucket: Mutex::new(Bucket {
                tokens: config.capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// 尝试取走一个令牌
    pub fn try_acquire(&self) -> Result<(), CoreError> {
        let mut bucket = self.bucket.lock().expect("rate limiter lock poisoned");

        let elapsed = bucket.last_refill.elapsed();
        bucket.last_refill = Instant::now();
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity as f64);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(CoreError::RateExhausted {
                limit: self.capacity,
                retry_after: self.retry_after,
            })
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(capacity: u64, refill_per_sec: f64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            capacity,
            refill_per_sec,
            retry_after_secs: 30,
        })
    }

    #[test]
    fn admits_exactly_capacity_without_refill() {
        let limiter = limiter(5, 0.0);
        for _ in 0..5 {
            limiter.try_acquire().unwrap();
        }
        // 第 C+1 次被拒绝
        let err = limiter.try_acquire().unwrap_err();
        match err {
            CoreError::RateExhausted { limit, retry_after } => {
                assert_eq!(limit, 5);
                assert_eq!(retry_after, Duration::from_secs(30));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn refill_restores_tokens() {
        let limiter = limiter(2, 1000.0);
        limiter.try_acquire().unwrap();
        limiter.try_acquire().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        limiter.try_acquire().unwrap();
    }

    #[test]
    fn tokens_never_exceed_capacity() {
        let limiter = limiter(2, 1000.0);
        std::thread::sleep(Duration::from_millis(50));
        limiter.try_acquire().unwrap();
        limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_err());
    }
}
