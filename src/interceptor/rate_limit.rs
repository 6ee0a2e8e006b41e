//! 限流拦截器（服务端）

use crate::ratelimit::RateLimiter;
use std::sync::Arc;
use tonic::{Request, Status};
use tracing::warn;

/// 限流拦截器
///
/// 在进入内层处理器之前取一个令牌，取不到立即以
/// ResourceExhausted 拒绝（附重试间隔），从不排队。
#[derive(Clone)]
pub struct RateLimitInterceptor {
    limiter: Arc<RateLimiter>,
}

impl RateLimitInterceptor {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }

    pub fn intercept<T>(&self, req: Request<T>) -> Result<Request<T>, Status> {
        match self.limiter.try_acquire() {
            Ok(()) => Ok(req),
            Err(err) => {
                warn!(limit = self.limiter.capacity(), "request rejected: rate limit exceeded");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;

    #[test]
    fn exhausted_bucket_rejects_with_retry_hint() {
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig {
            capacity: 1,
            refill_per_sec: 0.0,
            retry_after_secs: 7,
        }));
        let interceptor = RateLimitInterceptor::new(limiter);

        interceptor.intercept(Request::new(())).unwrap();
        let status = interceptor.intercept(Request::new(())).unwrap_err();

        assert_eq!(status.code(), tonic::Code::ResourceExhausted);
        assert_eq!(
            status.metadata().get("retry-after").unwrap().to_str().unwrap(),
            "7"
        );
    }
}
