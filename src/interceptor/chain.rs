//! 准入链组合
//!
//! 从 ChainConfig 一次性声明式构建，阶段顺序固定：
//! 认证 → 限流 → 观测。

use super::{AuthInterceptor, LoggingInterceptor, RateLimitInterceptor};
use crate::config::ChainConfig;
use crate::ratelimit::RateLimiter;
use std::sync::Arc;
use tonic::{Request, Status};

/// 服务端准入链
#[derive(Clone)]
pub struct AdmissionChain {
    auth: Option<AuthInterceptor>,
    rate_limit: Option<RateLimitInterceptor>,
    logging: Option<LoggingInterceptor>,
}

impl AdmissionChain {
    /// 按配置构建准入链
    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            auth: config.auth_token.as_deref().map(AuthInterceptor::new),
            rate_limit: config
                .rate_limit
                .as_ref()
                .map(|rl| RateLimitInterceptor::new(Arc::new(RateLimiter::new(rl)))),
            logging: config.tracing.then(LoggingInterceptor::new),
        }
    }

    /// 按固定顺序应用各阶段，任一阶段拒绝即短路
    pub fn intercept<T>(&self, mut req: Request<T>) -> Result<Request<T>, Status> {
        if let Some(ref auth) = self.auth {
            req = auth.intercept(req)?;
        }
        if let Some(ref rate_limit) = self.rate_limit {
            req = rate_limit.intercept(req)?;
        }
        if let Some(ref logging) = self.logging {
            req = logging.intercept(req)?;
        }
        Ok(req)
    }

    /// 转换为 tonic 拦截器函数
    ///
    /// tonic 对一元与流式调用使用同一拦截点，链对两种调用形态
    /// 生效方式一致。
    pub fn into_interceptor(
        self,
    ) -> impl FnMut(Request<()>) -> Result<Request<()>, Status> + Clone {
        move |req| self.intercept(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use tonic::metadata::MetadataValue;

    fn authed_request(token: &str) -> Request<()> {
        let mut req = Request::new(());
        let value: MetadataValue<_> = format!("Bearer {}", token).parse().unwrap();
        req.metadata_mut().insert("authorization", value);
        req
    }

    #[test]
    fn rejected_auth_does_not_consume_rate_quota() {
        let chain = AdmissionChain::from_config(&ChainConfig {
            auth_token: Some("secret".to_string()),
            rate_limit: Some(RateLimitConfig {
                capacity: 1,
                refill_per_sec: 0.0,
                retry_after_secs: 30,
            }),
            breaker: None,
            tracing: false,
        });

        // 未认证请求被拒，不应计入限流配额
        for _ in 0..3 {
            let status = chain.intercept(Request::new(())).unwrap_err();
            assert_eq!(status.code(), tonic::Code::Unauthenticated);
        }

        // 配额仍然完整：首个合法请求被放行
        assert!(chain.intercept(authed_request("secret")).is_ok());
        // 配额耗尽后才轮到限流拒绝
        let status = chain.intercept(authed_request("secret")).unwrap_err();
        assert_eq!(status.code(), tonic::Code::ResourceExhausted);
    }

    #[test]
    fn empty_config_builds_passthrough_chain() {
        let chain = AdmissionChain::from_config(&ChainConfig::default());
        assert!(chain.intercept(Request::new(())).is_ok());
    }
}
