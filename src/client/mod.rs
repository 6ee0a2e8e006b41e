//! 客户端引导模块
//!
//! 将解析器、均衡器、熔断器与凭证注入装配为一个服务客户端。
//! 调用路径：pick 选连接 → 注入凭证 → 熔断器包裹 → 带超时执行
//! → 回执完成回调。本层不做任何自动重试，重试策略由上层决定。

use crate::balancer::{Balancer, CallGuard};
use crate::breaker::CircuitBreaker;
use crate::config::ClientConfig;
use crate::error::{CoreError, Result};
use crate::interceptor::{Credential, StaticTokenCredential};
use crate::resolver::Resolver;
use crate::selector::create_selector;
use crate::store::CoordinationStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::info;

/// 服务客户端
pub struct ServiceClient {
    resolver: Resolver,
    balancer: Balancer,
    breaker: Option<Arc<CircuitBreaker>>,
    credential: Option<Arc<dyn Credential>>,
    timeout: Duration,
}

impl ServiceClient {
    /// 装配客户端
    ///
    /// 返回前已完成解析器的初始加载：构造成功即具备选取能力
    /// （成员集可能为空，此时调用失败而非阻塞）。
    pub async fn connect(store: Arc<dyn CoordinationStore>, config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let resolver = Resolver::start(
            store,
            &config.registry.registry_dir,
            &config.service_name,
        )
        .await?;
        let balancer = Balancer::new(&resolver, create_selector(config.strategy));

        let breaker = config
            .breaker
            .as_ref()
            .map(|b| Arc::new(CircuitBreaker::new(b.clone())));

        let credential: Option<Arc<dyn Credential>> = match &config.access_token {
            Some(token) => Some(Arc::new(StaticTokenCredential::new(token).map_err(|e| {
                CoreError::invalid_config(format!("invalid access token: {}", e))
            })?)),
            None => None,
        };

        info!(service = %config.service_name, "service client connected");

        Ok(Self {
            resolver,
            balancer,
            breaker,
            credential,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// 为一次调用选取连接与完成回执
    pub fn pick(&self) -> Result<(Channel, CallGuard)> {
        self.balancer.pick()
    }

    /// 向出站请求注入凭证
    pub fn attach_credential<T>(&self, req: &mut Request<T>) -> std::result::Result<(), Status> {
        if let Some(ref credential) = self.credential {
            credential.attach(req.metadata_mut())?;
        }
        Ok(())
    }

    /// 执行一次被守护的出站调用
    ///
    /// `invoke` 收到选中的连接并完成实际调用（通常是生成的 gRPC
    /// 客户端方法）。熔断器紧贴调用本身，超时计入熔断采样。
    pub async fn call<T, F, Fut>(&self, invoke: F) -> std::result::Result<T, Status>
    where
        F: FnOnce(Channel) -> Fut,
        Fut: Future<Output = std::result::Result<T, Status>>,
    {
        let (channel, guard) = self.pick().map_err(Status::from)?;
        let timeout = self.timeout;

        let result = match &self.breaker {
            Some(breaker) => {
                breaker
                    .call(|| with_deadline(timeout, invoke(channel)))
                    .await
            }
            None => with_deadline(timeout, invoke(channel)).await,
        };

        guard.done(result.is_ok());
        result
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn balancer(&self) -> &Balancer {
        &self.balancer
    }

    pub fn breaker(&self) -> Option<&CircuitBreaker> {
        self.breaker.as_deref()
    }
}

/// 统一施加调用超时，超时按 DeadlineExceeded 上报
async fn with_deadline<T>(
    timeout: Duration,
    fut: impl Future<Output = std::result::Result<T, Status>>,
) -> std::result::Result<T, Status> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Status::deadline_exceeded("call deadline exceeded")),
    }
}
