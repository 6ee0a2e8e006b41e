//! 服务端引导模块
//!
//! 校验配置、注册实例、构建准入链。注册失败视为启动期致命
//! 错误直接返回；关停前必须完成注销握手。

use crate::config::Config;
use crate::error::Result;
use crate::interceptor::AdmissionChain;
use crate::registry::Registry;
use crate::store::CoordinationStore;
use crate::types::ServiceEndpoint;
use std::sync::Arc;
use tonic::transport::Server;
use tonic::{Request, Status};
use tracing::info;

/// 服务实例
///
/// 生成的 gRPC 服务通过 [`Service::interceptor`] 取得准入链，
/// 用 `tonic::service::interceptor` 挂到各自的服务上；本类型
/// 负责实例的注册生命周期。
pub struct Service {
    endpoint: ServiceEndpoint,
    registry: Registry,
    chain: AdmissionChain,
}

impl Service {
    /// 引导服务实例：校验配置 → 注册 → 构建准入链
    pub async fn bootstrap(store: Arc<dyn CoordinationStore>, config: &Config) -> Result<Self> {
        config.service.validate()?;
        config.registry.validate()?;

        let mut endpoint = ServiceEndpoint::new(
            &config.service.name,
            &config.service.node_id,
            &config.service.address,
        );
        endpoint.metadata = config.service.metadata.clone();

        let mut registry = Registry::new(store, &config.registry, &endpoint)?;
        registry.register().await?;

        let chain = AdmissionChain::from_config(&config.chain);
        info!(
            service = %endpoint.service_name,
            node = %endpoint.node_id,
            "service bootstrapped"
        );

        Ok(Self {
            endpoint,
            registry,
            chain,
        })
    }

    /// 准入链的 tonic 拦截器
    pub fn interceptor(
        &self,
    ) -> impl FnMut(Request<()>) -> std::result::Result<Request<()>, Status> + Clone {
        self.chain.clone().into_interceptor()
    }

    /// 准入链
    pub fn chain(&self) -> &AdmissionChain {
        &self.chain
    }

    /// tonic 服务器构建器
    pub fn server_builder(&self) -> Server {
        Server::builder()
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// 关停：阻塞直到注销握手完成
    ///
    /// 必须在进程退出前调用；未注销的实例要等租约过期才会离开
    /// 成员集。
    pub async fn shutdown(mut self) -> Result<()> {
        self.registry.deregister().await
    }
}
