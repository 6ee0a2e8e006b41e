//! 统一错误类型
//!
//! 区分三类失败：启动期致命错误（注册、配置）、发现层可恢复错误
//! 与单次调用的准入拒绝（认证、限流、熔断）。

use std::time::Duration;
use thiserror::Error;

/// Ember 统一错误类型
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// 注册失败（租约申请或初始写入失败），启动期致命
    #[error("registration failed: {0}")]
    Registration(String),

    /// 配置校验失败，启动期致命
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// watch 流断开期间成员视图可能过期（可用性优先，非致命）
    #[error("membership view for service '{service}' may be stale")]
    ResolutionStale { service: String },

    /// 当前成员集为空，无端点可选
    #[error("no available endpoint for service '{service}'")]
    NoAvailableEndpoint { service: String },

    /// 熔断器处于打开状态，调用被本地短路
    #[error("circuit breaker is open")]
    BreakerOpen,

    /// 限流窗口耗尽，附带建议的重试间隔
    #[error("rate limit of {limit} exceeded, retry after {retry_after:?}")]
    RateExhausted { limit: u64, retry_after: Duration },

    /// 凭证缺失或无效
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// 凭证有效但权限不足
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// 业务参数校验失败，携带字段级明细
    #[error("invalid argument '{field}': {description}")]
    InvalidArgument { field: String, description: String },

    /// 协调存储操作失败
    #[error("coordination store error: {0}")]
    Store(String),

    /// 内部错误
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn registration(msg: impl Into<String>) -> Self {
        CoreError::Registration(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        CoreError::InvalidConfig(msg.into())
    }

    pub fn no_available_endpoint(service: impl Into<String>) -> Self {
        CoreError::NoAvailableEndpoint {
            service: service.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        CoreError::Store(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CoreError::Internal(msg.into())
    }

    pub fn invalid_argument(field: impl Into<String>, description: impl Into<String>) -> Self {
        CoreError::InvalidArgument {
            field: field.into(),
            description: description.into(),
        }
    }

    /// 是否为启动期致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::Registration(_) | CoreError::InvalidConfig(_)
        )
    }
}

impl From<etcd_client::Error> for CoreError {
    fn from(err: etcd_client::Error) -> Self {
        CoreError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("serialization failed: {}", err))
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;
