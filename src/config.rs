//! 配置定义
//!
//! 所有组件在构造时接收显式配置结构，不依赖进程级可变状态。

use crate::error::{CoreError, Result};
use crate::selector::LoadBalanceStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认注册目录
pub const DEFAULT_REGISTRY_DIR: &str = "/ember.service";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub chain: ChainConfig,
}

/// 服务实例配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// 服务名
    pub name: String,
    /// 服务地址（host:port）
    pub address: String,
    /// 节点 ID，缺省时随机生成
    #[serde(default = "default_node_id")]
    pub node_id: String,
    /// 随端点记录发布的元数据（如版本、可用区）
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

fn default_node_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.address.is_empty() || self.node_id.is_empty() {
            return Err(CoreError::invalid_config(
                "service name, address and node_id must not be empty",
            ));
        }
        Ok(())
    }
}

/// 注册中心配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// 协调存储地址
    pub endpoints: Vec<String>,
    /// 注册目录
    #[serde(default = "default_registry_dir")]
    pub registry_dir: String,
    /// 租约 TTL（秒）
    #[serde(default = "default_ttl")]
    pub ttl: u64,
}

fn default_registry_dir() -> String {
    DEFAULT_REGISTRY_DIR.to_string()
}

fn default_ttl() -> u64 {
    10
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(CoreError::invalid_config(
                "registry endpoints must not be empty",
            ));
        }
        if self.ttl == 0 {
            return Err(CoreError::invalid_config("registry ttl must be > 0"));
        }
        Ok(())
    }

    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

/// 准入链配置
///
/// 声明式描述拦截器链：启用的阶段按固定顺序
/// 认证 → 限流 → 熔断 → 观测 组装，不做命令式拼接。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChainConfig {
    /// 服务端静态访问令牌，None 表示不启用认证
    pub auth_token: Option<String>,
    /// 服务端限流策略
    pub rate_limit: Option<RateLimitConfig>,
    /// 客户端熔断策略
    pub breaker: Option<BreakerConfig>,
    /// 请求日志观测
    #[serde(default)]
    pub tracing: bool,
}

/// 令牌桶限流配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// 桶容量
    pub capacity: u64,
    /// 每秒补充令牌数
    pub refill_per_sec: f64,
    /// 拒绝时建议的重试间隔（秒）
    #[serde(default = "default_retry_after")]
    pub retry_after_secs: u64,
}

fn default_retry_after() -> u64 {
    30
}

/// 熔断器配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BreakerConfig {
    /// 触发熔断的失败率阈值（0.0 - 1.0）
    #[serde(default = "default_failure_ratio")]
    pub failure_ratio: f64,
    /// 采样窗口内的最小样本数，不足时不熔断
    #[serde(default = "default_min_samples")]
    pub min_samples: u32,
    /// 采样窗口长度（秒）
    #[serde(default = "default_window")]
    pub window_secs: u64,
    /// 打开后进入半开前的冷却时间（秒）
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

fn default_failure_ratio() -> f64 {
    0.5
}

fn default_min_samples() -> u32 {
    10
}

fn default_window() -> u64 {
    10
}

fn default_cooldown() -> u64 {
    30
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_ratio: default_failure_ratio(),
            min_samples: default_min_samples(),
            window_secs: default_window(),
            cooldown_secs: default_cooldown(),
        }
    }
}

/// 客户端配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// 目标服务名
    pub service_name: String,
    /// 注册中心配置
    pub registry: RegistryConfig,
    /// 负载均衡策略
    #[serde(default)]
    pub strategy: LoadBalanceStrategy,
    /// 单次调用超时（秒）
    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,
    /// 客户端访问令牌
    pub access_token: Option<String>,
    /// 熔断策略
    pub breaker: Option<BreakerConfig>,
}

fn default_call_timeout() -> u64 {
    30
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.service_name.is_empty() {
            return Err(CoreError::invalid_config("service_name must not be empty"));
        }
        self.registry.validate()
    }
}

impl Config {
    /// 从 TOML 文件加载配置
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::invalid_config(format!("failed to read {}: {}", path, e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CoreError::invalid_config(format!("failed to parse {}: {}", path, e)))?;
        config.service.validate()?;
        config.registry.validate()?;
        Ok(config)
    }
}
