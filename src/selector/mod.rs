//! 端点选择策略
//!
//! 选择器是对给定成员集快照的纯策略：不持有成员集，只在内部
//! 维护策略状态（如轮询游标），必须允许任意并发调用。

pub mod random;
pub mod round_robin;

pub use random::RandomSelector;
pub use round_robin::RoundRobinSelector;

use crate::types::ServiceEndpoint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 负载均衡策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// 轮询
    #[default]
    RoundRobin,
    /// 随机
    Random,
}

/// 端点选择器
///
/// 空集返回 None，由调用方映射为 NoAvailableEndpoint；不得 panic
/// 或阻塞。
pub trait Selector: Send + Sync {
    fn select<'a>(&self, endpoints: &'a [ServiceEndpoint]) -> Option<&'a ServiceEndpoint>;
}

/// 按策略创建内置选择器
pub fn create_selector(strategy: LoadBalanceStrategy) -> Arc<dyn Selector> {
    match strategy {
        LoadBalanceStrategy::RoundRobin => Arc::new(RoundRobinSelector::new()),
        LoadBalanceStrategy::Random => Arc::new(RandomSelector::new()),
    }
}
