//! 协调存储抽象
//!
//! 将底层键值存储收敛为注册与发现所需的最小接口：租约申请、
//! 带租约写入、续期、删除、前缀读取与前缀 watch。存储自身的共识
//! 与持久化保证不在本 crate 范围内。
//!
//! 支持两种后端：etcd 与内存实现（本地开发与测试用）。

pub mod etcd;
pub mod memory;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// 租约 ID
pub type LeaseId = i64;

/// 前缀 watch 事件
///
/// Put = 实例加入或更新，Delete = 实例离开（显式注销或租约过期）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// 协调存储接口
///
/// 所有实现必须保证：附着在租约上的键在租约过期后由存储侧自动
/// 删除，并向 watch 订阅者投递对应的 Delete 事件。
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// 申请租约，返回租约 ID
    async fn grant(&self, ttl: Duration) -> Result<LeaseId>;

    /// 写入键值并附着到租约
    async fn put(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<()>;

    /// 续期一次租约
    async fn keep_alive(&self, lease: LeaseId) -> Result<()>;

    /// 删除键
    async fn delete(&self, key: &str) -> Result<()>;

    /// 读取前缀下的所有键值对
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// 订阅前缀变更
    ///
    /// 返回的 channel 关闭表示 watch 流终止（存储重启、网络分区），
    /// 调用方负责重新订阅。
    async fn watch_prefix(&self, prefix: &str) -> Result<mpsc::Receiver<WatchEvent>>;
}
