//! 负载均衡模块
//!
//! 将 Resolver 的成员集快照与选择策略、连接池绑定：快照变更时
//! 增量调和连接池（新端点建连、离开端点关闭、不变端点不动），
//! 每次出站调用通过 [`Balancer::pick`] 选取一个端点的连接。

use crate::error::{CoreError, Result};
use crate::resolver::{MembershipSnapshot, Resolver};
use crate::selector::Selector;
use crate::types::ServiceEndpoint;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::watch;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, warn};

struct PooledChannel {
    channel: Channel,
    address: String,
}

/// 负载均衡器
///
/// `pick` 可被任意数量的在途调用并发执行；它读取最新发布的快照
/// 与连接池，从不等待更新（最终一致，不保证线性一致）。
pub struct Balancer {
    service_name: String,
    selector: Arc<dyn Selector>,
    snapshot_rx: watch::Receiver<MembershipSnapshot>,
    pool: Arc<RwLock<HashMap<String, PooledChannel>>>,
}

/// 单次调用的完成回执
///
/// 调用结束后由调用方回调。基础实现只记录耗时与结果，为按调用
/// 健康度扩展的策略保留挂点。
#[derive(Debug)]
pub struct CallGuard {
    service_name: String,
    node_id: String,
    started: Instant,
}

impl CallGuard {
    /// 上报调用结果
    pub fn done(self, success: bool) {
        debug!(
            service = %self.service_name,
            node = %self.node_id,
            success,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "call finished"
        );
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

impl Balancer {
    /// 绑定解析器与选择策略
    ///
    /// 立即用当前快照建池，并启动后台调和任务跟随后续快照。
    pub fn new(resolver: &Resolver, selector: Arc<dyn Selector>) -> Self {
        let snapshot_rx = resolver.subscribe();
        let pool = Arc::new(RwLock::new(HashMap::new()));
        reconcile(&pool, &snapshot_rx.borrow());

        let mut task_rx = resolver.subscribe();
        let task_pool = pool.clone();
        tokio::spawn(async move {
            while task_rx.changed().await.is_ok() {
                let snapshot = task_rx.borrow_and_update().clone();
                reconcile(&task_pool, &snapshot);
            }
            // 发送端随 Resolver 任务存活，正常情况下不会走到这里
        });

        Self {
            service_name: resolver.service_name().to_string(),
            selector,
            snapshot_rx,
            pool,
        }
    }

    /// 为一次出站调用选取连接
    ///
    /// 成员集为空时立即返回 [`CoreError::NoAvailableEndpoint`]，
    /// 从不阻塞等待新快照。
    pub fn pick(&self) -> Result<(Channel, CallGuard)> {
        let snapshot = self.snapshot_rx.borrow().clone();
        let endpoint = self
            .selector
            .select(&snapshot)
            .ok_or_else(|| CoreError::no_available_endpoint(&self.service_name))?;

        let channel = self.channel_for(endpoint)?;
        Ok((
            channel,
            CallGuard {
                service_name: self.service_name.clone(),
                node_id: endpoint.node_id.clone(),
                started: Instant::now(),
            },
        ))
    }

    /// 当前连接池大小（观测用）
    pub fn pool_size(&self) -> usize {
        self.pool.read().expect("balancer pool lock poisoned").len()
    }

    /// 取出端点对应的连接
    ///
    /// 快照可能先于调和任务到达；池中缺失时就地建连，避免在
    /// 新端点刚加入的窗口内拒绝调用。
    fn channel_for(&self, endpoint: &ServiceEndpoint) -> Result<Channel> {
        {
            let pool = self.pool.read().expect("balancer pool lock poisoned");
            if let Some(pooled) = pool.get(&endpoint.node_id) {
                if pooled.address == endpoint.address {
                    return Ok(pooled.channel.clone());
                }
            }
        }

        let channel = make_channel(endpoint)?;
        let mut pool = self.pool.write().expect("balancer pool lock poisoned");
        pool.insert(
            endpoint.node_id.clone(),
            PooledChannel {
                channel: channel.clone(),
                address: endpoint.address.clone(),
            },
        );
        Ok(channel)
    }
}

/// 按快照调和连接池：开新、关旧、不变不动
fn reconcile(pool: &RwLock<HashMap<String, PooledChannel>>, snapshot: &MembershipSnapshot) {
    let desired: HashMap<&str, &ServiceEndpoint> = snapshot
        .iter()
        .map(|e| (e.node_id.as_str(), e))
        .collect();

    let mut pool = pool.write().expect("balancer pool lock poisoned");

    pool.retain(|node_id, pooled| match desired.get(node_id.as_str()) {
        // 地址变更视为离开加加入
        Some(endpoint) => pooled.address == endpoint.address,
        None => {
            debug!(node = %node_id, "closing connection for departed endpoint");
            false
        }
    });

    for endpoint in snapshot.iter() {
        if pool.contains_key(&endpoint.node_id) {
            continue;
        }
        match make_channel(endpoint) {
            Ok(channel) => {
                debug!(node = %endpoint.node_id, address = %endpoint.address, "opened connection");
                pool.insert(
                    endpoint.node_id.clone(),
                    PooledChannel {
                        channel,
                        address: endpoint.address.clone(),
                    },
                );
            }
            Err(e) => warn!(node = %endpoint.node_id, error = %e, "failed to open connection"),
        }
    }
}

/// 懒连接：首个请求时才真正建立传输连接
fn make_channel(endpoint: &ServiceEndpoint) -> Result<Channel> {
    let uri = endpoint.to_grpc_uri();
    let endpoint = Endpoint::from_shared(uri.clone())
        .map_err(|e| CoreError::internal(format!("invalid endpoint uri {}: {}", uri, e)))?;
    Ok(endpoint.connect_lazy())
}
