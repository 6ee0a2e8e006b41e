//! 服务解析模块
//!
//! 监听注册目录下某个服务名的成员变更，维护当前存活端点集的
//! 快照并发布给订阅者（Balancer）。快照与存储是最终一致：按
//! watch 事件到达顺序应用，同一节点以最后一个事件为准。

use crate::error::{CoreError, Result};
use crate::store::{CoordinationStore, WatchEvent};
use crate::types::{service_prefix, ServiceEndpoint};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// watch 流断开后的重订阅间隔
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_millis(500);

/// 成员集快照，按节点 ID 排序，保证轮询旋转稳定
pub type MembershipSnapshot = Arc<Vec<ServiceEndpoint>>;

/// 服务解析器
///
/// 构造时完成一次全量读取（首个快照），随后由后台任务消费 watch
/// 事件。watch 流断开时保留最后已知快照（可用性优先于新鲜度），
/// 并以固定间隔重新订阅。
pub struct Resolver {
    service_name: String,
    snapshot_rx: watch::Receiver<MembershipSnapshot>,
    stale: Arc<AtomicBool>,
}

impl Resolver {
    /// 创建解析器并完成初始加载
    pub async fn start(
        store: Arc<dyn CoordinationStore>,
        registry_dir: &str,
        service_name: &str,
    ) -> Result<Self> {
        let prefix = service_prefix(registry_dir, service_name);
        let mut members = load_members(store.as_ref(), &prefix, service_name).await?;
        info!(
            service = service_name,
            count = members.len(),
            "resolver seeded from initial read"
        );

        let (snapshot_tx, snapshot_rx) = watch::channel(make_snapshot(&members));
        let stale = Arc::new(AtomicBool::new(false));

        let task_store = store.clone();
        let task_prefix = prefix.clone();
        let task_service = service_name.to_string();
        let task_stale = stale.clone();
        tokio::spawn(async move {
            let mut seeded = true;
            loop {
                let mut events = match task_store.watch_prefix(&task_prefix).await {
                    Ok(rx) => rx,
                    Err(e) => {
                        warn!(service = %task_service, error = %e, "watch subscription failed, retrying");
                        tokio::time::sleep(RESUBSCRIBE_BACKOFF).await;
                        continue;
                    }
                };

                // 重订阅成功后全量读取，弥补断流期间丢失的事件；
                // 首次订阅复用构造时的初始快照。
                if !seeded {
                    match load_members(task_store.as_ref(), &task_prefix, &task_service).await {
                        Ok(fresh) => {
                            members = fresh;
                            snapshot_tx.send_replace(make_snapshot(&members));
                            task_stale.store(false, Ordering::Relaxed);
                            info!(
                                service = %task_service,
                                count = members.len(),
                                "resolver reseeded after watch reconnect"
                            );
                        }
                        Err(e) => {
                            warn!(service = %task_service, error = %e, "reseed failed, keeping stale view");
                            tokio::time::sleep(RESUBSCRIBE_BACKOFF).await;
                            continue;
                        }
                    }
                }
                seeded = false;

                while let Some(event) = events.recv().await {
                    apply_event(&mut members, &task_service, event);
                    snapshot_tx.send_replace(make_snapshot(&members));
                }

                task_stale.store(true, Ordering::Relaxed);
                warn!(service = %task_service, "watch stream closed, resubscribing");
                tokio::time::sleep(RESUBSCRIBE_BACKOFF).await;
            }
        });

        Ok(Self {
            service_name: service_name.to_string(),
            snapshot_rx,
            stale,
        })
    }

    /// 订阅成员集快照
    pub fn subscribe(&self) -> watch::Receiver<MembershipSnapshot> {
        self.snapshot_rx.clone()
    }

    /// 当前成员集快照
    pub fn current(&self) -> MembershipSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 解析状态：watch 断开期间视图可能过期
    ///
    /// 过期视图仍然可用（降级而非失败），错误仅供观测上报。
    pub fn resolution_status(&self) -> Result<()> {
        if self.stale.load(Ordering::Relaxed) {
            Err(CoreError::ResolutionStale {
                service: self.service_name.clone(),
            })
        } else {
            Ok(())
        }
    }
}

async fn load_members(
    store: &dyn CoordinationStore,
    prefix: &str,
    service_name: &str,
) -> Result<BTreeMap<String, ServiceEndpoint>> {
    let pairs = store.get_prefix(prefix).await?;
    let mut members = BTreeMap::new();
    for (key, value) in pairs {
        match ServiceEndpoint::from_kv(service_name, &key, &value) {
            Some(endpoint) => {
                members.insert(endpoint.node_id.clone(), endpoint);
            }
            None => warn!(key = %key, "skipping unparseable endpoint record"),
        }
    }
    Ok(members)
}

/// 按事件到达顺序折叠成员集：Put 加入或更新，Delete 移除
fn apply_event(
    members: &mut BTreeMap<String, ServiceEndpoint>,
    service_name: &str,
    event: WatchEvent,
) {
    match event {
        WatchEvent::Put { key, value } => match ServiceEndpoint::from_kv(service_name, &key, &value)
        {
            Some(endpoint) => {
                debug!(node = %endpoint.node_id, "member joined or updated");
                members.insert(endpoint.node_id.clone(), endpoint);
            }
            None => warn!(key = %key, "skipping unparseable endpoint record"),
        },
        WatchEvent::Delete { key } => {
            if let Some(node_id) = key.rsplit('/').next() {
                if members.remove(node_id).is_some() {
                    debug!(node = %node_id, "member left");
                }
            }
        }
    }
}

fn make_snapshot(members: &BTreeMap<String, ServiceEndpoint>) -> MembershipSnapshot {
    Arc::new(members.values().cloned().collect())
}
