//! 服务注册模块
//!
//! 每个服务实例持有一个租约附着的键。注册成功后由后台任务持续
//! 续期；注销是两阶段握手：调用方发出请求信号，后台任务删除键
//! 后回执，`deregister` 阻塞直到收到回执。

use crate::config::RegistryConfig;
use crate::error::{CoreError, Result};
use crate::store::{CoordinationStore, LeaseId};
use crate::types::{endpoint_key, ServiceEndpoint};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// 低于此 TTL 时续期往返延迟可能导致租约误过期
const TTL_FLOOR: Duration = Duration::from_secs(2);

/// 服务注册器
///
/// 独占持有一个租约绑定：注册成功后，键在租约存续期内必须映射到
/// 本实例的端点记录；租约过期由存储侧自治删除。
pub struct Registry {
    store: Arc<dyn CoordinationStore>,
    key: String,
    value: Vec<u8>,
    ttl: Duration,
    deregister_tx: Option<mpsc::Sender<oneshot::Sender<()>>>,
}

impl Registry {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        config: &RegistryConfig,
        endpoint: &ServiceEndpoint,
    ) -> Result<Self> {
        config.validate()?;
        let ttl = config.ttl_duration();
        if ttl < TTL_FLOOR {
            warn!(
                ttl_secs = config.ttl,
                "registry ttl is shorter than the keepalive round-trip floor, lease may expire spuriously"
            );
        }

        let key = endpoint_key(&config.registry_dir, &endpoint.service_name, &endpoint.node_id);
        let value = serde_json::to_vec(&endpoint.value())?;

        Ok(Self {
            store,
            key,
            value,
            ttl,
            deregister_tx: None,
        })
    }

    /// 注册服务实例
    ///
    /// 申请租约、写入端点记录并启动续期任务。任一步骤失败返回
    /// [`CoreError::Registration`]，调用方必须视为启动期致命错误。
    pub async fn register(&mut self) -> Result<()> {
        if self.deregister_tx.is_some() {
            return Err(CoreError::internal("register called twice"));
        }

        let lease = self
            .store
            .grant(self.ttl)
            .await
            .map_err(|e| CoreError::registration(format!("lease grant failed: {}", e)))?;

        self.store
            .put(&self.key, self.value.clone(), lease)
            .await
            .map_err(|e| CoreError::registration(format!("initial write failed: {}", e)))?;

        info!(key = %self.key, lease, "service registered");

        let (tx, rx) = mpsc::channel(1);
        self.deregister_tx = Some(tx);
        tokio::spawn(run_keepalive(
            self.store.clone(),
            self.key.clone(),
            lease,
            self.ttl,
            rx,
        ));

        Ok(())
    }

    /// 注销服务实例
    ///
    /// 阻塞直到后台任务删除键并回执。重复调用或在注册前调用返回
    /// 内部错误。
    pub async fn deregister(&mut self) -> Result<()> {
        let tx = self
            .deregister_tx
            .take()
            .ok_or_else(|| CoreError::internal("deregister called before register completed"))?;

        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(ack_tx)
            .await
            .map_err(|_| CoreError::internal("registration task already stopped"))?;
        ack_rx
            .await
            .map_err(|_| CoreError::internal("registration task dropped deregister ack"))?;

        info!(key = %self.key, "service deregistered");
        Ok(())
    }
}

/// 注册后台任务：周期续期，等待注销信号
///
/// 续期失败不重试、不重新注册：记录告警后实例随租约过期静默退出
/// 成员集（受控降级）。任务继续等待注销信号，保证握手始终能完成。
async fn run_keepalive(
    store: Arc<dyn CoordinationStore>,
    key: String,
    lease: LeaseId,
    ttl: Duration,
    mut deregister_rx: mpsc::Receiver<oneshot::Sender<()>>,
) {
    let period = (ttl / 3).max(Duration::from_millis(500));
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await; // 首次 tick 立即返回，跳过
    let mut keepalive_alive = true;

    loop {
        tokio::select! {
            _ = ticker.tick(), if keepalive_alive => {
                if let Err(e) = store.keep_alive(lease).await {
                    warn!(
                        key = %key,
                        lease,
                        error = %e,
                        "keepalive failed, instance will fall out of membership when the lease expires"
                    );
                    keepalive_alive = false;
                }
            }
            msg = deregister_rx.recv() => {
                let Some(ack) = msg else {
                    // Registry 被丢弃且未注销：键随租约过期
                    return;
                };
                if let Err(e) = store.delete(&key).await {
                    warn!(key = %key, error = %e, "failed to delete registration key");
                }
                let _ = ack.send(());
                return;
            }
        }
    }
}
