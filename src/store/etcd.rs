//! etcd 协调存储后端

use super::{CoordinationStore, LeaseId, WatchEvent};
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use etcd_client::{Client, EventType, GetOptions, PutOptions, WatchOptions};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// etcd 后端
///
/// etcd-client 的 Client 可廉价克隆，每次操作克隆一份以获得可变句柄。
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// 连接 etcd 集群
    pub async fn connect(endpoints: Vec<String>) -> Result<Self> {
        let client = Client::connect(&endpoints, None)
            .await
            .map_err(|e| CoreError::store(format!("failed to connect to etcd: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn grant(&self, ttl: Duration) -> Result<LeaseId> {
        let mut client = self.client.clone();
        let resp = client.lease_grant(ttl.as_secs() as i64, None).await?;
        Ok(resp.id())
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<()> {
        let mut client = self.client.clone();
        let opts = PutOptions::new().with_lease(lease);
        client.put(key, value, Some(opts)).await?;
        Ok(())
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<()> {
        let mut client = self.client.clone();
        let (mut keeper, mut stream) = client.lease_keep_alive(lease).await?;
        keeper.keep_alive().await?;
        match stream.message().await? {
            Some(resp) if resp.ttl() > 0 => Ok(()),
            // ttl == 0 表示租约已在存储侧过期
            Some(_) | None => Err(CoreError::store(format!("lease {} expired", lease))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut client = self.client.clone();
        client.delete(key, None).await?;
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut client = self.client.clone();
        let opts = GetOptions::new().with_prefix();
        let resp = client.get(prefix, Some(opts)).await?;

        let mut pairs = Vec::new();
        for kv in resp.kvs() {
            pairs.push((
                String::from_utf8_lossy(kv.key()).to_string(),
                kv.value().to_vec(),
            ));
        }
        Ok(pairs)
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<mpsc::Receiver<WatchEvent>> {
        let mut client = self.client.clone();
        let opts = WatchOptions::new().with_prefix();
        let (_watcher, mut stream) = client.watch(prefix, Some(opts)).await?;

        let (tx, rx) = mpsc::channel(64);
        let prefix = prefix.to_string();

        tokio::spawn(async move {
            use tokio_stream::StreamExt;
            loop {
                match stream.next().await {
                    Some(Ok(resp)) => {
                        for event in resp.events() {
                            let Some(kv) = event.kv() else { continue };
                            let key = String::from_utf8_lossy(kv.key()).to_string();
                            let watch_event = match event.event_type() {
                                EventType::Put => WatchEvent::Put {
                                    key,
                                    value: kv.value().to_vec(),
                                },
                                EventType::Delete => WatchEvent::Delete { key },
                            };
                            if tx.send(watch_event).await.is_err() {
                                debug!(prefix = %prefix, "watch subscriber dropped, stopping forwarder");
                                return;
                            }
                        }
                    }
                    None => {
                        warn!(prefix = %prefix, "etcd watch stream closed");
                        return;
                    }
                    Some(Err(e)) => {
                        warn!(prefix = %prefix, error = %e, "etcd watch stream error");
                        return;
                    }
                }
            }
            // tx 随任务结束被丢弃，订阅方据此重新订阅
        });

        Ok(rx)
    }
}
