//! 内存协调存储后端
//!
//! 完整实现租约过期与前缀 watch 语义，供本地开发与测试使用，
//! 不提供持久化。

use super::{CoordinationStore, LeaseId, WatchEvent};
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// 租约过期扫描间隔
const SWEEP_INTERVAL: Duration = Duration::from_millis(20);

struct StoredValue {
    value: Vec<u8>,
    lease: LeaseId,
}

struct Lease {
    ttl: Duration,
    expires_at: Instant,
}

struct Watcher {
    prefix: String,
    tx: mpsc::Sender<WatchEvent>,
}

#[derive(Default)]
struct State {
    kvs: BTreeMap<String, StoredValue>,
    leases: HashMap<LeaseId, Lease>,
    next_lease_id: LeaseId,
    watchers: Vec<Watcher>,
}

/// 内存后端
///
/// 必须在 tokio 运行时内创建：构造时启动后台扫描任务，按
/// [`SWEEP_INTERVAL`] 周期删除过期租约下的键并投递 Delete 事件，
/// 模拟存储侧自治的过期行为。
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let state = Arc::new(Mutex::new(State::default()));
        Self::spawn_sweeper(Arc::downgrade(&state));
        Self { state }
    }

    fn spawn_sweeper(state: Weak<Mutex<State>>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let Some(state) = state.upgrade() else { return };
                let mut state = state.lock().expect("memory store lock poisoned");
                sweep_expired(&mut state);
            }
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 删除过期租约及其键，并通知订阅者
fn sweep_expired(state: &mut State) {
    let now = Instant::now();
    let expired: Vec<LeaseId> = state
        .leases
        .iter()
        .filter(|(_, lease)| lease.expires_at <= now)
        .map(|(id, _)| *id)
        .collect();

    for lease_id in expired {
        state.leases.remove(&lease_id);
        let keys: Vec<String> = state
            .kvs
            .iter()
            .filter(|(_, v)| v.lease == lease_id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys {
            state.kvs.remove(&key);
            debug!(key = %key, lease = lease_id, "lease expired, key removed");
            notify(&mut state.watchers, WatchEvent::Delete { key });
        }
    }
}

/// 向匹配前缀的订阅者投递事件；投递失败的订阅者被移除
fn notify(watchers: &mut Vec<Watcher>, event: WatchEvent) {
    watchers.retain(|w| {
        let matches = match &event {
            WatchEvent::Put { key, .. } | WatchEvent::Delete { key } => key.starts_with(&w.prefix),
        };
        if !matches {
            return true;
        }
        w.tx.try_send(event.clone()).is_ok()
    });
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn grant(&self, ttl: Duration) -> Result<LeaseId> {
        let mut state = self.state.lock().expect("memory store lock poisoned");
        state.next_lease_id += 1;
        let id = state.next_lease_id;
        state.leases.insert(
            id,
            Lease {
                ttl,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(id)
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease: LeaseId) -> Result<()> {
        let mut state = self.state.lock().expect("memory store lock poisoned");
        if !state.leases.contains_key(&lease) {
            return Err(CoreError::store(format!("lease {} not found", lease)));
        }
        state
            .kvs
            .insert(key.to_string(), StoredValue { value: value.clone(), lease });
        notify(
            &mut state.watchers,
            WatchEvent::Put {
                key: key.to_string(),
                value,
            },
        );
        Ok(())
    }

    async fn keep_alive(&self, lease: LeaseId) -> Result<()> {
        let mut state = self.state.lock().expect("memory store lock poisoned");
        match state.leases.get_mut(&lease) {
            Some(l) => {
                l.expires_at = Instant::now() + l.ttl;
                Ok(())
            }
            None => Err(CoreError::store(format!("lease {} expired", lease))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().expect("memory store lock poisoned");
        if state.kvs.remove(key).is_some() {
            notify(
                &mut state.watchers,
                WatchEvent::Delete {
                    key: key.to_string(),
                },
            );
        }
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let state = self.state.lock().expect("memory store lock poisoned");
        Ok(state
            .kvs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect())
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<mpsc::Receiver<WatchEvent>> {
        let (tx, rx) = mpsc::channel(256);
        let mut state = self.state.lock().expect("memory store lock poisoned");
        state.watchers.push(Watcher {
            prefix: prefix.to_string(),
            tx,
        });
        Ok(rx)
    }
}
