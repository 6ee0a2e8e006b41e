//! 注册与解析集成测试
//!
//! 基于内存协调存储验证注册、注销握手、watch 折叠与租约过期。
//! 需要真实 etcd 的场景参见 `EtcdStore`（此处不覆盖）。

use ember_service_core::{
    CoordinationStore, MemoryStore, Registry, RegistryConfig, Resolver, ServiceEndpoint,
};
use std::sync::Arc;
use std::time::Duration;

const REGISTRY_DIR: &str = "/ember.service";

fn registry_config(ttl: u64) -> RegistryConfig {
    RegistryConfig {
        endpoints: vec!["memory://".to_string()],
        registry_dir: REGISTRY_DIR.to_string(),
        ttl,
    }
}

/// 轮询等待条件成立，超时 panic
async fn wait_until(mut condition: impl FnMut() -> bool, what: &str) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for: {}", what);
}

#[tokio::test]
async fn deregister_removes_record_from_store() {
    let store = Arc::new(MemoryStore::new());
    let endpoint = ServiceEndpoint::new("orders", "n1", "127.0.0.1:50051");
    let mut registry = Registry::new(store.clone(), &registry_config(10), &endpoint).unwrap();

    registry.register().await.unwrap();
    assert_eq!(
        store.get_prefix("/ember.service/orders/").await.unwrap().len(),
        1
    );

    // 注销是阻塞的两阶段握手，返回即保证键已删除
    registry.deregister().await.unwrap();
    assert!(store
        .get_prefix("/ember.service/orders/")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn resolver_follows_joins_and_leaves() {
    let store = Arc::new(MemoryStore::new());
    let resolver = Resolver::start(store.clone(), REGISTRY_DIR, "orders")
        .await
        .unwrap();
    assert!(resolver.current().is_empty());

    let e1 = ServiceEndpoint::new("orders", "n1", "127.0.0.1:50051");
    let e2 = ServiceEndpoint::new("orders", "n2", "127.0.0.1:50052");
    let mut r1 = Registry::new(store.clone(), &registry_config(10), &e1).unwrap();
    let mut r2 = Registry::new(store.clone(), &registry_config(10), &e2).unwrap();

    r1.register().await.unwrap();
    r2.register().await.unwrap();
    wait_until(|| resolver.current().len() == 2, "both members visible").await;

    // 快照按节点 ID 排序
    let nodes: Vec<String> = resolver.current().iter().map(|e| e.node_id.clone()).collect();
    assert_eq!(nodes, vec!["n1", "n2"]);

    r1.deregister().await.unwrap();
    wait_until(|| resolver.current().len() == 1, "n1 departed").await;
    assert_eq!(resolver.current()[0].node_id, "n2");
}

#[tokio::test]
async fn resolver_seeds_from_existing_records() {
    let store = Arc::new(MemoryStore::new());
    let endpoint = ServiceEndpoint::new("orders", "n1", "127.0.0.1:50051");
    let mut registry = Registry::new(store.clone(), &registry_config(10), &endpoint).unwrap();
    registry.register().await.unwrap();

    // 解析器构造完成即包含已有成员，无需等待 watch 事件
    let resolver = Resolver::start(store, REGISTRY_DIR, "orders").await.unwrap();
    assert_eq!(resolver.current().len(), 1);
    assert!(resolver.resolution_status().is_ok());
}

#[tokio::test]
async fn lease_expiry_evicts_silent_instance() {
    let store = Arc::new(MemoryStore::new());
    let resolver = Resolver::start(store.clone(), REGISTRY_DIR, "orders")
        .await
        .unwrap();

    // 绕过 Registry 直接写入短租约记录，模拟续期停止的实例
    let lease = store.grant(Duration::from_millis(100)).await.unwrap();
    let value = serde_json::to_vec(
        &ServiceEndpoint::new("orders", "n1", "127.0.0.1:50051").value(),
    )
    .unwrap();
    store
        .put("/ember.service/orders/n1", value, lease)
        .await
        .unwrap();

    wait_until(|| resolver.current().len() == 1, "member visible").await;
    // 停止续期后由存储侧自治删除
    wait_until(|| resolver.current().is_empty(), "member evicted").await;
}

#[tokio::test]
async fn keepalive_holds_membership_across_ttl() {
    let store = Arc::new(MemoryStore::new());
    let endpoint = ServiceEndpoint::new("orders", "n1", "127.0.0.1:50051");
    let mut registry = Registry::new(store.clone(), &registry_config(1), &endpoint).unwrap();
    registry.register().await.unwrap();

    // 跨越多个 TTL 周期，续期任务应当保持记录存活
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(
        store.get_prefix("/ember.service/orders/").await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn updated_record_replaces_previous_value() {
    let store = Arc::new(MemoryStore::new());
    let resolver = Resolver::start(store.clone(), REGISTRY_DIR, "orders")
        .await
        .unwrap();

    let lease = store.grant(Duration::from_secs(10)).await.unwrap();
    let v1 = serde_json::to_vec(&ServiceEndpoint::new("orders", "n1", "127.0.0.1:1").value())
        .unwrap();
    let v2 = serde_json::to_vec(&ServiceEndpoint::new("orders", "n1", "127.0.0.1:2").value())
        .unwrap();

    store.put("/ember.service/orders/n1", v1, lease).await.unwrap();
    store.put("/ember.service/orders/n1", v2, lease).await.unwrap();

    wait_until(
        || {
            let current = resolver.current();
            current.len() == 1 && current[0].address == "127.0.0.1:2"
        },
        "same node keeps last event",
    )
    .await;
}
