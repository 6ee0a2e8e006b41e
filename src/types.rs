//! 服务端点定义
//!
//! 注册与发现共用的基础数据类型

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 服务端点记录
///
/// 身份由 (service_name, node_id) 唯一确定。由 Registry 在启动时创建，
/// 通过租约续期隐式刷新，在注销或租约过期时从存储中移除。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// 服务名（如 "orders", "payments"）
    pub service_name: String,

    /// 节点 ID（同一服务内唯一）
    pub node_id: String,

    /// 服务地址（host:port）
    pub address: String,

    /// 自定义元数据
    pub metadata: HashMap<String, String>,
}

/// 端点在协调存储中的值部分
///
/// 键已携带服务名与节点 ID，值只包含地址与元数据，JSON 编码。
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EndpointValue {
    pub addr: String,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceEndpoint {
    /// 创建新的服务端点
    pub fn new(
        service_name: impl Into<String>,
        node_id: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            node_id: node_id.into(),
            address: address.into(),
            metadata: HashMap::new(),
        }
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 转换为 gRPC URI
    pub fn to_grpc_uri(&self) -> String {
        format!("http://{}", self.address)
    }

    /// 存储值部分
    pub fn value(&self) -> EndpointValue {
        EndpointValue {
            addr: self.address.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// 从存储键值对还原端点
    ///
    /// 键形如 `{registry_dir}/{service_name}/{node_id}`，节点 ID 取最后一段。
    /// 值无法解析时返回 None，调用方按坏记录跳过处理。
    pub fn from_kv(service_name: &str, key: &str, value: &[u8]) -> Option<Self> {
        let node_id = key.rsplit('/').next()?;
        if node_id.is_empty() {
            return None;
        }
        let value: EndpointValue = serde_json::from_slice(value).ok()?;
        Some(Self {
            service_name: service_name.to_string(),
            node_id: node_id.to_string(),
            address: value.addr,
            metadata: value.metadata,
        })
    }
}

/// 端点在协调存储中的完整键
pub fn endpoint_key(registry_dir: &str, service_name: &str, node_id: &str) -> String {
    format!("{}/{}/{}", registry_dir, service_name, node_id)
}

/// 服务在协调存储中的键前缀（用于初始读取与 watch）
pub fn service_prefix(registry_dir: &str, service_name: &str) -> String {
    format!("{}/{}/", registry_dir, service_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_round_trips_through_kv() {
        let ep = ServiceEndpoint::new("orders", "n1", "127.0.0.1:50051")
            .with_metadata("version", "v1.2.0");
        let key = endpoint_key("/ember.service", "orders", "n1");
        let value = serde_json::to_vec(&ep.value()).unwrap();

        let restored = ServiceEndpoint::from_kv("orders", &key, &value).unwrap();
        assert_eq!(restored, ep);
    }

    #[test]
    fn bad_value_is_skipped() {
        let key = endpoint_key("/ember.service", "orders", "n1");
        assert!(ServiceEndpoint::from_kv("orders", &key, b"not json").is_none());
    }
}
