//! HTTP 网关适配
//!
//! 供 HTTP 前置网关使用的两类扩展：错误到 HTTP 响应的渲染，
//! 以及响应头改写 / 请求元数据注入两个透传挂点。网关自身的
//! 路由与编解码不在本 crate 范围内。

use crate::error::http_status;
use http::HeaderMap;
use serde::Serialize;
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tonic::Status;

/// 网关错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// 将 gRPC 状态渲染为 HTTP 状态码与 JSON 响应体
pub fn render_error(status: &Status) -> (u16, ErrorBody) {
    let mut details = Vec::new();
    for key in ["retry-after", "field-violation"] {
        if let Some(value) = status.metadata().get(key) {
            if let Ok(value) = value.to_str() {
                details.push(format!("{}: {}", key, value));
            }
        }
    }

    (
        http_status(status.code()),
        ErrorBody {
            code: status.code() as i32,
            message: status.message().to_string(),
            details,
        },
    )
}

/// 响应头改写挂点
pub type HeaderMutator = Arc<dyn Fn(&mut HeaderMap) + Send + Sync>;

/// 请求元数据注入挂点：从 HTTP 请求头派生 gRPC 元数据
pub type MetadataInjector = Arc<dyn Fn(&HeaderMap, &mut MetadataMap) + Send + Sync>;

/// 网关挂点集合，全部为透传扩展
#[derive(Clone, Default)]
pub struct GatewayHooks {
    header_mutators: Vec<HeaderMutator>,
    metadata_injectors: Vec<MetadataInjector>,
}

impl GatewayHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册响应头改写
    pub fn on_response_headers(
        mut self,
        f: impl Fn(&mut HeaderMap) + Send + Sync + 'static,
    ) -> Self {
        self.header_mutators.push(Arc::new(f));
        self
    }

    /// 注册元数据注入
    pub fn on_request_metadata(
        mut self,
        f: impl Fn(&HeaderMap, &mut MetadataMap) + Send + Sync + 'static,
    ) -> Self {
        self.metadata_injectors.push(Arc::new(f));
        self
    }

    /// 应用所有响应头改写
    pub fn apply_response_headers(&self, headers: &mut HeaderMap) {
        for mutator in &self.header_mutators {
            mutator(headers);
        }
    }

    /// 应用所有元数据注入
    pub fn apply_request_metadata(&self, request_headers: &HeaderMap, metadata: &mut MetadataMap) {
        for injector in &self.metadata_injectors {
            injector(request_headers, metadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use std::time::Duration;

    #[test]
    fn rate_exhausted_renders_429_with_retry_detail() {
        let status: Status = CoreError::RateExhausted {
            limit: 10,
            retry_after: Duration::from_secs(30),
        }
        .into();

        let (http, body) = render_error(&status);
        assert_eq!(http, 429);
        assert_eq!(body.code, tonic::Code::ResourceExhausted as i32);
        assert_eq!(body.details, vec!["retry-after: 30".to_string()]);
    }

    #[test]
    fn hooks_apply_in_registration_order() {
        let hooks = GatewayHooks::new()
            .on_response_headers(|h| {
                h.insert("x-served-by", "ember".parse().unwrap());
            })
            .on_request_metadata(|req, md| {
                if let Some(id) = req.get("x-request-id") {
                    md.insert("x-request-id", id.to_str().unwrap().parse().unwrap());
                }
            });

        let mut response_headers = HeaderMap::new();
        hooks.apply_response_headers(&mut response_headers);
        assert_eq!(response_headers.get("x-served-by").unwrap(), "ember");

        let mut request_headers = HeaderMap::new();
        request_headers.insert("x-request-id", "req-1".parse().unwrap());
        let mut metadata = MetadataMap::new();
        hooks.apply_request_metadata(&request_headers, &mut metadata);
        assert_eq!(
            metadata.get("x-request-id").unwrap().to_str().unwrap(),
            "req-1"
        );
    }
}
