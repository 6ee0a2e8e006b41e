//! 认证拦截器（服务端）

use crate::error::CoreError;
use tonic::{Request, Status};
use tracing::warn;

/// 静态令牌认证
///
/// 从调用元数据提取凭证并与配置的密钥比对。缺失返回
/// Unauthenticated，不匹配返回 PermissionDenied，两种情况都不会
/// 进入内层处理器。
#[derive(Clone)]
pub struct AuthInterceptor {
    token: String,
}

impl AuthInterceptor {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn intercept<T>(&self, req: Request<T>) -> Result<Request<T>, Status> {
        let presented = req
            .metadata()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string());

        match presented {
            None => {
                warn!("request rejected: missing authorization token");
                Err(CoreError::Unauthenticated("missing authorization token".into()).into())
            }
            Some(token) if token != self.token => {
                warn!("request rejected: access token mismatch");
                Err(CoreError::PermissionDenied("access token mismatch".into()).into())
            }
            Some(_) => Ok(req),
        }
    }
}
