//! 观测拦截器

use tonic::{Request, Status};
use tracing::info;

/// 请求日志拦截器
///
/// 只在准入时记录来源，不改写调用结果；拦截点在响应产生之前，
/// 服务端侧看不到耗时与结果。响应侧的耗时与结果由客户端的
/// CallGuard 回执记录。
#[derive(Clone)]
pub struct LoggingInterceptor;

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self
    }

    pub fn intercept<T>(&self, req: Request<T>) -> Result<Request<T>, Status> {
        let remote = req
            .remote_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        info!(remote = %remote, "request admitted");
        Ok(req)
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}
