//! gRPC 错误映射
//!
//! 提供 CoreError 与 tonic::Status 之间的转换。被拒绝的调用始终
//! 返回结构化状态而非裸传输错误：限流拒绝附带重试间隔，参数错误
//! 附带字段级明细。

use super::CoreError;
use tonic::{Code, Status};

/// CoreError 对应的 gRPC 状态码
pub fn status_code(err: &CoreError) -> Code {
    match err {
        CoreError::Unauthenticated(_) => Code::Unauthenticated,
        CoreError::PermissionDenied(_) => Code::PermissionDenied,
        CoreError::InvalidArgument { .. } => Code::InvalidArgument,
        CoreError::RateExhausted { .. } => Code::ResourceExhausted,
        CoreError::NoAvailableEndpoint { .. }
        | CoreError::BreakerOpen
        | CoreError::ResolutionStale { .. }
        | CoreError::Store(_) => Code::Unavailable,
        CoreError::Registration(_)
        | CoreError::InvalidConfig(_)
        | CoreError::Internal(_) => Code::Internal,
    }
}

impl From<CoreError> for Status {
    fn from(err: CoreError) -> Self {
        let code = status_code(&err);
        let mut status = Status::new(code, err.to_string());

        match &err {
            CoreError::RateExhausted { retry_after, .. } => {
                if let Ok(value) = retry_after.as_secs().to_string().parse() {
                    status.metadata_mut().insert("retry-after", value);
                }
            }
            CoreError::InvalidArgument { field, .. } => {
                if let Ok(value) = field.parse() {
                    status.metadata_mut().insert("field-violation", value);
                }
            }
            _ => {}
        }

        status
    }
}
