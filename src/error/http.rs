//! HTTP 状态码映射
//!
//! 供 HTTP 网关前置层使用的固定映射表

use super::CoreError;
use tonic::Code;

/// gRPC 状态码对应的 HTTP 状态码
pub fn http_status(code: Code) -> u16 {
    match code {
        Code::Ok => 200,
        Code::Unauthenticated => 401,
        Code::PermissionDenied => 403,
        Code::InvalidArgument => 400,
        Code::NotFound => 404,
        Code::ResourceExhausted => 429,
        Code::Unavailable => 503,
        Code::DeadlineExceeded => 504,
        _ => 500,
    }
}

/// CoreError 对应的 HTTP 状态码
pub fn http_status_for_error(err: &CoreError) -> u16 {
    http_status(super::status_code(err))
}
