//! Ember Service Core 错误处理模块
//!
//! 提供统一的错误分类、gRPC 状态码映射与 HTTP 状态码映射

pub mod core;
pub mod grpc;
pub mod http;

pub use self::core::{CoreError, Result};
pub use grpc::status_code;
pub use http::{http_status, http_status_for_error};
