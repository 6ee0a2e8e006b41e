//! 准入拦截器模块
//!
//! 服务端的准入链与客户端的凭证注入。链按固定顺序组合：
//! 认证 → 限流 → 观测。认证在限流之前执行，被拒绝的调用不消耗
//! 限流配额；熔断属于客户端侧（见 breaker 模块），在观测之内、
//! 传输之外包裹调用。
//!
//! tonic 的拦截器在每次调用建立时执行一次，对一元调用与流式
//! 调用同构：一个流会话整体作为一次被守护的调用。
//!
//! 观测阶段只在准入时记录（拦截点看不到响应）；单次调用的耗时
//! 与结果由客户端侧的 CallGuard 回执记录。

pub mod auth;
pub mod chain;
pub mod credential;
pub mod logging;
pub mod rate_limit;

pub use auth::AuthInterceptor;
pub use chain::AdmissionChain;
pub use credential::{Credential, StaticTokenCredential};
pub use logging::LoggingInterceptor;
pub use rate_limit::RateLimitInterceptor;
