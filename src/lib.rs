//! Ember RPC Service Core
//!
//! Client-side service discovery and load-balanced dispatch for fleets of
//! interchangeable gRPC instances, plus per-call admission control applied
//! uniformly to unary and streaming calls.
//!
//! - Registration: lease-backed membership records with keepalive and a
//!   synchronized deregistration handshake (`registry`).
//! - Discovery: prefix watch over the coordination store, live membership
//!   snapshots (`resolver`), pluggable selection (`selector`) and connection
//!   pool reconciliation (`balancer`).
//! - Admission: authentication, rate limiting (`interceptor`, `ratelimit`)
//!   on the server side; circuit breaking (`breaker`) on the client side.

pub mod balancer;
pub mod breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod interceptor;
pub mod ratelimit;
pub mod registry;
pub mod resolver;
pub mod selector;
pub mod server;
pub mod store;
pub mod types;

// Re-exports
pub use balancer::{Balancer, CallGuard};
pub use breaker::{CircuitBreaker, CircuitState};
pub use client::ServiceClient;
pub use config::{
    BreakerConfig, ChainConfig, ClientConfig, Config, RateLimitConfig, RegistryConfig,
    ServiceConfig, DEFAULT_REGISTRY_DIR,
};
pub use error::{CoreError, Result};
pub use gateway::{render_error, ErrorBody, GatewayHooks};
pub use interceptor::{
    AdmissionChain, AuthInterceptor, Credential, LoggingInterceptor, RateLimitInterceptor,
    StaticTokenCredential,
};
pub use ratelimit::RateLimiter;
pub use registry::Registry;
pub use resolver::{MembershipSnapshot, Resolver};
pub use selector::{
    create_selector, LoadBalanceStrategy, RandomSelector, RoundRobinSelector, Selector,
};
pub use server::Service;
pub use store::{CoordinationStore, EtcdStore, LeaseId, MemoryStore, WatchEvent};
pub use types::{endpoint_key, service_prefix, EndpointValue, ServiceEndpoint};
