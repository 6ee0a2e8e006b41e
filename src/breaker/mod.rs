//! 熔断器模块
//!
//! 客户端侧的故障隔离：包裹最靠近传输层的出站调用，按采样窗口
//! 统计成功/失败，失败率超阈值后本地短路，冷却期满放行一次试探
//! 调用。同一客户端连接上的所有调用共享一个熔断器实例。

use crate::config::BreakerConfig;
use crate::error::CoreError;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tonic::Status;
use tracing::{info, warn};

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// 关闭：正常放行并采样
    Closed,
    /// 打开：本地短路，不发起网络调用
    Open,
    /// 半开：放行一次试探调用
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    window_start: Instant,
    successes: u32,
    failures: u32,
    opened_at: Instant,
    trial_in_flight: bool,
}

/// 熔断器
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window_start: now,
                successes: 0,
                failures: 0,
                opened_at: now,
                trial_in_flight: false,
            }),
        }
    }

    /// 当前状态（观测用）
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    /// 包裹一次出站调用
    ///
    /// 打开状态下不执行 `invoke`，立即返回 Unavailable；关闭或
    /// 半开状态执行调用并把结果记入状态机。调用自身的 deadline
    /// 不做任何修改，试探调用与普通调用同权。
    ///
    /// 调用 future 在 await 点被丢弃（select 取消、会话中断）时，
    /// 已占用的试探槽位随 guard 归还，不会卡死在半开状态。
    pub async fn call<T, F, Fut>(&self, invoke: F) -> Result<T, Status>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let trial = self.admit().map_err(Status::from)?;
        let guard = TrialGuard {
            breaker: self,
            trial,
        };

        match invoke().await {
            Ok(value) => {
                guard.complete(true);
                Ok(value)
            }
            Err(status) => {
                guard.complete(false);
                Err(status)
            }
        }
    }

    /// 准入检查，返回本次调用是否占用了试探槽位
    fn admit(&self) -> Result<bool, CoreError> {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                if inner.opened_at.elapsed() >= self.cooldown() {
                    info!("circuit breaker half-open, allowing trial call");
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    Ok(true)
                } else {
                    Err(CoreError::BreakerOpen)
                }
            }
            CircuitState::HalfOpen => {
                // 半开时只放行一个在途试探
                if inner.trial_in_flight {
                    Err(CoreError::BreakerOpen)
                } else {
                    inner.trial_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    /// 归还未产生结果的试探槽位
    fn release_trial(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state == CircuitState::HalfOpen {
            warn!("trial call cancelled before completion, releasing slot");
            inner.trial_in_flight = false;
        }
    }

    /// 记录调用结果并驱动状态迁移
    fn record(&self, success: bool) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => {
                if inner.window_start.elapsed() >= self.window() {
                    inner.window_start = Instant::now();
                    inner.successes = 0;
                    inner.failures = 0;
                }
                if success {
                    inner.successes += 1;
                } else {
                    inner.failures += 1;
                }

                let total = inner.successes + inner.failures;
                if total >= self.config.min_samples {
                    let ratio = inner.failures as f64 / total as f64;
                    if ratio > self.config.failure_ratio {
                        warn!(
                            failures = inner.failures,
                            total,
                            "failure ratio exceeded threshold, circuit breaker open"
                        );
                        inner.state = CircuitState::Open;
                        inner.opened_at = Instant::now();
                    }
                }
            }
            CircuitState::HalfOpen => {
                inner.trial_in_flight = false;
                if success {
                    info!("trial call succeeded, circuit breaker closed");
                    inner.state = CircuitState::Closed;
                    inner.window_start = Instant::now();
                    inner.successes = 0;
                    inner.failures = 0;
                } else {
                    warn!("trial call failed, circuit breaker reopened");
                    inner.state = CircuitState::Open;
                    inner.opened_at = Instant::now();
                }
            }
            // Open 状态下不会有调用结果到达
            CircuitState::Open => {}
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs)
    }

    fn cooldown(&self) -> Duration {
        Duration::from_secs(self.config.cooldown_secs)
    }
}

/// 调用在途期间持有试探槽位
///
/// 正常结束走 `complete` 把结果记入状态机；future 被中途丢弃时
/// Drop 归还槽位。
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
}

impl TrialGuard<'_> {
    fn complete(mut self, success: bool) {
        self.trial = false;
        self.breaker.record(success);
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.trial {
            self.breaker.release_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config() -> BreakerConfig {
        BreakerConfig {
            failure_ratio: 0.5,
            min_samples: 4,
            window_secs: 60,
            cooldown_secs: 60,
        }
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), Status> {
        breaker
            .call(|| async { Err::<(), _>(Status::internal("boom")) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), Status> {
        breaker.call(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn opens_after_failure_ratio_exceeds_threshold() {
        let breaker = CircuitBreaker::new(test_config());

        succeed(&breaker).await.unwrap();
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_without_invoking() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..4 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let invoked = AtomicU32::new(0);
        let result = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        let status = result.unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn below_min_samples_never_opens() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn trial_success_closes_after_cooldown() {
        let mut config = test_config();
        config.cooldown_secs = 0;
        let breaker = CircuitBreaker::new(config);
        for _ in 0..4 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        // 冷却期已过（0 秒），放行试探并在成功后闭合
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn cancelled_trial_releases_half_open_slot() {
        let mut config = test_config();
        config.cooldown_secs = 0;
        let breaker = CircuitBreaker::new(config);
        for _ in 0..4 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        // 试探调用在 await 点被丢弃（如上层 select 取消）
        let trial = breaker.call(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), _>(())
        });
        tokio::select! {
            _ = trial => panic!("trial call should not complete"),
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // 槽位已归还：后续健康调用作为新试探放行并闭合
        let invoked = AtomicU32::new(0);
        breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<(), _>(())
            })
            .await
            .unwrap();
        assert_eq!(invoked.load(Ordering::SeqCst), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn trial_failure_reopens() {
        let mut config = test_config();
        config.cooldown_secs = 0;
        let breaker = CircuitBreaker::new(config);
        for _ in 0..4 {
            let _ = fail(&breaker).await;
        }

        let _ = fail(&breaker).await; // 试探失败
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
