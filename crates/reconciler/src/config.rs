//! 조정 엔진 설정
//!
//! [`ReconcilerConfig`]는 core의 [`PeersyncConfig`]에서 엔진이 쓰는 값만 모아
//! `Duration` 등 실행 시점 타입으로 바꿔 둔 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use peersync_core::config::PeersyncConfig;
//! use peersync_reconciler::config::ReconcilerConfig;
//!
//! let core_config = PeersyncConfig::default();
//! let config = ReconcilerConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use peersync_core::config::{PeersyncConfig, RouterConfig};

use crate::error::ReconcilerError;

const MAX_CONCURRENCY: usize = 64;

/// 재시도 정책
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 첫 시도를 포함한 최대 시도 횟수
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// `attempt`번째 실패 후 대기 시간 (`attempt`는 1부터)
    ///
    /// `initial * 2^(attempt-1)`, 상한은 `max_backoff`입니다.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(4_000),
            max_backoff: Duration::from_millis(10_000),
        }
    }
}

/// 조정 엔진 설정
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub retry: RetryPolicy,
    /// 장비 명령 1회 제한 시간
    pub device_timeout: Duration,
    /// 인벤토리 호출 1회 제한 시간
    pub inventory_timeout: Duration,
    /// SSH TCP 연결 제한 시간
    pub connect_timeout: Duration,
    pub ssh_port: u16,
    /// Established가 아닌 세션에 기록할 상태
    pub inactive_status: String,
    /// 라우터별 설정이 없을 때 쓰는 로컬 AS
    pub local_asn: Option<u32>,
    pub report_stale: bool,
    pub max_concurrency: usize,
    pub apply_changes: bool,
    pub report_path: PathBuf,
    pub routers: Vec<RouterConfig>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::from_core(&PeersyncConfig::default())
    }
}

impl ReconcilerConfig {
    /// core 설정에서 엔진 설정을 생성합니다.
    pub fn from_core(core: &PeersyncConfig) -> Self {
        Self {
            retry: RetryPolicy {
                max_attempts: core.retry.max_attempts,
                initial_backoff: Duration::from_millis(core.retry.initial_backoff_ms),
                max_backoff: Duration::from_millis(core.retry.max_backoff_ms),
            },
            device_timeout: Duration::from_secs(core.device.command_timeout_secs),
            inventory_timeout: Duration::from_secs(core.inventory.timeout_secs),
            connect_timeout: Duration::from_secs(core.device.connect_timeout_secs),
            ssh_port: core.device.ssh_port,
            inactive_status: core.reconcile.inactive_status.trim().to_lowercase(),
            local_asn: core.reconcile.local_asn,
            report_stale: core.reconcile.report_stale,
            max_concurrency: core.reconcile.max_concurrency,
            apply_changes: core.reconcile.apply_changes,
            report_path: PathBuf::from(&core.report.path),
            routers: core.routers.clone(),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ReconcilerError> {
        if self.retry.max_attempts == 0 {
            return Err(ReconcilerError::Config {
                field: "retry.max_attempts".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        if self.device_timeout.is_zero() || self.inventory_timeout.is_zero() {
            return Err(ReconcilerError::Config {
                field: "timeout".to_owned(),
                reason: "device and inventory timeouts must be greater than 0".to_owned(),
            });
        }

        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY {
            return Err(ReconcilerError::Config {
                field: "reconcile.max_concurrency".to_owned(),
                reason: format!("must be 1-{MAX_CONCURRENCY}"),
            });
        }

        if self.inactive_status.is_empty() || self.inactive_status == "active" {
            return Err(ReconcilerError::Config {
                field: "reconcile.inactive_status".to_owned(),
                reason: "must be a non-empty status other than 'active'".to_owned(),
            });
        }

        Ok(())
    }
}

/// 조정 엔진 설정 빌더
#[derive(Default)]
pub struct ReconcilerConfigBuilder {
    config: ReconcilerConfig,
}

impl ReconcilerConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 재시도 정책을 설정합니다.
    pub fn retry(mut self, max_attempts: u32, initial: Duration, max: Duration) -> Self {
        self.config.retry = RetryPolicy {
            max_attempts,
            initial_backoff: initial,
            max_backoff: max,
        };
        self
    }

    /// 장비 명령 제한 시간을 설정합니다.
    pub fn device_timeout(mut self, timeout: Duration) -> Self {
        self.config.device_timeout = timeout;
        self
    }

    /// 인벤토리 호출 제한 시간을 설정합니다.
    pub fn inventory_timeout(mut self, timeout: Duration) -> Self {
        self.config.inventory_timeout = timeout;
        self
    }

    /// 비활성 세션 상태를 설정합니다.
    pub fn inactive_status(mut self, status: impl Into<String>) -> Self {
        self.config.inactive_status = status.into().trim().to_lowercase();
        self
    }

    /// 기본 로컬 AS를 설정합니다.
    pub fn local_asn(mut self, asn: u32) -> Self {
        self.config.local_asn = Some(asn);
        self
    }

    /// stale 세션 보고 여부를 설정합니다.
    pub fn report_stale(mut self, enabled: bool) -> Self {
        self.config.report_stale = enabled;
        self
    }

    /// 동시 처리 라우터 수를 설정합니다.
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max;
        self
    }

    /// 인벤토리 쓰기 여부를 설정합니다.
    pub fn apply_changes(mut self, apply: bool) -> Self {
        self.config.apply_changes = apply;
        self
    }

    /// 보고서 경로를 설정합니다.
    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report_path = path.into();
        self
    }

    /// 라우터를 추가합니다.
    pub fn router(mut self, router: RouterConfig) -> Self {
        self.config.routers.push(router);
        self
    }

    /// 설정을 검증하고 반환합니다.
    pub fn build(self) -> Result<ReconcilerConfig, ReconcilerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
