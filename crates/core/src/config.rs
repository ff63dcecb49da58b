//! 설정 관리 -- peersync.toml 파싱 및 런타임 설정
//!
//! [`PeersyncConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//! 자격 증명(인벤토리 토큰, 장비 비밀번호)은 이 파일에 두지 않고
//! [`credentials`](crate::credentials)에서 환경변수로만 읽습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PEERSYNC_RETRY_MAX_ATTEMPTS=5` 형식)
//! 3. 설정 파일 (`peersync.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), peersync_core::error::PeersyncError> {
//! use peersync_core::config::PeersyncConfig;
//!
//! let config = PeersyncConfig::load("peersync.toml").await?;
//! let config = PeersyncConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PeersyncError};
use crate::types::Dialect;

const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_BACKOFF_MS: u64 = 300_000;
const MAX_CONCURRENCY: usize = 64;

/// peersync 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeersyncConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 인벤토리 API 설정
    #[serde(default)]
    pub inventory: InventoryConfig,
    /// 장비 접속 설정
    #[serde(default)]
    pub device: DeviceConfig,
    /// 재시도 정책
    #[serde(default)]
    pub retry: RetryConfig,
    /// 조정 정책
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// 보고서 설정
    #[serde(default)]
    pub report: ReportConfig,
    /// 감사 대상 라우터 목록 (목록 순서대로 처리)
    #[serde(default)]
    pub routers: Vec<RouterConfig>,
}

impl PeersyncConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PeersyncError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PeersyncError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PeersyncError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PeersyncError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PeersyncError> {
        toml::from_str(toml_str).map_err(|e| {
            PeersyncError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PEERSYNC_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PEERSYNC_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PEERSYNC_GENERAL_LOG_FORMAT");

        // Inventory
        override_u64(
            &mut self.inventory.timeout_secs,
            "PEERSYNC_INVENTORY_TIMEOUT_SECS",
        );
        override_usize(&mut self.inventory.page_size, "PEERSYNC_INVENTORY_PAGE_SIZE");
        override_bool(&mut self.inventory.verify_tls, "PEERSYNC_INVENTORY_VERIFY_TLS");

        // Device
        override_u16(&mut self.device.ssh_port, "PEERSYNC_DEVICE_SSH_PORT");
        override_u64(
            &mut self.device.connect_timeout_secs,
            "PEERSYNC_DEVICE_CONNECT_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.device.command_timeout_secs,
            "PEERSYNC_DEVICE_COMMAND_TIMEOUT_SECS",
        );

        // Retry
        override_u32(&mut self.retry.max_attempts, "PEERSYNC_RETRY_MAX_ATTEMPTS");
        override_u64(
            &mut self.retry.initial_backoff_ms,
            "PEERSYNC_RETRY_INITIAL_BACKOFF_MS",
        );
        override_u64(&mut self.retry.max_backoff_ms, "PEERSYNC_RETRY_MAX_BACKOFF_MS");

        // Reconcile
        override_opt_u32(&mut self.reconcile.local_asn, "PEERSYNC_RECONCILE_LOCAL_ASN");
        override_string(
            &mut self.reconcile.inactive_status,
            "PEERSYNC_RECONCILE_INACTIVE_STATUS",
        );
        override_bool(
            &mut self.reconcile.report_stale,
            "PEERSYNC_RECONCILE_REPORT_STALE",
        );
        override_usize(
            &mut self.reconcile.max_concurrency,
            "PEERSYNC_RECONCILE_MAX_CONCURRENCY",
        );
        override_bool(
            &mut self.reconcile.apply_changes,
            "PEERSYNC_RECONCILE_APPLY_CHANGES",
        );

        // Report
        override_string(&mut self.report.path, "PEERSYNC_REPORT_PATH");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PeersyncError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        check_timeout("inventory.timeout_secs", self.inventory.timeout_secs)?;
        check_timeout(
            "device.connect_timeout_secs",
            self.device.connect_timeout_secs,
        )?;
        check_timeout(
            "device.command_timeout_secs",
            self.device.command_timeout_secs,
        )?;

        if self.inventory.page_size == 0 {
            return Err(invalid("inventory.page_size", "must be greater than 0"));
        }

        if self.device.ssh_port == 0 {
            return Err(invalid("device.ssh_port", "must be greater than 0"));
        }

        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(invalid(
                "retry.max_attempts",
                format!("must be 1-{MAX_RETRY_ATTEMPTS}"),
            ));
        }

        if self.retry.max_backoff_ms > MAX_BACKOFF_MS {
            return Err(invalid(
                "retry.max_backoff_ms",
                format!("must be 0-{MAX_BACKOFF_MS}"),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(invalid(
                "retry.initial_backoff_ms",
                "must not exceed retry.max_backoff_ms",
            ));
        }

        let inactive = self.reconcile.inactive_status.trim();
        if inactive.is_empty() || inactive.eq_ignore_ascii_case("active") {
            return Err(invalid(
                "reconcile.inactive_status",
                "must be a non-empty status other than 'active'",
            ));
        }

        if self.reconcile.max_concurrency == 0 || self.reconcile.max_concurrency > MAX_CONCURRENCY
        {
            return Err(invalid(
                "reconcile.max_concurrency",
                format!("must be 1-{MAX_CONCURRENCY}"),
            ));
        }

        if self.report.path.trim().is_empty() {
            return Err(invalid("report.path", "must not be empty"));
        }

        let mut seen = HashSet::new();
        for (i, router) in self.routers.iter().enumerate() {
            if router.hostname.trim().is_empty() {
                return Err(invalid(
                    &format!("routers[{i}].hostname"),
                    "must not be empty",
                ));
            }
            if !seen.insert(router.hostname.as_str()) {
                return Err(invalid(
                    &format!("routers[{i}].hostname"),
                    format!("duplicate router '{}'", router.hostname),
                ));
            }
            if let Some(ip) = &router.primary_ip {
                let host = ip.split('/').next().unwrap_or_default();
                if host.parse::<IpAddr>().is_err() {
                    return Err(invalid(
                        &format!("routers[{i}].primary_ip"),
                        format!("'{ip}' is not an IP address"),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> PeersyncError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn check_timeout(field: &str, secs: u64) -> Result<(), PeersyncError> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(invalid(field, format!("must be 1-{MAX_TIMEOUT_SECS}")));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 인벤토리 API 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// 요청 1회 타임아웃 (초)
    pub timeout_secs: u64,
    /// 목록 조회 페이지 크기
    pub page_size: usize,
    /// TLS 인증서 검증 여부
    pub verify_tls: bool,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            page_size: 1000,
            verify_tls: true,
        }
    }
}

/// 장비 접속 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// SSH 포트
    pub ssh_port: u16,
    /// TCP 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 명령 1회 실행 타임아웃 (초)
    pub command_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ssh_port: 22,
            connect_timeout_secs: 10,
            command_timeout_secs: 30,
        }
    }
}

/// 재시도 정책
///
/// 지수 백오프: `initial_backoff_ms * 2^(n-1)`, 최대 `max_backoff_ms`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간 (밀리초)
    pub initial_backoff_ms: u64,
    /// 재시도 대기 시간 상한 (밀리초)
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 4_000,
            max_backoff_ms: 10_000,
        }
    }
}

/// 조정 정책
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// 새 세션 생성 시 사용할 로컬 AS (라우터별 설정이 우선)
    pub local_asn: Option<u32>,
    /// Established가 아닌 세션에 기록할 인벤토리 상태
    pub inactive_status: String,
    /// 라우터에서 관찰되지 않은 인벤토리 세션 보고 여부
    pub report_stale: bool,
    /// 동시에 처리할 라우터 수
    pub max_concurrency: usize,
    /// 결정 사항을 인벤토리에 기록할지 여부 (`sync` 명령은 항상 true)
    pub apply_changes: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            local_asn: None,
            inactive_status: "offline".to_owned(),
            report_stale: true,
            max_concurrency: 1,
            apply_changes: false,
        }
    }
}

/// 보고서 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 보고서 파일 경로 (매 실행마다 덮어씀)
    pub path: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: "bgp_audit_report.txt".to_owned(),
        }
    }
}

/// 감사 대상 라우터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// 인벤토리 장비명
    pub hostname: String,
    /// SSH 접속 주소 (없으면 primary_ip, 그것도 없으면 인벤토리의 primary IP)
    #[serde(default)]
    pub address: Option<String>,
    /// 출력 형식
    pub dialect: Dialect,
    /// 세션 키의 로컬 주소로 쓰는 장비 대표 IP
    #[serde(default)]
    pub primary_ip: Option<String>,
    /// 라우터별 로컬 AS
    #[serde(default)]
    pub local_asn: Option<u32>,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_opt_u32(target: &mut Option<u32>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = Some(parsed),
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
