//! 조정 엔진 에러 타입
//!
//! [`ReconcilerError`]는 장비 접속, 인벤토리 호출, 조정 실행 중 발생하는 모든 에러를 표현합니다.
//! [`is_transient`](ReconcilerError::is_transient)가 재시도 여부를 결정하며,
//! `From<ReconcilerError> for PeersyncError` 변환으로 상위 레이어에 `?`로 전파됩니다.

use peersync_core::error::{ConfigError, DeviceError, InventoryError, PeersyncError};

/// 외부 호출 대상 구분
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// 라우터 명령 실행
    Device,
    /// 인벤토리 API 호출
    Inventory,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device => f.write_str("device"),
            Self::Inventory => f.write_str("inventory"),
        }
    }
}

/// 조정 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    /// TCP 연결 또는 SSH 핸드셰이크 실패
    #[error("connection to {target} failed: {reason}")]
    Connection { target: String, reason: String },

    /// 인증 실패 (장비 비밀번호 또는 API 토큰)
    #[error("authentication to {target} failed: {reason}")]
    Authentication { target: String, reason: String },

    /// 시도 1회가 제한 시간을 초과함
    #[error("{kind} operation '{operation}' on {target} timed out after {secs}s")]
    Timeout {
        kind: CallKind,
        operation: String,
        target: String,
        secs: u64,
    },

    /// 장비에서 명령 실행 실패
    #[error("command '{command}' failed on {target}: {reason}")]
    Command {
        target: String,
        command: String,
        reason: String,
    },

    /// 인벤토리 HTTP 응답 에러
    #[error("inventory returned HTTP {status} for {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// 인벤토리 요청 전송 실패 (네트워크)
    #[error("inventory request failed: {0}")]
    Request(String),

    /// 응답 본문 해석 실패
    #[error("failed to decode inventory response: {0}")]
    Decode(String),

    /// 참조 대상 없음
    #[error("{kind} not found: {key}")]
    NotFound { kind: String, key: String },

    /// 요청 검증 실패
    #[error("validation failed: {0}")]
    Validation(String),

    /// 실행 시작 시 인벤토리를 읽지 못함
    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// 보고서 파일 I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconcilerError {
    /// 재시도할 가치가 있는 일시적 에러인지 여부
    ///
    /// 네트워크 타임아웃, 연결 실패, 인증 실패, 속도 제한(429), 5xx 응답이 해당합니다.
    /// 참조 없음과 검증 에러는 즉시 전파됩니다.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection { .. }
            | Self::Authentication { .. }
            | Self::Timeout { .. }
            | Self::Request(_) => true,
            Self::Http { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Command { .. }
            | Self::Decode(_)
            | Self::NotFound { .. }
            | Self::Validation(_)
            | Self::InventoryUnavailable(_)
            | Self::Config { .. }
            | Self::Io(_) => false,
        }
    }
}

impl From<ReconcilerError> for PeersyncError {
    fn from(err: ReconcilerError) -> Self {
        match err {
            ReconcilerError::Connection { target, reason } => {
                PeersyncError::Device(DeviceError::Connection { target, reason })
            }
            ReconcilerError::Authentication { target, reason } => {
                PeersyncError::Device(DeviceError::Authentication { target, reason })
            }
            ReconcilerError::Command {
                target,
                command,
                reason,
            } => PeersyncError::Device(DeviceError::Command {
                target,
                command,
                reason,
            }),
            ReconcilerError::Timeout {
                kind: CallKind::Device,
                ref target,
                ..
            } => PeersyncError::Device(DeviceError::Connection {
                target: target.clone(),
                reason: err.to_string(),
            }),
            ReconcilerError::NotFound { kind, key } => {
                PeersyncError::Inventory(InventoryError::NotFound { kind, key })
            }
            ReconcilerError::Validation(msg) => {
                PeersyncError::Inventory(InventoryError::Validation(msg))
            }
            ReconcilerError::Config { field, reason } => {
                PeersyncError::Config(ConfigError::InvalidValue { field, reason })
            }
            ReconcilerError::Io(e) => PeersyncError::Io(e),
            ReconcilerError::Timeout { .. }
            | ReconcilerError::Http { .. }
            | ReconcilerError::Request(_)
            | ReconcilerError::Decode(_)
            | ReconcilerError::InventoryUnavailable(_) => {
                PeersyncError::Inventory(InventoryError::Request(err.to_string()))
            }
        }
    }
}
