//! 에러 타입 -- 도메인별 에러 정의

/// peersync 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum PeersyncError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 자격 증명 에러
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// 장비 접근 에러 (SSH, 명령 실행)
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// 인벤토리 API 에러
    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 자격 증명 에러
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// 필수 환경변수 누락 또는 빈 값
    #[error("missing or empty environment variables: {}", vars.join(", "))]
    Missing { vars: Vec<String> },

    /// URL 형식 오류
    #[error("invalid URL in {var}: {reason}")]
    InvalidUrl { var: String, reason: String },
}

/// 장비 접근 에러
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// 연결 실패
    #[error("connection to {target} failed: {reason}")]
    Connection { target: String, reason: String },

    /// 인증 실패
    #[error("authentication to {target} failed: {reason}")]
    Authentication { target: String, reason: String },

    /// 명령 실행 실패
    #[error("command '{command}' failed on {target}: {reason}")]
    Command {
        target: String,
        command: String,
        reason: String,
    },
}

/// 인벤토리 API 에러
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// 요청 실패
    #[error("request failed: {0}")]
    Request(String),

    /// 참조 대상 없음
    #[error("{kind} not found: {key}")]
    NotFound { kind: String, key: String },

    /// 요청 검증 실패
    #[error("validation failed: {0}")]
    Validation(String),
}
