#![doc = include_str!("../README.md")]

pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, CredentialError, DeviceError, InventoryError, PeersyncError};

// 설정
pub use config::PeersyncConfig;

// 자격 증명
pub use credentials::Credentials;

// 파이프라인 trait
pub use pipeline::NeighborParser;

// 도메인 타입
pub use types::{
    Classification, Dialect, Discrepancy, InventorySessionRecord, NeighborObservation,
    SessionState,
};
