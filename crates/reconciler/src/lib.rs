#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`key`], [`index`]: 복합 키와 실행별 인벤토리 색인
//! - [`reconcile`], [`apply`]: 분류와 인벤토리 쓰기
//! - [`gateway`], [`audit`]: 타임아웃/재시도와 감사 기록
//! - [`device`], [`inventory`]: SSH 장비 실행기와 NetBox 클라이언트
//! - [`report`], [`runner`]: 보고서와 실행 드라이버

pub mod apply;
pub mod audit;
pub mod config;
pub mod device;
pub mod error;
pub mod gateway;
pub mod index;
pub mod inventory;
pub mod key;
pub mod reconcile;
pub mod report;
pub mod runner;

// --- 주요 타입 re-export ---

pub use apply::{Applier, WriteOutcome};
pub use audit::{
    AuditSink, FanoutAuditSink, GatewayEvent, GatewayEventKind, MemoryAuditSink, TracingAuditSink,
};
pub use config::{ReconcilerConfig, ReconcilerConfigBuilder, RetryPolicy};
pub use device::{DeviceExecutor, DeviceTarget, SshDeviceExecutor};
pub use error::{CallKind, ReconcilerError};
pub use gateway::{Operation, ResilientGateway};
pub use index::{SessionIndex, build_index};
pub use inventory::{InventoryClient, NetboxClient};
pub use key::{SessionKey, build_key};
pub use reconcile::{Decision, Reconciler};
pub use report::{build_report, write_report};
pub use runner::{RunMode, RunSummary, Runner};
