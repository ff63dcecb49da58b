//! 게이트웨이 감사 기록
//!
//! [`ResilientGateway`](crate::gateway::ResilientGateway)는 재시도와 최종 실패를
//! 호출자에게 돌려주기 전에 [`AuditSink`]로 기록합니다.

use std::fmt;
use std::sync::Mutex;
use std::time::SystemTime;

use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::CallKind;

/// 게이트웨이 이벤트 종류
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum GatewayEventKind {
    /// 일시적 실패 후 재시도 예정
    Retry { attempt: u32, backoff_ms: u64 },
    /// 더 이상 재시도하지 않음
    Failure { attempts: u32, transient: bool },
}

/// 외부 호출의 재시도/실패 기록
#[derive(Debug, Clone, Serialize)]
pub struct GatewayEvent {
    /// 실행 식별자
    pub run_id: Uuid,
    pub kind: GatewayEventKind,
    #[serde(skip)]
    pub call: CallKind,
    /// 작업 이름 (`show_bgp_summary`, `create_session` 등)
    pub operation: String,
    /// 대상 (라우터명, 인벤토리 객체 등)
    pub target: String,
    pub error: String,
    pub timestamp: SystemTime,
}

impl fmt::Display for GatewayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GatewayEventKind::Retry {
                attempt,
                backoff_ms,
            } => write!(
                f,
                "retry {} {} on {} after attempt {attempt} (backoff {backoff_ms}ms): {}",
                self.call, self.operation, self.target, self.error
            ),
            GatewayEventKind::Failure { attempts, .. } => write!(
                f,
                "failed {} {} on {} after {attempts} attempt(s): {}",
                self.call, self.operation, self.target, self.error
            ),
        }
    }
}

/// 게이트웨이 이벤트 기록 대상
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &GatewayEvent);
}

/// tracing 로그로 기록하는 기본 sink
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &GatewayEvent) {
        match &event.kind {
            GatewayEventKind::Retry {
                attempt,
                backoff_ms,
            } => warn!(
                run_id = %event.run_id,
                call = %event.call,
                operation = event.operation.as_str(),
                subject = event.target.as_str(),
                attempt,
                backoff_ms,
                error = event.error.as_str(),
                "retrying after transient failure"
            ),
            GatewayEventKind::Failure {
                attempts,
                transient,
            } => error!(
                run_id = %event.run_id,
                call = %event.call,
                operation = event.operation.as_str(),
                subject = event.target.as_str(),
                attempts,
                transient,
                error = event.error.as_str(),
                "external call failed"
            ),
        }
    }
}

/// 여러 sink에 같은 이벤트를 전달합니다.
#[derive(Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, event: &GatewayEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

/// 메모리에 이벤트를 모으는 sink (요약 출력, 테스트용)
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<GatewayEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 기록된 이벤트의 복사본
    pub fn events(&self) -> Vec<GatewayEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &GatewayEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

impl<S: AuditSink + ?Sized> AuditSink for std::sync::Arc<S> {
    fn record(&self, event: &GatewayEvent) {
        (**self).record(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_event() -> GatewayEvent {
        GatewayEvent {
            run_id: Uuid::new_v4(),
            kind: GatewayEventKind::Retry {
                attempt: 1,
                backoff_ms: 4000,
            },
            call: CallKind::Device,
            operation: "show_bgp_summary".to_owned(),
            target: "edge1".to_owned(),
            error: "connection refused".to_owned(),
            timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn display_mentions_operation_and_target() {
        let text = retry_event().to_string();
        assert!(text.contains("show_bgp_summary"));
        assert!(text.contains("edge1"));
        assert!(text.contains("4000ms"));
    }

    #[test]
    fn memory_sink_collects_events() {
        let sink = MemoryAuditSink::new();
        sink.record(&retry_event());
        sink.record(&retry_event());
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let first = std::sync::Arc::new(MemoryAuditSink::new());
        let second = std::sync::Arc::new(MemoryAuditSink::new());
        let fanout = FanoutAuditSink::new()
            .with(first.clone())
            .with(second.clone());
        fanout.record(&retry_event());
        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
    }

    #[test]
    fn event_serializes_with_tagged_kind() {
        let json = serde_json::to_value(retry_event()).unwrap();
        assert_eq!(json["kind"]["type"], "retry");
        assert_eq!(json["kind"]["attempt"], 1);
    }
}
