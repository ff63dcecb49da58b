//! 재시도 게이트웨이 -- 모든 외부 호출의 타임아웃과 백오프를 담당합니다.
//!
//! [`ResilientGateway`]는 장비 명령 실행과 인벤토리 CRUD를 모두 감쌉니다.
//! 시도마다 제한 시간을 적용하고, 일시적 에러만 지수 백오프로 재시도합니다.
//! 참조 없음과 검증 에러는 즉시 반환합니다. 재시도와 최종 실패는
//! 반환하기 전에 [`AuditSink`]에 기록합니다.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use peersync_core::metrics as m;
use tracing::debug;
use uuid::Uuid;

use crate::audit::{AuditSink, GatewayEvent, GatewayEventKind, TracingAuditSink};
use crate::config::{ReconcilerConfig, RetryPolicy};
use crate::device::{DeviceExecutor, DeviceTarget};
use crate::error::{CallKind, ReconcilerError};

/// 게이트웨이를 거치는 호출 하나의 설명
#[derive(Debug, Clone, Copy)]
pub struct Operation<'a> {
    pub kind: CallKind,
    /// 고정된 작업 이름 (메트릭 레이블로 사용)
    pub name: &'static str,
    pub target: &'a str,
}

impl<'a> Operation<'a> {
    pub fn device(name: &'static str, target: &'a str) -> Self {
        Self {
            kind: CallKind::Device,
            name,
            target,
        }
    }

    pub fn inventory(name: &'static str, target: &'a str) -> Self {
        Self {
            kind: CallKind::Inventory,
            name,
            target,
        }
    }
}

/// 재시도 게이트웨이
pub struct ResilientGateway {
    run_id: Uuid,
    retry: RetryPolicy,
    device_timeout: Duration,
    inventory_timeout: Duration,
    sink: Arc<dyn AuditSink>,
}

impl ResilientGateway {
    /// 새 게이트웨이를 생성합니다. 기본 sink는 tracing 로그입니다.
    pub fn new(retry: RetryPolicy, device_timeout: Duration, inventory_timeout: Duration) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            retry,
            device_timeout,
            inventory_timeout,
            sink: Arc::new(TracingAuditSink),
        }
    }

    /// 엔진 설정에서 게이트웨이를 생성합니다.
    pub fn from_config(config: &ReconcilerConfig) -> Self {
        Self::new(
            config.retry.clone(),
            config.device_timeout,
            config.inventory_timeout,
        )
    }

    /// 감사 sink를 교체합니다.
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = sink;
        self
    }

    /// 실행 식별자를 지정합니다.
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn timeout_for(&self, kind: CallKind) -> Duration {
        match kind {
            CallKind::Device => self.device_timeout,
            CallKind::Inventory => self.inventory_timeout,
        }
    }

    /// 일시적 에러를 [`ReconcilerError::is_transient`]로 판별하여 호출합니다.
    pub async fn call<T, F, Fut>(&self, op: Operation<'_>, call: F) -> Result<T, ReconcilerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReconcilerError>>,
    {
        self.call_with_retry(op, ReconcilerError::is_transient, call)
            .await
    }

    /// 호출을 최대 `max_attempts`회 시도합니다.
    ///
    /// `classify`가 true를 반환한 에러만 재시도합니다. 제한 시간 초과는
    /// [`ReconcilerError::Timeout`]으로 바뀌어 같은 판별을 거칩니다.
    pub async fn call_with_retry<T, F, Fut, C>(
        &self,
        op: Operation<'_>,
        classify: C,
        mut call: F,
    ) -> Result<T, ReconcilerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReconcilerError>>,
        C: Fn(&ReconcilerError) -> bool,
    {
        let timeout = self.timeout_for(op.kind);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            metrics::counter!(m::GATEWAY_ATTEMPTS_TOTAL, m::LABEL_OPERATION => op.name)
                .increment(1);

            let err = match tokio::time::timeout(timeout, call()).await {
                Ok(Ok(value)) => {
                    if attempt > 1 {
                        debug!(
                            operation = op.name,
                            subject = op.target,
                            attempt,
                            "call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => e,
                Err(_elapsed) => ReconcilerError::Timeout {
                    kind: op.kind,
                    operation: op.name.to_owned(),
                    target: op.target.to_owned(),
                    secs: timeout.as_secs(),
                },
            };

            let transient = classify(&err);
            if !transient || attempt >= max_attempts {
                metrics::counter!(m::GATEWAY_FAILURES_TOTAL, m::LABEL_OPERATION => op.name)
                    .increment(1);
                self.record(
                    op,
                    GatewayEventKind::Failure {
                        attempts: attempt,
                        transient,
                    },
                    &err,
                );
                return Err(err);
            }

            let backoff = self.retry.backoff(attempt);
            metrics::counter!(m::GATEWAY_RETRIES_TOTAL, m::LABEL_OPERATION => op.name)
                .increment(1);
            self.record(
                op,
                GatewayEventKind::Retry {
                    attempt,
                    backoff_ms: u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                },
                &err,
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// 라우터에서 명령을 실행합니다.
    pub async fn run_command<D: DeviceExecutor>(
        &self,
        devices: &D,
        target: &DeviceTarget,
        command: &str,
    ) -> Result<String, ReconcilerError> {
        self.call(
            Operation::device("show_bgp_summary", &target.hostname),
            move || devices.run_command(target, command),
        )
        .await
    }

    fn record(&self, op: Operation<'_>, kind: GatewayEventKind, err: &ReconcilerError) {
        self.sink.record(&GatewayEvent {
            run_id: self.run_id,
            kind,
            call: op.kind,
            operation: op.name.to_owned(),
            target: op.target.to_owned(),
            error: err.to_string(),
            timestamp: SystemTime::now(),
        });
    }
}
