//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `peersync_`
//! - 영역: `parser_`, `gateway_`, `reconcile_`, `run_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(peersync_core::metrics::GATEWAY_RETRIES_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 출력 형식 레이블 키 (cisco_ios, cisco_xr, nokia_sros)
pub const LABEL_DIALECT: &str = "dialect";

/// 작업 레이블 키 (show_bgp_summary, list_sessions, create_session, ...)
pub const LABEL_OPERATION: &str = "operation";

/// 분류 레이블 키 (drift, missing_in_inventory, ...)
pub const LABEL_CLASSIFICATION: &str = "classification";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Parser 메트릭 ─────────────────────────────────────────────────

/// Parser: 파싱된 이웃 수 (counter, label: dialect)
pub const PARSER_NEIGHBORS_PARSED_TOTAL: &str = "peersync_parser_neighbors_parsed_total";

// ─── Gateway 메트릭 ────────────────────────────────────────────────

/// Gateway: 외부 호출 시도 수 (counter, label: operation)
pub const GATEWAY_ATTEMPTS_TOTAL: &str = "peersync_gateway_attempts_total";

/// Gateway: 재시도 수 (counter, label: operation)
pub const GATEWAY_RETRIES_TOTAL: &str = "peersync_gateway_retries_total";

/// Gateway: 최종 실패 수 (counter, label: operation)
pub const GATEWAY_FAILURES_TOTAL: &str = "peersync_gateway_failures_total";

// ─── Reconcile 메트릭 ──────────────────────────────────────────────

/// Reconcile: 분류별 불일치 수 (counter, label: classification)
pub const RECONCILE_DISCREPANCIES_TOTAL: &str = "peersync_reconcile_discrepancies_total";

/// Reconcile: 인벤토리 쓰기 수 (counter, label: operation, result)
pub const RECONCILE_WRITES_TOTAL: &str = "peersync_reconcile_writes_total";

/// Reconcile: 인덱스 키 충돌 수 (counter)
pub const RECONCILE_INDEX_COLLISIONS_TOTAL: &str = "peersync_reconcile_index_collisions_total";

// ─── Run 메트릭 ────────────────────────────────────────────────────

/// Run: 처리된 라우터 수 (counter, label: result)
pub const RUN_ROUTERS_TOTAL: &str = "peersync_run_routers_total";

/// Run: 실행 소요 시간 (histogram, 초)
pub const RUN_DURATION_SECONDS: &str = "peersync_run_duration_seconds";

/// Run: 인덱싱된 인벤토리 세션 수 (gauge)
pub const RUN_INVENTORY_SESSIONS: &str = "peersync_run_inventory_sessions";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        PARSER_NEIGHBORS_PARSED_TOTAL,
        "BGP neighbors extracted from router summary output"
    );

    describe_counter!(
        GATEWAY_ATTEMPTS_TOTAL,
        "External calls attempted through the retry gateway"
    );
    describe_counter!(
        GATEWAY_RETRIES_TOTAL,
        "External calls retried after a transient failure"
    );
    describe_counter!(
        GATEWAY_FAILURES_TOTAL,
        "External calls that failed after all attempts"
    );

    describe_counter!(
        RECONCILE_DISCREPANCIES_TOTAL,
        "Discrepancies found between routers and inventory"
    );
    describe_counter!(
        RECONCILE_WRITES_TOTAL,
        "Inventory create/update requests issued by the applier"
    );
    describe_counter!(
        RECONCILE_INDEX_COLLISIONS_TOTAL,
        "Inventory sessions that share a key with an earlier session"
    );

    describe_counter!(RUN_ROUTERS_TOTAL, "Routers processed per run");
    describe_histogram!(RUN_DURATION_SECONDS, "Wall time of a full audit run");
    describe_gauge!(
        RUN_INVENTORY_SESSIONS,
        "Inventory sessions indexed at the start of the run"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        PARSER_NEIGHBORS_PARSED_TOTAL,
        GATEWAY_ATTEMPTS_TOTAL,
        GATEWAY_RETRIES_TOTAL,
        GATEWAY_FAILURES_TOTAL,
        RECONCILE_DISCREPANCIES_TOTAL,
        RECONCILE_WRITES_TOTAL,
        RECONCILE_INDEX_COLLISIONS_TOTAL,
        RUN_ROUTERS_TOTAL,
        RUN_DURATION_SECONDS,
        RUN_INVENTORY_SESSIONS,
    ];

    #[test]
    fn all_metrics_start_with_peersync_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("peersync_"),
                "Metric '{name}' does not start with 'peersync_' prefix"
            );
        }
    }

    #[test]
    fn metric_names_are_unique() {
        let mut names = ALL_METRIC_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_METRIC_NAMES.len());
    }

    #[test]
    fn counters_end_with_total() {
        let counters = [
            PARSER_NEIGHBORS_PARSED_TOTAL,
            GATEWAY_ATTEMPTS_TOTAL,
            GATEWAY_RETRIES_TOTAL,
            GATEWAY_FAILURES_TOTAL,
            RECONCILE_DISCREPANCIES_TOTAL,
            RECONCILE_WRITES_TOTAL,
            RECONCILE_INDEX_COLLISIONS_TOTAL,
            RUN_ROUTERS_TOTAL,
        ];
        for name in counters {
            assert!(name.ends_with("_total"), "counter '{name}' lacks _total");
        }
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [
            LABEL_DIALECT,
            LABEL_OPERATION,
            LABEL_CLASSIFICATION,
            LABEL_RESULT,
        ] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }
}
