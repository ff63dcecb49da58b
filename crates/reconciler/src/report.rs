//! 감사 보고서 -- 불일치 목록을 고정폭 텍스트 표로 만듭니다.
//!
//! 보고서 생성([`build_report`])과 저장([`write_report`])은 분리되어 있습니다.
//! 실행마다 한 번만 저장합니다.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Local};
use peersync_core::types::{Classification, Discrepancy};
use tracing::info;

use crate::error::ReconcilerError;

/// 불일치가 없을 때 출력하는 문장
pub const NO_DISCREPANCIES: &str =
    "No discrepancies found. All BGP sessions match inventory records.";

const DEVICE_WIDTH: usize = 20;
const NEIGHBOR_WIDTH: usize = 40;
const STATUS_WIDTH: usize = 18;
const CLASS_WIDTH: usize = 22;
const RULE_WIDTH: usize = DEVICE_WIDTH + NEIGHBOR_WIDTH + STATUS_WIDTH * 2 + CLASS_WIDTH + 4;

/// 보고서 본문을 만듭니다.
pub fn build_report(discrepancies: &[Discrepancy], generated_at: DateTime<Local>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "BGP Session Audit Report - {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');

    if discrepancies.is_empty() {
        out.push('\n');
        out.push_str(NO_DISCREPANCIES);
        out.push('\n');
        return out;
    }

    out.push_str(&row(
        "Device",
        "Neighbor IP",
        "Inventory Status",
        "Router Status",
        "Classification",
    ));
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');

    let mut counts: BTreeMap<Classification, usize> = BTreeMap::new();
    for d in discrepancies {
        *counts.entry(d.classification).or_default() += 1;
        out.push_str(&row(
            &d.device,
            &d.neighbor_ip,
            &d.inventory_status,
            &d.router_status,
            d.classification.as_str(),
        ));
        if !d.reason.is_empty() {
            out.push_str(&format!("    reason: {}\n", d.reason));
        }
    }

    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    out.push_str(&format!("Summary: {} discrepancies\n", discrepancies.len()));
    for (classification, count) in counts {
        out.push_str(&format!("  {:<CLASS_WIDTH$} {count}\n", classification.as_str()));
    }
    out
}

fn row(device: &str, neighbor: &str, inventory: &str, router: &str, class: &str) -> String {
    let mut line = format!(
        "{device:<DEVICE_WIDTH$} {neighbor:<NEIGHBOR_WIDTH$} {inventory:<STATUS_WIDTH$} {router:<STATUS_WIDTH$} {class}"
    );
    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}

/// 보고서를 파일에 저장합니다. 기존 파일은 덮어씁니다.
pub async fn write_report(path: &Path, report: &str) -> Result<(), ReconcilerError> {
    tokio::fs::write(path, report).await?;
    info!(path = %path.display(), bytes = report.len(), "audit report written");
    Ok(())
}
