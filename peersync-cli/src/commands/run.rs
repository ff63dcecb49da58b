//! `peersync audit` / `peersync sync` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use peersync_core::config::PeersyncConfig;
use peersync_core::credentials::Credentials;
use peersync_core::types::Discrepancy;
use peersync_reconciler::{
    FanoutAuditSink, GatewayEvent, GatewayEventKind, MemoryAuditSink, NetboxClient,
    ReconcilerConfig, ResilientGateway, RunMode, RunSummary, Runner, SshDeviceExecutor,
    TracingAuditSink,
};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute `audit` or `sync`.
///
/// Configuration and credentials are checked before anything is contacted.
/// A completed run succeeds even when it found discrepancies.
pub async fn execute(
    mode: RunMode,
    args: RunArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let core = PeersyncConfig::load(config_path).await?;
    let credentials = Credentials::from_env()?;
    let config = build_config(&core, args)?;

    info!(
        path = %config_path.display(),
        mode = mode.as_str(),
        routers = config.routers.len(),
        "configuration loaded"
    );

    let inventory = NetboxClient::from_credentials(&credentials, &core.inventory)?;
    let devices = SshDeviceExecutor::from_credentials(
        &credentials,
        config.connect_timeout,
        config.device_timeout,
    );

    // Gateway events go to the log and to the run summary
    let events = Arc::new(MemoryAuditSink::new());
    let sink = FanoutAuditSink::new()
        .with(TracingAuditSink)
        .with(Arc::clone(&events));
    let gateway = ResilientGateway::from_config(&config).with_sink(Arc::new(sink));

    let summary = Runner::new(config, devices, inventory)
        .with_gateway(gateway)
        .run(mode)
        .await?;

    let mut report = RunReport::from(&summary);
    report.record_gateway_events(&events.events());
    writer.render(&report)?;
    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration.
fn build_config(core: &PeersyncConfig, args: RunArgs) -> Result<ReconcilerConfig, CliError> {
    let mut config = ReconcilerConfig::from_core(core);
    if let Some(path) = args.report {
        config.report_path = path;
    }
    if let Some(n) = args.concurrency {
        config.max_concurrency = n;
    }
    if !args.routers.is_empty() {
        if let Some(unknown) = args
            .routers
            .iter()
            .find(|name| !config.routers.iter().any(|r| &r.hostname == *name))
        {
            return Err(CliError::Command(format!(
                "router '{unknown}' is not in the configuration"
            )));
        }
        config.routers.retain(|r| args.routers.contains(&r.hostname));
    }
    config.validate()?;
    Ok(config)
}

/// Result of one audit or sync run.
#[derive(Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub mode: String,
    pub routers_total: usize,
    pub routers_failed: usize,
    pub observations: usize,
    pub created: usize,
    pub updated: usize,
    pub write_failures: usize,
    /// Retries performed by the gateway across all calls
    pub gateway_retries: usize,
    /// Calls that failed after the last attempt
    pub gateway_failures: usize,
    pub report_path: String,
    /// Discrepancy count per classification
    pub counts: BTreeMap<String, usize>,
    pub discrepancies: Vec<Discrepancy>,
    /// Rendered report text (text output only)
    #[serde(skip)]
    pub report: String,
}

impl From<&RunSummary> for RunReport {
    fn from(summary: &RunSummary) -> Self {
        let mut counts = BTreeMap::new();
        for d in &summary.discrepancies {
            *counts.entry(d.classification.as_str().to_owned()).or_insert(0) += 1;
        }
        Self {
            run_id: summary.run_id.to_string(),
            mode: summary.mode.as_str().to_owned(),
            routers_total: summary.routers_total,
            routers_failed: summary.routers_failed,
            observations: summary.observations,
            created: summary.created,
            updated: summary.updated,
            write_failures: summary.write_failures,
            gateway_retries: 0,
            gateway_failures: 0,
            report_path: summary.report_path.display().to_string(),
            counts,
            discrepancies: summary.discrepancies.clone(),
            report: summary.report.clone(),
        }
    }
}

impl RunReport {
    fn record_gateway_events(&mut self, events: &[GatewayEvent]) {
        for event in events {
            match event.kind {
                GatewayEventKind::Retry { .. } => self.gateway_retries += 1,
                GatewayEventKind::Failure { .. } => self.gateway_failures += 1,
            }
        }
    }
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        write!(w, "{}", self.report)?;
        writeln!(w)?;

        let routers = format!(
            "{}/{} routers reachable",
            self.routers_total - self.routers_failed,
            self.routers_total
        );
        if self.routers_failed == 0 {
            writeln!(w, "{}", routers.green())?;
        } else {
            writeln!(w, "{}", routers.yellow())?;
        }
        writeln!(w, "Observations: {}", self.observations)?;
        if self.gateway_retries + self.gateway_failures > 0 {
            writeln!(
                w,
                "Gateway: {} retries, {} failed calls",
                self.gateway_retries, self.gateway_failures
            )?;
        }
        if self.mode == RunMode::Sync.as_str() || self.created + self.updated > 0 {
            writeln!(
                w,
                "Inventory writes: {} created, {} updated, {} failed",
                self.created, self.updated, self.write_failures
            )?;
        }
        writeln!(w, "Report written to {}", self.report_path.bold())?;
        Ok(())
    }
}
