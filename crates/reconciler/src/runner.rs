//! Run driver -- one audit or sync pass over every configured router.
//!
//! The [`Runner`] loads the inventory once, then processes routers through a
//! worker pool bounded by `max_concurrency`. Results are merged in router-list
//! order so the report is identical whatever the pool size.
//!
//! # Per-router steps
//!
//! 1. Resolve the device primary IP (configuration first, then inventory)
//! 2. Run the dialect's summary command through the gateway
//! 3. Parse, deduplicate and reconcile every observation
//! 4. Apply decisions when writing is enabled
//! 5. Report inventory sessions that were not observed
//!
//! A router that cannot be reached contributes one `connection_error` row per
//! inventory session it owns (a single row when it owns none) and never aborts
//! the run. Only an unreadable inventory at start is fatal.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use peersync_core::config::RouterConfig;
use peersync_core::metrics as m;
use peersync_core::types::{Classification, Discrepancy};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::apply::{Applier, WriteOutcome};
use crate::config::ReconcilerConfig;
use crate::device::{DeviceExecutor, DeviceTarget};
use crate::error::ReconcilerError;
use crate::gateway::{Operation, ResilientGateway};
use crate::index::{SessionIndex, build_index};
use crate::inventory::InventoryClient;
use crate::key::build_key;
use crate::reconcile::{Reconciler, dedup_observations};
use crate::report::{build_report, write_report};

/// Whether decisions are written back to the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Report only.
    Audit,
    /// Report and apply create/update decisions.
    Sync,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Sync => "sync",
        }
    }
}

/// Result of one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub mode: RunMode,
    /// Merged discrepancies, in router-list order.
    pub discrepancies: Vec<Discrepancy>,
    pub routers_total: usize,
    pub routers_failed: usize,
    pub observations: usize,
    pub created: usize,
    pub updated: usize,
    pub write_failures: usize,
    /// Rendered report text.
    pub report: String,
    pub report_path: PathBuf,
}

impl RunSummary {
    /// Number of discrepancies with the given classification.
    pub fn count(&self, classification: Classification) -> usize {
        self.discrepancies
            .iter()
            .filter(|d| d.classification == classification)
            .count()
    }
}

/// What one router contributed to the run.
#[derive(Debug, Default)]
struct RouterOutcome {
    discrepancies: Vec<Discrepancy>,
    failed: bool,
    observations: usize,
    created: usize,
    updated: usize,
    write_failures: usize,
}

impl RouterOutcome {
    fn unreachable(discrepancies: Vec<Discrepancy>) -> Self {
        Self {
            discrepancies,
            failed: true,
            ..Self::default()
        }
    }
}

/// Drives one reconciliation run.
pub struct Runner<D, I> {
    config: Arc<ReconcilerConfig>,
    devices: Arc<D>,
    inventory: Arc<I>,
    gateway: Arc<ResilientGateway>,
    reconciler: Reconciler,
}

impl<D: DeviceExecutor, I: InventoryClient> Runner<D, I> {
    /// Creates a runner with a gateway built from `config`.
    pub fn new(config: ReconcilerConfig, devices: D, inventory: I) -> Self {
        let gateway = ResilientGateway::from_config(&config);
        Self {
            reconciler: Reconciler::from_config(&config),
            config: Arc::new(config),
            devices: Arc::new(devices),
            inventory: Arc::new(inventory),
            gateway: Arc::new(gateway),
        }
    }

    /// Replaces the gateway (custom audit sink, run id).
    pub fn with_gateway(mut self, gateway: ResilientGateway) -> Self {
        self.gateway = Arc::new(gateway);
        self
    }

    pub fn gateway(&self) -> &ResilientGateway {
        &self.gateway
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Runs every configured router and writes the report exactly once.
    ///
    /// # Errors
    ///
    /// - `ReconcilerError::InventoryUnavailable` when the session list cannot be read
    /// - `ReconcilerError::Io` when the report cannot be written
    pub async fn run(&self, mode: RunMode) -> Result<RunSummary, ReconcilerError> {
        let started = Instant::now();
        let run_id = self.gateway.run_id();
        let write = mode == RunMode::Sync || self.config.apply_changes;

        info!(
            %run_id,
            mode = mode.as_str(),
            routers = self.config.routers.len(),
            write,
            "reconciliation run starting"
        );

        let inventory = &self.inventory;
        let sessions = self
            .gateway
            .call(Operation::inventory("list_sessions", "bgp sessions"), || {
                inventory.list_sessions()
            })
            .await
            .map_err(|e| {
                error!(%run_id, error = %e, "cannot read inventory sessions");
                ReconcilerError::InventoryUnavailable(e.to_string())
            })?;

        let index = Arc::new(build_index(sessions));
        metrics::gauge!(m::RUN_INVENTORY_SESSIONS).set(index.len() as f64);
        info!(
            sessions = index.len(),
            collisions = index.collisions(),
            skipped = index.skipped(),
            "inventory index built"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(self.config.routers.len());
        for router in &self.config.routers {
            let task = RouterTask {
                config: Arc::clone(&self.config),
                devices: Arc::clone(&self.devices),
                inventory: Arc::clone(&self.inventory),
                gateway: Arc::clone(&self.gateway),
                reconciler: self.reconciler.clone(),
                index: Arc::clone(&index),
                write,
            };
            let semaphore = Arc::clone(&semaphore);
            let router = router.clone();
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return task.unreachable(&router.hostname, "worker pool closed");
                };
                task.process(&router).await
            }));
        }

        let mut summary = RunSummary {
            run_id,
            mode,
            discrepancies: Vec::new(),
            routers_total: self.config.routers.len(),
            routers_failed: 0,
            observations: 0,
            created: 0,
            updated: 0,
            write_failures: 0,
            report: String::new(),
            report_path: self.config.report_path.clone(),
        };

        // 라우터 목록 순서대로 병합
        for (router, handle) in self.config.routers.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(router = router.hostname.as_str(), error = %e, "router task failed");
                    RouterOutcome::unreachable(self.reconciler.unreachable(
                        &router.hostname,
                        &index,
                        &format!("router task failed: {e}"),
                    ))
                }
            };

            let result = if outcome.failed { "failure" } else { "success" };
            metrics::counter!(m::RUN_ROUTERS_TOTAL, m::LABEL_RESULT => result).increment(1);

            summary.routers_failed += usize::from(outcome.failed);
            summary.observations += outcome.observations;
            summary.created += outcome.created;
            summary.updated += outcome.updated;
            summary.write_failures += outcome.write_failures;
            summary.discrepancies.extend(outcome.discrepancies);
        }

        for d in &summary.discrepancies {
            metrics::counter!(
                m::RECONCILE_DISCREPANCIES_TOTAL,
                m::LABEL_CLASSIFICATION => d.classification.as_str()
            )
            .increment(1);
        }

        summary.report = build_report(&summary.discrepancies, Local::now());
        write_report(&self.config.report_path, &summary.report).await?;

        let elapsed = started.elapsed();
        metrics::histogram!(m::RUN_DURATION_SECONDS).record(elapsed.as_secs_f64());
        info!(
            %run_id,
            discrepancies = summary.discrepancies.len(),
            routers_failed = summary.routers_failed,
            created = summary.created,
            updated = summary.updated,
            elapsed_ms = elapsed.as_millis() as u64,
            "reconciliation run finished"
        );

        Ok(summary)
    }
}

/// Everything a spawned router task needs, shared read-only.
struct RouterTask<D, I> {
    config: Arc<ReconcilerConfig>,
    devices: Arc<D>,
    inventory: Arc<I>,
    gateway: Arc<ResilientGateway>,
    reconciler: Reconciler,
    index: Arc<SessionIndex>,
    write: bool,
}

impl<D: DeviceExecutor, I: InventoryClient> RouterTask<D, I> {
    async fn process(&self, router: &RouterConfig) -> RouterOutcome {
        let hostname = router.hostname.as_str();

        let primary_ip = match self.primary_ip(router).await {
            Ok(ip) => ip,
            Err(e) => {
                warn!(router = hostname, error = %e, "cannot resolve device primary IP");
                return self.unreachable(hostname, &format!("cannot resolve primary IP: {e}"));
            }
        };

        let target = DeviceTarget::from_router(router, Some(&primary_ip), self.config.ssh_port);
        let raw = match self
            .gateway
            .run_command(
                self.devices.as_ref(),
                &target,
                router.dialect.summary_command(),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(router = hostname, error = %e, "router unreachable");
                return self.unreachable(hostname, &e.to_string());
            }
        };

        let observations =
            dedup_observations(peersync_parser::parse(&raw, router.dialect, hostname));
        let local_asn = router.local_asn.or(self.config.local_asn);
        let applier = Applier::new(&self.gateway, self.inventory.as_ref());

        let mut outcome = RouterOutcome {
            observations: observations.len(),
            ..RouterOutcome::default()
        };
        let mut observed = HashSet::with_capacity(observations.len());

        for obs in &observations {
            observed.insert(build_key(&obs.neighbor_ip, &primary_ip));
            let (decision, mut discrepancy) =
                self.reconciler.reconcile(obs, &self.index, &primary_ip, local_asn);

            if self.write && decision.is_write() {
                match applier.apply(&decision, discrepancy.as_mut()).await {
                    WriteOutcome::Created(_) => outcome.created += 1,
                    WriteOutcome::Updated(_) => outcome.updated += 1,
                    WriteOutcome::Failed => outcome.write_failures += 1,
                    WriteOutcome::Skipped | WriteOutcome::AlreadyPresent(_) => {}
                }
            }

            if let Some(d) = discrepancy {
                outcome.discrepancies.push(d);
            }
        }

        if self.config.report_stale {
            outcome
                .discrepancies
                .extend(self.reconciler.stale(hostname, &self.index, &observed));
        }

        info!(
            router = hostname,
            dialect = %router.dialect,
            observations = outcome.observations,
            discrepancies = outcome.discrepancies.len(),
            "router reconciled"
        );
        outcome
    }

    /// One `connection_error` per inventory session of the device.
    fn unreachable(&self, hostname: &str, reason: &str) -> RouterOutcome {
        RouterOutcome::unreachable(self.reconciler.unreachable(hostname, &self.index, reason))
    }

    /// Primary IP from configuration, or from the inventory device record.
    async fn primary_ip(&self, router: &RouterConfig) -> Result<String, ReconcilerError> {
        if let Some(ip) = router.primary_ip.as_deref() {
            return Ok(ip.to_owned());
        }

        let inventory = &self.inventory;
        let device = self
            .gateway
            .call(Operation::inventory("get_device", &router.hostname), || {
                inventory.get_device(&router.hostname)
            })
            .await?;

        device.primary_ip.ok_or_else(|| {
            ReconcilerError::Validation(format!("device {} has no primary IP", router.hostname))
        })
    }
}
