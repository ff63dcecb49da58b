//! 통합 테스트 -- 전체 실행 플로우 검증
//!
//! 인벤토리 로드 → 라우터 스크랩 → 분류 → (sync) 쓰기 → 보고서 저장
//! 시나리오를 trait mock으로 테스트합니다.

use std::sync::Arc;
use std::time::Duration;

use peersync_core::config::RouterConfig;
use peersync_core::types::{Classification, Dialect, InventorySessionRecord};
use peersync_reconciler::{
    GatewayEventKind, MemoryAuditSink, ReconcilerConfig, ReconcilerConfigBuilder,
    ResilientGateway, RunMode, Runner,
};

// Mock device and inventory clients for integration tests
mod mock {
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    use peersync_core::types::InventorySessionRecord;
    use peersync_reconciler::inventory::{
        DeviceRecord, NewSession, ObjectRef, SessionFilter, SessionPatch,
    };
    use peersync_reconciler::{DeviceExecutor, DeviceTarget, InventoryClient, ReconcilerError};
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct TestRouters {
        outputs: HashMap<String, String>,
        down: HashSet<String>,
        commands: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl TestRouters {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn output(mut self, hostname: &str, raw: &str) -> Self {
            self.outputs.insert(hostname.to_owned(), raw.to_owned());
            self
        }

        pub fn down(mut self, hostname: &str) -> Self {
            self.down.insert(hostname.to_owned());
            self
        }

        /// 실행된 (호스트명, 명령) 기록. runner로 옮긴 뒤에도 볼 수 있음
        pub fn command_log(&self) -> Arc<Mutex<Vec<(String, String)>>> {
            Arc::clone(&self.commands)
        }
    }

    impl DeviceExecutor for TestRouters {
        async fn run_command(
            &self,
            target: &DeviceTarget,
            command: &str,
        ) -> Result<String, ReconcilerError> {
            self.commands
                .lock()
                .await
                .push((target.hostname.clone(), command.to_owned()));
            if self.down.contains(&target.hostname) {
                return Err(ReconcilerError::Connection {
                    target: target.address.clone(),
                    reason: "no route to host".to_owned(),
                });
            }
            Ok(self
                .outputs
                .get(&target.hostname)
                .cloned()
                .unwrap_or_default())
        }
    }

    #[derive(Default)]
    pub struct TestInventory {
        sessions: Vec<InventorySessionRecord>,
        devices: HashMap<String, (u64, Option<String>)>,
        asns: HashSet<u32>,
        created: Arc<Mutex<Vec<NewSession>>>,
        updated: Arc<Mutex<Vec<(u64, SessionPatch)>>>,
    }

    impl TestInventory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn session(mut self, record: InventorySessionRecord) -> Self {
            self.sessions.push(record);
            self
        }

        pub fn device(mut self, name: &str, id: u64, primary_ip: &str) -> Self {
            self.devices
                .insert(name.to_owned(), (id, Some(primary_ip.to_owned())));
            self
        }

        pub fn asn(mut self, asn: u32) -> Self {
            self.asns.insert(asn);
            self
        }

        pub fn created_log(&self) -> Arc<Mutex<Vec<NewSession>>> {
            Arc::clone(&self.created)
        }

        pub fn updated_log(&self) -> Arc<Mutex<Vec<(u64, SessionPatch)>>> {
            Arc::clone(&self.updated)
        }
    }

    impl InventoryClient for TestInventory {
        async fn list_sessions(&self) -> Result<Vec<InventorySessionRecord>, ReconcilerError> {
            Ok(self.sessions.clone())
        }

        async fn get_session(
            &self,
            filter: &SessionFilter,
        ) -> Result<Option<InventorySessionRecord>, ReconcilerError> {
            Ok(self
                .sessions
                .iter()
                .find(|s| {
                    s.device == filter.device && s.remote_address == filter.remote_address
                })
                .cloned())
        }

        async fn create_session(
            &self,
            session: &NewSession,
        ) -> Result<InventorySessionRecord, ReconcilerError> {
            self.created.lock().await.push(session.clone());
            Ok(InventorySessionRecord {
                id: 500,
                name: session.name.clone(),
                status: session.status.clone(),
                ..Default::default()
            })
        }

        async fn update_session(
            &self,
            id: u64,
            patch: &SessionPatch,
        ) -> Result<InventorySessionRecord, ReconcilerError> {
            self.updated.lock().await.push((id, patch.clone()));
            Ok(InventorySessionRecord {
                id,
                ..Default::default()
            })
        }

        async fn get_device(&self, name: &str) -> Result<DeviceRecord, ReconcilerError> {
            let (id, primary_ip) =
                self.devices
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ReconcilerError::NotFound {
                        kind: "device".to_owned(),
                        key: name.to_owned(),
                    })?;
            Ok(DeviceRecord {
                id,
                name: name.to_owned(),
                site: Some(ObjectRef {
                    id: 20,
                    display: "CHCGILDT".to_owned(),
                }),
                primary_ip,
            })
        }

        async fn get_asn(&self, asn: u32) -> Result<ObjectRef, ReconcilerError> {
            if !self.asns.contains(&asn) {
                return Err(ReconcilerError::NotFound {
                    kind: "asn".to_owned(),
                    key: asn.to_string(),
                });
            }
            Ok(ObjectRef {
                id: u64::from(asn) + 100_000,
                display: asn.to_string(),
            })
        }

        async fn get_ip_address(&self, address: &str) -> Result<ObjectRef, ReconcilerError> {
            Ok(ObjectRef {
                id: 900,
                display: address.to_owned(),
            })
        }

        async fn get_site(&self, name: &str) -> Result<ObjectRef, ReconcilerError> {
            Ok(ObjectRef {
                id: 20,
                display: name.to_owned(),
            })
        }
    }
}

use mock::{TestInventory, TestRouters};

const IOS_OUTPUT: &str = "\
BGP router identifier 64.50.224.10, local AS number 4181
BGP table version is 1045, main routing table version 1045

Neighbor        V           AS MsgRcvd MsgSent   TblVer  InQ OutQ Up/Down  State/PfxRcd
64.50.230.2     4         4150  102934  102911     1045    0    0 9w4d           12
";

const SROS_OUTPUT: &str = "\
===============================================================================
BGP Summary
===============================================================================
Neighbor
Description
                   AS PktRcvd InQ  Up/Down   State|Rcv/Act/Sent (Addr Family)
                      PktSent OutQ
-------------------------------------------------------------------------------
64.50.224.0
CHCGILDTcor51 Te0/0/0/1
                 4181  240117    0 27d04h12m 1021/980/14 (IPv4)
                       238811    0
192.0.2.77
                65077       0    0 00h00m41s Active
                            0    0
-------------------------------------------------------------------------------
";

fn router(hostname: &str, dialect: Dialect, primary_ip: Option<&str>) -> RouterConfig {
    RouterConfig {
        hostname: hostname.to_owned(),
        address: None,
        dialect,
        primary_ip: primary_ip.map(str::to_owned),
        local_asn: None,
    }
}

fn session(id: u64, device: &str, remote: &str, local: &str, status: &str) -> InventorySessionRecord {
    InventorySessionRecord {
        id,
        name: format!("{device} {remote}"),
        device: Some(device.to_owned()),
        local_address: Some(local.to_owned()),
        remote_address: Some(remote.to_owned()),
        status: status.to_owned(),
        ..Default::default()
    }
}

fn config(report: &std::path::Path, routers: Vec<RouterConfig>) -> ReconcilerConfig {
    let mut builder = ReconcilerConfigBuilder::new()
        .retry(3, Duration::from_millis(1), Duration::from_millis(4))
        .device_timeout(Duration::from_secs(2))
        .inventory_timeout(Duration::from_secs(2))
        .local_asn(4181)
        .report_path(report);
    for r in routers {
        builder = builder.router(r);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn test_matching_router_and_unreachable_router() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("bgp_audit_report.txt");
    let config = config(
        &report_path,
        vec![
            router("CHCGILDTcor51", Dialect::Ios, Some("64.50.224.10/32")),
            router("GRBYWIAJagg01", Dialect::Ios, Some("64.50.224.20/32")),
        ],
    );

    let sink = Arc::new(MemoryAuditSink::new());
    let gateway = ResilientGateway::from_config(&config).with_sink(sink.clone());
    let routers = TestRouters::new()
        .output("CHCGILDTcor51", IOS_OUTPUT)
        .down("GRBYWIAJagg01");
    let inventory = TestInventory::new().session(session(
        1,
        "CHCGILDTcor51",
        "64.50.230.2/30",
        "64.50.224.10/32",
        "active",
    ));

    let runner = Runner::new(config, routers, inventory).with_gateway(gateway);
    let summary = runner.run(RunMode::Audit).await.unwrap();

    assert_eq!(summary.discrepancies.len(), 1);
    let only = &summary.discrepancies[0];
    assert_eq!(only.device, "GRBYWIAJagg01");
    assert_eq!(only.classification, Classification::ConnectionError);
    assert!(only.reason.contains("no route to host"));
    assert_eq!(summary.routers_total, 2);
    assert_eq!(summary.routers_failed, 1);

    // 2번 재시도 + 최종 실패
    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.target == "GRBYWIAJagg01"));
    assert!(matches!(
        events[2].kind,
        GatewayEventKind::Failure { attempts: 3, .. }
    ));

    let written = std::fs::read_to_string(&report_path).unwrap();
    assert!(written.starts_with("BGP Session Audit Report - "));
    assert!(written.contains("connection_error"));
    assert!(written.contains("Summary: 1 discrepancies"));
}

#[tokio::test]
async fn test_sync_creates_missing_session_with_resolved_references() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        &dir.path().join("report.txt"),
        vec![router("CHCGILDTcor51", Dialect::Ios, None)],
    );
    let gateway =
        ResilientGateway::from_config(&config).with_sink(Arc::new(MemoryAuditSink::new()));
    let routers = TestRouters::new().output("CHCGILDTcor51", IOS_OUTPUT);
    let inventory = TestInventory::new()
        .device("CHCGILDTcor51", 31, "64.50.224.10/32")
        .asn(4181)
        .asn(4150);
    let created = inventory.created_log();

    let runner = Runner::new(config, routers, inventory).with_gateway(gateway);
    let summary = runner.run(RunMode::Sync).await.unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(summary.count(Classification::MissingInInventory), 1);

    let created = created.lock().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "CHCGILDTcor51 64.50.230.2 AS4150");
    assert_eq!(created[0].device, 31);
    assert_eq!(created[0].site, Some(20));
    assert_eq!(created[0].local_as, 104_181);
    assert_eq!(created[0].remote_as, 104_150);
    assert_eq!(created[0].status, "active");
}

#[tokio::test]
async fn test_audit_mode_never_writes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        &dir.path().join("report.txt"),
        vec![router("CHCGILDTcor51", Dialect::Ios, Some("64.50.224.10/32"))],
    );
    let gateway =
        ResilientGateway::from_config(&config).with_sink(Arc::new(MemoryAuditSink::new()));
    let routers = TestRouters::new().output("CHCGILDTcor51", IOS_OUTPUT);
    let inventory = TestInventory::new()
        .session(session(
            1,
            "CHCGILDTcor51",
            "64.50.230.2/30",
            "64.50.224.10/32",
            "offline",
        ))
        .asn(4181)
        .asn(4150);
    let updated = inventory.updated_log();
    let created = inventory.created_log();

    let runner = Runner::new(config, routers, inventory).with_gateway(gateway);
    let summary = runner.run(RunMode::Audit).await.unwrap();

    assert_eq!(summary.count(Classification::Drift), 1);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.created, 0);
    assert!(updated.lock().await.is_empty());
    assert!(created.lock().await.is_empty());
}

#[tokio::test]
async fn test_sros_router_uses_its_own_command_and_parser() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(
        &dir.path().join("report.txt"),
        vec![router("MDSNWIGJdst53", Dialect::Sros, Some("64.50.224.1/31"))],
    );
    let gateway =
        ResilientGateway::from_config(&config).with_sink(Arc::new(MemoryAuditSink::new()));
    let routers = TestRouters::new().output("MDSNWIGJdst53", SROS_OUTPUT);
    let commands = routers.command_log();
    let inventory = TestInventory::new()
        .session(session(
            7,
            "MDSNWIGJdst53",
            "64.50.224.0/31",
            "64.50.224.1/31",
            "active",
        ))
        .session(session(
            8,
            "MDSNWIGJdst53",
            "192.0.2.77/30",
            "64.50.224.1/31",
            "planned",
        ))
        .session(session(
            9,
            "MDSNWIGJdst53",
            "198.51.100.1/30",
            "64.50.224.1/31",
            "active",
        ));

    let runner = Runner::new(config, routers, inventory).with_gateway(gateway);
    let summary = runner.run(RunMode::Audit).await.unwrap();

    assert_eq!(summary.observations, 2);
    // Active 상태는 planned와 일치, 198.51.100.1은 관찰되지 않음
    assert_eq!(summary.discrepancies.len(), 1);
    assert_eq!(
        summary.discrepancies[0].classification,
        Classification::StaleInInventory
    );
    assert_eq!(summary.discrepancies[0].neighbor_ip, "198.51.100.1");

    assert_eq!(
        *commands.lock().await,
        vec![(
            "MDSNWIGJdst53".to_owned(),
            "show router bgp summary".to_owned()
        )]
    );
}
