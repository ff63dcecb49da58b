//! 결정 적용 -- `sync` 모드에서 생성/수정 결정을 인벤토리에 씁니다.
//!
//! 생성 전에 외래 키(장비, 사이트, ASN, IP 주소)를 모두 조회로 해석합니다.
//! 해석할 수 없는 참조는 영구 에러이며, 로그와 불일치 사유에 남긴 뒤
//! 다음 결정으로 넘어갑니다. 사이트만은 예외로, 장비 레코드에 없으면
//! 호스트명의 CLLI 코드로 찾고 그래도 없으면 사이트 없이 생성합니다.

use peersync_core::metrics as m;
use peersync_core::types::Discrepancy;
use tracing::{info, warn};

use crate::error::ReconcilerError;
use crate::gateway::{Operation, ResilientGateway};
use crate::inventory::{InventoryClient, NewSession, SessionFilter, SessionPatch};
use crate::reconcile::{Decision, SessionDraft};

/// 결정 하나를 적용한 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 쓸 것이 없음
    Skipped,
    Created(u64),
    Updated(u64),
    /// 같은 장비/원격 주소의 세션이 이미 있어 생성하지 않음
    AlreadyPresent(u64),
    Failed,
}

/// 인벤토리 쓰기 담당
pub struct Applier<'a, I> {
    gateway: &'a ResilientGateway,
    inventory: &'a I,
}

impl<'a, I: InventoryClient> Applier<'a, I> {
    pub fn new(gateway: &'a ResilientGateway, inventory: &'a I) -> Self {
        Self { gateway, inventory }
    }

    /// 결정을 적용합니다. 실패하면 사유를 `discrepancy`에 덧붙입니다.
    pub async fn apply(
        &self,
        decision: &Decision,
        discrepancy: Option<&mut Discrepancy>,
    ) -> WriteOutcome {
        let (operation, result) = match decision {
            Decision::None => return WriteOutcome::Skipped,
            Decision::Create(draft) => ("create", self.create(draft).await),
            Decision::Update {
                id,
                status,
                description,
            } => (
                "update",
                self.update(*id, status, description.as_deref()).await,
            ),
        };

        let label = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!(
            m::RECONCILE_WRITES_TOTAL,
            m::LABEL_OPERATION => operation,
            m::LABEL_RESULT => label
        )
        .increment(1);

        match result {
            Ok(WriteOutcome::AlreadyPresent(id)) => {
                if let (Decision::Create(draft), Some(d)) = (decision, discrepancy) {
                    d.append_reason(&format!(
                        "session {id} already exists for {}/{} under a different local address",
                        draft.device, draft.remote_address
                    ));
                }
                WriteOutcome::AlreadyPresent(id)
            }
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(operation, error = %e, "inventory write failed");
                if let Some(d) = discrepancy {
                    d.append_reason(&format!("{operation} failed: {e}"));
                }
                WriteOutcome::Failed
            }
        }
    }

    async fn create(&self, draft: &SessionDraft) -> Result<WriteOutcome, ReconcilerError> {
        let inv = self.inventory;
        let gw = self.gateway;

        // 재실행 시 중복 생성 방지
        let filter = SessionFilter {
            device: Some(draft.device.clone()),
            remote_address: Some(draft.remote_address.clone()),
        };
        let existing = gw
            .call(
                Operation::inventory("get_session", &draft.remote_address),
                || inv.get_session(&filter),
            )
            .await?;
        if let Some(existing) = existing {
            info!(
                id = existing.id,
                name = existing.name.as_str(),
                "session already present for device and remote address, not creating"
            );
            return Ok(WriteOutcome::AlreadyPresent(existing.id));
        }

        let local_asn = draft.local_as.ok_or_else(|| {
            ReconcilerError::Validation(format!("no local ASN configured for {}", draft.device))
        })?;

        let device = gw
            .call(Operation::inventory("get_device", &draft.device), || {
                inv.get_device(&draft.device)
            })
            .await?;
        let local_as = gw
            .call(Operation::inventory("get_asn", &draft.device), || {
                inv.get_asn(local_asn)
            })
            .await?;
        let remote_as = gw
            .call(Operation::inventory("get_asn", &draft.remote_address), || {
                inv.get_asn(draft.remote_as)
            })
            .await?;
        let local_address = gw
            .call(
                Operation::inventory("get_ip_address", &draft.local_address),
                || inv.get_ip_address(&draft.local_address),
            )
            .await?;
        let remote_address = gw
            .call(
                Operation::inventory("get_ip_address", &draft.remote_address),
                || inv.get_ip_address(&draft.remote_address),
            )
            .await?;
        let site = match device.site {
            Some(site) => Some(site.id),
            None => self.site_for(&draft.device).await?,
        };

        let session = NewSession {
            name: draft.name.clone(),
            description: draft.description.clone(),
            comments: String::new(),
            device: device.id,
            site,
            local_as: local_as.id,
            local_address: local_address.id,
            remote_as: remote_as.id,
            remote_address: remote_address.id,
            status: draft.status.to_lowercase(),
        };
        let created = gw
            .call(Operation::inventory("create_session", &draft.name), || {
                inv.create_session(&session)
            })
            .await?;

        info!(id = created.id, name = created.name.as_str(), "inventory session created");
        Ok(WriteOutcome::Created(created.id))
    }

    /// 호스트명의 CLLI 코드로 사이트를 찾습니다. 없으면 `None`.
    async fn site_for(&self, device: &str) -> Result<Option<u64>, ReconcilerError> {
        let Some(name) = site_name(device) else {
            return Ok(None);
        };
        let inv = self.inventory;
        let found = self
            .gateway
            .call(Operation::inventory("get_site", &name), || inv.get_site(&name))
            .await;
        match found {
            Ok(site) => Ok(Some(site.id)),
            Err(ReconcilerError::NotFound { .. }) => {
                warn!(
                    device,
                    site = name.as_str(),
                    "site not in inventory, creating without site"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update(
        &self,
        id: u64,
        status: &str,
        description: Option<&str>,
    ) -> Result<WriteOutcome, ReconcilerError> {
        let inv = self.inventory;
        let patch = SessionPatch {
            status: Some(status.to_lowercase()),
            description: description.map(str::to_owned),
        };
        let subject = id.to_string();
        let updated = self
            .gateway
            .call(Operation::inventory("update_session", &subject), || {
                inv.update_session(id, &patch)
            })
            .await?;

        info!(id = updated.id, status, "inventory session updated");
        Ok(WriteOutcome::Updated(updated.id))
    }
}

/// 호스트명 앞의 CLLI 코드
///
/// 라우터 이름은 13자(`CHCGILDTcor51`)이고 CLLI는 앞 8자입니다.
/// 11자 이름은 6자, 16자 이름은 11자를 씁니다. 그 밖의 길이는 `None`.
pub fn site_name(hostname: &str) -> Option<String> {
    let host = hostname.split('.').next().unwrap_or(hostname);
    let len = match host.len() {
        13 => 8,
        11 => 6,
        16 => 11,
        _ => return None,
    };
    host.get(..len).map(str::to_ascii_uppercase)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use peersync_core::types::{Classification, InventorySessionRecord};

    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::config::RetryPolicy;
    use crate::inventory::MockInventoryClient;

    fn gateway() -> ResilientGateway {
        ResilientGateway::new(
            RetryPolicy {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(1),
            },
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .with_sink(Arc::new(MemoryAuditSink::new()))
    }

    fn draft(local_as: Option<u32>) -> SessionDraft {
        SessionDraft {
            name: "CHCGILDTcor51 64.50.230.2 AS4150".to_owned(),
            description: "CHCGILDTcor51 64.50.230.2 AS4150".to_owned(),
            device: "CHCGILDTcor51".to_owned(),
            local_address: "64.50.224.10/32".to_owned(),
            remote_address: "64.50.230.2".to_owned(),
            local_as,
            remote_as: 4150,
            status: "Active".to_owned(),
        }
    }

    fn full_inventory() -> MockInventoryClient {
        MockInventoryClient::new()
            .with_device("CHCGILDTcor51", 3, Some("64.50.224.10/32"))
            .with_asn(4181)
            .with_asn(4150)
            .with_address("64.50.224.10/32")
            .with_address("64.50.230.2")
    }

    #[tokio::test]
    async fn create_resolves_foreign_keys() {
        let gw = gateway();
        let inv = full_inventory();
        let applier = Applier::new(&gw, &inv);

        let outcome = applier
            .apply(&Decision::Create(draft(Some(4181))), None)
            .await;
        assert_eq!(outcome, WriteOutcome::Created(1000));

        let created = inv.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].device, 3);
        assert_eq!(created[0].site, Some(1));
        assert_eq!(created[0].local_as, 4181);
        assert_eq!(created[0].remote_as, 4150);
        assert_eq!(created[0].status, "active");
    }

    #[tokio::test]
    async fn unknown_asn_is_noted_on_discrepancy() {
        let gw = gateway();
        let inv = MockInventoryClient::new()
            .with_device("CHCGILDTcor51", 3, None)
            .with_asn(4181)
            .with_address("64.50.224.10/32")
            .with_address("64.50.230.2");
        let applier = Applier::new(&gw, &inv);
        let mut d = Discrepancy {
            device: "CHCGILDTcor51".to_owned(),
            neighbor_ip: "64.50.230.2".to_owned(),
            inventory_status: "not found".to_owned(),
            router_status: "Established".to_owned(),
            classification: Classification::MissingInInventory,
            reason: "no inventory session".to_owned(),
        };

        let outcome = applier
            .apply(&Decision::Create(draft(Some(4181))), Some(&mut d))
            .await;
        assert_eq!(outcome, WriteOutcome::Failed);
        assert!(d.reason.contains("create failed"));
        assert!(d.reason.contains("4150"));
        assert!(inv.created().is_empty());
    }

    #[tokio::test]
    async fn missing_local_asn_is_validation_failure() {
        let gw = gateway();
        let inv = full_inventory();
        let applier = Applier::new(&gw, &inv);
        let mut d = Discrepancy::connection_error("CHCGILDTcor51", "");

        let outcome = applier
            .apply(&Decision::Create(draft(None)), Some(&mut d))
            .await;
        assert_eq!(outcome, WriteOutcome::Failed);
        assert!(d.reason.contains("no local ASN"));
    }

    #[tokio::test]
    async fn existing_session_is_not_created_twice() {
        let gw = gateway();
        let inv = full_inventory().with_session(InventorySessionRecord {
            id: 55,
            device: Some("CHCGILDTcor51".to_owned()),
            remote_address: Some("64.50.230.2".to_owned()),
            ..Default::default()
        });
        let applier = Applier::new(&gw, &inv);

        let outcome = applier
            .apply(&Decision::Create(draft(Some(4181))), None)
            .await;
        assert_eq!(outcome, WriteOutcome::AlreadyPresent(55));
        assert!(inv.created().is_empty());
    }

    #[tokio::test]
    async fn existing_session_is_explained_on_discrepancy() {
        let gw = gateway();
        let inv = full_inventory().with_session(InventorySessionRecord {
            id: 55,
            device: Some("CHCGILDTcor51".to_owned()),
            local_address: Some("64.50.224.99/32".to_owned()),
            remote_address: Some("64.50.230.2".to_owned()),
            ..Default::default()
        });
        let applier = Applier::new(&gw, &inv);
        let mut d = Discrepancy {
            device: "CHCGILDTcor51".to_owned(),
            neighbor_ip: "64.50.230.2".to_owned(),
            inventory_status: "not found".to_owned(),
            router_status: "Established".to_owned(),
            classification: Classification::MissingInInventory,
            reason: "no inventory session".to_owned(),
        };

        let outcome = applier
            .apply(&Decision::Create(draft(Some(4181))), Some(&mut d))
            .await;
        assert_eq!(outcome, WriteOutcome::AlreadyPresent(55));
        assert_eq!(d.classification, Classification::MissingInInventory);
        assert!(d.reason.starts_with("no inventory session; "));
        assert!(d.reason.contains("session 55 already exists for CHCGILDTcor51/64.50.230.2"));
    }

    #[tokio::test]
    async fn device_without_site_resolves_site_from_hostname() {
        let gw = gateway();
        let mut inv = full_inventory().with_site("CHCGILDT");
        if let Some(device) = inv.devices.get_mut("CHCGILDTcor51") {
            device.site = None;
        }
        let applier = Applier::new(&gw, &inv);

        let outcome = applier
            .apply(&Decision::Create(draft(Some(4181))), None)
            .await;
        assert_eq!(outcome, WriteOutcome::Created(1000));
        assert_eq!(inv.created()[0].site, Some(7));
    }

    #[tokio::test]
    async fn unknown_site_creates_session_without_site() {
        let gw = gateway();
        let mut inv = full_inventory();
        if let Some(device) = inv.devices.get_mut("CHCGILDTcor51") {
            device.site = None;
        }
        let applier = Applier::new(&gw, &inv);

        let outcome = applier
            .apply(&Decision::Create(draft(Some(4181))), None)
            .await;
        assert_eq!(outcome, WriteOutcome::Created(1000));
        assert_eq!(inv.created()[0].site, None);
    }

    #[test]
    fn site_name_takes_clli_prefix() {
        assert_eq!(site_name("CHCGILDTcor51").as_deref(), Some("CHCGILDT"));
        assert_eq!(
            site_name("atlngamqcor52.network.tds.net").as_deref(),
            Some("ATLNGAMQ")
        );
        assert_eq!(site_name("CNTCNHdst51").as_deref(), Some("CNTCNH"));
        assert_eq!(site_name("MDSNWIVU01Ndst53").as_deref(), Some("MDSNWIVU01N"));
        assert_eq!(site_name("bogus"), None);
    }

    #[tokio::test]
    async fn update_sends_lowercased_status() {
        let gw = gateway();
        let inv = full_inventory();
        let applier = Applier::new(&gw, &inv);

        let outcome = applier
            .apply(
                &Decision::Update {
                    id: 9,
                    status: "Offline".to_owned(),
                    description: Some("filled".to_owned()),
                },
                None,
            )
            .await;
        assert_eq!(outcome, WriteOutcome::Updated(9));

        let updated = inv.updated();
        assert_eq!(updated[0].0, 9);
        assert_eq!(updated[0].1.status.as_deref(), Some("offline"));
        assert_eq!(updated[0].1.description.as_deref(), Some("filled"));
    }

    #[tokio::test]
    async fn none_decision_is_skipped() {
        let gw = gateway();
        let inv = full_inventory();
        let outcome = Applier::new(&gw, &inv).apply(&Decision::None, None).await;
        assert_eq!(outcome, WriteOutcome::Skipped);
    }
}
