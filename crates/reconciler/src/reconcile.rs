//! 관찰값 분류 -- 라우터 관찰과 인벤토리 레코드를 비교하여 결정과 불일치를 만듭니다.
//!
//! # 분류 규칙
//! - 키가 인덱스에 없음: [`Decision::Create`] + `missing_in_inventory`
//! - `Established`인데 상태가 `active`가 아님: [`Decision::Update`] + `drift`
//! - `Established`가 아닌데 상태가 `active`: [`Decision::Update`] + `drift`
//! - 그 외: [`Decision::None`], 불일치 없음
//!
//! 이 모듈은 순수합니다. 인벤토리 쓰기는 [`Applier`](crate::apply::Applier)가 담당합니다.

use std::collections::HashSet;

use peersync_core::types::{
    Classification, Discrepancy, InventorySessionRecord, NeighborObservation, STATUS_NOT_FOUND,
    STATUS_NOT_OBSERVED, SessionState,
};
use tracing::debug;

use crate::config::ReconcilerConfig;
use crate::index::SessionIndex;
use crate::key::{SessionKey, build_key, strip_mask};

/// Established 세션의 인벤토리 상태
pub const ACTIVE_STATUS: &str = "active";

/// 새로 만들 세션의 내용 (외래 키는 아직 이름/값 상태)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDraft {
    /// `<device> <neighbor> AS<asn>`
    pub name: String,
    pub description: String,
    pub device: String,
    pub local_address: String,
    pub remote_address: String,
    pub local_as: Option<u32>,
    pub remote_as: u32,
    pub status: String,
}

/// 관찰값 하나에 대한 조정 결정
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// 인벤토리가 이미 맞음
    None,
    /// 세션 생성
    Create(SessionDraft),
    /// 상태 수정 (빈 설명도 함께 채움)
    Update {
        id: u64,
        status: String,
        description: Option<String>,
    },
}

impl Decision {
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// 관찰값 분류기
#[derive(Debug, Clone)]
pub struct Reconciler {
    inactive_status: String,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new("offline")
    }
}

impl Reconciler {
    /// `inactive_status`는 Established가 아닌 세션에 기록할 상태입니다.
    pub fn new(inactive_status: impl Into<String>) -> Self {
        Self {
            inactive_status: inactive_status.into().trim().to_lowercase(),
        }
    }

    pub fn from_config(config: &ReconcilerConfig) -> Self {
        Self::new(config.inactive_status.clone())
    }

    /// 관찰된 상태에 맞는 인벤토리 상태
    pub fn expected_status(&self, state: SessionState) -> &str {
        if state.is_established() {
            ACTIVE_STATUS
        } else {
            &self.inactive_status
        }
    }

    /// 관찰 상태와 인벤토리 상태가 일치하는지 여부
    ///
    /// Established가 아닌 상태는 `active`가 아닌 모든 상태와 일치합니다.
    pub fn is_consistent(state: SessionState, inventory_status: &str) -> bool {
        let active = inventory_status.trim().eq_ignore_ascii_case(ACTIVE_STATUS);
        state.is_established() == active
    }

    /// 관찰값 하나를 인덱스와 비교합니다.
    ///
    /// 키는 `(이웃 주소, 장비 대표 IP)`입니다. `local_asn`은 생성 초안에만 쓰입니다.
    pub fn reconcile(
        &self,
        observation: &NeighborObservation,
        index: &SessionIndex,
        device_primary_ip: &str,
        local_asn: Option<u32>,
    ) -> (Decision, Option<Discrepancy>) {
        let key = build_key(&observation.neighbor_ip, device_primary_ip);
        let device = observation.source_router.as_str();

        let Some(record) = index.get(&key) else {
            let draft = self.draft(observation, &key, device_primary_ip, local_asn);
            debug!(router = device, key = %key, "session missing in inventory");
            let discrepancy = Discrepancy {
                device: device.to_owned(),
                neighbor_ip: observation.neighbor_ip.clone(),
                inventory_status: STATUS_NOT_FOUND.to_owned(),
                router_status: observation.state.to_string(),
                classification: Classification::MissingInInventory,
                reason: format!(
                    "no inventory session for {key} (AS{})",
                    observation.remote_as
                ),
            };
            return (Decision::Create(draft), Some(discrepancy));
        };

        if Self::is_consistent(observation.state, &record.status) {
            return (Decision::None, None);
        }

        let status = self.expected_status(observation.state).to_owned();
        debug!(
            router = device,
            key = %key,
            id = record.id,
            from = record.status.as_str(),
            to = status.as_str(),
            "session status drifted"
        );
        let description = record
            .description
            .trim()
            .is_empty()
            .then(|| session_name(device, &observation.neighbor_ip, observation.remote_as));
        let discrepancy = Discrepancy {
            device: device.to_owned(),
            neighbor_ip: observation.neighbor_ip.clone(),
            inventory_status: record.status.clone(),
            router_status: observation.state.to_string(),
            classification: Classification::Drift,
            reason: format!(
                "inventory session {} is '{}' but router reports {}, expected '{status}'",
                record.id, record.status, observation.state
            ),
        };
        (
            Decision::Update {
                id: record.id,
                status,
                description,
            },
            Some(discrepancy),
        )
    }

    /// 라우터에서 관찰되지 않은 장비 세션을 찾습니다. 보고만 하고 삭제하지 않습니다.
    pub fn stale(
        &self,
        device: &str,
        index: &SessionIndex,
        observed: &HashSet<SessionKey>,
    ) -> Vec<Discrepancy> {
        index
            .records_for_device(device)
            .into_iter()
            .filter(|(key, _)| !observed.contains(*key))
            .map(|(key, record)| stale_discrepancy(device, key, record))
            .collect()
    }

    /// 접속하지 못한 장비의 `connection_error` 행을 만듭니다.
    ///
    /// 인벤토리 세션마다 한 행씩 만들고, 세션이 없으면 이웃 `-` 한 행을 만듭니다.
    pub fn unreachable(
        &self,
        device: &str,
        index: &SessionIndex,
        reason: &str,
    ) -> Vec<Discrepancy> {
        let rows: Vec<_> = index
            .records_for_device(device)
            .into_iter()
            .map(|(key, record)| {
                let mut d = Discrepancy::connection_error(device, reason);
                d.neighbor_ip = key.remote.clone();
                d.inventory_status = record.status.clone();
                d
            })
            .collect();
        if rows.is_empty() {
            vec![Discrepancy::connection_error(device, reason)]
        } else {
            rows
        }
    }

    fn draft(
        &self,
        observation: &NeighborObservation,
        key: &SessionKey,
        device_primary_ip: &str,
        local_asn: Option<u32>,
    ) -> SessionDraft {
        let name = session_name(
            &observation.source_router,
            &key.remote,
            observation.remote_as,
        );
        SessionDraft {
            description: name.clone(),
            name,
            device: observation.source_router.clone(),
            local_address: device_primary_ip.trim().to_owned(),
            remote_address: observation.neighbor_ip.clone(),
            local_as: local_asn,
            remote_as: observation.remote_as,
            status: self.expected_status(observation.state).to_owned(),
        }
    }
}

/// 생성하는 세션의 이름
pub fn session_name(device: &str, neighbor: &str, remote_as: u32) -> String {
    format!("{device} {} AS{remote_as}", strip_mask(neighbor))
}

fn stale_discrepancy(device: &str, key: &SessionKey, record: &InventorySessionRecord) -> Discrepancy {
    Discrepancy {
        device: device.to_owned(),
        neighbor_ip: key.remote.clone(),
        inventory_status: record.status.clone(),
        router_status: STATUS_NOT_OBSERVED.to_owned(),
        classification: Classification::StaleInInventory,
        reason: format!(
            "inventory session {} '{}' was not observed on the router",
            record.id, record.name
        ),
    }
}

/// 한 번의 스크랩 안에서 같은 이웃을 중복 제거합니다. 첫 관찰이 남습니다.
pub fn dedup_observations(observations: Vec<NeighborObservation>) -> Vec<NeighborObservation> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(observations.len());
    for obs in observations {
        if seen.insert(strip_mask(&obs.neighbor_ip)) {
            unique.push(obs);
        } else {
            debug!(
                router = obs.source_router.as_str(),
                neighbor = obs.neighbor_ip.as_str(),
                "duplicate observation dropped"
            );
        }
    }
    unique
}
