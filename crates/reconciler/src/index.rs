//! 인벤토리 세션 인덱스
//!
//! 실행마다 한 번 인벤토리 전체를 읽어 [`SessionKey`] 기준으로 색인합니다.
//! 같은 키가 두 번 나오면 나중 레코드가 이깁니다.

use std::collections::HashMap;

use peersync_core::metrics as m;
use peersync_core::types::InventorySessionRecord;
use tracing::{debug, warn};

use crate::key::SessionKey;

/// 키 → 인벤토리 세션 색인
#[derive(Debug, Default, Clone)]
pub struct SessionIndex {
    by_key: HashMap<SessionKey, InventorySessionRecord>,
    collisions: usize,
    skipped: usize,
}

/// 세션 목록에서 색인을 한 번에 만듭니다.
///
/// 원격 주소가 없는 레코드는 키를 만들 수 없어 건너뜁니다.
pub fn build_index<I>(sessions: I) -> SessionIndex
where
    I: IntoIterator<Item = InventorySessionRecord>,
{
    let mut index = SessionIndex::default();

    for record in sessions {
        let Some(key) = SessionKey::for_record(&record) else {
            debug!(id = record.id, name = record.name.as_str(), "session has no remote address, skipping");
            index.skipped += 1;
            continue;
        };

        let incoming_id = record.id;
        if let Some(previous) = index.by_key.insert(key.clone(), record) {
            warn!(
                key = %key,
                replaced_id = previous.id,
                kept_id = incoming_id,
                "duplicate inventory session key, keeping the later record"
            );
            index.collisions += 1;
        }
    }

    if index.collisions > 0 {
        metrics::counter!(m::RECONCILE_INDEX_COLLISIONS_TOTAL).increment(index.collisions as u64);
    }

    index
}

impl SessionIndex {
    /// 키로 레코드를 찾습니다.
    pub fn get(&self, key: &SessionKey) -> Option<&InventorySessionRecord> {
        self.by_key.get(key)
    }

    /// 색인된 레코드 수
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// 덮어쓴 충돌 수
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// 키가 없어 건너뛴 레코드 수
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// 장비에 속한 레코드를 키 순서로 반환합니다.
    ///
    /// 장비명 비교는 대소문자를 구분하지 않습니다.
    pub fn records_for_device(&self, device: &str) -> Vec<(&SessionKey, &InventorySessionRecord)> {
        let mut records: Vec<_> = self
            .by_key
            .iter()
            .filter(|(_, r)| {
                r.device
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(device))
            })
            .collect();
        records.sort_by(|a, b| a.0.cmp(b.0));
        records
    }
}
