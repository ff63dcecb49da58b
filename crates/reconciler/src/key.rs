//! 세션 키 -- 관찰값과 인벤토리 레코드를 같은 기준으로 식별합니다.
//!
//! 원격 주소만으로는 세션이 구분되지 않습니다 (VRF별 중복 주소 등).
//! 그래서 `(원격 주소, 로컬 주소)` 쌍을 키로 씁니다.

use std::fmt;
use std::net::IpAddr;

use peersync_core::types::InventorySessionRecord;

/// 마스크를 제거한 `(원격 주소, 로컬 주소)` 복합 키
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub remote: String,
    pub local: String,
}

impl SessionKey {
    /// 인벤토리 레코드의 키를 만듭니다.
    ///
    /// 원격 주소가 없는 레코드는 키를 가질 수 없습니다.
    pub fn for_record(record: &InventorySessionRecord) -> Option<Self> {
        let remote = record.remote_address.as_deref()?;
        let local = record.local_address.as_deref().unwrap_or_default();
        Some(build_key(remote, local))
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.remote, self.local)
    }
}

/// 두 주소에서 `/mask`를 제거하여 키를 만듭니다.
///
/// IP로 해석되는 주소는 표준 표기로 바꾸므로 `2001:DB8::1/64`와
/// `2001:db8::1`은 같은 키가 됩니다. 여러 번 적용해도 결과가 같습니다.
pub fn build_key(remote: &str, local: &str) -> SessionKey {
    SessionKey {
        remote: strip_mask(remote),
        local: strip_mask(local),
    }
}

/// 주소에서 마스크를 제거합니다.
pub fn strip_mask(address: &str) -> String {
    let host = address.split('/').next().unwrap_or_default().trim();
    match host.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => host.to_owned(),
    }
}
