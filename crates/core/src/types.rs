//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 라우터에서 관찰한 BGP 이웃, 인벤토리에 기록된 세션, 그리고 둘 사이의
//! 불일치를 표현합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// BGP 세션 상태 (RFC 4271 FSM)
///
/// 라우터 출력의 상태 문자열을 정규화한 값입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Established,
    Idle,
    Active,
    Connect,
    OpenSent,
    OpenConfirm,
    /// 인식할 수 없는 상태 문자열
    #[default]
    Unknown,
}

impl SessionState {
    /// 라우터 출력의 상태 문자열을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며 `Idle (Admin)`, `Idle (PfxCt)` 처럼
    /// 괄호로 붙는 사유는 무시합니다.
    pub fn from_str_loose(s: &str) -> Self {
        let word = s.split(['(', ' ']).next().unwrap_or_default();
        match word.trim().to_lowercase().as_str() {
            "established" | "estab" => Self::Established,
            "idle" => Self::Idle,
            "active" => Self::Active,
            "connect" => Self::Connect,
            "opensent" => Self::OpenSent,
            "openconfirm" => Self::OpenConfirm,
            _ => Self::Unknown,
        }
    }

    /// 세션이 수립된 상태인지 여부
    pub fn is_established(self) -> bool {
        self == Self::Established
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Established => "Established",
            Self::Idle => "Idle",
            Self::Active => "Active",
            Self::Connect => "Connect",
            Self::OpenSent => "OpenSent",
            Self::OpenConfirm => "OpenConfirm",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// 라우터 CLI 출력 형식
///
/// 설정 파일에서는 netmiko 스타일 장비 타입 이름을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Cisco IOS / IOS-XE `show ip bgp summary`
    #[serde(rename = "cisco_ios", alias = "ios")]
    Ios,
    /// Cisco IOS-XR `show bgp summary`
    #[serde(rename = "cisco_xr", alias = "iosxr")]
    IosXr,
    /// Nokia SR-OS `show router bgp summary`
    #[serde(rename = "nokia_sros", alias = "sros")]
    Sros,
}

impl Dialect {
    /// 모든 지원 형식
    pub const ALL: [Dialect; 3] = [Self::Ios, Self::IosXr, Self::Sros];

    /// BGP 요약을 얻기 위해 장비에서 실행할 명령
    pub fn summary_command(self) -> &'static str {
        match self {
            Self::Ios => "show ip bgp summary",
            Self::IosXr => "show bgp summary",
            Self::Sros => "show router bgp summary",
        }
    }

    /// 설정 파일에서 사용하는 이름
    pub fn name(self) -> &'static str {
        match self {
            Self::Ios => "cisco_ios",
            Self::IosXr => "cisco_xr",
            Self::Sros => "nokia_sros",
        }
    }

    /// 이름 또는 별칭에서 형식을 파싱합니다.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cisco_ios" | "ios" | "cisco_xe" => Some(Self::Ios),
            "cisco_xr" | "iosxr" | "ios-xr" => Some(Self::IosXr),
            "nokia_sros" | "sros" | "sr-os" => Some(Self::Sros),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 라우터 한 대에서 관찰한 BGP 이웃
///
/// 스크랩마다 새로 생성되며 해당 실행의 조정이 끝나면 버려집니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborObservation {
    /// 이웃 IP 주소
    pub neighbor_ip: String,
    /// 원격 AS 번호 (asplain)
    pub remote_as: u32,
    /// 세션 상태
    pub state: SessionState,
    /// 수신 프리픽스 수
    pub prefixes_received: u64,
    /// 관찰한 라우터 호스트명
    pub source_router: String,
}

impl fmt::Display for NeighborObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} AS{} {} pfx={} (via {})",
            self.neighbor_ip, self.remote_as, self.state, self.prefixes_received, self.source_router,
        )
    }
}

/// 인벤토리에 기록된 BGP 세션
///
/// 외래 키는 사람이 읽을 수 있는 값(장비명, ASN, CIDR)으로 평탄화되어 있습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySessionRecord {
    /// 인벤토리가 부여한 식별자
    pub id: u64,
    pub name: String,
    pub description: String,
    pub comments: String,
    /// 장비명
    pub device: Option<String>,
    /// 사이트명
    pub site: Option<String>,
    pub local_as: Option<u32>,
    /// 로컬 주소 (CIDR)
    pub local_address: Option<String>,
    pub remote_as: Option<u32>,
    /// 원격 주소 (CIDR)
    pub remote_address: Option<String>,
    /// 상태 (소문자 정규화)
    pub status: String,
}

/// 불일치 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Ok,
    Drift,
    MissingInInventory,
    StaleInInventory,
    ConnectionError,
}

impl Classification {
    /// 보고서와 메트릭 레이블에 쓰는 고정 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Drift => "drift",
            Self::MissingInInventory => "missing_in_inventory",
            Self::StaleInInventory => "stale_in_inventory",
            Self::ConnectionError => "connection_error",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 인벤토리 상태가 없을 때 보고서에 표시하는 값
pub const STATUS_NOT_FOUND: &str = "not found";

/// 라우터에 접속하지 못했을 때 보고서에 표시하는 값
pub const STATUS_CONNECTION_ERROR: &str = "Connection Error";

/// 라우터에서 관찰되지 않은 세션에 표시하는 값
pub const STATUS_NOT_OBSERVED: &str = "not observed";

/// 라우터 상태와 인벤토리 상태의 불일치
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// 라우터 호스트명
    pub device: String,
    /// 이웃 IP (장비 단위 연결 실패는 `-`)
    pub neighbor_ip: String,
    /// 인벤토리 상태 또는 `not found`
    pub inventory_status: String,
    /// 라우터에서 관찰한 상태
    pub router_status: String,
    pub classification: Classification,
    /// 이 행이 보고되는 이유
    pub reason: String,
}

impl Discrepancy {
    /// 장비 단위 연결 실패 불일치를 생성합니다.
    pub fn connection_error(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            neighbor_ip: "-".to_owned(),
            inventory_status: STATUS_NOT_FOUND.to_owned(),
            router_status: STATUS_CONNECTION_ERROR.to_owned(),
            classification: Classification::ConnectionError,
            reason: reason.into(),
        }
    }

    /// 사유에 메모를 덧붙입니다.
    pub fn append_reason(&mut self, note: &str) {
        if self.reason.is_empty() {
            self.reason = note.to_owned();
        } else {
            self.reason.push_str("; ");
            self.reason.push_str(note);
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: inventory={} router={}",
            self.classification, self.device, self.neighbor_ip, self.inventory_status, self.router_status,
        )
    }
}
