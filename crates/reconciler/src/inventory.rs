//! 인벤토리 클라이언트 -- NetBox BGP 플러그인 REST API
//!
//! [`InventoryClient`] trait은 세션 목록 조회, 생성, 수정과 외래 키 조회를 추상화합니다.
//! 운영 코드는 [`NetboxClient`]를, 테스트는 `MockInventoryClient`를 사용합니다.
//!
//! 클라이언트 자체에는 타임아웃이 없습니다. 시도별 제한 시간과 재시도는
//! [`ResilientGateway`](crate::gateway::ResilientGateway)가 담당합니다.

use std::future::Future;

use peersync_core::config::InventoryConfig;
use peersync_core::credentials::Credentials;
use peersync_core::types::InventorySessionRecord;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::ReconcilerError;

const SESSIONS_PATH: &str = "api/plugins/bgp/session/";
const DEVICES_PATH: &str = "api/dcim/devices/";
const ASNS_PATH: &str = "api/ipam/asns/";
const IP_ADDRESSES_PATH: &str = "api/ipam/ip-addresses/";
const SITES_PATH: &str = "api/dcim/sites/";

/// 에러 본문은 이 길이까지만 보관
const MAX_ERROR_BODY: usize = 200;

/// 인벤토리 객체 참조 (외래 키)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: u64,
    /// 사람이 읽을 수 있는 표기 (장비명, ASN, CIDR 등)
    pub display: String,
}

/// 인벤토리 장비
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: u64,
    pub name: String,
    pub site: Option<ObjectRef>,
    /// 대표 IP (CIDR)
    pub primary_ip: Option<String>,
}

/// 세션 검색 조건
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub device: Option<String>,
    pub remote_address: Option<String>,
}

/// 새 세션 생성 요청 (외래 키는 모두 id로 해석된 상태)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSession {
    pub name: String,
    pub description: String,
    pub comments: String,
    pub device: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<u64>,
    pub local_as: u64,
    pub local_address: u64,
    pub remote_as: u64,
    pub remote_address: u64,
    pub status: String,
}

/// 세션 부분 수정 요청
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.description.is_none()
    }
}

/// 인벤토리 저장소 클라이언트
///
/// # Errors
///
/// - `ReconcilerError::Request`: 네트워크 전송 실패 (일시적)
/// - `ReconcilerError::Http`: 상태 코드 에러 (429/5xx는 일시적)
/// - `ReconcilerError::NotFound`: 조회 대상 없음
/// - `ReconcilerError::Validation`: 인벤토리가 요청을 거부함
pub trait InventoryClient: Send + Sync + 'static {
    /// 모든 세션을 읽습니다 (페이지 순회 포함).
    fn list_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<InventorySessionRecord>, ReconcilerError>> + Send;

    /// 조건에 맞는 첫 세션을 찾습니다.
    fn get_session(
        &self,
        filter: &SessionFilter,
    ) -> impl Future<Output = Result<Option<InventorySessionRecord>, ReconcilerError>> + Send;

    fn create_session(
        &self,
        session: &NewSession,
    ) -> impl Future<Output = Result<InventorySessionRecord, ReconcilerError>> + Send;

    fn update_session(
        &self,
        id: u64,
        patch: &SessionPatch,
    ) -> impl Future<Output = Result<InventorySessionRecord, ReconcilerError>> + Send;

    fn get_device(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<DeviceRecord, ReconcilerError>> + Send;

    fn get_asn(&self, asn: u32)
    -> impl Future<Output = Result<ObjectRef, ReconcilerError>> + Send;

    fn get_ip_address(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<ObjectRef, ReconcilerError>> + Send;

    fn get_site(&self, name: &str)
    -> impl Future<Output = Result<ObjectRef, ReconcilerError>> + Send;
}

// --- NetBox 응답 형식 ---

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct NbStatus {
    value: String,
}

#[derive(Debug, Deserialize)]
struct NbNamed {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display: Option<String>,
}

impl NbNamed {
    fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.display.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct NbAsn {
    id: u64,
    asn: u32,
}

#[derive(Debug, Deserialize)]
struct NbAddress {
    id: u64,
    address: String,
}

#[derive(Debug, Deserialize)]
struct NbSession {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    comments: String,
    #[serde(default)]
    device: Option<NbNamed>,
    #[serde(default)]
    site: Option<NbNamed>,
    #[serde(default)]
    local_as: Option<NbAsn>,
    #[serde(default)]
    local_address: Option<NbAddress>,
    #[serde(default)]
    remote_as: Option<NbAsn>,
    #[serde(default)]
    remote_address: Option<NbAddress>,
    #[serde(default)]
    status: Option<NbStatus>,
}

impl From<NbSession> for InventorySessionRecord {
    fn from(s: NbSession) -> Self {
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            comments: s.comments,
            device: s.device.map(|d| d.label()),
            site: s.site.map(|d| d.label()),
            local_as: s.local_as.map(|a| a.asn),
            local_address: s.local_address.map(|a| a.address),
            remote_as: s.remote_as.map(|a| a.asn),
            remote_address: s.remote_address.map(|a| a.address),
            status: s
                .status
                .map(|st| st.value.to_lowercase())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NbDevice {
    id: u64,
    name: String,
    #[serde(default)]
    site: Option<NbNamed>,
    #[serde(default)]
    primary_ip: Option<NbAddress>,
}

/// NetBox REST 클라이언트
pub struct NetboxClient {
    http: reqwest::Client,
    base: Url,
    page_size: usize,
}

impl NetboxClient {
    /// 새 클라이언트를 생성합니다.
    ///
    /// `base_url`에는 `/api/` 앞부분까지만 지정합니다 (`https://netbox.example.net`).
    pub fn new(
        base_url: &Url,
        token: &str,
        verify_tls: bool,
        page_size: usize,
    ) -> Result<Self, ReconcilerError> {
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Token {token}")).map_err(|e| {
            ReconcilerError::Config {
                field: "NETBOX_TOKEN".to_owned(),
                reason: e.to_string(),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| ReconcilerError::Config {
                field: "inventory".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })?;

        Ok(Self {
            http,
            base,
            page_size: page_size.max(1),
        })
    }

    /// 환경 자격 증명과 `[inventory]` 설정으로 클라이언트를 생성합니다.
    pub fn from_credentials(
        credentials: &Credentials,
        config: &InventoryConfig,
    ) -> Result<Self, ReconcilerError> {
        Self::new(
            &credentials.inventory_url,
            &credentials.inventory_token,
            config.verify_tls,
            config.page_size,
        )
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ReconcilerError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| ReconcilerError::Request(format!("invalid endpoint {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ReconcilerError> {
        debug!(url = url.as_str(), "GET");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ReconcilerError::Request(e.to_string()))?;
        decode(check_status(response).await?).await
    }

    /// 조회 endpoint에서 첫 결과를 가져옵니다. 없으면 `NotFound`.
    async fn lookup<T: DeserializeOwned>(
        &self,
        path: &str,
        field: &str,
        value: &str,
        kind: &str,
    ) -> Result<T, ReconcilerError> {
        let url = self.endpoint(path, &[(field, value), ("limit", "1")])?;
        let page: Page<T> = self.get_json(url).await?;
        page.results
            .into_iter()
            .next()
            .ok_or_else(|| ReconcilerError::NotFound {
                kind: kind.to_owned(),
                key: value.to_owned(),
            })
    }
}

impl InventoryClient for NetboxClient {
    async fn list_sessions(&self) -> Result<Vec<InventorySessionRecord>, ReconcilerError> {
        let limit = self.page_size.to_string();
        let mut next = Some(self.endpoint(SESSIONS_PATH, &[("limit", &limit)])?);
        let mut sessions = Vec::new();

        while let Some(url) = next.take() {
            let page: Page<NbSession> = self.get_json(url).await?;
            sessions.extend(page.results.into_iter().map(InventorySessionRecord::from));
            next = match page.next {
                Some(link) => Some(
                    Url::parse(&link)
                        .map_err(|e| ReconcilerError::Decode(format!("bad next link {link}: {e}")))?,
                ),
                None => None,
            };
        }

        debug!(count = sessions.len(), "inventory sessions loaded");
        Ok(sessions)
    }

    async fn get_session(
        &self,
        filter: &SessionFilter,
    ) -> Result<Option<InventorySessionRecord>, ReconcilerError> {
        let mut query = vec![("limit", "1")];
        if let Some(device) = filter.device.as_deref() {
            query.push(("device", device));
        }
        if let Some(remote) = filter.remote_address.as_deref() {
            query.push(("remote_address", remote));
        }
        let url = self.endpoint(SESSIONS_PATH, &query)?;
        let page: Page<NbSession> = self.get_json(url).await?;
        Ok(page.results.into_iter().next().map(Into::into))
    }

    async fn create_session(
        &self,
        session: &NewSession,
    ) -> Result<InventorySessionRecord, ReconcilerError> {
        let mut body = session.clone();
        body.status = body.status.to_lowercase();

        let url = self.endpoint(SESSIONS_PATH, &[])?;
        debug!(url = url.as_str(), name = body.name.as_str(), "POST");
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReconcilerError::Request(e.to_string()))?;
        let created: NbSession = decode(check_status(response).await?).await?;
        Ok(created.into())
    }

    async fn update_session(
        &self,
        id: u64,
        patch: &SessionPatch,
    ) -> Result<InventorySessionRecord, ReconcilerError> {
        let mut body = patch.clone();
        body.status = body.status.map(|s| s.to_lowercase());

        let url = self.endpoint(&format!("{SESSIONS_PATH}{id}/"), &[])?;
        debug!(url = url.as_str(), id, "PATCH");
        let response = self
            .http
            .patch(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReconcilerError::Request(e.to_string()))?;
        let updated: NbSession = decode(check_status(response).await?).await?;
        Ok(updated.into())
    }

    async fn get_device(&self, name: &str) -> Result<DeviceRecord, ReconcilerError> {
        let device: NbDevice = self.lookup(DEVICES_PATH, "name", name, "device").await?;
        Ok(DeviceRecord {
            id: device.id,
            name: device.name,
            site: device.site.map(|s| ObjectRef {
                id: s.id,
                display: s.label(),
            }),
            primary_ip: device.primary_ip.map(|ip| ip.address),
        })
    }

    async fn get_asn(&self, asn: u32) -> Result<ObjectRef, ReconcilerError> {
        let key = asn.to_string();
        let found: NbAsn = self.lookup(ASNS_PATH, "asn", &key, "asn").await?;
        Ok(ObjectRef {
            id: found.id,
            display: found.asn.to_string(),
        })
    }

    async fn get_ip_address(&self, address: &str) -> Result<ObjectRef, ReconcilerError> {
        let found: NbAddress = self
            .lookup(IP_ADDRESSES_PATH, "address", address, "ip address")
            .await?;
        Ok(ObjectRef {
            id: found.id,
            display: found.address,
        })
    }

    async fn get_site(&self, name: &str) -> Result<ObjectRef, ReconcilerError> {
        let site: NbNamed = self.lookup(SITES_PATH, "name", name, "site").await?;
        Ok(ObjectRef {
            id: site.id,
            display: site.label(),
        })
    }
}

/// 상태 코드를 도메인 에러로 바꿉니다.
async fn check_status(response: Response) -> Result<Response, ReconcilerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY)
        .collect();

    Err(match status {
        StatusCode::NOT_FOUND => ReconcilerError::NotFound {
            kind: "resource".to_owned(),
            key: url,
        },
        StatusCode::BAD_REQUEST => ReconcilerError::Validation(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ReconcilerError::Authentication {
            target: url,
            reason: format!("HTTP {}", status.as_u16()),
        },
        _ => ReconcilerError::Http {
            status: status.as_u16(),
            url,
            body,
        },
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ReconcilerError> {
    let url = response.url().to_string();
    response
        .json()
        .await
        .map_err(|e| ReconcilerError::Decode(format!("{url}: {e}")))
}

/// 테스트용 메모리 인벤토리
#[cfg(test)]
#[derive(Default)]
pub struct MockInventoryClient {
    pub sessions: std::sync::Mutex<Vec<InventorySessionRecord>>,
    pub devices: std::collections::HashMap<String, DeviceRecord>,
    pub asns: std::collections::HashSet<u32>,
    pub addresses: std::collections::HashSet<String>,
    pub sites: std::collections::HashSet<String>,
    /// true면 `list_sessions`가 실패
    pub list_fails: bool,
    pub created: std::sync::Mutex<Vec<NewSession>>,
    pub updated: std::sync::Mutex<Vec<(u64, SessionPatch)>>,
}

#[cfg(test)]
impl MockInventoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, record: InventorySessionRecord) -> Self {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push(record);
        }
        self
    }

    pub fn with_device(mut self, name: &str, id: u64, primary_ip: Option<&str>) -> Self {
        self.devices.insert(
            name.to_owned(),
            DeviceRecord {
                id,
                name: name.to_owned(),
                site: Some(ObjectRef {
                    id: 1,
                    display: "SITE1".to_owned(),
                }),
                primary_ip: primary_ip.map(str::to_owned),
            },
        );
        self
    }

    pub fn with_asn(mut self, asn: u32) -> Self {
        self.asns.insert(asn);
        self
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.addresses.insert(address.to_owned());
        self
    }

    pub fn with_site(mut self, name: &str) -> Self {
        self.sites.insert(name.to_owned());
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.list_fails = true;
        self
    }

    pub fn created(&self) -> Vec<NewSession> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn updated(&self) -> Vec<(u64, SessionPatch)> {
        self.updated.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl InventoryClient for MockInventoryClient {
    async fn list_sessions(&self) -> Result<Vec<InventorySessionRecord>, ReconcilerError> {
        if self.list_fails {
            return Err(ReconcilerError::Http {
                status: 503,
                url: "mock://sessions".to_owned(),
                body: String::new(),
            });
        }
        Ok(self.sessions.lock().map(|s| s.clone()).unwrap_or_default())
    }

    async fn get_session(
        &self,
        filter: &SessionFilter,
    ) -> Result<Option<InventorySessionRecord>, ReconcilerError> {
        let sessions = self.sessions.lock().map(|s| s.clone()).unwrap_or_default();
        Ok(sessions.into_iter().find(|s| {
            filter
                .device
                .as_ref()
                .is_none_or(|d| s.device.as_ref() == Some(d))
                && filter
                    .remote_address
                    .as_ref()
                    .is_none_or(|r| s.remote_address.as_ref() == Some(r))
        }))
    }

    async fn create_session(
        &self,
        session: &NewSession,
    ) -> Result<InventorySessionRecord, ReconcilerError> {
        if let Ok(mut created) = self.created.lock() {
            created.push(session.clone());
        }
        Ok(InventorySessionRecord {
            id: 1000,
            name: session.name.clone(),
            description: session.description.clone(),
            status: session.status.to_lowercase(),
            ..Default::default()
        })
    }

    async fn update_session(
        &self,
        id: u64,
        patch: &SessionPatch,
    ) -> Result<InventorySessionRecord, ReconcilerError> {
        if let Ok(mut updated) = self.updated.lock() {
            updated.push((id, patch.clone()));
        }
        Ok(InventorySessionRecord {
            id,
            status: patch.status.clone().unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn get_device(&self, name: &str) -> Result<DeviceRecord, ReconcilerError> {
        self.devices
            .get(name)
            .cloned()
            .ok_or_else(|| ReconcilerError::NotFound {
                kind: "device".to_owned(),
                key: name.to_owned(),
            })
    }

    async fn get_asn(&self, asn: u32) -> Result<ObjectRef, ReconcilerError> {
        if self.asns.contains(&asn) {
            Ok(ObjectRef {
                id: u64::from(asn),
                display: asn.to_string(),
            })
        } else {
            Err(ReconcilerError::NotFound {
                kind: "asn".to_owned(),
                key: asn.to_string(),
            })
        }
    }

    async fn get_ip_address(&self, address: &str) -> Result<ObjectRef, ReconcilerError> {
        if self.addresses.contains(address) {
            Ok(ObjectRef {
                id: 7,
                display: address.to_owned(),
            })
        } else {
            Err(ReconcilerError::NotFound {
                kind: "ip address".to_owned(),
                key: address.to_owned(),
            })
        }
    }

    async fn get_site(&self, name: &str) -> Result<ObjectRef, ReconcilerError> {
        if self.sites.contains(name) {
            Ok(ObjectRef {
                id: 7,
                display: name.to_owned(),
            })
        } else {
            Err(ReconcilerError::NotFound {
                kind: "site".to_owned(),
                key: name.to_owned(),
            })
        }
    }
}
