//! 자격 증명 -- 환경변수에서 인벤토리/장비 접속 정보를 읽습니다.
//!
//! 자격 증명은 설정 파일에 두지 않습니다. 필수 변수가 하나라도 없으면
//! 누락된 변수 전체를 한 번에 보고합니다.

use std::fmt;

use url::Url;

use crate::error::CredentialError;

/// 인벤토리 API 기본 URL
pub const ENV_INVENTORY_URL: &str = "NETBOX_URL";
/// 인벤토리 API 토큰
pub const ENV_INVENTORY_TOKEN: &str = "NETBOX_TOKEN";
/// 라우터 SSH 사용자명
pub const ENV_ROUTER_USERNAME: &str = "ROUTER_USERNAME";
/// 라우터 SSH 비밀번호
pub const ENV_ROUTER_PASSWORD: &str = "ROUTER_PASSWORD";

const REQUIRED_VARS: [&str; 4] = [
    ENV_INVENTORY_URL,
    ENV_INVENTORY_TOKEN,
    ENV_ROUTER_USERNAME,
    ENV_ROUTER_PASSWORD,
];

/// 앞뒤 공백도 값의 일부인 변수
const SECRET_VARS: [&str; 2] = [ENV_INVENTORY_TOKEN, ENV_ROUTER_PASSWORD];

/// 실행에 필요한 자격 증명
///
/// `Debug` 출력에서 토큰과 비밀번호는 가려집니다.
#[derive(Clone)]
pub struct Credentials {
    /// 인벤토리 API 기본 URL (http/https)
    pub inventory_url: Url,
    pub inventory_token: String,
    pub router_username: String,
    pub router_password: String,
}

impl Credentials {
    /// 프로세스 환경변수에서 자격 증명을 읽습니다.
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로 자격 증명을 구성합니다.
    ///
    /// URL과 사용자명은 앞뒤 공백을 제거합니다. 토큰과 비밀번호는 그대로 둡니다.
    /// 공백뿐인 값은 누락으로 취급합니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = Vec::with_capacity(REQUIRED_VARS.len());
        let mut missing = Vec::new();

        for var in REQUIRED_VARS {
            match lookup(var) {
                Some(v) if v.trim().is_empty() => {
                    missing.push(var.to_owned());
                    values.push(String::new());
                }
                Some(v) if SECRET_VARS.contains(&var) => values.push(v),
                Some(v) => values.push(v.trim().to_owned()),
                None => {
                    missing.push(var.to_owned());
                    values.push(String::new());
                }
            }
        }

        if !missing.is_empty() {
            return Err(CredentialError::Missing { vars: missing });
        }

        let [url, token, username, password]: [String; 4] =
            values
                .try_into()
                .map_err(|_| CredentialError::Missing {
                    vars: REQUIRED_VARS.iter().map(|v| (*v).to_owned()).collect(),
                })?;

        let inventory_url = parse_base_url(&url)?;

        Ok(Self {
            inventory_url,
            inventory_token: token,
            router_username: username,
            router_password: password,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, CredentialError> {
    let url = Url::parse(raw).map_err(|e| CredentialError::InvalidUrl {
        var: ENV_INVENTORY_URL.to_owned(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(CredentialError::InvalidUrl {
                var: ENV_INVENTORY_URL.to_owned(),
                reason: format!("unsupported scheme '{other}', expected http or https"),
            });
        }
    }

    if url.host_str().is_none() {
        return Err(CredentialError::InvalidUrl {
            var: ENV_INVENTORY_URL.to_owned(),
            reason: "missing host".to_owned(),
        });
    }

    Ok(url)
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("inventory_url", &self.inventory_url.as_str())
            .field("inventory_token", &"***")
            .field("router_username", &self.router_username)
            .field("router_password", &"***")
            .finish()
    }
}
