//! 通用端点：把参数 POST 到描述符声明的 endpoint，鉴权方式来自 authType / authConfig

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{DockError, DockResult};
use crate::descriptor::{config_str, AuthType, ToolDescriptor};
use crate::providers::http::{Auth, HttpProvider};

#[async_trait]
pub trait EndpointApi: Send + Sync {
    async fn invoke(&self, payload: &Value) -> DockResult<Value>;
}

pub struct HttpEndpoint {
    http: HttpProvider,
}

impl HttpEndpoint {
    pub fn from_descriptor(descriptor: &ToolDescriptor, timeout_secs: u64) -> DockResult<Self> {
        let auth = endpoint_auth(descriptor)?;
        Ok(Self {
            http: HttpProvider::new("Tool endpoint", descriptor.endpoint.clone(), auth, timeout_secs)?,
        })
    }
}

#[async_trait]
impl EndpointApi for HttpEndpoint {
    async fn invoke(&self, payload: &Value) -> DockResult<Value> {
        self.http.post("", payload).await
    }
}

/// authType + authConfig -> 请求鉴权
///
/// - apiKey: authConfig.apiKey，请求头名取 authConfig.headerName（默认 X-API-Key）
/// - basic: authConfig.username / password
/// - bearer / oauth: authConfig.token 或 accessToken
pub fn endpoint_auth(descriptor: &ToolDescriptor) -> DockResult<Auth> {
    let cfg = &descriptor.auth_config;
    let missing = |key: &str| DockError::RegistrationFailed {
        kind: crate::core::EntityKind::Tool,
        id: descriptor.id.clone(),
        reason: format!("authConfig.{key} is required for authType {:?}", descriptor.auth_type),
    };
    Ok(match descriptor.auth_type {
        AuthType::None => Auth::None,
        AuthType::ApiKey => Auth::Header {
            name: config_str(cfg, "headerName").unwrap_or("X-API-Key").to_string(),
            value: config_str(cfg, "apiKey").ok_or_else(|| missing("apiKey"))?.to_string(),
        },
        AuthType::Basic => Auth::Basic {
            username: config_str(cfg, "username").ok_or_else(|| missing("username"))?.to_string(),
            password: config_str(cfg, "password").unwrap_or_default().to_string(),
        },
        AuthType::Bearer | AuthType::Oauth => Auth::Bearer(
            config_str(cfg, "token")
                .or_else(|| config_str(cfg, "accessToken"))
                .ok_or_else(|| missing("token"))?
                .to_string(),
        ),
    })
}
