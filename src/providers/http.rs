//! Provider HTTP 基础客户端
//!
//! reqwest Client + base_url + 鉴权方式；所有 Provider 的 REST 实现共用。
//! 非 2xx 响应与网络/解码错误统一转为 ExternalService，context 为「服务名 路径」。

use std::fmt;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{preview, DockError, DockResult};

/// 鉴权方式
#[derive(Clone)]
pub enum Auth {
    None,
    Basic { username: String, password: String },
    Bearer(String),
    /// 自定义请求头（如 X-Shopify-Access-Token、X-API-Key）
    Header { name: String, value: String },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
            Auth::Bearer(_) => f.write_str("Bearer(***)"),
            Auth::Header { name, .. } => write!(f, "Header({name}: ***)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    base_url: String,
    auth: Auth,
    service: &'static str,
}

impl HttpProvider {
    pub fn new(service: &'static str, base_url: impl Into<String>, auth: Auth, timeout_secs: u64) -> DockResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("agentdock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DockError::ConfigError(format!("failed to build {service} client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            service,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };
        let req = self.client.request(method, url);
        match &self.auth {
            Auth::None => req,
            Auth::Basic { username, password } => req.basic_auth(username, Some(password)),
            Auth::Bearer(token) => req.bearer_auth(token),
            Auth::Header { name, value } => req.header(name.as_str(), value.as_str()),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> DockResult<T> {
        self.send(self.request(Method::GET, path).query(query), path).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> DockResult<T> {
        self.send(self.request(Method::POST, path).json(body), path).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: &Value) -> DockResult<T> {
        self.send(self.request(Method::PUT, path).json(body), path).await
    }

    /// 无响应体的写操作（如 Jira 的 204 No Content）
    pub async fn send_no_content(&self, method: Method, path: &str, body: &Value) -> DockResult<()> {
        let resp = self
            .request(method, path)
            .json(body)
            .send()
            .await
            .map_err(|e| self.error(path, e))?;
        self.check_status(resp, path).await.map(|_| ())
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, path: &str) -> DockResult<T> {
        let resp = req.send().await.map_err(|e| self.error(path, e))?;
        let resp = self.check_status(resp, path).await?;
        resp.json::<T>().await.map_err(|e| self.error(path, e))
    }

    async fn check_status(&self, resp: reqwest::Response, path: &str) -> DockResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        Err(self.error(path, format!("HTTP {status}: {}", preview(&text, 300))))
    }

    fn error(&self, path: &str, e: impl fmt::Display) -> DockError {
        let path = if path.is_empty() { "/" } else { path };
        DockError::external(format!("{} {}", self.service, path), e)
    }
}
