//! Typed REST client for the finance API.
//!
//! Every request picks up the stored bearer token. A 401 clears the session
//! and sends the user to the login route, except under the dev bypass. No
//! retry or deduplication: errors go straight back to the caller.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ApiError, Result, parse_error_detail};
use crate::token::TokenStore;
use crate::transport::{ApiRequest, ApiResponse, Method, ReqwestTransport, Transport};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const API_PREFIX: &str = "/api/v1";
pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Requests under this path (relative to `/api/v1`) keep the session on a
    /// 401. Development only.
    pub dev_bypass_prefix: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            dev_bypass_prefix: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Where the client sends the user when the session ends.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

pub struct NoNavigation;

impl Navigator for NoNavigation {
    fn navigate(&self, _route: &str) {}
}

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    dev_bypass_prefix: Option<String>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            tokens,
            navigator: Arc::new(NoNavigation),
            dev_bypass_prefix: None,
        }
    }

    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.base_url, config.timeout)?;
        Ok(Self::new(Arc::new(transport), tokens).with_dev_bypass(config.dev_bypass_prefix.clone()))
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_dev_bypass(mut self, prefix: Option<String>) -> Self {
        self.dev_bypass_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Send a request to `path` (relative to `/api/v1`, leading slash).
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let relative = request.path.clone();
        request.path = format!("{API_PREFIX}{relative}");
        request.bearer = self.tokens.access_token();

        tracing::debug!(method = request.method.as_str(), path = %relative, "api request");
        let resp = self.transport.send(request).await?;

        if resp.status == 401 {
            return Err(self.handle_unauthorized(&relative, parse_error_detail(&resp.body)));
        }
        if !resp.is_success() {
            let detail = parse_error_detail(&resp.body);
            tracing::debug!(status = resp.status, path = %relative, ?detail, "api error");
            return Err(ApiError::Http {
                status: resp.status,
                detail,
            });
        }
        Ok(resp)
    }

    fn handle_unauthorized(&self, path: &str, detail: Option<String>) -> ApiError {
        let bypass = self
            .dev_bypass_prefix
            .as_deref()
            .is_some_and(|prefix| path.starts_with(prefix));
        if bypass {
            tracing::warn!(path, "401 under dev bypass; session kept");
            return ApiError::Unauthorized {
                session_cleared: false,
                detail,
            };
        }

        tracing::warn!(path, "401 from API; clearing session");
        self.tokens.clear();
        self.navigator.navigate(LOGIN_ROUTE);
        ApiError::Unauthorized {
            session_cleared: true,
            detail,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T> {
        let resp = self
            .send(ApiRequest::new(Method::Get, path).with_query(query))
            .await?;
        decode(path, &resp)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .send(ApiRequest::new(Method::Post, path).with_json(to_value(body)?))
            .await?;
        decode(path, &resp)
    }

    /// POST without a body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send(ApiRequest::new(Method::Post, path)).await?;
        decode(path, &resp)
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .send(ApiRequest::new(Method::Put, path).with_json(to_value(body)?))
            .await?;
        decode(path, &resp)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(ApiRequest::new(Method::Delete, path)).await?;
        Ok(())
    }

    pub async fn delete_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .send(ApiRequest::new(Method::Delete, path).with_json(to_value(body)?))
            .await?;
        decode(path, &resp)
    }
}

fn to_value<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(format!("serialize body: {e}")))
}

/// Decode a JSON body. An empty body decodes as `null`, so `()` and
/// `Option<_>` targets work for 204 responses.
pub(crate) fn decode<T: DeserializeOwned>(path: &str, resp: &ApiResponse) -> Result<T> {
    let body: &[u8] = if resp.body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &resp.body
    };
    serde_json::from_slice(body).map_err(|e| ApiError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_body_as_unit() {
        let resp = ApiResponse { status: 204, body: vec![] };
        let _: () = decode("/cards/1", &resp).unwrap();
        let v: Option<u32> = decode("/cards/1", &resp).unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn test_decode_error_names_path() {
        let resp = ApiResponse { status: 200, body: b"[1,2".to_vec() };
        let err = decode::<Vec<u32>>("/cards", &resp).unwrap_err();
        assert!(err.to_string().contains("/cards"));
    }
}
