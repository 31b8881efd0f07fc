#![allow(dead_code)]

use async_trait::async_trait;
use finboard_api::{
    ApiClient, ApiRequest, ApiResponse, MemoryTokenStore, Method, Navigator, Result, StoredToken,
    Transport,
};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays canned responses per `(method, path)`. The last response for a
/// route repeats once its queue is down to one.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<ApiResponse>>>,
    log: Mutex<Vec<ApiRequest>>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        let resp = ApiResponse {
            status,
            body: serde_json::to_vec(&body).unwrap(),
        };
        self.routes
            .lock()
            .unwrap()
            .entry((method, format!("/api/v1{path}")))
            .or_default()
            .push_back(resp);
    }

    /// Delay every response by `latency` (tokio time).
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        let full = format!("/api/v1{path}");
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == full)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let key = (request.method, request.path.clone());
        self.log.lock().unwrap().push(request);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&key);
        let resp = match queue {
            Some(q) if q.len() > 1 => q.pop_front(),
            Some(q) => q.front().cloned(),
            None => None,
        };
        Ok(resp.unwrap_or(ApiResponse {
            status: 404,
            body: br#"{"detail":"Not Found"}"#.to_vec(),
        }))
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub routes: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}

pub fn logged_in_store() -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_token(StoredToken::issue(
        "tok-123".into(),
        None,
        chrono::Utc::now(),
    )))
}

pub fn client(transport: Arc<ScriptedTransport>) -> ApiClient {
    ApiClient::new(transport, logged_in_store())
}

pub fn statement(extraction: &str, categorization: &str, status: &str) -> Value {
    json!({
        "id": "st-1",
        "filename": "estado-mayo.pdf",
        "status": status,
        "extraction_status": extraction,
        "categorization_status": categorization,
    })
}
