// Scripted in-process transport for tests and benchmarks

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{json, Value};
use url::Url;

use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Normal,
    // Every request fails before reaching the server
    CompleteOutage,
    // Connection drops after the request was sent
    BrokenConnection,
}

#[derive(Debug, Clone)]
struct MockRoute {
    status: StatusCode,
    body: Bytes,
}

pub struct MockServer {
    mode: AtomicU8,
    delay_ms: AtomicU64,
    request_count: AtomicUsize,
    routes: Mutex<HashMap<String, MockRoute>>,
    recorded: Mutex<Vec<HttpRequest>>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(0),
            delay_ms: AtomicU64::new(0),
            request_count: AtomicUsize::new(0),
            routes: Mutex::new(HashMap::new()),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: ServerMode) {
        let mode_value = match mode {
            ServerMode::Normal => 0,
            ServerMode::CompleteOutage => 1,
            ServerMode::BrokenConnection => 2,
        };
        self.mode.store(mode_value, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    /// Registers a JSON reply. `path` is matched as a suffix of the request
    /// path (with its query string, if any); the longest match wins.
    pub fn add_json_response(&self, path: &str, status: u16, body: Value) {
        self.add_raw_response(path, status, &body.to_string());
    }

    pub fn add_raw_response(&self, path: &str, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.routes.lock().insert(
            path.to_string(),
            MockRoute {
                status,
                body: Bytes::from(body.to_string()),
            },
        );
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.recorded.lock().clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.recorded.lock().last().cloned()
    }

    fn lookup(&self, url: &str) -> Option<MockRoute> {
        let (path, path_and_query) = match Url::parse(url) {
            Ok(parsed) => {
                let path = parsed.path().to_string();
                let with_query = match parsed.query() {
                    Some(query) => format!("{path}?{query}"),
                    None => path.clone(),
                };
                (path, with_query)
            }
            Err(_) => (url.to_string(), url.to_string()),
        };

        let routes = self.routes.lock();
        routes
            .iter()
            .filter(|(key, _)| path_and_query.ends_with(key.as_str()) || path.ends_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, route)| route.clone())
    }
}

#[async_trait]
impl Transport for MockServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().push(request.clone());

        match self.mode.load(Ordering::SeqCst) {
            1 => {
                return Err(TransportError::Connect(
                    "error trying to connect: connection refused".to_string(),
                ))
            }
            2 => return Err(TransportError::Io("connection reset by peer".to_string())),
            _ => {}
        }

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        match self.lookup(&request.url) {
            Some(route) => Ok(HttpResponse {
                status: route.status,
                body: route.body,
            }),
            None => Ok(HttpResponse {
                status: StatusCode::NOT_FOUND,
                body: Bytes::from(json!({"error": "Not found"}).to_string()),
            }),
        }
    }
}
