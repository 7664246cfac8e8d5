//! In-memory doubles for the cache backing store and the HTTP client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::cache::CacheStorage;
use crate::error::AppError;
use crate::http::{HttpClient, HttpResponse};

#[derive(Clone, Default)]
pub struct MemoryStorage {
    bytes: Arc<Mutex<Option<Vec<u8>>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn with_bytes(bytes: &[u8]) -> Self {
        let storage = Self::default();
        *storage.bytes.lock().unwrap() = Some(bytes.to_vec());
        storage
    }

    pub fn with_json(value: &Value) -> Self {
        Self::with_bytes(&serde_json::to_vec(value).unwrap())
    }

    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes.lock().unwrap().clone()
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes().unwrap_or_default()).unwrap()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CacheStorage for MemoryStorage {
    fn read(&self) -> Option<Vec<u8>> {
        self.bytes()
    }

    fn write(&self, bytes: &[u8]) -> Result<(), AppError> {
        *self.bytes.lock().unwrap() = Some(bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

enum Reply {
    Response(HttpResponse),
    Fail(String),
}

/// Routes a GET to the first registered reply whose pattern the URL contains.
/// Unrouted URLs answer 404.
#[derive(Default)]
pub struct MockHttp {
    routes: Vec<(String, Reply)>,
    calls: Mutex<Vec<String>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: &str, status: u16, body: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.routes.push((
            pattern.to_string(),
            Reply::Response(HttpResponse {
                status,
                body: body.into(),
            }),
        ));
        self
    }

    pub fn route_json(self, pattern: &str, status: u16, body: &Value) -> Self {
        self.route(pattern, status, body.to_string())
    }

    pub fn route_error(mut self, pattern: &str, message: &str) -> Self {
        self.routes
            .push((pattern.to_string(), Reply::Fail(message.to_string())));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|url| url.contains(pattern))
            .count()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let reply = self
            .routes
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, reply)| reply);
        match reply {
            Some(Reply::Response(response)) => Ok(response.clone()),
            Some(Reply::Fail(message)) => Err(AppError::Network(message.clone())),
            None => Ok(HttpResponse {
                status: StatusCode::NOT_FOUND,
                body: String::new(),
            }),
        }
    }
}
