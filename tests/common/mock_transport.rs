//! Scripted HttpTransport and recording collaborators.
//!
//! `MockTransport` answers requests from per-route reply scripts and
//! records every request it sees. A script is consumed front to back; its
//! last reply repeats forever. Unscripted routes answer 404.

#![allow(dead_code)]

use integration_engine::classifier::{OperatorNotice, OperatorNotifier, TokenRefresher};
use integration_engine::dead_letter::{DeadLetterEntry, DeadLetterSink};
use integration_engine::destination::DestinationKind;
use integration_engine::error::IntegrationError;
use integration_engine::transport::{BoxFuture, HttpTransport, OutboundRequest, TransportResponse};
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Timeout,
    Connection,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Status(200, body.to_string())
    }

    pub fn created() -> Self {
        Reply::Status(201, r#"{"data":{}}"#.to_string())
    }

    pub fn status(code: u16) -> Self {
        Reply::Status(code, format!(r#"{{"error":"status {code}"}}"#))
    }
}

/// Transport answering from scripts.
pub struct MockTransport {
    routes: RwLock<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: RwLock<Vec<OutboundRequest>>,
    delay: Duration,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            requests: RwLock::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Every reply is held back by `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    /// Append replies to the script for `method url`.
    pub async fn on(&self, method: Method, url: &str, replies: impl IntoIterator<Item = Reply>) {
        self.routes
            .write()
            .await
            .entry((method, url.to_string()))
            .or_default()
            .extend(replies);
    }

    pub async fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.read().await.clone()
    }

    pub async fn requests_to(&self, method: Method, url: &str) -> Vec<OutboundRequest> {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .cloned()
            .collect()
    }

    async fn next_reply(&self, method: &Method, url: &str) -> Option<Reply> {
        let mut routes = self.routes.write().await;
        let script = routes.get_mut(&(method.clone(), url.to_string()))?;
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResponse> {
        Box::pin(async move {
            self.requests.write().await.push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.next_reply(&request.method, &request.url).await {
                Some(Reply::Status(status, body)) => Ok(TransportResponse::new(status, body)),
                Some(Reply::Timeout) => Err(IntegrationError::Timeout { url: request.url }),
                Some(Reply::Connection) => Err(IntegrationError::Connection {
                    url: request.url,
                    message: "connection refused".to_string(),
                }),
                None => Ok(TransportResponse::new(404, "no route")),
            }
        })
    }
}

/// Notifier that keeps every notice.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: RwLock<Vec<OperatorNotice>>,
}

impl RecordingNotifier {
    pub async fn notices(&self) -> Vec<OperatorNotice> {
        self.notices.read().await.clone()
    }
}

impl OperatorNotifier for RecordingNotifier {
    fn notify(&self, notice: OperatorNotice) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.notices.write().await.push(notice);
            Ok(())
        })
    }
}

/// Refresher that counts refresh requests.
#[derive(Default)]
pub struct RecordingRefresher {
    calls: RwLock<Vec<Option<DestinationKind>>>,
}

impl RecordingRefresher {
    pub async fn calls(&self) -> Vec<Option<DestinationKind>> {
        self.calls.read().await.clone()
    }
}

impl TokenRefresher for RecordingRefresher {
    fn refresh(&self, destination: Option<DestinationKind>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.calls.write().await.push(destination);
            Ok(())
        })
    }
}

/// Dead-letter sink held in memory.
#[derive(Default)]
pub struct MemoryDeadLetterSink {
    entries: RwLock<Vec<DeadLetterEntry>>,
}

impl MemoryDeadLetterSink {
    pub async fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.read().await.clone()
    }
}

impl DeadLetterSink for MemoryDeadLetterSink {
    fn append(&self, entry: DeadLetterEntry) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.entries.write().await.push(entry);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, Vec<DeadLetterEntry>> {
        Box::pin(async move { Ok(self.entries.read().await.clone()) })
    }
}
