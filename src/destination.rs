// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Destinations, auth headers and routing.
//!
//! A [`Destination`] is built from a config snapshot and knows how to
//! address and authenticate against its ERP:
//!
//! ```text
//! Destination         Create                              Auth
//! ------------------  ----------------------------------  ---------------------------------
//! PrimaryErp          POST {base}/api/resource/{DocType}  Authorization: token key:secret
//! GenericErp          POST {base}/api/{path}              bearer | basic | api-key
//! ```
//!
//! [`select_destinations`] returns the enabled destinations that accept a
//! document, primary first. The result depends only on the snapshot passed
//! in, so a config update never reroutes an invocation already running.

use crate::config::IntegrationConfig;
use crate::model::DocumentKind;
use crate::transport::OutboundRequest;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Which back-end a destination is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestinationKind {
    PrimaryErp,
    GenericErp,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationKind::PrimaryErp => f.write_str("primary-erp"),
            DestinationKind::GenericErp => f.write_str("generic-erp"),
        }
    }
}

/// Auth scheme of the generic ERP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthType {
    Bearer,
    Basic,
    ApiKey,
    /// Unrecognized value, kept for the warning.
    Unsupported(String),
}

impl AuthType {
    /// Case-insensitive parse of `generic.authType`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bearer" => AuthType::Bearer,
            "basic" => AuthType::Basic,
            "api-key" => AuthType::ApiKey,
            other => AuthType::Unsupported(other.to_string()),
        }
    }
}

/// Primary ERP (`/api/resource/<DocType>`).
#[derive(Debug, Clone)]
pub struct PrimaryErp {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout: Duration,
}

impl PrimaryErp {
    pub fn from_config(config: &IntegrationConfig) -> Self {
        Self {
            base_url: config.frappe.base_url.trim_end_matches('/').to_string(),
            api_key: config.frappe.api_key.clone(),
            api_secret: config.frappe.api_secret.clone(),
            timeout: config.request_timeout(),
        }
    }

    pub fn resource_url(&self, document: DocumentKind) -> String {
        format!(
            "{}/api/resource/{}",
            self.base_url,
            document.doctype().replace(' ', "%20")
        )
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let token = format!("token {}:{}", self.api_key, self.api_secret);
        insert(&mut headers, AUTHORIZATION, &token);
        headers
    }
}

/// Generic ERP (`/api/<path>`) with a configurable auth scheme.
#[derive(Debug, Clone)]
pub struct GenericErp {
    pub base_url: String,
    pub auth_type: AuthType,
    pub token: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl GenericErp {
    pub fn from_config(config: &IntegrationConfig) -> Self {
        let generic = &config.generic;
        Self {
            base_url: generic.base_url.trim_end_matches('/').to_string(),
            auth_type: AuthType::parse(&generic.auth_type),
            token: generic.token.clone(),
            username: generic.username.clone(),
            password: generic.password.clone(),
            timeout: config.request_timeout(),
        }
    }

    /// `None` when the generic ERP does not take this document.
    pub fn resource_url(&self, document: DocumentKind) -> Option<String> {
        document
            .generic_path()
            .map(|path| format!("{}/api/{}", self.base_url, path))
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match &self.auth_type {
            AuthType::Bearer => {
                insert(&mut headers, AUTHORIZATION, &format!("Bearer {}", self.token));
            }
            AuthType::Basic => {
                let credentials = STANDARD.encode(format!("{}:{}", self.username, self.password));
                insert(&mut headers, AUTHORIZATION, &format!("Basic {credentials}"));
            }
            AuthType::ApiKey => {
                insert(&mut headers, HeaderName::from_static("x-api-key"), &self.token);
            }
            AuthType::Unsupported(value) => {
                warn!(auth_type = %value, "Unsupported generic ERP auth type, sending without credentials");
            }
        }
        headers
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => warn!(header = %name, "Credential is not valid header text, header omitted"),
    }
}

/// A downstream ERP that receives transformed records.
#[derive(Debug, Clone)]
pub enum Destination {
    PrimaryErp(PrimaryErp),
    GenericErp(GenericErp),
}

impl Destination {
    pub fn kind(&self) -> DestinationKind {
        match self {
            Destination::PrimaryErp(_) => DestinationKind::PrimaryErp,
            Destination::GenericErp(_) => DestinationKind::GenericErp,
        }
    }

    pub fn supports(&self, document: DocumentKind) -> bool {
        match self {
            Destination::PrimaryErp(_) => true,
            Destination::GenericErp(_) => document.generic_path().is_some(),
        }
    }

    /// Auth headers for this destination.
    pub fn auth_headers(&self) -> HeaderMap {
        match self {
            Destination::PrimaryErp(p) => p.auth_headers(),
            Destination::GenericErp(g) => g.auth_headers(),
        }
    }

    /// Resource URL for `document`, `None` when unsupported.
    pub fn resource_url(&self, document: DocumentKind) -> Option<String> {
        match self {
            Destination::PrimaryErp(p) => Some(p.resource_url(document)),
            Destination::GenericErp(g) => g.resource_url(document),
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            Destination::PrimaryErp(p) => p.timeout,
            Destination::GenericErp(g) => g.timeout,
        }
    }

    fn base_request(&self, method: Method, url: String) -> OutboundRequest {
        let mut json_headers = HeaderMap::new();
        json_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        json_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        OutboundRequest::new(method, url, self.timeout())
            .headers(json_headers)
            .headers(self.auth_headers())
    }

    /// POST creating `body` as a `document`.
    pub fn create_request(&self, document: DocumentKind, body: Value) -> Option<OutboundRequest> {
        let url = self.resource_url(document)?;
        Some(self.base_request(Method::POST, url).json(body))
    }

    /// GET listing `document` records, used by reverse sync.
    pub fn list_request(&self, document: DocumentKind) -> Option<OutboundRequest> {
        let url = self.resource_url(document)?;
        let request = self.base_request(Method::GET, url);
        Some(match self {
            Destination::PrimaryErp(_) => request.query("fields", r#"["*"]"#),
            Destination::GenericErp(_) => request,
        })
    }
}

/// Enabled destinations accepting `document`, primary first.
pub fn select_destinations(config: &IntegrationConfig, document: DocumentKind) -> Vec<Destination> {
    let mut selected = Vec::with_capacity(2);
    if config.frappe.enabled {
        selected.push(Destination::PrimaryErp(PrimaryErp::from_config(config)));
    }
    if config.generic.enabled {
        selected.push(Destination::GenericErp(GenericErp::from_config(config)));
    }
    selected.retain(|d| d.supports(document));
    selected
}
