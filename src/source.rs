// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Client for the HR source-of-record.
//!
//! Reads go to `GET {base}/{path}` (with `?batch=N` on batched endpoints),
//! reverse-sync writes to `PUT {base}/{path}/bulk-update`. Both carry the
//! source API token as a bearer header.

use crate::config::IntegrationConfig;
use crate::error::Result;
use crate::model::{DocumentKind, EntityType};
use crate::transform::extract_records;
use crate::transport::{HttpTransport, OutboundRequest};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Records returned by one source read.
#[derive(Debug, Clone)]
pub struct FetchedBatch {
    pub records: Vec<Value>,
}

/// HR source client bound to one config snapshot.
#[derive(Debug, Clone)]
pub struct SourceClient {
    base_url: String,
    api_token: String,
    timeout: Duration,
}

impl SourceClient {
    pub fn from_config(config: &IntegrationConfig) -> Self {
        Self {
            base_url: config.source.base_url.trim_end_matches('/').to_string(),
            api_token: config.source.api_token.clone(),
            timeout: config.request_timeout(),
        }
    }

    fn request(&self, method: Method, path: &str) -> OutboundRequest {
        OutboundRequest::new(method, format!("{}/{}", self.base_url, path), self.timeout)
            .header("authorization", &format!("Bearer {}", self.api_token))
            .header("accept", "application/json")
    }

    /// Build the read request for `document`.
    pub fn fetch_request(&self, document: DocumentKind, batch_size: usize) -> OutboundRequest {
        let request = self.request(Method::GET, document.source_path());
        if document.is_batched() {
            request.query("batch", batch_size.to_string())
        } else {
            request
        }
    }

    /// Read `document` records.
    ///
    /// Batched endpoints are cut to `batch_size` in case the source ignores
    /// the query parameter.
    pub async fn fetch<T>(
        &self,
        transport: &T,
        document: DocumentKind,
        batch_size: usize,
    ) -> Result<FetchedBatch>
    where
        T: HttpTransport + ?Sized,
    {
        let request = self.fetch_request(document, batch_size);
        let url = request.url.clone();
        let response = transport.send(request).await?.error_for_status(&url)?;
        let body = response.json()?;

        let mut records = extract_records(&body);
        if document.is_batched() && records.len() > batch_size {
            debug!(document = %document, returned = records.len(), batch_size, "Source returned more than the batch size, truncating");
            records.truncate(batch_size);
        }
        Ok(FetchedBatch { records })
    }

    /// Build the bulk-update request for `entity`.
    pub fn bulk_update_request(
        &self,
        entity: EntityType,
        document: DocumentKind,
        records: Vec<Value>,
    ) -> OutboundRequest {
        let path = format!("{}/bulk-update", entity.bulk_update_path());
        self.request(Method::PUT, &path)
            .header("content-type", "application/json")
            .json(json!({ document.envelope_key(): records }))
    }

    /// Send transformed destination records back to the source.
    pub async fn bulk_update<T>(
        &self,
        transport: &T,
        entity: EntityType,
        document: DocumentKind,
        records: Vec<Value>,
    ) -> Result<()>
    where
        T: HttpTransport + ?Sized,
    {
        let request = self.bulk_update_request(entity, document, records);
        let url = request.url.clone();
        transport.send(request).await?.error_for_status(&url)?;
        Ok(())
    }
}
