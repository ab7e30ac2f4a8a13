//! Elasticsearch-compatible HTTP cluster.
//!
//! Documents live at `{url}/{index}/{doc_type}/{id}` where the composite id
//! is sent as a single percent-encoded path segment (`5%2FABCD1234`).
//! Gated writes use `version_type=external_gt`, so the cluster itself
//! rejects anything not strictly newer with HTTP 409.
//!
//! No retries happen here; a failed request surfaces to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use sync_types::{DocumentId, IndexTargetSettings};

use crate::cluster::{DeleteOutcome, IndexCluster, UpsertRequest, WriteOutcome};
use crate::error::IndexError;

/// Longest error body kept in an [`IndexError::Remote`].
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for one index cluster.
pub struct ElasticIndex {
    client: Client,
    name: String,
    base_url: Url,
    index: String,
    doc_type: String,
    username: Option<String>,
    password: Option<SecretString>,
}

impl ElasticIndex {
    /// Create a client for the given target.
    pub fn new(
        name: impl Into<String>,
        target: &IndexTargetSettings,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        let name = name.into();
        let base_url = Url::parse(&target.url)
            .map_err(|e| IndexError::Config(format!("{name}: invalid url '{}': {e}", target.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(IndexError::Config(format!(
                "{name}: url '{}' cannot be a base",
                target.url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Config(e.to_string()))?;

        Ok(Self {
            client,
            name,
            base_url,
            index: target.index.clone(),
            doc_type: target.doc_type.clone(),
            username: target.username.clone(),
            password: target.password.clone(),
        })
    }

    /// URL of a single document.
    fn document_url(&self, id: &DocumentId) -> Result<Url, IndexError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| IndexError::Config(format!("{}: url cannot be a base", self.name)))?;
            segments
                .pop_if_empty()
                .push(&self.index)
                .push(&self.doc_type)
                .push(&id.to_string());
        }
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => builder.basic_auth(
                username,
                self.password.as_ref().map(|p| p.expose_secret().to_string()),
            ),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, IndexError> {
        self.authorize(builder)
            .send()
            .await
            .map_err(|source| IndexError::Transport {
                cluster: self.name.clone(),
                source,
            })
    }

    async fn remote_error(&self, response: Response) -> IndexError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        IndexError::Remote {
            cluster: self.name.clone(),
            status,
            body: truncated(&body),
        }
    }
}

fn truncated(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[async_trait]
impl IndexCluster for ElasticIndex {
    async fn upsert(&self, request: UpsertRequest<'_>) -> Result<WriteOutcome, IndexError> {
        let url = self.document_url(request.id)?;

        let mut query = vec![("routing", request.id.routing())];
        if let Some(version) = request.version {
            query.push(("version", version.to_string()));
            query.push(("version_type", "external_gt".to_string()));
        }

        let response = self
            .send(self.client.put(url).query(&query).json(request.body))
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(WriteOutcome::Applied);
        }
        if status == StatusCode::CONFLICT && request.version.is_some() {
            debug!(
                cluster = %self.name,
                id = %request.id,
                version = request.version,
                "Version gate rejected write"
            );
            return Ok(WriteOutcome::VersionConflict);
        }

        Err(self.remote_error(response).await)
    }

    async fn delete(&self, id: &DocumentId) -> Result<DeleteOutcome, IndexError> {
        let url = self.document_url(id)?;

        let response = self
            .send(self.client.delete(url).query(&[("routing", id.routing())]))
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(DeleteOutcome::Deleted);
        }

        if status == StatusCode::NOT_FOUND {
            // A missing index is also a 404; only a missing document counts
            let body = response.text().await.unwrap_or_default();
            let missing_document = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("result").and_then(Value::as_str).map(|r| r == "not_found"))
                .unwrap_or(false);

            if missing_document {
                return Ok(DeleteOutcome::NotFound);
            }
            return Err(IndexError::Remote {
                cluster: self.name.clone(),
                status: status.as_u16(),
                body: truncated(&body),
            });
        }

        Err(self.remote_error(response).await)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
