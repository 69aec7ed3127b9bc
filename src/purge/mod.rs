//! Cache purge transport
//!
//! Issues one `PURGE` request per resolved tag, all dispatched concurrently.
//! A failing tag never blocks its siblings; every response is collected as a
//! [`PurgeOutcome`] so the caller can log the full audit trail and derive the
//! process exit status.

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use futures::future::join_all;
use reqwest::{Client, Method, StatusCode};
use std::collections::BTreeSet;
use tracing::debug;

/// Result of one purge request.
#[derive(Debug, Clone)]
pub struct PurgeOutcome {
    pub tag: String,
    /// Response status, absent on transport failure
    pub status: Option<StatusCode>,
    /// Response body, collected for operator visibility regardless of outcome
    pub body: String,
    /// Transport error description, when no response was received
    pub error: Option<String>,
}

impl PurgeOutcome {
    /// A purge counts as successful only on an exact 200 response.
    pub fn succeeded(&self) -> bool {
        self.status == Some(StatusCode::OK)
    }
}

/// HTTP client issuing tag-based purge requests.
pub struct CachePurger {
    client: Client,
    method: Method,
    endpoint: String,
    tag_header: String,
    username: Option<String>,
    password: Option<String>,
}

impl CachePurger {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
        let method = Method::from_bytes(b"PURGE")
            .map_err(|e| Error::Config(format!("Invalid purge method: {e}")))?;

        Ok(Self {
            client,
            method,
            endpoint: config.endpoint.clone(),
            tag_header: config.tag_header.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Purge every tag in the set concurrently and wait for all outcomes.
    ///
    /// An empty set issues no requests at all.
    pub async fn purge_all(&self, tags: &BTreeSet<String>) -> Vec<PurgeOutcome> {
        if tags.is_empty() {
            return Vec::new();
        }

        debug!("Dispatching {} purge requests", tags.len());
        let requests = tags.iter().map(|tag| self.purge_one(tag.clone()));
        join_all(requests).await
    }

    async fn purge_one(&self, tag: String) -> PurgeOutcome {
        let mut request = self
            .client
            .request(self.method.clone(), &self.endpoint)
            .header(self.tag_header.as_str(), tag.as_str());
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            request = request.basic_auth(username, Some(password));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("<body unavailable: {e}>"));
                PurgeOutcome {
                    tag,
                    status: Some(status),
                    body,
                    error: None,
                }
            }
            Err(e) => PurgeOutcome {
                tag,
                status: None,
                body: String::new(),
                error: Some(e.to_string()),
            },
        }
    }
}
