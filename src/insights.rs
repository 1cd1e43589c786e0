//! Admin-only inventory and insight reads.
//!
//! The inventory service is optional. With no base URL configured every call
//! returns [`InsightsResponse::NotConfigured`] instead of an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum InsightsResponse {
    Available(Value),
    NotConfigured,
}

impl InsightsResponse {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        matches!(self, InsightsResponse::Available(_))
    }
}

pub struct InsightsClient {
    agent: ureq::Agent,
    base_url: Option<String>,
}

impl InsightsClient {
    #[must_use]
    pub fn new(base_url: Option<&str>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(10))
                .build(),
            base_url: base_url
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Current inventory levels.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the service is configured but the call fails.
    pub fn inventory(&self) -> Result<InsightsResponse, StoreError> {
        self.fetch("GET", "inventory")
    }

    /// Stored insight records.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the service is configured but the call fails.
    pub fn insights(&self) -> Result<InsightsResponse, StoreError> {
        self.fetch("GET", "insights")
    }

    /// Ask the service to generate a fresh insight.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the service is configured but the call fails.
    pub fn generate(&self) -> Result<InsightsResponse, StoreError> {
        self.fetch("POST", "insights/generate")
    }

    fn fetch(&self, method: &str, path: &str) -> Result<InsightsResponse, StoreError> {
        let Some(base) = &self.base_url else {
            log::debug!("insights service not configured; skipping {path}");
            return Ok(InsightsResponse::NotConfigured);
        };
        let value: Value = self
            .agent
            .request(method, &format!("{base}/{path}"))
            .call()?
            .into_json()?;
        Ok(InsightsResponse::Available(value))
    }
}
