// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! HTTP client for the state backend

use super::{
    endpoints, parse_scores, parse_states, CompareRequest, CompareResponse, DifferencesRequest,
    SaveMetadataRequest, ScoresRequest, StateApi, StateRequest,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{FullDiff, Metadata};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Longest response body kept in a status error
const MAX_ERROR_BODY: usize = 512;

/// [`StateApi`] over JSON-speaking HTTP
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    /// Build a client for `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| Error::Http {
                endpoint: "client",
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build a client from application configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_url, Duration::from_secs(config.timeout_secs))
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn get(&self, endpoint: &'static str) -> Result<Value> {
        debug!("GET {}", endpoint);
        let response = self
            .client
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(|source| Error::Http { endpoint, source })?;
        Self::finish(endpoint, response).await
    }

    async fn post<B: Serialize + ?Sized>(&self, endpoint: &'static str, body: &B) -> Result<Value> {
        debug!("POST {}", endpoint);
        let response = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(|source| Error::Http { endpoint, source })?;
        Self::finish(endpoint, response).await
    }

    /// Check the status and parse the body; empty or non-JSON bodies become `null`
    async fn finish(endpoint: &'static str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| Error::Http { endpoint, source })?;

        if !status.is_success() {
            let mut body = text;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(Error::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[async_trait]
impl StateApi for HttpApi {
    async fn compare_states(
        &self,
        source_state: &str,
        target_state: &str,
        container_ids: &[String],
    ) -> Result<FullDiff> {
        let endpoint = endpoints::COMPARE_STATES;
        let payload = self
            .post(
                endpoint,
                &CompareRequest {
                    source_state,
                    target_state,
                    container_ids,
                },
            )
            .await?;
        let response: CompareResponse =
            serde_json::from_value(payload).map_err(|e| Error::Decode {
                endpoint,
                reason: e.to_string(),
            })?;
        Ok(response.differences_all.unwrap_or_default())
    }

    async fn load_transition_metadata(&self) -> Result<Value> {
        self.get(endpoints::TRANSITION_METADATA).await
    }

    async fn save_transition_metadata(&self, metadata: &Metadata) -> Result<()> {
        self.post(endpoints::TRANSITION_METADATA, &SaveMetadataRequest { metadata })
            .await?;
        Ok(())
    }

    async fn apply_differences(
        &self,
        container_ids: &[String],
        differences: &FullDiff,
        target_state: &str,
    ) -> Result<()> {
        self.post(
            endpoints::APPLY_DIFFERENCES,
            &DifferencesRequest {
                container_ids,
                differences,
                target_state,
            },
        )
        .await?;
        Ok(())
    }

    async fn revert_differences(
        &self,
        container_ids: &[String],
        differences: &FullDiff,
        target_state: &str,
    ) -> Result<()> {
        self.post(
            endpoints::REVERT_DIFFERENCES,
            &DifferencesRequest {
                container_ids,
                differences,
                target_state,
            },
        )
        .await?;
        Ok(())
    }

    async fn calculate_state_scores(&self, base_state: &str) -> Result<BTreeMap<String, f64>> {
        let payload = self
            .post(endpoints::CALCULATE_STATE_SCORES, &ScoresRequest { base_state })
            .await?;
        Ok(parse_scores(&payload))
    }

    async fn list_states(&self) -> Result<Vec<String>> {
        let payload = self.get(endpoints::STATES).await?;
        Ok(parse_states(&payload))
    }

    async fn save_state(&self, name: &str) -> Result<()> {
        self.post(endpoints::SAVE_STATE, &StateRequest { state_name: name })
            .await?;
        Ok(())
    }

    async fn load_state(&self, name: &str) -> Result<()> {
        self.post(endpoints::LOAD_STATE, &StateRequest { state_name: name })
            .await?;
        Ok(())
    }

    async fn delete_state(&self, name: &str) -> Result<()> {
        self.post(endpoints::DELETE_STATE, &StateRequest { state_name: name })
            .await?;
        Ok(())
    }
}
