// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Remote state backend interface
//!
//! The backend owns containers, positions and states. This crate only ever
//! talks to it through [`StateApi`], so the HTTP client and the in-memory
//! backend are interchangeable.

mod http;
mod memory;

pub use http::HttpApi;
pub use memory::{ApiCall, Fixture, FixtureComparison, MemoryApi};

use crate::error::Result;
use crate::types::{FullDiff, Metadata};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Endpoint paths relative to the configured API URL
pub mod endpoints {
    /// Compare two states
    pub const COMPARE_STATES: &str = "compare-states";
    /// Load or save transition metadata
    pub const TRANSITION_METADATA: &str = "transition-metadata";
    /// Apply differences to the live graph
    pub const APPLY_DIFFERENCES: &str = "apply-differences";
    /// Revert differences from the live graph
    pub const REVERT_DIFFERENCES: &str = "revert-differences";
    /// Score every container against a base state
    pub const CALCULATE_STATE_SCORES: &str = "calculate-state-scores";
    /// List saved states
    pub const STATES: &str = "states";
    /// Save the live graph as a named state
    pub const SAVE_STATE: &str = "save-state";
    /// Make a named state the live graph
    pub const LOAD_STATE: &str = "load-state";
    /// Delete a named state
    pub const DELETE_STATE: &str = "delete-state";
}

/// Operations the diff engine needs from the state backend
#[async_trait]
pub trait StateApi: Send + Sync {
    /// Structural diff between two states for the given containers
    async fn compare_states(
        &self,
        source_state: &str,
        target_state: &str,
        container_ids: &[String],
    ) -> Result<FullDiff>;

    /// Raw metadata payload; shape is normalized by the metadata store
    async fn load_transition_metadata(&self) -> Result<Value>;

    /// Persist the complete metadata map
    async fn save_transition_metadata(&self, metadata: &Metadata) -> Result<()>;

    /// Push a diff forward into the live graph
    async fn apply_differences(
        &self,
        container_ids: &[String],
        differences: &FullDiff,
        target_state: &str,
    ) -> Result<()>;

    /// Roll a diff back out of the live graph
    async fn revert_differences(
        &self,
        container_ids: &[String],
        differences: &FullDiff,
        target_state: &str,
    ) -> Result<()>;

    /// Per-container scores relative to a base state
    async fn calculate_state_scores(&self, base_state: &str) -> Result<BTreeMap<String, f64>>;

    /// Names of all saved states
    async fn list_states(&self) -> Result<Vec<String>>;

    /// Save the live graph under a name
    async fn save_state(&self, name: &str) -> Result<()>;

    /// Replace the live graph with a saved state
    async fn load_state(&self, name: &str) -> Result<()>;

    /// Delete a saved state
    async fn delete_state(&self, name: &str) -> Result<()>;
}

// =============================================================================
// Wire shapes
// =============================================================================

/// Body of a compare request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompareRequest<'a> {
    pub source_state: &'a str,
    pub target_state: &'a str,
    pub container_ids: &'a [String],
}

/// Body of a compare response
#[derive(Debug, Deserialize)]
pub(crate) struct CompareResponse {
    #[serde(default)]
    pub differences_all: Option<FullDiff>,
}

/// Body of an apply or revert request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DifferencesRequest<'a> {
    pub container_ids: &'a [String],
    pub differences: &'a FullDiff,
    pub target_state: &'a str,
}

/// Body of a metadata save request
#[derive(Debug, Serialize)]
pub(crate) struct SaveMetadataRequest<'a> {
    pub metadata: &'a Metadata,
}

/// Body of a scores request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScoresRequest<'a> {
    pub base_state: &'a str,
}

/// Body of a state lifecycle request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StateRequest<'a> {
    pub state_name: &'a str,
}

/// Pull numeric scores out of `{scores: {...}}`; non-numeric values are skipped
pub(crate) fn parse_scores(payload: &Value) -> BTreeMap<String, f64> {
    payload
        .get("scores")
        .and_then(Value::as_object)
        .map(|scores| {
            scores
                .iter()
                .filter_map(|(id, v)| v.as_f64().map(|s| (id.clone(), s)))
                .collect()
        })
        .unwrap_or_default()
}

/// Accept `{states: [...]}` or a bare array of names or `{name}` objects
pub(crate) fn parse_states(payload: &Value) -> Vec<String> {
    let list = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => match obj.get("states") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    list.iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("name").and_then(Value::as_str).map(String::from),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_states_shapes() {
        assert_eq!(parse_states(&json!(["base", "v2"])), vec!["base", "v2"]);
        assert_eq!(
            parse_states(&json!({"states": [{"name": "base"}, "v2", 7]})),
            vec!["base", "v2"]
        );
        assert!(parse_states(&json!("nope")).is_empty());
    }

    #[test]
    fn test_parse_scores_skips_non_numeric() {
        let scores = parse_scores(&json!({"scores": {"C1": 2.5, "C2": null, "C3": 1}}));
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["C1"], 2.5);
        assert_eq!(scores["C3"], 1.0);
    }

    #[test]
    fn test_compare_request_is_camel_case() {
        let ids = vec!["C1".to_string()];
        let body = serde_json::to_value(CompareRequest {
            source_state: "base",
            target_state: "v2",
            container_ids: &ids,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"sourceState": "base", "targetState": "v2", "containerIds": ["C1"]})
        );
    }
}
