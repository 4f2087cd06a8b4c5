// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! In-process state backend
//!
//! Holds canned comparisons, a metadata payload and a state list in memory,
//! records every call it receives, and can be told to fail chosen endpoints.

use super::{endpoints, parse_states, StateApi};
use crate::error::{Error, Result};
use crate::types::{FullDiff, Metadata, BASE_STATE};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Canned backend contents for offline runs
///
/// ```json
/// {
///   "states": ["base", "v2"],
///   "comparisons": [{"sourceState": "base", "targetState": "v2", "differences": {}}],
///   "metadata": {"C1|T1|None -> x|add": {"weight": "3"}},
///   "scores": {"base": {"C1": 1.0}}
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    /// Saved state names besides `base`
    #[serde(default)]
    pub states: Vec<String>,
    /// Diffs returned for state pairs
    #[serde(default)]
    pub comparisons: Vec<FixtureComparison>,
    /// Raw metadata payload, in any shape the backend may send
    #[serde(default)]
    pub metadata: Value,
    /// Scores by base state
    #[serde(default)]
    pub scores: HashMap<String, BTreeMap<String, f64>>,
}

/// One canned comparison
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureComparison {
    /// Source state
    pub source_state: String,
    /// Target state
    pub target_state: String,
    /// Diff for the pair
    #[serde(default)]
    pub differences: FullDiff,
}

/// One call received by a [`MemoryApi`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    /// Endpoint that was hit
    pub endpoint: &'static str,
    /// Request body as the HTTP client would have sent it
    pub body: Value,
}

#[derive(Debug, Default)]
struct Inner {
    comparisons: HashMap<(String, String), FullDiff>,
    metadata_payload: Value,
    states: Vec<String>,
    active_state: String,
    scores: HashMap<String, BTreeMap<String, f64>>,
    failing: HashSet<&'static str>,
    failing_once: HashSet<&'static str>,
    calls: Vec<ApiCall>,
}

/// [`StateApi`] backed by in-memory maps
#[derive(Debug)]
pub struct MemoryApi {
    inner: Mutex<Inner>,
    metadata_delay: Option<Duration>,
    save_delay: Option<Duration>,
}

impl Default for MemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryApi {
    /// Empty backend holding only the `base` state
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                metadata_payload: Value::Null,
                states: vec![BASE_STATE.to_string()],
                active_state: BASE_STATE.to_string(),
                ..Inner::default()
            }),
            metadata_delay: None,
            save_delay: None,
        }
    }

    /// Delay every metadata load, to widen race windows
    #[must_use]
    pub fn with_metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = Some(delay);
        self
    }

    /// Delay every metadata save, so later edits can queue behind it
    #[must_use]
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = Some(delay);
        self
    }

    /// Backend preloaded from an offline fixture
    #[must_use]
    pub fn from_fixture(fixture: Fixture) -> Self {
        let api = Self::new();
        for comparison in fixture.comparisons {
            api.set_comparison(
                &comparison.source_state,
                &comparison.target_state,
                comparison.differences,
            );
        }
        let mut inner = api.lock();
        for name in fixture.states {
            if !inner.states.contains(&name) {
                inner.states.push(name);
            }
        }
        inner.metadata_payload = fixture.metadata;
        inner.scores.extend(fixture.scores);
        drop(inner);
        api
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the diff `compare_states(source, target, ..)` returns
    pub fn set_comparison(&self, source: &str, target: &str, diff: FullDiff) {
        let mut inner = self.lock();
        for name in [source, target] {
            if !inner.states.iter().any(|s| s == name) {
                inner.states.push(name.to_string());
            }
        }
        inner
            .comparisons
            .insert((source.to_string(), target.to_string()), diff);
    }

    /// Replace the raw payload returned by the metadata endpoint
    pub fn set_metadata_payload(&self, payload: Value) {
        self.lock().metadata_payload = payload;
    }

    /// Raw metadata payload as last saved
    #[must_use]
    pub fn metadata_payload(&self) -> Value {
        self.lock().metadata_payload.clone()
    }

    /// Register scores for a base state
    pub fn set_scores(&self, base_state: &str, scores: BTreeMap<String, f64>) {
        self.lock().scores.insert(base_state.to_string(), scores);
    }

    /// Make an endpoint fail until [`MemoryApi::recover`] is called
    pub fn fail(&self, endpoint: &'static str) {
        self.lock().failing.insert(endpoint);
    }

    /// Make only the next call to an endpoint fail
    pub fn fail_once(&self, endpoint: &'static str) {
        self.lock().failing_once.insert(endpoint);
    }

    /// Clear a scripted failure
    pub fn recover(&self, endpoint: &'static str) {
        self.lock().failing.remove(endpoint);
    }

    /// Every call received so far
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Number of calls to one endpoint
    #[must_use]
    pub fn call_count(&self, endpoint: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }

    /// Name of the state currently loaded as the live graph
    #[must_use]
    pub fn active_state(&self) -> String {
        self.lock().active_state.clone()
    }

    /// Names of saved states
    #[must_use]
    pub fn states(&self) -> Vec<String> {
        self.lock().states.clone()
    }

    fn record(&self, endpoint: &'static str, body: Value) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.push(ApiCall { endpoint, body });
        if inner.failing_once.remove(endpoint) || inner.failing.contains(endpoint) {
            return Err(Error::backend(endpoint, "scripted failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl StateApi for MemoryApi {
    async fn compare_states(
        &self,
        source_state: &str,
        target_state: &str,
        container_ids: &[String],
    ) -> Result<FullDiff> {
        self.record(
            endpoints::COMPARE_STATES,
            json!({
                "sourceState": source_state,
                "targetState": target_state,
                "containerIds": container_ids,
            }),
        )?;
        let inner = self.lock();
        let diff = inner
            .comparisons
            .get(&(source_state.to_string(), target_state.to_string()))
            .map(|diff| {
                diff.iter()
                    .filter(|(id, _)| container_ids.contains(id))
                    .map(|(id, entry)| (id.clone(), entry.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(diff)
    }

    async fn load_transition_metadata(&self) -> Result<Value> {
        if let Some(delay) = self.metadata_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(endpoints::TRANSITION_METADATA, Value::Null)?;
        Ok(self.lock().metadata_payload.clone())
    }

    async fn save_transition_metadata(&self, metadata: &Metadata) -> Result<()> {
        if let Some(delay) = self.save_delay {
            tokio::time::sleep(delay).await;
        }
        let body = json!({ "metadata": metadata });
        self.record(endpoints::TRANSITION_METADATA, body.clone())?;
        self.lock().metadata_payload = body;
        Ok(())
    }

    async fn apply_differences(
        &self,
        container_ids: &[String],
        differences: &FullDiff,
        target_state: &str,
    ) -> Result<()> {
        self.record(
            endpoints::APPLY_DIFFERENCES,
            json!({
                "containerIds": container_ids,
                "differences": differences,
                "targetState": target_state,
            }),
        )
    }

    async fn revert_differences(
        &self,
        container_ids: &[String],
        differences: &FullDiff,
        target_state: &str,
    ) -> Result<()> {
        self.record(
            endpoints::REVERT_DIFFERENCES,
            json!({
                "containerIds": container_ids,
                "differences": differences,
                "targetState": target_state,
            }),
        )
    }

    async fn calculate_state_scores(&self, base_state: &str) -> Result<BTreeMap<String, f64>> {
        self.record(
            endpoints::CALCULATE_STATE_SCORES,
            json!({ "baseState": base_state }),
        )?;
        Ok(self
            .lock()
            .scores
            .get(base_state)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_states(&self) -> Result<Vec<String>> {
        self.record(endpoints::STATES, Value::Null)?;
        let states = Value::from(self.lock().states.clone());
        Ok(parse_states(&states))
    }

    async fn save_state(&self, name: &str) -> Result<()> {
        self.record(endpoints::SAVE_STATE, json!({ "stateName": name }))?;
        let mut inner = self.lock();
        if !inner.states.iter().any(|s| s == name) {
            inner.states.push(name.to_string());
        }
        Ok(())
    }

    async fn load_state(&self, name: &str) -> Result<()> {
        self.record(endpoints::LOAD_STATE, json!({ "stateName": name }))?;
        let mut inner = self.lock();
        if !inner.states.iter().any(|s| s == name) {
            return Err(Error::backend(
                endpoints::LOAD_STATE,
                format!("unknown state '{name}'"),
            ));
        }
        inner.active_state = name.to_string();
        Ok(())
    }

    async fn delete_state(&self, name: &str) -> Result<()> {
        self.record(endpoints::DELETE_STATE, json!({ "stateName": name }))?;
        self.lock().states.retain(|s| s != name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeRecord, ChangeStatus};

    fn one_change(container: &str, target: &str) -> FullDiff {
        let mut diff = FullDiff::new();
        diff.entry(container.to_string())
            .or_default()
            .insert(target.to_string(), ChangeRecord::new(ChangeStatus::Added));
        diff
    }

    #[tokio::test]
    async fn test_compare_scopes_to_requested_containers() {
        let api = MemoryApi::new();
        let mut diff = one_change("C1", "T1");
        diff.extend(one_change("C2", "T2"));
        api.set_comparison("base", "v2", diff);

        let scoped = api
            .compare_states("base", "v2", &["C2".to_string()])
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert!(scoped.contains_key("C2"));
        assert_eq!(api.call_count(endpoints::COMPARE_STATES), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure_is_recorded() {
        let api = MemoryApi::new();
        api.fail(endpoints::APPLY_DIFFERENCES);
        let err = api
            .apply_differences(&[], &one_change("C1", "T1"), "v2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
        assert_eq!(api.call_count(endpoints::APPLY_DIFFERENCES), 1);

        api.recover(endpoints::APPLY_DIFFERENCES);
        assert!(api
            .apply_differences(&[], &one_change("C1", "T1"), "v2")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_fail_once_clears_itself() {
        let api = MemoryApi::new();
        api.fail_once(endpoints::SAVE_STATE);
        assert!(api.save_state("v2").await.is_err());
        assert!(api.save_state("v2").await.is_ok());
        assert_eq!(api.states(), vec!["base", "v2"]);
    }

    #[tokio::test]
    async fn test_fixture_preloads_everything() {
        let fixture: Fixture = serde_json::from_value(json!({
            "states": ["v3"],
            "comparisons": [{
                "sourceState": "base",
                "targetState": "v2",
                "differences": { "C1": { "T1": { "status": "added" } } }
            }],
            "metadata": { "metadata": {} },
            "scores": { "base": { "C1": 2.5 } }
        }))
        .unwrap();
        let api = MemoryApi::from_fixture(fixture);

        assert_eq!(api.states(), vec!["base", "v2", "v3"]);
        let diff = api
            .compare_states("base", "v2", &["C1".to_string()])
            .await
            .unwrap();
        assert_eq!(diff["C1"]["T1"].status, ChangeStatus::Added);
        assert_eq!(api.calculate_state_scores("base").await.unwrap()["C1"], 2.5);
        assert_eq!(api.metadata_payload(), json!({ "metadata": {} }));
    }

    #[tokio::test]
    async fn test_load_unknown_state_fails() {
        let api = MemoryApi::new();
        assert!(api.load_state("ghost").await.is_err());
        assert_eq!(api.active_state(), "base");
    }
}
