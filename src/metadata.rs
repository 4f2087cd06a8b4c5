// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Transition metadata store
//!
//! One store instance is built at startup and shared by `Arc`. The backend is
//! hit at most once for reads: concurrent `load()` calls join the same
//! in-flight request, and a failed load caches an empty map. Writes go through
//! a single queue because every save replaces the entire remote map.

use crate::api::StateApi;
use crate::error::Result;
use crate::types::{generate_key, Direction, Metadata, TransitionMetadata};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

type LoadFuture = Shared<BoxFuture<'static, Arc<Metadata>>>;

enum CacheState {
    Unloaded,
    Loading(LoadFuture),
    Loaded(Arc<Metadata>),
}

/// Cached view of every transition metadata record
pub struct MetadataStore {
    api: Arc<dyn StateApi>,
    state: Mutex<CacheState>,
    write_queue: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.lock_state() {
            CacheState::Unloaded => "unloaded",
            CacheState::Loading(_) => "loading",
            CacheState::Loaded(_) => "loaded",
        };
        f.debug_struct("MetadataStore").field("state", &state).finish()
    }
}

impl MetadataStore {
    /// Create an unloaded store over a backend
    pub fn new(api: Arc<dyn StateApi>) -> Self {
        Self {
            api,
            state: Mutex::new(CacheState::Unloaded),
            write_queue: tokio::sync::Mutex::new(()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached map, if a load has completed
    #[must_use]
    pub fn cached(&self) -> Option<Arc<Metadata>> {
        match &*self.lock_state() {
            CacheState::Loaded(m) => Some(Arc::clone(m)),
            _ => None,
        }
    }

    /// Return the cached map, fetching it on first use
    pub async fn load(&self) -> Arc<Metadata> {
        let pending = {
            let mut state = self.lock_state();
            match &*state {
                CacheState::Loaded(m) => return Arc::clone(m),
                CacheState::Loading(f) => f.clone(),
                CacheState::Unloaded => {
                    let api = Arc::clone(&self.api);
                    let fut = async move { Arc::new(fetch(api.as_ref()).await) }
                        .boxed()
                        .shared();
                    *state = CacheState::Loading(fut.clone());
                    fut
                }
            }
        };

        let metadata = pending.clone().await;

        // A save may have landed while we waited; only promote our own load.
        let mut state = self.lock_state();
        if let CacheState::Loading(current) = &*state {
            if current.ptr_eq(&pending) {
                *state = CacheState::Loaded(Arc::clone(&metadata));
            }
        }
        metadata
    }

    /// Persist the full map, then adopt exactly what was sent as the cache
    pub async fn save(&self, metadata: Metadata) -> Result<()> {
        self.api.save_transition_metadata(&metadata).await?;
        debug!("Saved {} transition metadata records", metadata.len());
        *self.lock_state() = CacheState::Loaded(Arc::new(metadata));
        Ok(())
    }

    /// Stored record for a transition, or an empty one
    pub async fn get_for(
        &self,
        container_id: &str,
        target_id: &str,
        transition_label: &str,
        direction: Direction,
    ) -> TransitionMetadata {
        let key = generate_key(container_id, target_id, transition_label, direction);
        self.load().await.get(&key).cloned().unwrap_or_default()
    }

    /// Merge `patch` into one record and persist the whole map
    ///
    /// Calls are serialized: each one loads its base only after the previous
    /// update's save has settled. Returns the merged record.
    pub async fn update_for(
        &self,
        container_id: &str,
        target_id: &str,
        transition_label: &str,
        direction: Direction,
        patch: &TransitionMetadata,
    ) -> Result<TransitionMetadata> {
        let _turn = self.write_queue.lock().await;

        let mut next = (*self.load().await).clone();
        let key = generate_key(container_id, target_id, transition_label, direction);
        let record = next.entry(key).or_default();
        record.merge(patch);
        let merged = record.clone();

        self.save(next).await?;
        Ok(merged)
    }

    /// Drop the cache so the next read fetches again
    pub fn invalidate(&self) {
        *self.lock_state() = CacheState::Unloaded;
    }
}

/// Fetch and normalize; every failure degrades to an empty map
async fn fetch(api: &dyn StateApi) -> Metadata {
    match api.load_transition_metadata().await {
        Ok(payload) => normalize(payload),
        Err(e) => {
            error!("Failed to load transition metadata: {}", e);
            Metadata::new()
        }
    }
}

/// Accept `null`, `{metadata: {...}}` or a bare map
pub(crate) fn normalize(payload: Value) -> Metadata {
    match payload {
        Value::Null => Metadata::new(),
        Value::Object(mut obj) => match obj.remove("metadata") {
            Some(Value::Object(inner)) => parse_records(inner),
            Some(Value::Null) => Metadata::new(),
            Some(other) => {
                warn!("Unexpected transition metadata shape: metadata is {}", kind(&other));
                Metadata::new()
            }
            None => parse_records(obj),
        },
        other => {
            warn!("Unexpected transition metadata shape: {}", kind(&other));
            Metadata::new()
        }
    }
}

fn parse_records(obj: serde_json::Map<String, Value>) -> Metadata {
    let mut metadata = Metadata::new();
    for (key, value) in obj {
        if !value.is_object() {
            warn!("Skipping metadata record {}: not an object", key);
            continue;
        }
        match serde_json::from_value::<TransitionMetadata>(value) {
            Ok(record) => {
                metadata.insert(key, record);
            }
            Err(e) => warn!("Skipping metadata record {}: {}", key, e),
        }
    }
    metadata
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
