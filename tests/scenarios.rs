// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! End-to-end flows over the in-memory backend
//!
//! compare -> enrich -> summarise -> select -> apply, plus the metadata
//! round trip through a fresh load.

use serde_json::json;
use stateweave::api::{endpoints, MemoryApi, StateApi};
use stateweave::metadata::MetadataStore;
use stateweave::notify::{CollectingNotifier, Notice, NoticeLevel, Notifier};
use stateweave::orchestrator::{Orchestrator, Outcome};
use stateweave::refresh::{RefreshBus, RefreshKind};
use stateweave::session::{DiffContext, DiffSession};
use stateweave::summary::{compare_against, compare_pair, Orientation};
use stateweave::types::{Direction, FullDiff, TransitionMetadata};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

// =============================================================================
// Test Helpers
// =============================================================================

struct World {
    api: Arc<MemoryApi>,
    store: Arc<MetadataStore>,
    notices: Arc<CollectingNotifier>,
    bus: RefreshBus,
}

impl World {
    fn new() -> Self {
        let api = Arc::new(MemoryApi::new());
        let store = Arc::new(MetadataStore::new(Arc::clone(&api) as Arc<dyn StateApi>));
        Self {
            api,
            store,
            notices: Arc::new(CollectingNotifier::new()),
            bus: RefreshBus::new(),
        }
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&self.api) as Arc<dyn StateApi>,
            self.bus.clone(),
            Arc::clone(&self.notices) as Arc<dyn Notifier>,
        )
    }
}

fn names() -> HashMap<String, String> {
    [("C1", "C1name"), ("T1", "T1name")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// C1 gains a "supports" edge to T1; the new relationship carries no label
fn supports_diff() -> FullDiff {
    serde_json::from_value(json!({
        "C1": {
            "T1": {
                "status": "added",
                "relationship": "supports",
                "relationship_dict": {}
            }
        }
    }))
    .unwrap()
}

fn scope() -> Vec<String> {
    vec!["C1".to_string()]
}

// =============================================================================
// Comparison Scenarios
// =============================================================================

#[tokio::test]
async fn test_plain_comparison_summary() {
    let world = World::new();
    world.api.set_comparison("base", "v2", supports_diff());

    let pair = compare_pair(
        world.api.as_ref(),
        &world.store,
        "base",
        "v2",
        &scope(),
        &names(),
    )
    .await;

    assert_eq!(pair.summary.counts.added, 1);
    assert_eq!(pair.summary.counts.changed, 0);
    assert_eq!(pair.summary.counts.removed, 0);
    assert!(pair.summary.total_weight.abs() < f64::EPSILON);
    assert_eq!(
        pair.summary.descriptions,
        vec!["C1name [added] T1name [with] supports"]
    );
    assert_eq!(pair.summary.label(), "+1");
}

#[tokio::test]
async fn test_comparison_with_metadata_override() {
    let world = World::new();
    world.api.set_comparison("base", "v2", supports_diff());
    world.api.set_metadata_payload(json!({
        "metadata": {
            "C1|T1|None -> None|add": { "weight": "3", "qual_label": "minor" }
        }
    }));

    let pair = compare_pair(
        world.api.as_ref(),
        &world.store,
        "base",
        "v2",
        &scope(),
        &names(),
    )
    .await;

    let record = &pair.diff.as_diff()["C1"]["T1"];
    assert_eq!(record.weight.as_deref(), Some("3"));
    assert_eq!(record.qual_label.as_deref(), Some("minor"));
    assert_eq!(record.relationship.as_deref(), Some("supports"));
    assert_eq!(
        pair.summary.descriptions,
        vec!["C1name [added] T1name [with] supports (cost: 3 minor)"]
    );
    assert!((pair.summary.total_weight - 3.0).abs() < f64::EPSILON);
    assert_eq!(pair.summary.qual_labels, BTreeSet::from(["minor".to_string()]));
    assert_eq!(pair.summary.label(), "+1 (cost 3) [minor]");
}

#[tokio::test]
async fn test_multi_state_comparison_shares_one_metadata_load() {
    let world = World::new();
    world.api.set_comparison("base", "v2", supports_diff());
    world.api.set_comparison("base", "v3", supports_diff());
    world.api.set_comparison("base", "v4", FullDiff::new());

    let states = world.api.states();
    let pairs = compare_against(
        world.api.as_ref(),
        &world.store,
        "base",
        &states,
        &scope(),
        &names(),
        Orientation::SelectedIsSource,
    )
    .await;

    let targets: Vec<&str> = pairs.iter().map(|p| p.target_state.as_str()).collect();
    assert_eq!(targets, vec!["v2", "v3"]);
    assert_eq!(world.api.call_count(endpoints::COMPARE_STATES), 3);
    assert_eq!(world.api.call_count(endpoints::TRANSITION_METADATA), 1);
}

// =============================================================================
// Metadata Round Trip
// =============================================================================

#[tokio::test]
async fn test_metadata_survives_reload() {
    let world = World::new();
    let patch = TransitionMetadata {
        weight: Some("7".into()),
        qual_label: None,
        notes: Some("needs review".into()),
    };

    world
        .store
        .update_for("C1", "T1", "None -> None", Direction::Add, &patch)
        .await
        .unwrap();
    assert_eq!(
        world.store.get_for("C1", "T1", "None -> None", Direction::Add).await,
        patch
    );

    world.store.invalidate();
    let reloaded = world
        .store
        .get_for("C1", "T1", "None -> None", Direction::Add)
        .await;
    assert_eq!(reloaded, patch);
    assert_eq!(world.api.call_count(endpoints::TRANSITION_METADATA), 3);
}

// =============================================================================
// Select and Apply
// =============================================================================

#[tokio::test]
async fn test_edit_select_and_apply() {
    let world = World::new();
    let mut diff = supports_diff();
    diff.entry("C1".into()).or_default().insert(
        "T2".into(),
        serde_json::from_value(json!({
            "status": "removed",
            "base_relationship_dict": { "label": "blocks" }
        }))
        .unwrap(),
    );
    world.api.set_comparison("base", "v2", diff);

    let pair = compare_pair(world.api.as_ref(), &world.store, "base", "v2", &scope(), &names()).await;
    let session = DiffSession::new(Arc::clone(&world.store), names());
    session.open(pair);

    session
        .edit_metadata("C1", "T1", &TransitionMetadata::weight("2"))
        .await
        .unwrap();
    assert!(!session.toggle("C1", "T2").unwrap());

    let context = DiffContext::new();
    let selected = session.commit(&context).unwrap();
    assert_eq!(context.current(), Some(selected.clone()));
    assert_eq!(selected.diff["C1"].len(), 1);
    assert_eq!(selected.diff["C1"]["T1"].weight.as_deref(), Some("2"));

    let mut views = world.bus.subscribe();
    let outcome = world
        .orchestrator()
        .apply_selected(&scope(), &selected)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(views.recv().await.unwrap().kind, RefreshKind::Differences);

    let calls = world.api.calls();
    let applied = calls
        .iter()
        .find(|c| c.endpoint == endpoints::APPLY_DIFFERENCES)
        .unwrap();
    assert_eq!(applied.body["targetState"], "v2");
    assert_eq!(applied.body["differences"]["C1"]["T1"]["weight"], "2");
    assert!(applied.body["differences"]["C1"].get("T2").is_none());

    // Stored under the key enrichment derives, so a fresh load sees it
    world.store.invalidate();
    assert_eq!(
        world
            .store
            .get_for("C1", "T1", "None -> None", Direction::Add)
            .await
            .weight
            .as_deref(),
        Some("2")
    );
}

#[tokio::test]
async fn test_empty_selection_short_circuits() {
    let world = World::new();
    world.api.set_comparison("base", "v2", supports_diff());

    let pair = compare_pair(world.api.as_ref(), &world.store, "base", "v2", &scope(), &names()).await;
    let session = DiffSession::new(Arc::clone(&world.store), names());
    session.open(pair);
    session.set_all(false).unwrap();
    let selected = session.commit(&DiffContext::new()).unwrap();

    let before = world.api.calls().len();
    let outcome = world
        .orchestrator()
        .revert_selected(&scope(), &selected)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Nothing);
    assert_eq!(world.api.calls().len(), before);

    let notices = world.notices.notices();
    assert_eq!(notices, vec![Notice::info("Nothing to revert")]);
    assert_eq!(notices[0].level, NoticeLevel::Info);
}
