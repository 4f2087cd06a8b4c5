// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Per-pair change summaries for state comparison views
//!
//! A summary collapses one enriched diff into the text shown on a single
//! comparison edge: counts by status, the total cost and the distinct
//! qualitative labels, plus one description line per change for the detail
//! view.

use crate::api::StateApi;
use crate::enrich::enrich;
use crate::metadata::MetadataStore;
use crate::types::{ChangeRecord, ChangeStatus, EnrichedDiff, FullDiff};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, error, info};

/// Number of changes by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    /// Edges only in the target state
    pub added: usize,
    /// Edges in both states with different content
    pub changed: usize,
    /// Edges only in the source state
    pub removed: usize,
}

impl ChangeCounts {
    /// Sum of all counters
    #[must_use]
    pub fn total(&self) -> usize {
        self.added + self.changed + self.removed
    }

    fn bump(&mut self, status: ChangeStatus) {
        match status {
            ChangeStatus::Added => self.added += 1,
            ChangeStatus::Changed => self.changed += 1,
            ChangeStatus::Removed => self.removed += 1,
        }
    }
}

/// Aggregate view of one diff
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSummary {
    /// One line per change, in diff order
    pub descriptions: Vec<String>,
    /// Counts by status
    pub counts: ChangeCounts,
    /// Sum of all parseable weights
    pub total_weight: f64,
    /// Distinct non-empty qualitative labels
    pub qual_labels: BTreeSet<String>,
}

impl ChangeSummary {
    /// True when the diff had no changes; callers skip the edge
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.total() == 0
    }

    /// Compact edge label, e.g. `+2 ~1 -3 (cost 4) [major, minor]`
    #[must_use]
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if self.counts.added > 0 {
            parts.push(format!("+{}", self.counts.added));
        }
        if self.counts.changed > 0 {
            parts.push(format!("~{}", self.counts.changed));
        }
        if self.counts.removed > 0 {
            parts.push(format!("-{}", self.counts.removed));
        }
        let mut label = parts.join(" ");
        if self.total_weight > 0.0 {
            label.push_str(&format!(" (cost {})", self.total_weight));
        }
        if !self.qual_labels.is_empty() {
            let labels: Vec<&str> = self.qual_labels.iter().map(String::as_str).collect();
            label.push_str(&format!(" [{}]", labels.join(", ")));
        }
        label
    }
}

/// Summarise a diff, resolving display names through `name_by_id`
#[must_use]
pub fn build_change_summary(diff: &FullDiff, name_by_id: &HashMap<String, String>) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    for (container_id, entry) in diff {
        let container_name = display_name(name_by_id, container_id);
        for (target_id, record) in entry {
            let target_name = display_name(name_by_id, target_id);
            summary
                .descriptions
                .push(describe(container_name, target_name, record));
            summary.counts.bump(record.status);
            summary.total_weight += record.weight.as_deref().map_or(0.0, parse_weight);
            if let Some(label) = record.qual_label.as_deref().filter(|l| !l.is_empty()) {
                summary.qual_labels.insert(label.to_string());
            }
        }
    }
    summary
}

fn display_name<'a>(name_by_id: &'a HashMap<String, String>, id: &'a str) -> &'a str {
    name_by_id.get(id).map_or(id, String::as_str)
}

/// One human-readable line for a change
#[must_use]
pub fn describe(container_name: &str, target_name: &str, record: &ChangeRecord) -> String {
    let mut line = format!("{container_name} [{}] {target_name}", record.status);
    if let Some(rel) = record.relationship.as_deref().filter(|r| !r.is_empty()) {
        line.push_str(" [with] ");
        line.push_str(rel);
    }
    let cost: Vec<&str> = [record.weight.as_deref(), record.qual_label.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    if !cost.is_empty() {
        line.push_str(&format!(" (cost: {})", cost.join(" ")));
    }
    line
}

/// Parse the leading number of a weight string; anything unparseable is 0
///
/// Values that parse to infinity, such as `"Infinity"` or `"1e999"`, also
/// count as 0.
#[must_use]
pub fn parse_weight(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let scan = |from: usize| {
        bytes[from.min(bytes.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
            + from
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = scan(end);
    let int_digits = int_end - end;
    end = int_end;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = scan(end + 1);
        frac_digits = frac_end - end - 1;
        if int_digits + frac_digits > 0 {
            end = frac_end;
        }
    }
    if int_digits + frac_digits == 0 {
        return 0.0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = scan(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

// =============================================================================
// Multi-state comparison
// =============================================================================

/// Whether the selected state is the source or the target of each pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    /// `selected -> other`
    #[default]
    SelectedIsSource,
    /// `other -> selected`
    SelectedIsTarget,
}

impl Orientation {
    /// `(source, target)` for a pair
    #[must_use]
    pub fn order<'a>(&self, selected: &'a str, other: &'a str) -> (&'a str, &'a str) {
        match self {
            Self::SelectedIsSource => (selected, other),
            Self::SelectedIsTarget => (other, selected),
        }
    }
}

/// One compared state pair with its enriched diff and summary
#[derive(Debug, Clone, PartialEq)]
pub struct PairComparison {
    /// Source state name
    pub source_state: String,
    /// Target state name
    pub target_state: String,
    /// Enriched diff for the pair
    pub diff: EnrichedDiff,
    /// Summary of `diff`
    pub summary: ChangeSummary,
}

/// Message shown when a comparison has no containers in scope
pub const NO_CONTAINERS: &str = "No containers to compare";

/// Compare, enrich and summarise one pair
///
/// With no containers nothing is requested, not even metadata, and the pair
/// is empty. Comparison failures are logged and also produce an empty pair.
pub async fn compare_pair(
    api: &dyn StateApi,
    store: &MetadataStore,
    source_state: &str,
    target_state: &str,
    container_ids: &[String],
    name_by_id: &HashMap<String, String>,
) -> PairComparison {
    if container_ids.is_empty() {
        info!("{} ({} -> {})", NO_CONTAINERS, source_state, target_state);
        return PairComparison {
            source_state: source_state.to_string(),
            target_state: target_state.to_string(),
            diff: EnrichedDiff::default(),
            summary: ChangeSummary::default(),
        };
    }

    let raw = match api
        .compare_states(source_state, target_state, container_ids)
        .await
    {
        Ok(diff) => diff,
        Err(e) => {
            error!(
                "Failed to compare {} -> {}: {}",
                source_state, target_state, e
            );
            FullDiff::new()
        }
    };

    let diff = enrich(store, &raw).await;
    let summary = build_change_summary(diff.as_diff(), name_by_id);
    debug!(
        "{} -> {}: {}",
        source_state,
        target_state,
        if summary.is_empty() { "no changes".to_string() } else { summary.label() }
    );
    PairComparison {
        source_state: source_state.to_string(),
        target_state: target_state.to_string(),
        diff,
        summary,
    }
}

/// Compare `selected` against every other state concurrently
///
/// Self-comparison and duplicate names are skipped, and pairs with no changes
/// are dropped. No request is made when `container_ids` is empty.
pub async fn compare_against(
    api: &dyn StateApi,
    store: &MetadataStore,
    selected: &str,
    states: &[String],
    container_ids: &[String],
    name_by_id: &HashMap<String, String>,
    orientation: Orientation,
) -> Vec<PairComparison> {
    if container_ids.is_empty() {
        info!("{}", NO_CONTAINERS);
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let pairs = states
        .iter()
        .filter(|s| s.as_str() != selected && seen.insert(s.as_str()))
        .map(|other| {
            let (source, target) = orientation.order(selected, other);
            compare_pair(api, store, source, target, container_ids, name_by_id)
        });

    join_all(pairs)
        .await
        .into_iter()
        .filter(|pair| !pair.summary.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{endpoints, MemoryApi};
    use std::sync::Arc;

    fn record(status: ChangeStatus) -> ChangeRecord {
        ChangeRecord::new(status)
    }

    fn diff_of(changes: &[(&str, &str, ChangeRecord)]) -> FullDiff {
        let mut diff = FullDiff::new();
        for (c, t, r) in changes {
            diff.entry((*c).to_string())
                .or_default()
                .insert((*t).to_string(), r.clone());
        }
        diff
    }

    #[test]
    fn test_counts_and_label_order() {
        let diff = diff_of(&[
            ("A", "1", record(ChangeStatus::Removed)),
            ("A", "2", record(ChangeStatus::Added)),
            ("B", "1", record(ChangeStatus::Removed)),
            ("B", "2", record(ChangeStatus::Changed)),
            ("C", "1", record(ChangeStatus::Added)),
            ("C", "2", record(ChangeStatus::Removed)),
        ]);
        let summary = build_change_summary(&diff, &HashMap::new());
        assert_eq!(
            summary.counts,
            ChangeCounts { added: 2, changed: 1, removed: 3 }
        );
        assert_eq!(summary.label(), "+2 ~1 -3");
    }

    #[test]
    fn test_label_omits_zero_clauses() {
        let diff = diff_of(&[
            ("A", "1", record(ChangeStatus::Added)),
            ("A", "2", record(ChangeStatus::Added)),
        ]);
        let label = build_change_summary(&diff, &HashMap::new()).label();
        assert_eq!(label, "+2");
        assert!(!label.contains('~'));
        assert!(!label.contains('-'));
    }

    #[test]
    fn test_cost_and_qual_labels() {
        let mut a = record(ChangeStatus::Changed).with_relationship("influences");
        a.weight = Some("2.5".into());
        a.qual_label = Some("minor".into());
        let mut b = record(ChangeStatus::Removed);
        b.weight = Some("abc".into());
        b.qual_label = Some("major".into());
        let mut c = record(ChangeStatus::Added);
        c.qual_label = Some("minor".into());

        let diff = diff_of(&[("A", "X", a), ("A", "Y", b), ("B", "Z", c)]);
        let names: HashMap<String, String> =
            [("A".to_string(), "Alpha".to_string())].into_iter().collect();
        let summary = build_change_summary(&diff, &names);

        assert!((summary.total_weight - 2.5).abs() < f64::EPSILON);
        assert_eq!(summary.qual_labels.len(), 2);
        assert_eq!(summary.label(), "+1 ~1 -1 (cost 2.5) [major, minor]");
        assert_eq!(
            summary.descriptions[0],
            "Alpha [changed] X [with] influences (cost: 2.5 minor)"
        );
        assert_eq!(summary.descriptions[1], "Alpha [removed] Y (cost: abc major)");
        assert_eq!(summary.descriptions[2], "B [added] Z (cost: minor)");
    }

    #[test]
    fn test_empty_diff_is_empty_summary() {
        let summary = build_change_summary(&FullDiff::new(), &HashMap::new());
        assert!(summary.is_empty());
        assert!(summary.descriptions.is_empty());
        assert!(summary.qual_labels.is_empty());
        assert_eq!(summary.total_weight, 0.0);
        assert_eq!(summary.label(), "");
    }

    #[test]
    fn test_parse_weight_leading_number() {
        assert_eq!(parse_weight("3"), 3.0);
        assert_eq!(parse_weight(" 4.5kg"), 4.5);
        assert_eq!(parse_weight("-2"), -2.0);
        assert_eq!(parse_weight(".5"), 0.5);
        assert_eq!(parse_weight("1e2x"), 100.0);
        assert_eq!(parse_weight("1e"), 1.0);
        assert_eq!(parse_weight(""), 0.0);
        assert_eq!(parse_weight("."), 0.0);
        assert_eq!(parse_weight("abc"), 0.0);
        assert_eq!(parse_weight("1e999"), 0.0);
        assert_eq!(parse_weight("Infinity"), 0.0);
    }

    #[tokio::test]
    async fn test_compare_against_skips_self_and_empty_pairs() {
        let api = Arc::new(MemoryApi::new());
        api.set_comparison("base", "v2", diff_of(&[("C1", "T1", record(ChangeStatus::Added))]));
        api.set_comparison("base", "v3", FullDiff::new());
        let store = MetadataStore::new(Arc::clone(&api) as Arc<dyn StateApi>);

        let states: Vec<String> = ["base", "v2", "v3", "v2"].iter().map(|s| s.to_string()).collect();
        let pairs = compare_against(
            api.as_ref(),
            &store,
            "base",
            &states,
            &["C1".to_string()],
            &HashMap::new(),
            Orientation::SelectedIsSource,
        )
        .await;

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source_state, "base");
        assert_eq!(pairs[0].target_state, "v2");
        assert_eq!(api.call_count(endpoints::COMPARE_STATES), 2);
    }

    #[tokio::test]
    async fn test_orientation_flips_pair() {
        let api = Arc::new(MemoryApi::new());
        api.set_comparison("v2", "base", diff_of(&[("C1", "T1", record(ChangeStatus::Removed))]));
        let store = MetadataStore::new(Arc::clone(&api) as Arc<dyn StateApi>);

        let pairs = compare_against(
            api.as_ref(),
            &store,
            "base",
            &["v2".to_string()],
            &["C1".to_string()],
            &HashMap::new(),
            Orientation::SelectedIsTarget,
        )
        .await;
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source_state, "v2");
        assert_eq!(pairs[0].summary.label(), "-1");
    }

    #[tokio::test]
    async fn test_pair_without_containers_makes_no_calls() {
        let api = Arc::new(MemoryApi::new());
        api.set_comparison("base", "v2", diff_of(&[("C1", "T1", record(ChangeStatus::Added))]));
        let store = MetadataStore::new(Arc::clone(&api) as Arc<dyn StateApi>);

        let pair = compare_pair(api.as_ref(), &store, "base", "v2", &[], &HashMap::new()).await;
        assert!(pair.diff.is_empty());
        assert!(pair.summary.is_empty());
        assert!(api.calls().is_empty());
        assert!(store.cached().is_none());
    }

    #[tokio::test]
    async fn test_no_containers_means_no_requests() {
        let api = Arc::new(MemoryApi::new());
        let store = MetadataStore::new(Arc::clone(&api) as Arc<dyn StateApi>);
        let pairs = compare_against(
            api.as_ref(),
            &store,
            "base",
            &["v2".to_string()],
            &[],
            &HashMap::new(),
            Orientation::default(),
        )
        .await;
        assert!(pairs.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_comparison_degrades_to_empty() {
        let api = Arc::new(MemoryApi::new());
        api.fail(endpoints::COMPARE_STATES);
        let store = MetadataStore::new(Arc::clone(&api) as Arc<dyn StateApi>);
        let pair = compare_pair(
            api.as_ref(),
            &store,
            "base",
            "v2",
            &["C1".to_string()],
            &HashMap::new(),
        )
        .await;
        assert!(pair.summary.is_empty());
    }
}
