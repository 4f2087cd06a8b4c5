// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Stateweave library - state diffs and transition metadata for container graphs
//!
//! This crate provides the reconciliation engine that sits between a remote
//! state backend and the views that render it: comparing named states,
//! enriching the differences with transition metadata, summarising them per
//! state pair, and applying or reverting a selected subset.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod enrich;
pub mod error;
pub mod graph;
pub mod metadata;
pub mod notify;
pub mod orchestrator;
pub mod refresh;
pub mod session;
pub mod summary;

pub use error::{Error, Result};

/// Core data types shared by every stage of the diff pipeline
pub mod types {
    use serde::{Deserialize, Deserializer, Serialize};
    use serde_json::{Map, Value};
    use std::collections::BTreeMap;
    use std::fmt;

    /// Name of the reserved default state
    pub const BASE_STATE: &str = "base";

    /// Label used for a missing side of a transition
    pub const NO_LABEL: &str = "None";

    // =========================================================================
    // Containers and Positions
    // =========================================================================

    /// A unit of work or content in the graph
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Container {
        /// Backend-issued identifier (numeric ids are stringified)
        #[serde(deserialize_with = "id_string")]
        pub id: String,
        /// Display name
        #[serde(default)]
        pub name: String,
        /// Comma-separated tag string; each tag is a layer
        #[serde(rename = "Tags", default)]
        pub tags: String,
    }

    impl Container {
        /// Create a container with no tags
        #[must_use]
        pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
            Self {
                id: id.into(),
                name: name.into(),
                tags: String::new(),
            }
        }

        /// Layers this container belongs to, in tag order
        #[must_use]
        pub fn layers(&self) -> Vec<&str> {
            self.tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect()
        }
    }

    /// A directed relationship between two containers
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Position {
        /// Source container ID
        #[serde(deserialize_with = "id_string")]
        pub source: String,
        /// Target container ID
        #[serde(deserialize_with = "id_string")]
        pub target: String,
        /// Free-text label, e.g. "successor"
        #[serde(default)]
        pub label: Option<String>,
        /// Rich-text narrative
        #[serde(default)]
        pub narrative: Option<String>,
    }

    // =========================================================================
    // Diffs
    // =========================================================================

    /// Kind of change between two states for one edge
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ChangeStatus {
        /// Edge exists only in the target state
        Added,
        /// Edge exists in both states with different content
        Changed,
        /// Edge exists only in the source state
        Removed,
    }

    impl ChangeStatus {
        /// Wire name of the status
        #[must_use]
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::Added => "added",
                Self::Changed => "changed",
                Self::Removed => "removed",
            }
        }
    }

    impl fmt::Display for ChangeStatus {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Structured relationship label as stored in a state
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct RelationshipDict {
        /// Relationship label
        #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
        pub label: Option<String>,
        /// Any other fields the backend sends
        #[serde(flatten)]
        pub extra: Map<String, Value>,
    }

    /// Change to one `(container, target)` edge between two states
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ChangeRecord {
        /// Added, changed or removed
        pub status: ChangeStatus,
        /// Description of the new or changed relationship
        #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
        pub relationship: Option<String>,
        /// Relationship in the source state
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub base_relationship_dict: Option<RelationshipDict>,
        /// Relationship in the target state
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub relationship_dict: Option<RelationshipDict>,
        /// Numeric cost as a string (attached by enrichment)
        #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
        pub weight: Option<String>,
        /// Qualitative label (attached by enrichment)
        #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
        pub qual_label: Option<String>,
        /// Free-form notes (attached by enrichment)
        #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
        pub notes: Option<String>,
        /// Fields this crate does not interpret, sent back verbatim
        #[serde(flatten)]
        pub extra: Map<String, Value>,
    }

    impl ChangeRecord {
        /// Create a bare record with the given status
        #[must_use]
        pub fn new(status: ChangeStatus) -> Self {
            Self {
                status,
                relationship: None,
                base_relationship_dict: None,
                relationship_dict: None,
                weight: None,
                qual_label: None,
                notes: None,
                extra: Map::new(),
            }
        }

        /// Set the relationship description
        #[must_use]
        pub fn with_relationship(mut self, relationship: impl Into<String>) -> Self {
            self.relationship = Some(relationship.into());
            self
        }

        /// Set the source-state relationship label
        #[must_use]
        pub fn with_base_label(mut self, label: Option<&str>) -> Self {
            self.base_relationship_dict = Some(RelationshipDict {
                label: label.map(String::from),
                extra: Map::new(),
            });
            self
        }

        /// Set the target-state relationship label
        #[must_use]
        pub fn with_current_label(mut self, label: Option<&str>) -> Self {
            self.relationship_dict = Some(RelationshipDict {
                label: label.map(String::from),
                extra: Map::new(),
            });
            self
        }

        /// `"<baseLabel> -> <currentLabel>"`, each side defaulting to `None`
        #[must_use]
        pub fn transition_label(&self) -> String {
            let side = |dict: &Option<RelationshipDict>| {
                dict.as_ref()
                    .and_then(|d| d.label.clone())
                    .unwrap_or_else(|| NO_LABEL.to_string())
            };
            format!(
                "{} -> {}",
                side(&self.base_relationship_dict),
                side(&self.relationship_dict)
            )
        }

        /// Direction derived from which relationship dicts are present
        #[must_use]
        pub fn direction(&self) -> Direction {
            Direction::derive(
                self.base_relationship_dict.is_some(),
                self.relationship_dict.is_some(),
            )
        }

        /// Overlay the non-empty fields of a metadata record
        pub fn apply_metadata(&mut self, meta: &TransitionMetadata) {
            if let Some(w) = &meta.weight {
                self.weight = Some(w.clone());
            }
            if let Some(q) = &meta.qual_label {
                self.qual_label = Some(q.clone());
            }
            if let Some(n) = &meta.notes {
                self.notes = Some(n.clone());
            }
        }
    }

    /// Changes for one container: target ID to change record
    pub type DiffEntry = BTreeMap<String, ChangeRecord>;

    /// Changes for every compared container
    pub type FullDiff = BTreeMap<String, DiffEntry>;

    /// True when no container has any changed target
    #[must_use]
    pub fn diff_is_empty(diff: &FullDiff) -> bool {
        diff.values().all(BTreeMap::is_empty)
    }

    /// Number of `(container, target)` changes in a diff
    #[must_use]
    pub fn diff_len(diff: &FullDiff) -> usize {
        diff.values().map(BTreeMap::len).sum()
    }

    /// A diff carrying transition metadata, produced by the enricher
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EnrichedDiff(FullDiff);

    impl EnrichedDiff {
        /// Wrap an already-enriched diff
        #[must_use]
        pub fn from_enriched(diff: FullDiff) -> Self {
            Self(diff)
        }

        /// Borrow the underlying diff
        #[must_use]
        pub fn as_diff(&self) -> &FullDiff {
            &self.0
        }

        /// Take ownership of the underlying diff
        #[must_use]
        pub fn into_inner(self) -> FullDiff {
            self.0
        }

        /// True when there is nothing to show
        #[must_use]
        pub fn is_empty(&self) -> bool {
            diff_is_empty(&self.0)
        }
    }

    // =========================================================================
    // Transition Metadata
    // =========================================================================

    /// Which way an edge moved between two states
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Direction {
        /// No source relationship, has a target relationship
        Add,
        /// Anything else, including both present
        Change,
        /// Has a source relationship, no target relationship
        Remove,
    }

    impl Direction {
        /// Derive from presence of the source/target relationship dicts
        #[must_use]
        pub fn derive(has_base: bool, has_current: bool) -> Self {
            match (has_base, has_current) {
                (false, true) => Self::Add,
                (true, false) => Self::Remove,
                _ => Self::Change,
            }
        }

        /// Key component for this direction
        #[must_use]
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::Add => "add",
                Self::Change => "change",
                Self::Remove => "remove",
            }
        }
    }

    impl fmt::Display for Direction {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Partial metadata for one transition
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransitionMetadata {
        /// Numeric cost as a string
        #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
        pub weight: Option<String>,
        /// Qualitative label
        #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
        pub qual_label: Option<String>,
        /// Free-form notes
        #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
        pub notes: Option<String>,
    }

    impl TransitionMetadata {
        /// Record with only a weight
        #[must_use]
        pub fn weight(weight: impl Into<String>) -> Self {
            Self {
                weight: Some(weight.into()),
                ..Self::default()
            }
        }

        /// True when no field is set
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.weight.is_none() && self.qual_label.is_none() && self.notes.is_none()
        }

        /// Shallow merge: every field present in `patch` overwrites
        pub fn merge(&mut self, patch: &TransitionMetadata) {
            if patch.weight.is_some() {
                self.weight.clone_from(&patch.weight);
            }
            if patch.qual_label.is_some() {
                self.qual_label.clone_from(&patch.qual_label);
            }
            if patch.notes.is_some() {
                self.notes.clone_from(&patch.notes);
            }
        }
    }

    /// Every stored transition record, by composite key
    pub type Metadata = BTreeMap<String, TransitionMetadata>;

    /// Build the composite metadata key
    ///
    /// Components are joined with `|`; a literal `|` or `\` inside a
    /// component is backslash-escaped so distinct tuples never collide.
    #[must_use]
    pub fn generate_key(
        container_id: &str,
        target_id: &str,
        transition_label: &str,
        direction: Direction,
    ) -> String {
        let mut key = String::with_capacity(
            container_id.len() + target_id.len() + transition_label.len() + 10,
        );
        for (i, part) in [container_id, target_id, transition_label, direction.as_str()]
            .iter()
            .enumerate()
        {
            if i > 0 {
                key.push('|');
            }
            for ch in part.chars() {
                if ch == '|' || ch == '\\' {
                    key.push('\\');
                }
                key.push(ch);
            }
        }
        key
    }

    /// Display key for a diff entry, `"containerId-targetId"`
    #[must_use]
    pub fn selection_key(container_id: &str, target_id: &str) -> String {
        format!("{container_id}-{target_id}")
    }

    // =========================================================================
    // Serde helpers
    // =========================================================================

    /// Accept a string or a number; anything else becomes `None`
    fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "container id must be a string or number, got {other}"
            ))),
        }
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::*;
}
