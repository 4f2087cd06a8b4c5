// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Local copy of the container graph
//!
//! Views render from this cache; the backend remains the source of truth.

use crate::summary::PairComparison;
use crate::types::{Container, Position};
use anyhow::Result;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Serializable container/position snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStore {
    /// All containers
    #[serde(default)]
    pub containers: Vec<Container>,
    /// All positions
    #[serde(default)]
    pub positions: Vec<Position>,
}

/// Containers and positions with petgraph backing
pub struct ContainerGraph {
    graph: DiGraph<String, Option<String>>,
    node_indices: HashMap<String, NodeIndex>,
    edge_indices: HashMap<(String, String), EdgeIndex>,
    /// Backing data
    pub store: GraphStore,
}

impl Default for ContainerGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            edge_indices: HashMap::new(),
            store: GraphStore::default(),
        }
    }

    /// Build from a store, dropping positions whose endpoints are unknown
    #[must_use]
    pub fn from_store(store: GraphStore) -> Self {
        let mut graph = Self::new();
        for container in store.containers {
            graph.add_container(container);
        }
        for position in store.positions {
            if graph.set_position(position).is_err() {
                tracing::warn!("Dropping position with unknown endpoint");
            }
        }
        graph
    }

    /// Parse a JSON snapshot of `{containers, positions}`
    pub fn from_json(json: &str) -> Result<Self> {
        let store: GraphStore = serde_json::from_str(json)?;
        Ok(Self::from_store(store))
    }

    /// Add or replace a container
    pub fn add_container(&mut self, container: Container) {
        if self.node_indices.contains_key(&container.id) {
            if let Some(existing) = self
                .store
                .containers
                .iter_mut()
                .find(|c| c.id == container.id)
            {
                *existing = container;
            }
        } else {
            let idx = self.graph.add_node(container.id.clone());
            self.node_indices.insert(container.id.clone(), idx);
            self.store.containers.push(container);
        }
    }

    /// Set the single position for an ordered pair, overwriting any existing one
    pub fn set_position(&mut self, position: Position) -> Result<()> {
        let from_idx = *self
            .node_indices
            .get(&position.source)
            .ok_or_else(|| anyhow::anyhow!("Source container not found: {}", position.source))?;
        let to_idx = *self
            .node_indices
            .get(&position.target)
            .ok_or_else(|| anyhow::anyhow!("Target container not found: {}", position.target))?;

        let pair = (position.source.clone(), position.target.clone());
        if let Some(&edge) = self.edge_indices.get(&pair) {
            if let Some(weight) = self.graph.edge_weight_mut(edge) {
                weight.clone_from(&position.label);
            }
            if let Some(existing) = self
                .store
                .positions
                .iter_mut()
                .find(|p| p.source == position.source && p.target == position.target)
            {
                *existing = position;
            }
        } else {
            let edge = self.graph.add_edge(from_idx, to_idx, position.label.clone());
            self.edge_indices.insert(pair, edge);
            self.store.positions.push(position);
        }
        Ok(())
    }

    /// Remove the position for an ordered pair; returns whether one existed
    pub fn remove_position(&mut self, source: &str, target: &str) -> bool {
        let pair = (source.to_string(), target.to_string());
        let Some(edge) = self.edge_indices.remove(&pair) else {
            return false;
        };
        // remove_edge moves the last edge into the freed slot
        let last = EdgeIndex::new(self.graph.edge_count() - 1);
        self.graph.remove_edge(edge);
        if last != edge {
            if let Some(moved) = self.edge_indices.values_mut().find(|e| **e == last) {
                *moved = edge;
            }
        }
        self.store
            .positions
            .retain(|p| !(p.source == source && p.target == target));
        true
    }

    /// Get a container by ID
    #[must_use]
    pub fn get_container(&self, id: &str) -> Option<&Container> {
        self.store.containers.iter().find(|c| c.id == id)
    }

    /// Position for an ordered pair
    #[must_use]
    pub fn position(&self, source: &str, target: &str) -> Option<&Position> {
        self.store
            .positions
            .iter()
            .find(|p| p.source == source && p.target == target)
    }

    /// Targets reachable in one step from a container
    #[must_use]
    pub fn targets_of(&self, id: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let mut targets: Vec<&str> = self
            .graph
            .neighbors(idx)
            .map(|n| self.graph[n].as_str())
            .collect();
        targets.sort_unstable();
        targets
    }

    /// All container IDs, in insertion order
    #[must_use]
    pub fn container_ids(&self) -> Vec<String> {
        self.store.containers.iter().map(|c| c.id.clone()).collect()
    }

    /// Display name lookup for summaries
    #[must_use]
    pub fn name_by_id(&self) -> HashMap<String, String> {
        self.store
            .containers
            .iter()
            .map(|c| (c.id.clone(), c.name.clone()))
            .collect()
    }

    /// Layer name to member IDs; a container may be in several layers
    #[must_use]
    pub fn layers(&self) -> BTreeMap<String, Vec<String>> {
        let mut layers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for container in &self.store.containers {
            for layer in container.layers() {
                layers
                    .entry(layer.to_string())
                    .or_default()
                    .push(container.id.clone());
            }
        }
        layers
    }

    /// Containers tagged with a layer
    #[must_use]
    pub fn containers_in_layer(&self, layer: &str) -> Vec<&Container> {
        self.store
            .containers
            .iter()
            .filter(|c| c.layers().contains(&layer))
            .collect()
    }

    /// Get container count
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.store.containers.len()
    }

    /// Get position count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.store.positions.len()
    }

    /// Check if the graph is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.containers.is_empty()
    }
}

/// Render a state comparison diagram in DOT format
///
/// One node per state, one labelled edge per pair with changes.
#[must_use]
pub fn comparison_dot(selected: &str, comparisons: &[PairComparison]) -> String {
    let mut dot = String::from("digraph states {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [shape=box, style=rounded];\n\n");
    dot.push_str(&format!("  \"{}\" [style=\"rounded,bold\"];\n", escape(selected)));

    for pair in comparisons {
        let other = if pair.source_state == selected {
            &pair.target_state
        } else {
            &pair.source_state
        };
        dot.push_str(&format!("  \"{}\";\n", escape(other)));
    }
    dot.push('\n');

    for pair in comparisons.iter().filter(|p| !p.summary.is_empty()) {
        dot.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
            escape(&pair.source_state),
            escape(&pair.target_state),
            escape(&pair.summary.label())
        ));
    }

    dot.push_str("}\n");
    dot
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
