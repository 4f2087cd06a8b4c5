// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod apply;
pub mod compare;
pub mod completions;
pub mod config;
pub mod diff;
pub mod metadata;
pub mod scores;
pub mod state;

use anyhow::{Context as _, Result};
use std::path::Path;
use std::sync::Arc;
use stateweave::api::{Fixture, HttpApi, MemoryApi, StateApi};
use stateweave::config::Config;
use stateweave::graph::ContainerGraph;
use stateweave::metadata::MetadataStore;
use stateweave::notify::{ConsoleNotifier, LogNotifier, Notifier};
use stateweave::orchestrator::Orchestrator;
use stateweave::refresh::RefreshBus;
use stateweave::types::FullDiff;

/// Everything a backend-facing command needs
pub struct Context {
    pub config: Config,
    pub api: Arc<dyn StateApi>,
    pub store: Arc<MetadataStore>,
    pub notifier: Arc<dyn Notifier>,
    pub json: bool,
}

impl Context {
    pub fn new(
        config: Config,
        offline: Option<&Path>,
        json: bool,
        quiet: bool,
        color: bool,
    ) -> Result<Self> {
        let api: Arc<dyn StateApi> = match offline {
            Some(path) => Arc::new(load_fixture(path)?),
            None => Arc::new(
                HttpApi::from_config(&config).context("Failed to build HTTP client")?,
            ),
        };
        let notifier: Arc<dyn Notifier> = if json || quiet {
            Arc::new(LogNotifier)
        } else {
            Arc::new(ConsoleNotifier::new(color))
        };
        Ok(Self {
            store: Arc::new(MetadataStore::new(Arc::clone(&api))),
            config,
            api,
            notifier,
            json,
        })
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&self.api),
            RefreshBus::new(),
            Arc::clone(&self.notifier),
        )
    }

    /// Containers to operate on: explicit list, then graph, then config
    pub fn scope(&self, explicit: &[String], graph: Option<&ContainerGraph>) -> Vec<String> {
        if !explicit.is_empty() {
            return explicit.to_vec();
        }
        match graph {
            Some(g) if !g.is_empty() => g.container_ids(),
            _ => self.config.container_ids.clone(),
        }
    }
}

/// Raw diff for a pair; a failed comparison is logged and yields an empty diff
pub async fn fetch_diff(ctx: &Context, source: &str, target: &str, scope: &[String]) -> FullDiff {
    ctx.api
        .compare_states(source, target, scope)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to compare {} -> {}: {}", source, target, e);
            FullDiff::new()
        })
}

/// Load an optional container graph snapshot
pub fn load_graph(path: Option<&Path>) -> Result<Option<ContainerGraph>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph snapshot {}", path.display()))?;
    let graph = ContainerGraph::from_json(&json)
        .with_context(|| format!("Failed to parse graph snapshot {}", path.display()))?;
    tracing::debug!(
        "Loaded {} containers and {} positions",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(Some(graph))
}

/// In-memory backend from a fixture file; changes last for this run only
fn load_fixture(path: &Path) -> Result<MemoryApi> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    let fixture: Fixture = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse fixture {}", path.display()))?;
    tracing::info!("Using offline backend from {}", path.display());
    Ok(MemoryApi::from_fixture(fixture))
}
