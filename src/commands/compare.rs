// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Multi-state comparison

use super::{load_graph, Context};
use crate::Side;
use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use stateweave::graph::comparison_dot;
use stateweave::notify::Notice;
use stateweave::summary::{compare_against, Orientation, PairComparison, NO_CONTAINERS};

pub async fn run(
    ctx: &Context,
    selected: &str,
    against: Vec<String>,
    side: Side,
    containers: &[String],
    graph: Option<PathBuf>,
    dot: bool,
) -> Result<()> {
    let graph = load_graph(graph.as_deref())?;
    let names = graph.as_ref().map(|g| g.name_by_id()).unwrap_or_default();
    let scope = ctx.scope(containers, graph.as_ref());
    if scope.is_empty() {
        ctx.notifier.notify(Notice::info(NO_CONTAINERS));
        return Ok(());
    }

    let states = if against.is_empty() {
        ctx.orchestrator().list_states().await
    } else {
        against
    };

    let orientation = match side {
        Side::Source => Orientation::SelectedIsSource,
        Side::Target => Orientation::SelectedIsTarget,
    };

    let comparisons = compare_against(
        ctx.api.as_ref(),
        &ctx.store,
        selected,
        &states,
        &scope,
        &names,
        orientation,
    )
    .await;

    if dot {
        print!("{}", comparison_dot(selected, &comparisons));
    } else if ctx.json {
        let pairs: Vec<_> = comparisons.iter().map(pair_json).collect();
        println!("{}", serde_json::to_string_pretty(&pairs)?);
    } else {
        print_text(selected, &comparisons);
    }
    Ok(())
}

fn pair_json(pair: &PairComparison) -> serde_json::Value {
    json!({
        "sourceState": pair.source_state,
        "targetState": pair.target_state,
        "label": pair.summary.label(),
        "counts": {
            "added": pair.summary.counts.added,
            "changed": pair.summary.counts.changed,
            "removed": pair.summary.counts.removed,
        },
        "totalWeight": pair.summary.total_weight,
        "qualLabels": pair.summary.qual_labels,
        "descriptions": pair.summary.descriptions,
        "differences": pair.diff,
    })
}

fn print_text(selected: &str, comparisons: &[PairComparison]) {
    if comparisons.is_empty() {
        println!("No differences from '{selected}'");
        return;
    }
    for pair in comparisons {
        println!();
        println!("{} -> {}: {}", pair.source_state, pair.target_state, pair.summary.label());
        println!("{}", "-".repeat(60));
        for line in &pair.summary.descriptions {
            println!("  {line}");
        }
    }
}
