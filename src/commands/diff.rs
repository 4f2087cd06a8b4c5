// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Single-pair diff inspection, selection and push

use super::{fetch_diff, load_graph, Context};
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use stateweave::notify::Notice;
use stateweave::session::{DiffContext, DiffSession};
use stateweave::summary::NO_CONTAINERS;

/// Selection and push options for `diff`
#[derive(Debug, Default)]
pub struct DiffArgs {
    /// Entries to deselect
    pub exclude: Vec<String>,
    /// Entries to keep; everything else is deselected
    pub only: Vec<String>,
    /// Push the selection forward
    pub apply: bool,
    /// Push the selection backward
    pub revert: bool,
}

pub async fn run(
    ctx: &Context,
    source: &str,
    target: &str,
    containers: &[String],
    graph: Option<PathBuf>,
    args: DiffArgs,
) -> Result<()> {
    let graph = load_graph(graph.as_deref())?;
    let names = graph.as_ref().map(|g| g.name_by_id()).unwrap_or_default();
    let scope = ctx.scope(containers, graph.as_ref());
    if scope.is_empty() {
        ctx.notifier.notify(Notice::info(NO_CONTAINERS));
        return Ok(());
    }

    let raw = fetch_diff(ctx, source, target, &scope).await;

    let session = DiffSession::new(std::sync::Arc::clone(&ctx.store), names);
    if session.open_raw(source, target, &raw).await.is_none() {
        bail!("Diff session was superseded while loading");
    }

    if !args.only.is_empty() {
        session.set_all(false)?;
        session.set_selection(&keys(&args.only, true))?;
    } else if !args.exclude.is_empty() {
        session.set_selection(&keys(&args.exclude, false))?;
    }

    let entries = session.entries();
    if !ctx.json {
        println!("{source} -> {target}");
        println!("{}", "-".repeat(60));
        if entries.is_empty() {
            println!("  No differences");
        }
        let selection = session.selection_map();
        for entry in &entries {
            let mark = if selection.get(&entry.key).copied().unwrap_or(false) { "x" } else { " " };
            println!("  [{mark}] {:<24} {}", entry.key, entry.description);
        }
    }

    let context = DiffContext::new();
    let selected = session.commit(&context)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&selected.diff)?);
    }

    let orchestrator = ctx.orchestrator();
    if args.apply {
        orchestrator.apply_selected(&scope, &selected).await?;
    } else if args.revert {
        orchestrator.revert_selected(&scope, &selected).await?;
    }
    Ok(())
}

fn keys(list: &[String], value: bool) -> HashMap<String, bool> {
    list.iter().map(|k| (k.clone(), value)).collect()
}
