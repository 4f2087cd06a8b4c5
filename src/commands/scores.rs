// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Per-container scores against a base state

use super::Context;
use anyhow::Result;

pub async fn run(ctx: &Context, base: &str) -> Result<()> {
    let scores = ctx.orchestrator().state_scores(base).await;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&scores)?);
        return Ok(());
    }
    if scores.is_empty() {
        println!("No scores against '{base}'");
        return Ok(());
    }

    let mut ranked: Vec<_> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (id, score) in ranked {
        println!("{id:<24} {score:>10.2}");
    }
    Ok(())
}
