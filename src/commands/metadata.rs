// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Transition metadata commands

use super::{fetch_diff, Context};
use crate::{DirectionArg, MetadataAction};
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Arc;
use stateweave::notify::Notice;
use stateweave::session::DiffSession;
use stateweave::types::{Direction, TransitionMetadata};

pub async fn run(ctx: &Context, action: MetadataAction) -> Result<()> {
    match action {
        MetadataAction::List => list(ctx).await,
        MetadataAction::Get { container, target, transition, direction } => {
            let direction = match direction {
                DirectionArg::Add => Direction::Add,
                DirectionArg::Change => Direction::Change,
                DirectionArg::Remove => Direction::Remove,
            };
            let record = ctx
                .store
                .get_for(&container, &target, &transition, direction)
                .await;
            print_record(ctx, &record)
        }
        MetadataAction::Set {
            source,
            target_state,
            container,
            target,
            weight,
            qual_label,
            notes,
        } => {
            let patch = TransitionMetadata { weight, qual_label, notes };
            if patch.is_empty() {
                bail!("Nothing to set. Use --weight, --qual-label or --notes");
            }
            set(ctx, &source, &target_state, &container, &target, &patch).await
        }
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let metadata = ctx.store.load().await;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&*metadata)?);
        return Ok(());
    }
    if metadata.is_empty() {
        println!("No transition metadata");
        return Ok(());
    }
    for (key, record) in metadata.iter() {
        println!(
            "{key}: weight={} qual_label={} notes={}",
            record.weight.as_deref().unwrap_or("-"),
            record.qual_label.as_deref().unwrap_or("-"),
            record.notes.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

/// Edit through a diff session so the key is derived from the live record
async fn set(
    ctx: &Context,
    source: &str,
    target_state: &str,
    container: &str,
    target: &str,
    patch: &TransitionMetadata,
) -> Result<()> {
    let scope = vec![container.to_string()];
    let raw = fetch_diff(ctx, source, target_state, &scope).await;

    let session = DiffSession::new(Arc::clone(&ctx.store), HashMap::new());
    if session.open_raw(source, target_state, &raw).await.is_none() {
        bail!("Diff session was superseded while loading");
    }

    match session.edit_metadata(container, target, patch).await {
        Ok(merged) => {
            ctx.notifier
                .notify(Notice::success(format!("Saved metadata for {container}-{target}")));
            session.cancel();
            print_record(ctx, &merged)
        }
        Err(e) => {
            ctx.notifier
                .notify(Notice::failure(format!("Failed to save metadata: {e}")));
            session.cancel();
            Err(e.into())
        }
    }
}

fn print_record(ctx: &Context, record: &TransitionMetadata) -> Result<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        println!("weight:     {}", record.weight.as_deref().unwrap_or("-"));
        println!("qual_label: {}", record.qual_label.as_deref().unwrap_or("-"));
        println!("notes:      {}", record.notes.as_deref().unwrap_or("-"));
    }
    Ok(())
}
