// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Apply and revert a diff file

use super::Context;
use anyhow::{Context as _, Result};
use std::io::Read;
use std::path::Path;
use stateweave::types::FullDiff;

/// Which way the diff is pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Apply,
    Revert,
}

/// Run apply or revert
pub async fn run(
    ctx: &Context,
    mode: Mode,
    file: &Path,
    target: &str,
    containers: Vec<String>,
) -> Result<()> {
    let diff = read_diff(file)?;

    // The diff's own containers are the natural scope
    let scope = if containers.is_empty() {
        diff.keys().cloned().collect()
    } else {
        containers
    };

    let orchestrator = ctx.orchestrator();
    match mode {
        Mode::Apply => orchestrator.apply(&scope, &diff, target).await?,
        Mode::Revert => orchestrator.revert(&scope, &diff, target).await?,
    };
    Ok(())
}

fn read_diff(file: &Path) -> Result<FullDiff> {
    let json = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read diff from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read diff {}", file.display()))?
    };
    serde_json::from_str(&json).with_context(|| format!("Invalid diff in {}", file.display()))
}
