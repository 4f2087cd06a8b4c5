// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Saved state lifecycle

use super::Context;
use anyhow::{anyhow, bail, Result};

pub async fn run(
    ctx: &Context,
    action: &str,
    name: Option<String>,
    save_current_as: Option<String>,
) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let need_name = || name.clone().ok_or_else(|| anyhow!("State name is required"));

    match action {
        "list" | "ls" => {
            let states = orchestrator.list_states().await;
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&states)?);
            } else {
                for state in states {
                    println!("{state}");
                }
            }
        }
        "save" => orchestrator.save_state(&need_name()?).await?,
        "switch" | "load" => {
            orchestrator
                .switch_state(&need_name()?, save_current_as.as_deref())
                .await?;
        }
        "delete" | "rm" => orchestrator.delete_state(&need_name()?).await?,
        _ => {
            bail!("Unknown state action: {}. Use list, save, switch, or delete", action);
        }
    }
    Ok(())
}
