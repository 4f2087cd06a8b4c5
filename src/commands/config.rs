// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

use anyhow::{bail, Result};
use stateweave::config::Config;

pub fn run(config: &Config, key: Option<&str>, json: bool) -> Result<()> {
    match key {
        Some(k) => match config.get(k) {
            Some(value) => println!("{value}"),
            None => bail!("Unknown configuration key: {}", k),
        },
        None if json => println!("{}", serde_json::to_string_pretty(config)?),
        None => print!("{}", config.to_toml()?),
    }
    Ok(())
}
