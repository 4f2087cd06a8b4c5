// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Layers, lowest first: built-in defaults, an optional TOML file, then
//! `STATEWEAVE_*` environment variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "STATEWEAVE";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the state backend API
    pub api_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Containers compared when a command is not given any
    #[serde(default)]
    pub container_ids: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000/api".to_string(),
            timeout_secs: 30,
            log_level: "info".to_string(),
            container_ids: Vec::new(),
        }
    }
}

impl Config {
    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Look up one top-level key, rendered as text
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "api_url" => Some(self.api_url.clone()),
            "timeout_secs" => Some(self.timeout_secs.to_string()),
            "log_level" => Some(self.log_level.clone()),
            "container_ids" => Some(self.container_ids.join(",")),
            _ => None,
        }
    }
}

/// Default config file location, if the platform has one
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "hyperpolymath", "stateweave")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration
///
/// An explicitly given `path` must exist; the default location is optional.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let defaults = config::Config::try_from(&Config::default())
        .map_err(|e| Error::Config(e.to_string()))?;

    let mut builder = config::Config::builder().add_source(defaults);

    match path {
        Some(p) => {
            builder = builder.add_source(config::File::from(p).required(true));
        }
        None => {
            if let Some(p) = default_path() {
                builder = builder.add_source(config::File::from(p).required(false));
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("container_ids"),
    );

    let loaded = builder
        .build()
        .and_then(config::Config::try_deserialize::<Config>)
        .map_err(|e| Error::Config(e.to_string()))?;

    tracing::debug!("Loaded configuration: api_url={}", loaded.api_url);
    Ok(loaded)
}
