// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Apply, revert and state lifecycle against the live graph
//!
//! Every mutating call here produces exactly one notice: success, failure, or
//! an informational "nothing to do". Successful mutations ask dependent views
//! to refresh.

use crate::api::StateApi;
use crate::error::{Error, Result};
use crate::notify::{Notice, Notifier};
use crate::refresh::{RefreshBus, RefreshKind};
use crate::session::SelectedDiff;
use crate::types::{diff_is_empty, diff_len, FullDiff, BASE_STATE};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Result of an apply or revert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The backend accepted the changes
    Done,
    /// The diff was empty; nothing was sent
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Apply,
    Revert,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Revert => "revert",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Self::Apply => "Applied",
            Self::Revert => "Reverted",
        }
    }
}

/// Pushes diffs into the live graph and manages saved states
pub struct Orchestrator {
    api: Arc<dyn StateApi>,
    bus: RefreshBus,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Wire an orchestrator to a backend, a refresh bus and a notifier
    pub fn new(api: Arc<dyn StateApi>, bus: RefreshBus, notifier: Arc<dyn Notifier>) -> Self {
        Self { api, bus, notifier }
    }

    /// Refresh bus this orchestrator signals on
    #[must_use]
    pub fn bus(&self) -> &RefreshBus {
        &self.bus
    }

    /// Apply `diff` to the live graph toward `target_state`
    pub async fn apply(
        &self,
        container_ids: &[String],
        diff: &FullDiff,
        target_state: &str,
    ) -> Result<Outcome> {
        self.push(Action::Apply, container_ids, diff, target_state).await
    }

    /// Revert `diff` from the live graph relative to `target_state`
    pub async fn revert(
        &self,
        container_ids: &[String],
        diff: &FullDiff,
        target_state: &str,
    ) -> Result<Outcome> {
        self.push(Action::Revert, container_ids, diff, target_state).await
    }

    /// Apply a committed selection toward its own target state
    pub async fn apply_selected(&self, container_ids: &[String], selected: &SelectedDiff) -> Result<Outcome> {
        self.apply(container_ids, &selected.diff, &selected.target_state)
            .await
    }

    /// Revert a committed selection relative to its own target state
    pub async fn revert_selected(&self, container_ids: &[String], selected: &SelectedDiff) -> Result<Outcome> {
        self.revert(container_ids, &selected.diff, &selected.target_state)
            .await
    }

    async fn push(
        &self,
        action: Action,
        container_ids: &[String],
        diff: &FullDiff,
        target_state: &str,
    ) -> Result<Outcome> {
        if diff_is_empty(diff) {
            self.notifier
                .notify(Notice::info(format!("Nothing to {}", action.verb())));
            return Ok(Outcome::Nothing);
        }

        let result = match action {
            Action::Apply => {
                self.api
                    .apply_differences(container_ids, diff, target_state)
                    .await
            }
            Action::Revert => {
                self.api
                    .revert_differences(container_ids, diff, target_state)
                    .await
            }
        };

        match result {
            Ok(()) => {
                let message = format!(
                    "{} {} changes ({})",
                    action.past(),
                    diff_len(diff),
                    target_state
                );
                info!("{}", message);
                self.notifier.notify(Notice::success(message));
                self.bus.request(RefreshKind::Differences);
                Ok(Outcome::Done)
            }
            Err(e) => {
                error!("Failed to {} differences: {}", action.verb(), e);
                self.notifier.notify(Notice::failure(format!(
                    "Failed to {} differences: {e}",
                    action.verb()
                )));
                Err(e)
            }
        }
    }

    /// Make `name` the live state, optionally saving the current one first
    ///
    /// When `save_current_as` is given and that save fails, nothing is loaded.
    pub async fn switch_state(&self, name: &str, save_current_as: Option<&str>) -> Result<()> {
        if let Some(current) = save_current_as {
            if let Err(e) = self.api.save_state(current).await {
                self.notifier.notify(Notice::failure(format!(
                    "Could not save '{current}' before switching: {e}"
                )));
                return Err(e);
            }
        }

        match self.api.load_state(name).await {
            Ok(()) => {
                info!("Switched to state {}", name);
                self.notifier
                    .notify(Notice::success(format!("Switched to state '{name}'")));
                self.bus.request(RefreshKind::StateSwitched);
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .notify(Notice::failure(format!("Failed to switch to '{name}': {e}")));
                Err(e)
            }
        }
    }

    /// Save the live graph as `name`
    pub async fn save_state(&self, name: &str) -> Result<()> {
        match self.api.save_state(name).await {
            Ok(()) => {
                self.notifier
                    .notify(Notice::success(format!("Saved state '{name}'")));
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .notify(Notice::failure(format!("Failed to save '{name}': {e}")));
                Err(e)
            }
        }
    }

    /// Delete a saved state; `base` is refused before any request
    pub async fn delete_state(&self, name: &str) -> Result<()> {
        if name == BASE_STATE {
            let e = Error::ReservedState(name.to_string());
            self.notifier.notify(Notice::failure(e.to_string()));
            return Err(e);
        }
        match self.api.delete_state(name).await {
            Ok(()) => {
                self.notifier
                    .notify(Notice::success(format!("Deleted state '{name}'")));
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .notify(Notice::failure(format!("Failed to delete '{name}': {e}")));
                Err(e)
            }
        }
    }

    /// Saved state names; empty if the backend cannot be reached
    pub async fn list_states(&self) -> Vec<String> {
        self.api.list_states().await.unwrap_or_else(|e| {
            error!("Failed to list states: {}", e);
            Vec::new()
        })
    }

    /// Per-container scores against `base_state`; empty on failure
    pub async fn state_scores(&self, base_state: &str) -> BTreeMap<String, f64> {
        self.api
            .calculate_state_scores(base_state)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to calculate scores against {}: {}", base_state, e);
                BTreeMap::new()
            })
    }
}
