// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Diff selection session
//!
//! A session holds the one diff currently under inspection. It starts
//! `Closed`; opening it takes a private working copy of an enriched diff and
//! selects every entry. While open, entries can be toggled and their metadata
//! edited in place. Committing publishes the selected subset to the shared
//! [`DiffContext`]; cancelling discards everything without publishing.
//!
//! Every open, commit and cancel moves the session to a new generation. Work
//! that was started under an older generation (a slow enrichment, a metadata
//! save) checks its [`SessionTicket`] before touching session state and is
//! dropped if the session has moved on.

use crate::enrich::enrich;
use crate::error::{Error, Result};
use crate::metadata::MetadataStore;
use crate::summary::{describe, PairComparison};
use crate::types::{
    selection_key, ChangeRecord, ChangeStatus, EnrichedDiff, FullDiff, TransitionMetadata,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};

/// Identifies one opening of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionTicket(u64);

/// One row of the detail view
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    /// `"containerId-targetId"`
    pub key: String,
    /// Rendered change description
    pub description: String,
    /// Change status
    pub status: ChangeStatus,
    /// Container ID
    pub container_id: String,
    /// Target ID
    pub target_id: String,
}

/// A committed selection, waiting to be applied or reverted
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedDiff {
    /// Source state of the compared pair
    pub source_state: String,
    /// Target state of the compared pair
    pub target_state: String,
    /// Only the selected changes
    pub diff: FullDiff,
}

impl SelectedDiff {
    /// Containers with at least one selected change
    #[must_use]
    pub fn container_ids(&self) -> Vec<String> {
        self.diff.keys().cloned().collect()
    }
}

/// Application-wide slot holding the last committed selection
#[derive(Debug, Clone, Default)]
pub struct DiffContext {
    slot: Arc<RwLock<Option<SelectedDiff>>>,
}

impl DiffContext {
    /// Empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current selection
    pub fn publish(&self, selected: SelectedDiff) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(selected);
    }

    /// Copy of the current selection
    #[must_use]
    pub fn current(&self) -> Option<SelectedDiff> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return the current selection
    #[must_use]
    pub fn take(&self) -> Option<SelectedDiff> {
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

type PairId = (String, String);

struct OpenSession {
    ticket: SessionTicket,
    source_state: String,
    target_state: String,
    working: FullDiff,
    entries: Vec<SessionEntry>,
    selection: HashMap<PairId, bool>,
}

impl OpenSession {
    fn record_mut(&mut self, container_id: &str, target_id: &str) -> Result<&mut ChangeRecord> {
        self.working
            .get_mut(container_id)
            .and_then(|entry| entry.get_mut(target_id))
            .ok_or_else(|| unknown(container_id, target_id))
    }

    fn refresh_description(&mut self, names: &HashMap<String, String>, container_id: &str, target_id: &str) {
        let Some(record) = self
            .working
            .get(container_id)
            .and_then(|entry| entry.get(target_id))
        else {
            return;
        };
        let line = describe(
            display(names, container_id),
            display(names, target_id),
            record,
        );
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.container_id == container_id && e.target_id == target_id)
        {
            entry.description = line;
        }
    }
}

enum Phase {
    Closed,
    Open(OpenSession),
}

/// Interactive inspection of one state pair's diff
pub struct DiffSession {
    store: Arc<MetadataStore>,
    names: HashMap<String, String>,
    phase: Mutex<Phase>,
    generation: AtomicU64,
}

impl std::fmt::Debug for DiffSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffSession")
            .field("open", &self.is_open())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl DiffSession {
    /// Closed session; `names` resolves container IDs for descriptions
    pub fn new(store: Arc<MetadataStore>, names: HashMap<String, String>) -> Self {
        Self {
            store,
            names,
            phase: Mutex::new(Phase::Closed),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Callers hold the phase lock
    fn advance(&self) -> SessionTicket {
        SessionTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_current(&self, ticket: SessionTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// Open on a comparison that is already enriched
    pub fn open(&self, pair: PairComparison) -> SessionTicket {
        let mut phase = self.lock();
        let ticket = self.advance();
        *phase = Phase::Open(self.build(
            ticket,
            pair.source_state,
            pair.target_state,
            pair.diff,
        ));
        ticket
    }

    /// Enrich a raw diff, then open on it
    ///
    /// Returns `None` if the session was opened, committed or cancelled again
    /// while enrichment was in flight; the late result is discarded.
    pub async fn open_raw(
        &self,
        source_state: &str,
        target_state: &str,
        raw: &FullDiff,
    ) -> Option<SessionTicket> {
        let ticket = {
            let _phase = self.lock();
            self.advance()
        };
        let enriched = enrich(&self.store, raw).await;

        let mut phase = self.lock();
        if !self.is_current(ticket) {
            debug!("Discarding stale enrichment for {} -> {}", source_state, target_state);
            return None;
        }
        *phase = Phase::Open(self.build(
            ticket,
            source_state.to_string(),
            target_state.to_string(),
            enriched,
        ));
        Some(ticket)
    }

    fn build(
        &self,
        ticket: SessionTicket,
        source_state: String,
        target_state: String,
        diff: EnrichedDiff,
    ) -> OpenSession {
        let working = diff.into_inner();
        let mut entries = Vec::new();
        let mut selection = HashMap::new();
        for (container_id, entry) in &working {
            for (target_id, record) in entry {
                entries.push(SessionEntry {
                    key: selection_key(container_id, target_id),
                    description: describe(
                        display(&self.names, container_id),
                        display(&self.names, target_id),
                        record,
                    ),
                    status: record.status,
                    container_id: container_id.clone(),
                    target_id: target_id.clone(),
                });
                selection.insert((container_id.clone(), target_id.clone()), true);
            }
        }
        debug!(
            "Opened diff session {} -> {} with {} entries",
            source_state,
            target_state,
            entries.len()
        );
        OpenSession {
            ticket,
            source_state,
            target_state,
            working,
            entries,
            selection,
        }
    }

    /// True while a diff is loaded
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(*self.lock(), Phase::Open(_))
    }

    /// Ticket of the open session
    #[must_use]
    pub fn ticket(&self) -> Option<SessionTicket> {
        match &*self.lock() {
            Phase::Open(open) => Some(open.ticket),
            Phase::Closed => None,
        }
    }

    /// `(source, target)` state names of the open session
    #[must_use]
    pub fn pair(&self) -> Option<(String, String)> {
        match &*self.lock() {
            Phase::Open(open) => Some((open.source_state.clone(), open.target_state.clone())),
            Phase::Closed => None,
        }
    }

    /// Rows for display, in stable order
    #[must_use]
    pub fn entries(&self) -> Vec<SessionEntry> {
        match &*self.lock() {
            Phase::Open(open) => open.entries.clone(),
            Phase::Closed => Vec::new(),
        }
    }

    /// Current working record for one entry
    #[must_use]
    pub fn record(&self, container_id: &str, target_id: &str) -> Option<ChangeRecord> {
        match &*self.lock() {
            Phase::Open(open) => open
                .working
                .get(container_id)
                .and_then(|entry| entry.get(target_id))
                .cloned(),
            Phase::Closed => None,
        }
    }

    /// Whether one entry is selected
    #[must_use]
    pub fn is_selected(&self, container_id: &str, target_id: &str) -> Option<bool> {
        match &*self.lock() {
            Phase::Open(open) => open
                .selection
                .get(&(container_id.to_string(), target_id.to_string()))
                .copied(),
            Phase::Closed => None,
        }
    }

    /// Selection by display key
    #[must_use]
    pub fn selection_map(&self) -> BTreeMap<String, bool> {
        match &*self.lock() {
            Phase::Open(open) => open
                .entries
                .iter()
                .map(|e| {
                    let selected = open
                        .selection
                        .get(&(e.container_id.clone(), e.target_id.clone()))
                        .copied()
                        .unwrap_or(false);
                    (e.key.clone(), selected)
                })
                .collect(),
            Phase::Closed => BTreeMap::new(),
        }
    }

    /// Flip one entry; returns its new value
    pub fn toggle(&self, container_id: &str, target_id: &str) -> Result<bool> {
        let mut phase = self.lock();
        let Phase::Open(open) = &mut *phase else {
            return Err(Error::SessionClosed);
        };
        let slot = open
            .selection
            .get_mut(&(container_id.to_string(), target_id.to_string()))
            .ok_or_else(|| unknown(container_id, target_id))?;
        *slot = !*slot;
        Ok(*slot)
    }

    /// Apply a `"containerId-targetId" -> bool` map; unknown keys are ignored
    pub fn set_selection(&self, keys: &HashMap<String, bool>) -> Result<()> {
        let mut phase = self.lock();
        let Phase::Open(open) = &mut *phase else {
            return Err(Error::SessionClosed);
        };
        for entry in &open.entries {
            if let Some(&value) = keys.get(&entry.key) {
                open.selection
                    .insert((entry.container_id.clone(), entry.target_id.clone()), value);
            }
        }
        Ok(())
    }

    /// Select or deselect everything
    pub fn set_all(&self, selected: bool) -> Result<()> {
        let mut phase = self.lock();
        let Phase::Open(open) = &mut *phase else {
            return Err(Error::SessionClosed);
        };
        open.selection.values_mut().for_each(|v| *v = selected);
        Ok(())
    }

    /// Edit one entry's weight, label or notes and persist it
    ///
    /// The working copy and its description change immediately. The store
    /// write happens without holding the session lock, so toggles keep
    /// working meanwhile. If the write fails, the fields this patch set are
    /// restored (when the session is still the same one and no later edit
    /// has overwritten them) and the error is returned.
    pub async fn edit_metadata(
        &self,
        container_id: &str,
        target_id: &str,
        patch: &TransitionMetadata,
    ) -> Result<TransitionMetadata> {
        let (ticket, previous, label, direction) = {
            let mut phase = self.lock();
            let Phase::Open(open) = &mut *phase else {
                return Err(Error::SessionClosed);
            };
            let record = open.record_mut(container_id, target_id)?;
            let previous = record.clone();
            let label = record.transition_label();
            let direction = record.direction();
            record.apply_metadata(patch);
            open.refresh_description(&self.names, container_id, target_id);
            (open.ticket, previous, label, direction)
        };

        let result = self
            .store
            .update_for(container_id, target_id, &label, direction, patch)
            .await;

        if result.is_err() && self.is_current(ticket) {
            if let Phase::Open(open) = &mut *self.lock() {
                if let Ok(record) = open.record_mut(container_id, target_id) {
                    revert_fields(record, &previous, patch);
                }
                open.refresh_description(&self.names, container_id, target_id);
            }
        }
        result
    }

    /// Publish the selected entries and close
    pub fn commit(&self, context: &DiffContext) -> Result<SelectedDiff> {
        let open = {
            let mut phase = self.lock();
            match std::mem::replace(&mut *phase, Phase::Closed) {
                Phase::Open(open) => {
                    self.advance();
                    open
                }
                Phase::Closed => return Err(Error::SessionClosed),
            }
        };

        let selection = &open.selection;
        let diff = filter_by(&open.working, |c, t| {
            selection
                .get(&(c.to_string(), t.to_string()))
                .copied()
                .unwrap_or(false)
        });
        let selected = SelectedDiff {
            source_state: open.source_state,
            target_state: open.target_state,
            diff,
        };
        info!(
            "Committed {} of {} changes for {} -> {}",
            crate::types::diff_len(&selected.diff),
            open.entries.len(),
            selected.source_state,
            selected.target_state
        );
        context.publish(selected.clone());
        Ok(selected)
    }

    /// Close without publishing; returns whether a session was open
    ///
    /// Metadata edits made while open are already persisted and stay.
    pub fn cancel(&self) -> bool {
        let mut phase = self.lock();
        self.advance();
        matches!(std::mem::replace(&mut *phase, Phase::Closed), Phase::Open(_))
    }
}

/// Keep only entries whose `"containerId-targetId"` value is `true`
///
/// Containers left with no targets are dropped.
#[must_use]
pub fn filter_diff(diff: &FullDiff, selection: &HashMap<String, bool>) -> FullDiff {
    filter_by(diff, |c, t| {
        selection
            .get(&selection_key(c, t))
            .copied()
            .unwrap_or(false)
    })
}

fn filter_by(diff: &FullDiff, keep: impl Fn(&str, &str) -> bool) -> FullDiff {
    diff.iter()
        .filter_map(|(container_id, entry)| {
            let kept: BTreeMap<_, _> = entry
                .iter()
                .filter(|(target_id, _)| keep(container_id, target_id))
                .map(|(target_id, record)| (target_id.clone(), record.clone()))
                .collect();
            (!kept.is_empty()).then(|| (container_id.clone(), kept))
        })
        .collect()
}

/// Undo one patch, leaving fields a later edit has since changed
fn revert_fields(record: &mut ChangeRecord, previous: &ChangeRecord, patch: &TransitionMetadata) {
    let undo = |field: &mut Option<String>, before: &Option<String>, set: &Option<String>| {
        if set.is_some() && field == set {
            field.clone_from(before);
        }
    };
    undo(&mut record.weight, &previous.weight, &patch.weight);
    undo(&mut record.qual_label, &previous.qual_label, &patch.qual_label);
    undo(&mut record.notes, &previous.notes, &patch.notes);
}

fn display<'a>(names: &'a HashMap<String, String>, id: &'a str) -> &'a str {
    names.get(id).map_or(id, String::as_str)
}

fn unknown(container_id: &str, target_id: &str) -> Error {
    Error::UnknownEntry {
        container_id: container_id.to_string(),
        target_id: target_id.to_string(),
    }
}
