// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Attach transition metadata to a raw diff

use crate::metadata::MetadataStore;
use crate::types::{generate_key, EnrichedDiff, FullDiff, Metadata};

/// Enrich a diff using the store's metadata (loaded once per call)
pub async fn enrich(store: &MetadataStore, diff: &FullDiff) -> EnrichedDiff {
    let metadata = store.load().await;
    enrich_with(&metadata, diff)
}

/// Enrich a diff against an already-loaded metadata map
///
/// Every record is cloned before metadata is overlaid, so `diff` is left
/// untouched and the result owns all of its data.
#[must_use]
pub fn enrich_with(metadata: &Metadata, diff: &FullDiff) -> EnrichedDiff {
    let enriched = diff
        .iter()
        .map(|(container_id, entry)| {
            let targets = entry
                .iter()
                .map(|(target_id, record)| {
                    let mut copy = record.clone();
                    let key = generate_key(
                        container_id,
                        target_id,
                        &record.transition_label(),
                        record.direction(),
                    );
                    if let Some(meta) = metadata.get(&key).filter(|m| !m.is_empty()) {
                        copy.apply_metadata(meta);
                    }
                    (target_id.clone(), copy)
                })
                .collect();
            (container_id.clone(), targets)
        })
        .collect();
    EnrichedDiff::from_enriched(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeRecord, ChangeStatus, Direction, TransitionMetadata};

    fn sample_diff() -> FullDiff {
        let mut diff = FullDiff::new();
        let entry = diff.entry("C1".to_string()).or_default();
        entry.insert(
            "T1".into(),
            ChangeRecord::new(ChangeStatus::Added)
                .with_relationship("supports")
                .with_current_label(Some("supports")),
        );
        entry.insert(
            "T2".into(),
            ChangeRecord::new(ChangeStatus::Removed).with_base_label(Some("blocks")),
        );
        diff
    }

    #[test]
    fn test_metadata_is_overlaid_on_matching_key() {
        let mut metadata = Metadata::new();
        metadata.insert(
            generate_key("C1", "T1", "None -> supports", Direction::Add),
            TransitionMetadata {
                weight: Some("3".into()),
                qual_label: Some("minor".into()),
                notes: None,
            },
        );

        let enriched = enrich_with(&metadata, &sample_diff());
        let t1 = &enriched.as_diff()["C1"]["T1"];
        assert_eq!(t1.weight.as_deref(), Some("3"));
        assert_eq!(t1.qual_label.as_deref(), Some("minor"));
        assert_eq!(t1.relationship.as_deref(), Some("supports"));
        assert_eq!(enriched.as_diff()["C1"]["T2"].weight, None);
    }

    #[test]
    fn test_wrong_direction_is_no_override() {
        let mut metadata = Metadata::new();
        metadata.insert(
            generate_key("C1", "T1", "None -> supports", Direction::Change),
            TransitionMetadata::weight("7"),
        );
        let enriched = enrich_with(&metadata, &sample_diff());
        assert_eq!(enriched.as_diff()["C1"]["T1"].weight, None);
    }

    #[test]
    fn test_raw_record_fields_survive_partial_metadata() {
        let mut diff = sample_diff();
        diff.get_mut("C1").unwrap().get_mut("T2").unwrap().notes = Some("raw note".into());

        let mut metadata = Metadata::new();
        metadata.insert(
            generate_key("C1", "T2", "blocks -> None", Direction::Remove),
            TransitionMetadata::weight("2"),
        );
        let enriched = enrich_with(&metadata, &diff);
        let t2 = &enriched.as_diff()["C1"]["T2"];
        assert_eq!(t2.weight.as_deref(), Some("2"));
        assert_eq!(t2.notes.as_deref(), Some("raw note"));
    }

    #[test]
    fn test_input_is_not_modified() {
        let diff = sample_diff();
        let before = diff.clone();
        let mut metadata = Metadata::new();
        metadata.insert(
            generate_key("C1", "T1", "None -> supports", Direction::Add),
            TransitionMetadata::weight("3"),
        );
        let _ = enrich_with(&metadata, &diff);
        assert_eq!(diff, before);
    }
}
