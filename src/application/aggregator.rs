//! Grouping, merge and dedup of catalog entries and fetch outcomes

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::warn;

use super::scheduler::FetchOutcome;
use crate::domain::catalog::{MergedEntry, RawEntry};
use crate::domain::identifier::TitleId;

/// Entries grouped by resolved title ID, groups in first-resolution order
#[derive(Debug, Clone, Default)]
pub struct TitleGroups {
    groups: Vec<(TitleId, Vec<RawEntry>)>,
    index: HashMap<TitleId, usize>,
}

impl TitleGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: TitleId, entry: RawEntry) {
        match self.index.get(&id) {
            Some(&slot) => self.groups[slot].1.push(entry),
            None => {
                self.index.insert(id.clone(), self.groups.len());
                self.groups.push((id, vec![entry]));
            }
        }
    }

    /// Distinct IDs, first-resolution order
    pub fn ids(&self) -> Vec<TitleId> {
        self.groups.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn get(&self, id: &TitleId) -> Option<&[RawEntry]> {
        self.index.get(id).map(|&slot| self.groups[slot].1.as_slice())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|(_, entries)| entries.len()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TitleId, Vec<RawEntry>)> {
        self.groups.iter()
    }
}

/// Every entry of a group gets a clone of its ID's update list. An ID with no
/// outcome gets an empty list.
pub fn merge(groups: TitleGroups, outcomes: &HashMap<TitleId, FetchOutcome>) -> Vec<MergedEntry> {
    let mut merged = Vec::with_capacity(groups.entry_count());
    for (id, entries) in groups.groups {
        let updates = outcomes
            .get(&id)
            .map(|outcome| outcome.updates.clone())
            .unwrap_or_default();
        for entry in entries {
            merged.push(MergedEntry::new(id.clone(), entry, updates.clone()));
        }
    }
    merged
}

/// Hash of the canonical JSON form (object keys sorted)
///
/// Key order comes from `serde_json::Map` being a `BTreeMap`. If the
/// `preserve_order` feature ever gets enabled in the dependency graph, keys
/// must be sorted here explicitly; the key must never depend on insertion order.
pub fn canonical_key<T: Serialize>(item: &T) -> Option<blake3::Hash> {
    let value = serde_json::to_value(item).ok()?;
    let bytes = serde_json::to_vec(&value).ok()?;
    Some(blake3::hash(&bytes))
}

/// Drop exact duplicates, keeping the first occurrence and the original order.
pub fn dedup_exact<T: Serialize>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        match canonical_key(&item) {
            Some(key) => {
                if seen.insert(key) {
                    kept.push(item);
                }
            }
            None => {
                warn!("Record could not be serialized for dedup; keeping it");
                kept.push(item);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scheduler::OutcomeClass;
    use crate::domain::catalog::fields;
    use crate::domain::update::{UpdateKind, UpdateRecord};
    use proptest::prelude::*;

    fn id(s: &str) -> TitleId {
        TitleId::parse(s).unwrap()
    }

    fn entry(title: &str, disc: &str) -> RawEntry {
        RawEntry::from_fields([(fields::TITLE, title), (fields::DISC_ID, disc)])
    }

    fn outcome(title_id: TitleId, urls: &[&str]) -> FetchOutcome {
        FetchOutcome {
            title_id,
            updates: urls
                .iter()
                .map(|u| UpdateRecord::new(UpdateKind::Primary, Some("01.00".into()), (*u).into(), None, None))
                .collect(),
            http_status: Some(200),
            class: OutcomeClass::Fetched,
            attempts: 1,
        }
    }

    #[test]
    fn test_groups_keep_first_resolution_order() {
        let mut groups = TitleGroups::new();
        groups.push(id("BBBB00002"), entry("b", ""));
        groups.push(id("AAAA00001"), entry("a", ""));
        groups.push(id("BBBB00002"), entry("b2", ""));

        assert_eq!(groups.ids(), vec![id("BBBB00002"), id("AAAA00001")]);
        assert_eq!(groups.get(&id("BBBB00002")).unwrap().len(), 2);
        assert_eq!(groups.entry_count(), 3);
    }

    #[test]
    fn test_merge_broadcasts_identical_lists() {
        let mut groups = TitleGroups::new();
        groups.push(id("BLUS30443"), entry("Disc 1", "BLUS30443"));
        groups.push(id("NPEB00001"), entry("Other", ""));
        groups.push(id("BLUS30443"), entry("Disc 1 (alt)", "blus-30443"));

        let mut outcomes = HashMap::new();
        outcomes.insert(id("BLUS30443"), outcome(id("BLUS30443"), &["http://cdn/a.pkg", "http://cdn/b.pkg"]));

        let merged = merge(groups, &outcomes);
        let titles: Vec<&str> = merged.iter().map(|m| m.entry.display_title()).collect();
        assert_eq!(titles, vec!["Disc 1", "Disc 1 (alt)", "Other"]);

        assert_eq!(merged[0].updates, merged[1].updates);
        assert_eq!(
            serde_json::to_vec(&merged[0].updates).unwrap(),
            serde_json::to_vec(&merged[1].updates).unwrap()
        );
        assert_eq!(merged[0].updates.len(), 2);
        // no outcome for the ID: empty list, entry still present
        assert!(merged[2].updates.is_empty());
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let merged = vec![
            MergedEntry::new(id("AAAA00001"), entry("x", "AAAA00001"), Vec::new()),
            MergedEntry::new(id("AAAA00001"), entry("y", "AAAA00001"), Vec::new()),
            MergedEntry::new(id("AAAA00001"), entry("x", "AAAA00001"), Vec::new()),
        ];
        let deduped = dedup_exact(merged);
        let titles: Vec<&str> = deduped.iter().map(|m| m.entry.display_title()).collect();
        assert_eq!(titles, vec!["x", "y"]);
    }

    #[test]
    fn test_canonical_key_ignores_field_insertion_order() {
        let a = RawEntry::from_fields([(fields::TITLE, "t"), (fields::REGION, "EU")]);
        let b = RawEntry::from_fields([(fields::REGION, "EU"), (fields::TITLE, "t")]);
        assert_eq!(canonical_key(&a), canonical_key(&b));
    }

    #[test]
    fn test_canonical_key_sorts_object_keys() {
        let zzz_first = serde_json::json!({ "ZZZ": "1", "TITLE": "t", "NFO": "n", "updates": [] });
        let nfo_first = serde_json::json!({ "NFO": "n", "updates": [], "TITLE": "t", "ZZZ": "1" });
        assert_eq!(canonical_key(&zzz_first), canonical_key(&nfo_first));

        let bytes = serde_json::to_vec(&serde_json::to_value(&zzz_first).unwrap()).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"NFO":"n","TITLE":"t","ZZZ":"1","updates":[]}"#
        );
    }

    proptest! {
        #[test]
        fn prop_dedup_is_idempotent(titles in proptest::collection::vec("[a-c]{0,2}", 0..24)) {
            let merged: Vec<MergedEntry> = titles
                .iter()
                .map(|t| MergedEntry::new(id("ABCD12345"), entry(t, "ABCD12345"), Vec::new()))
                .collect();
            let once = dedup_exact(merged);
            let twice = dedup_exact(once.clone());
            prop_assert_eq!(&once, &twice);

            let distinct: HashSet<&String> = titles.iter().collect();
            prop_assert_eq!(once.len(), distinct.len());
        }
    }
}
