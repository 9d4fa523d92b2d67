use std::collections::HashSet;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::document::{record_key, Collections};

/// How a downloaded document combines with the local collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Overwrite local collections wholesale.
    Replace,
    /// Keep local entries and append remote entries whose key is new.
    Append,
}

impl std::fmt::Display for MergeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeMode::Replace => f.write_str("replace"),
            MergeMode::Append => f.write_str("append"),
        }
    }
}

/// Append `remote` to `local`, skipping items whose key was already seen.
///
/// Local items are kept verbatim and in order, remote-only items follow in
/// their original order. A remote key seen twice is only taken once. Items
/// for which `key_of` returns `None` are never treated as duplicates.
pub fn merge_by_key<T, K, F>(local: Vec<T>, remote: Vec<T>, key_of: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> Option<K>,
{
    let mut seen: HashSet<K> = local.iter().filter_map(&key_of).collect();
    let mut merged = local;
    merged.reserve(remote.len());
    for item in remote {
        match key_of(&item) {
            Some(key) => {
                if seen.insert(key) {
                    merged.push(item);
                }
            }
            None => merged.push(item),
        }
    }
    merged
}

impl Collections {
    /// Combine these (local) collections with `remote` according to `mode`.
    pub fn merged(self, remote: Collections, mode: MergeMode) -> Collections {
        match mode {
            MergeMode::Replace => remote,
            MergeMode::Append => Collections {
                prompts: merge_by_key(self.prompts, remote.prompts, record_key),
                categories: merge_by_key(self.categories, remote.categories, record_key),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_keeps_local_first_and_drops_remote_duplicates() {
        let local = vec![json!({"id": "a"}), json!({"id": "b", "v": "local"})];
        let remote = vec![json!({"id": "b", "v": "remote"}), json!({"id": "c"})];
        let merged = merge_by_key(local, remote, record_key);
        assert_eq!(
            merged,
            vec![
                json!({"id": "a"}),
                json!({"id": "b", "v": "local"}),
                json!({"id": "c"})
            ]
        );
    }

    #[test]
    fn append_deduplicates_within_remote() {
        let merged = merge_by_key(
            vec![],
            vec![json!({"id": "x", "n": 1}), json!({"id": "x", "n": 2})],
            record_key,
        );
        assert_eq!(merged, vec![json!({"id": "x", "n": 1})]);
    }

    #[test]
    fn keyless_items_are_always_kept() {
        let merged = merge_by_key(
            vec![json!({"title": "a"})],
            vec![json!({"title": "a"}), json!({"title": "b"})],
            record_key,
        );
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn generic_keys_work_for_plain_values() {
        let merged = merge_by_key(vec![1, 2, 3], vec![3, 4, 1, 5], |n| Some(*n));
        assert_eq!(merged, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn replace_returns_remote_exactly() {
        let local = Collections::new(vec![json!({"id": "a"})], vec![json!({"id": "c1"})]);
        let remote = Collections::new(vec![json!({"id": "z"})], vec![]);
        assert_eq!(local.merged(remote.clone(), MergeMode::Replace), remote);
    }

    #[test]
    fn append_applies_to_both_collections() {
        let local = Collections::new(vec![json!({"id": "a"})], vec![json!({"id": "c1"})]);
        let remote = Collections::new(
            vec![json!({"id": "a"}), json!({"id": "b"})],
            vec![json!({"id": "c2"}), json!({"id": "c1"})],
        );
        let merged = local.merged(remote, MergeMode::Append);
        assert_eq!(merged.prompts, vec![json!({"id": "a"}), json!({"id": "b"})]);
        assert_eq!(
            merged.categories,
            vec![json!({"id": "c1"}), json!({"id": "c2"})]
        );
    }
}
