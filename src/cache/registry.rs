//! Bidirectional tag index.
//!
//! Tracks which cache keys carry which tags so that a single tag sweep can
//! find every affected entry, and so that deleting an entry can find every
//! tag it has to be removed from.

use std::collections::{HashMap, HashSet};

/// Tracks tag → keys and key → tags mappings.
///
/// The index holds no locks of its own; it lives inside the cache's state and
/// is mutated under the same guard as the entries it describes.
#[derive(Debug, Default)]
pub struct TagIndex {
    /// Maps tags to all keys currently carrying them
    tag_to_keys: HashMap<String, HashSet<String>>,
    /// Maps keys to all tags they were stored with
    key_to_tags: HashMap<String, HashSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under each of `tags`, replacing any previous registration.
    pub fn register(&mut self, key: &str, tags: HashSet<String>) {
        self.unregister(key);

        if tags.is_empty() {
            return;
        }

        for tag in &tags {
            self.tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        self.key_to_tags.insert(key.to_string(), tags);
    }

    /// Remove `key` from every tag it was registered under.
    ///
    /// Tags left without keys are dropped from the index.
    pub fn unregister(&mut self, key: &str) {
        let Some(tags) = self.key_to_tags.remove(key) else {
            return;
        };

        for tag in tags {
            if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_to_keys.remove(&tag);
                }
            }
        }
    }

    /// Remove a tag and return the keys that carried it.
    ///
    /// The returned keys are also unregistered from any other tags, because
    /// the caller is expected to delete those entries.
    pub fn take_tag(&mut self, tag: &str) -> HashSet<String> {
        let keys = self.tag_to_keys.remove(tag).unwrap_or_default();
        for key in &keys {
            self.unregister(key);
        }
        keys
    }

    pub fn keys_for_tag(&self, tag: &str) -> HashSet<String> {
        self.tag_to_keys.get(tag).cloned().unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.tag_to_keys.clear();
        self.key_to_tags.clear();
    }

    /// Number of tags with at least one key.
    pub fn tag_count(&self) -> usize {
        self.tag_to_keys.len()
    }
}
