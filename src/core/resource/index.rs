use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::model::{IndexKey, Resource, ResourceDomain};
use crate::core::fs::FileId;

/// Lookup by the first identity that is set: hash, then URI, then the
/// (device, inode) of a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
    pub hash: Option<String>,
    pub uri: Option<String>,
    pub file: Option<FileId>,
}

/// Multi-key, in-memory index over every known resource.
///
/// Records live once, under their content hash; every other key (URIs,
/// source files, stored path) points at a hash. `add` and `remove` touch the whole
/// key set of a record in one call, so a caller holding the index lock never
/// observes a partially indexed resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    by_hash: BTreeMap<String, Arc<Resource>>,
    keys: HashMap<IndexKey, String>,
}

impl ResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut index = Self::new();
        for resource in resources {
            index.add(resource);
        }
        index
    }

    /// Insert or supersede a record. Returns the record it replaced.
    ///
    /// Keys shared with other records move to the new one, except a source
    /// file key, which stays with the record that saw the file last.
    pub fn add(&mut self, resource: impl Into<Arc<Resource>>) -> Option<Arc<Resource>> {
        let resource = resource.into();
        let new_keys = resource.keys();

        let previous = self.remove(&resource.hash);
        for key in new_keys {
            if let IndexKey::File(id) = &key {
                if self.file_seen_later_elsewhere(*id, &resource) {
                    continue;
                }
            }
            self.keys.insert(key, resource.hash.clone());
        }
        self.by_hash.insert(resource.hash.clone(), resource);
        previous
    }

    /// Remove a record and every key that still points at it.
    pub fn remove(&mut self, hash: &str) -> Option<Arc<Resource>> {
        let resource = self.by_hash.remove(hash)?;
        for key in resource.keys() {
            if self.keys.get(&key).is_some_and(|owner| owner == hash) {
                self.keys.remove(&key);
            }
        }
        Some(resource)
    }

    fn file_seen_later_elsewhere(&self, id: FileId, resource: &Resource) -> bool {
        let Some(owner) = self
            .keys
            .get(&IndexKey::File(id))
            .and_then(|hash| self.by_hash.get(hash))
        else {
            return false;
        };
        match (owner.source_file(id), resource.source_file(id)) {
            (Some(theirs), Some(ours)) => theirs.modified > ours.modified,
            _ => false,
        }
    }

    pub fn get(&self, key: &IndexKey) -> Option<Arc<Resource>> {
        let hash = match key {
            IndexKey::Hash(hash) => hash,
            other => self.keys.get(other)?,
        };
        self.by_hash.get(hash).cloned()
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<Arc<Resource>> {
        self.by_hash.get(hash).cloned()
    }

    pub fn query(&self, query: &ResourceQuery) -> Option<Arc<Resource>> {
        let candidates = [
            query.hash.clone().map(IndexKey::Hash),
            query.uri.clone().map(IndexKey::Uri),
            query.file.map(IndexKey::File),
        ];
        candidates
            .into_iter()
            .flatten()
            .find_map(|key| self.get(&key))
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.by_hash.values()
    }

    pub fn in_domain(&self, domain: ResourceDomain) -> impl Iterator<Item = &Arc<Resource>> {
        self.by_hash.values().filter(move |r| r.domain == domain)
    }

    /// Every key currently pointing at `hash`, sorted.
    pub fn keys_of(&self, hash: &str) -> Vec<IndexKey> {
        let mut keys: Vec<IndexKey> = self
            .keys
            .iter()
            .filter(|(_, owner)| owner.as_str() == hash)
            .map(|(key, _)| key.clone())
            .collect();
        if self.by_hash.contains_key(hash) {
            keys.push(IndexKey::Hash(hash.to_string()));
        }
        keys.sort();
        keys.dedup();
        keys
    }
}
