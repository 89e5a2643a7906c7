//! Per-bucket key arena.
//!
//! [`ObjectStore`] maps each key to a [`VersionChain`] behind its own mutex.
//! The outer `BTreeMap` keeps keys sorted for listing and is locked only long
//! enough to find or insert an entry, so writers to different keys never
//! contend. A chain that becomes empty is marked detached and removed; a
//! writer that locked a detached chain looks the key up again.
//!
//! Lock order: a key mutex may be held while taking the map lock, never the
//! reverse.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use super::object::{ObjectVersion, S3Object};
use super::version::VersionChain;
use crate::error::S3ServiceResult;

type KeyEntry = Mutex<VersionChain>;

// ---------------------------------------------------------------------------
// List result types
// ---------------------------------------------------------------------------

/// Result of a `ListObjects` page.
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    /// Current objects in key order.
    pub objects: Vec<S3Object>,
    /// Common prefixes when a delimiter is used.
    pub common_prefixes: Vec<String>,
    /// Whether more entries follow.
    pub is_truncated: bool,
    /// Last key or prefix returned, set when truncated.
    pub next_marker: Option<String>,
}

/// Result of a `ListObjectVersions` page.
#[derive(Debug, Clone, Default)]
pub struct VersionListResult {
    /// Versions and delete markers, keys ascending then newest first.
    pub versions: Vec<VersionListEntry>,
    /// Common prefixes when a delimiter is used.
    pub common_prefixes: Vec<String>,
    /// Whether more entries follow.
    pub is_truncated: bool,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Version-id marker for the next page.
    pub next_version_id_marker: Option<String>,
}

/// A single entry in a version listing.
#[derive(Debug, Clone)]
pub struct VersionListEntry {
    /// The version or delete marker.
    pub version: ObjectVersion,
    /// Whether this is the latest entry of its key.
    pub is_latest: bool,
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// Key to version-chain arena of one bucket.
#[derive(Debug, Default)]
pub struct ObjectStore {
    keys: RwLock<BTreeMap<String, Arc<KeyEntry>>>,
    stamps: AtomicU64,
}

impl ObjectStore {
    /// Run `f` against the chain of `key` inside the key's critical section.
    ///
    /// A successful `f` stamps the chain with a new generation. A chain left
    /// empty is removed from the store whether or not `f` succeeded.
    pub fn mutate<R, F>(&self, key: &str, f: F) -> S3ServiceResult<R>
    where
        F: FnOnce(&mut VersionChain) -> S3ServiceResult<R>,
    {
        loop {
            let entry = self.entry(key);
            let mut chain = entry.lock();
            if chain.detached {
                continue;
            }

            let result = f(&mut chain);
            if result.is_ok() {
                chain.set_generation(self.stamps.fetch_add(1, Ordering::Relaxed) + 1);
            }
            if chain.is_empty() {
                chain.detached = true;
                self.remove_entry(key, &entry);
            }
            return result;
        }
    }

    /// Run `f` against a snapshot view of `key`'s chain. Returns `None` when
    /// the key holds no versions.
    pub fn read<R>(&self, key: &str, f: impl FnOnce(&VersionChain) -> R) -> Option<R> {
        let entry = self.keys.read().get(key).cloned()?;
        let chain = entry.lock();
        if chain.detached || chain.is_empty() {
            return None;
        }
        Some(f(&chain))
    }

    /// Generation of `key`'s chain, `None` when the key is absent.
    #[must_use]
    pub fn generation(&self, key: &str) -> Option<u64> {
        self.read(key, VersionChain::generation)
    }

    /// The current object of `key`.
    #[must_use]
    pub fn current(&self, key: &str) -> Option<S3Object> {
        self.read(key, |chain| chain.current().cloned()).flatten()
    }

    /// Number of keys holding at least one version or delete marker.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether no key holds any version.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// List current objects in key order.
    ///
    /// Keys whose latest entry is a delete marker are invisible. With a
    /// delimiter, keys sharing the segment up to the first delimiter after
    /// `prefix` roll up into one common prefix, which counts toward
    /// `max_keys`.
    #[must_use]
    pub fn list_objects(
        &self,
        prefix: &str,
        delimiter: &str,
        start_after: &str,
        max_keys: usize,
    ) -> ListResult {
        let mut result = ListResult::default();
        let mut count = 0usize;

        for (key, entry) in self.entries_from(prefix, start_after) {
            if key.as_str() <= start_after {
                continue;
            }
            let Some(object) = current_of(&entry) else {
                continue;
            };

            if let Some(cp) = common_prefix(&key, prefix, delimiter) {
                if cp.as_str() <= start_after || result.common_prefixes.last() == Some(&cp) {
                    continue;
                }
                if count == max_keys {
                    result.is_truncated = true;
                    break;
                }
                result.next_marker = Some(cp.clone());
                result.common_prefixes.push(cp);
            } else {
                if count == max_keys {
                    result.is_truncated = true;
                    break;
                }
                result.next_marker = Some(key);
                result.objects.push(object);
            }
            count += 1;
        }

        if !result.is_truncated {
            result.next_marker = None;
        }
        result
    }

    /// List every version and delete marker.
    ///
    /// An empty `version_id_marker` resumes after `key_marker` entirely;
    /// otherwise listing resumes inside `key_marker` after that version.
    #[must_use]
    pub fn list_object_versions(
        &self,
        prefix: &str,
        delimiter: &str,
        key_marker: &str,
        version_id_marker: &str,
        max_keys: usize,
    ) -> VersionListResult {
        let mut result = VersionListResult::default();
        let mut count = 0usize;

        'keys: for (key, entry) in self.entries_from(prefix, key_marker) {
            if key == key_marker && version_id_marker.is_empty() {
                continue;
            }
            let versions = versions_of(&entry);
            if versions.is_empty() {
                continue;
            }

            if let Some(cp) = common_prefix(&key, prefix, delimiter) {
                if cp.as_str() <= key_marker || result.common_prefixes.last() == Some(&cp) {
                    continue;
                }
                if count == max_keys {
                    result.is_truncated = true;
                    break;
                }
                result.next_key_marker = Some(cp.clone());
                result.next_version_id_marker = None;
                result.common_prefixes.push(cp);
                count += 1;
                continue;
            }

            let skip = if key == key_marker {
                versions
                    .iter()
                    .position(|e| e.version.version_id() == version_id_marker)
                    .map_or(versions.len(), |pos| pos + 1)
            } else {
                0
            };

            for entry in versions.into_iter().skip(skip) {
                if count == max_keys {
                    result.is_truncated = true;
                    break 'keys;
                }
                result.next_key_marker = Some(key.clone());
                result.next_version_id_marker = Some(entry.version.version_id().to_owned());
                result.versions.push(entry);
                count += 1;
            }
        }

        if !result.is_truncated {
            result.next_key_marker = None;
            result.next_version_id_marker = None;
        }
        result
    }

    fn entry(&self, key: &str) -> Arc<KeyEntry> {
        if let Some(entry) = self.keys.read().get(key) {
            return Arc::clone(entry);
        }
        Arc::clone(self.keys.write().entry(key.to_owned()).or_default())
    }

    fn remove_entry(&self, key: &str, entry: &Arc<KeyEntry>) {
        let mut keys = self.keys.write();
        if keys.get(key).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            keys.remove(key);
        }
    }

    /// Clone the handles of every key under `prefix` at or after `marker`
    /// so no key mutex is taken while the map lock is held.
    fn entries_from(&self, prefix: &str, marker: &str) -> Vec<(String, Arc<KeyEntry>)> {
        let start = if marker > prefix { marker } else { prefix };
        self.keys
            .read()
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key.clone(), Arc::clone(entry)))
            .collect()
    }
}

fn current_of(entry: &KeyEntry) -> Option<S3Object> {
    let chain = entry.lock();
    if chain.detached {
        return None;
    }
    chain.current().cloned()
}

fn versions_of(entry: &KeyEntry) -> Vec<VersionListEntry> {
    let chain = entry.lock();
    if chain.detached {
        return Vec::new();
    }
    chain
        .newest_first()
        .enumerate()
        .map(|(idx, version)| VersionListEntry {
            version: version.clone(),
            is_latest: idx == 0,
        })
        .collect()
}

fn common_prefix(key: &str, prefix: &str, delimiter: &str) -> Option<String> {
    if delimiter.is_empty() {
        return None;
    }
    let rest = &key[prefix.len()..];
    rest.find(delimiter)
        .map(|pos| key[..prefix.len() + pos + delimiter.len()].to_owned())
}
