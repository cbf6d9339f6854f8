use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use folio_core::FileRecord;
use tokio::time::Instant;

/// Snapshot of one folder's listing. Entries are replaced wholesale, so a
/// reader holding an `Arc<CacheEntry>` never observes a partial update.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub files: Arc<[FileRecord]>,
    pub fetched_at: Instant,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.files.iter().map(|file| file.size_bytes).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Fresh,
    Stale,
}

/// Per-folder listings with a fixed time-to-live.
///
/// The cache only advertises freshness; it never refreshes itself. The
/// "all folders" view is deliberately not stored here, it is merged from the
/// per-folder entries on every read.
#[derive(Debug)]
pub struct FileCache {
    ttl: Duration,
    entries: HashMap<String, Arc<CacheEntry>>,
    // Bumped on every invalidation so fetches that started earlier can
    // detect that their result is already outdated.
    epochs: HashMap<String, u64>,
    generation: u64,
}

impl FileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            epochs: HashMap::new(),
            generation: 0,
        }
    }

    pub fn get(&self, folder_id: &str) -> Option<Arc<CacheEntry>> {
        self.entries.get(folder_id).cloned()
    }

    pub fn get_fresh(&self, folder_id: &str, now: Instant) -> Option<Arc<CacheEntry>> {
        self.entries
            .get(folder_id)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .cloned()
    }

    pub fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        entry.is_fresh(now, self.ttl)
    }

    pub fn freshness(&self, folder_id: &str, now: Instant) -> Freshness {
        match self.entries.get(folder_id) {
            None => Freshness::Missing,
            Some(entry) if entry.is_fresh(now, self.ttl) => Freshness::Fresh,
            Some(_) => Freshness::Stale,
        }
    }

    /// Replaces the folder's entry. `fetched_at` never moves backwards for a
    /// folder that still has an entry.
    pub fn put(
        &mut self,
        folder_id: &str,
        files: Vec<FileRecord>,
        now: Instant,
    ) -> Arc<CacheEntry> {
        let fetched_at = match self.entries.get(folder_id) {
            Some(previous) if previous.fetched_at > now => previous.fetched_at,
            _ => now,
        };
        let entry = Arc::new(CacheEntry {
            files: Arc::from(files),
            fetched_at,
        });
        self.entries.insert(folder_id.to_string(), Arc::clone(&entry));
        entry
    }

    /// Stores the listing only if the folder was not invalidated since
    /// `epoch` was read.
    pub fn put_if_unchanged(
        &mut self,
        folder_id: &str,
        files: Vec<FileRecord>,
        now: Instant,
        epoch: u64,
    ) -> Option<Arc<CacheEntry>> {
        if self.epoch(folder_id) != epoch {
            return None;
        }
        Some(self.put(folder_id, files, now))
    }

    pub fn epoch(&self, folder_id: &str) -> u64 {
        self.generation + self.epochs.get(folder_id).copied().unwrap_or(0)
    }

    /// Drops the folder's entry so the next read has to refetch.
    pub fn invalidate(&mut self, folder_id: &str) -> bool {
        *self.epochs.entry(folder_id.to_string()).or_insert(0) += 1;
        self.entries.remove(folder_id).is_some()
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.entries.clear();
    }

    pub fn find_file(&self, file_id: &str) -> Option<&FileRecord> {
        self.entries
            .values()
            .flat_map(|entry| entry.files.iter())
            .find(|file| file.id == file_id)
    }

    pub fn folder_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
