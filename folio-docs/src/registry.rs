use folio_core::{FileRecord, FolderRecord};
use tokio::time::Instant;

use crate::cache::FileCache;

/// Folder metadata, ordered as the API listed it.
///
/// `file_count` and `total_size_bytes` are recomputed from a fresh cache
/// entry whenever one is stored. Without a fresh entry the last known value
/// stays, so an unfetched folder never shows zero files.
#[derive(Debug, Default)]
pub struct FolderRegistry {
    folders: Vec<FolderRecord>,
    loaded: bool,
}

impl FolderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn folders(&self) -> &[FolderRecord] {
        &self.folders
    }

    pub fn get(&self, folder_id: &str) -> Option<&FolderRecord> {
        self.folders.iter().find(|folder| folder.id == folder_id)
    }

    pub fn folder_ids(&self) -> Vec<String> {
        self.folders.iter().map(|folder| folder.id.clone()).collect()
    }

    /// Adopts a fresh folder listing; counts for folders with a fresh cache
    /// entry are taken from the cache rather than from the listing.
    pub fn replace_all(&mut self, folders: Vec<FolderRecord>, cache: &FileCache, now: Instant) {
        self.folders = folders;
        self.loaded = true;
        for folder in &mut self.folders {
            if let Some(entry) = cache.get_fresh(&folder.id, now) {
                folder.file_count = entry.files.len() as u64;
                folder.total_size_bytes = entry.total_size_bytes();
            }
        }
    }

    pub fn insert(&mut self, folder: FolderRecord) {
        match self.folders.iter_mut().find(|existing| existing.id == folder.id) {
            Some(existing) => *existing = folder,
            None => self.folders.push(folder),
        }
    }

    pub fn remove(&mut self, folder_id: &str) -> Option<FolderRecord> {
        let index = self
            .folders
            .iter()
            .position(|folder| folder.id == folder_id)?;
        Some(self.folders.remove(index))
    }

    /// Returns false when the folder is not registered.
    pub fn recompute_from(&mut self, folder_id: &str, files: &[FileRecord]) -> bool {
        let Some(folder) = self
            .folders
            .iter_mut()
            .find(|folder| folder.id == folder_id)
        else {
            return false;
        };
        folder.file_count = files.len() as u64;
        folder.total_size_bytes = files.iter().map(|file| file.size_bytes).sum();
        true
    }

    /// Fills in folder name and colour the API left out of a file payload.
    pub fn decorate(&self, record: &mut FileRecord) {
        let Some(folder) = self.get(&record.folder_id) else {
            return;
        };
        if record.folder_name.is_empty() {
            record.folder_name = folder.name.clone();
        }
        if record.folder_color.is_empty() {
            record.folder_color = folder.color.clone();
        }
    }
}
