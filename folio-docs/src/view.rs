use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use folio_core::FileRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Folder(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

/// State behind the document screen. The document list is copy-on-write:
/// a snapshot taken with [`ViewModel::documents`] is never modified.
#[derive(Debug, Default)]
pub struct ViewModel {
    documents: Arc<Vec<FileRecord>>,
    filter: Filter,
    view_mode: ViewMode,
}

impl ViewModel {
    pub fn documents(&self) -> Arc<Vec<FileRecord>> {
        Arc::clone(&self.documents)
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
    }

    pub fn find(&self, file_id: &str) -> Option<&FileRecord> {
        self.documents.iter().find(|file| file.id == file_id)
    }

    pub fn replace_documents(&mut self, documents: Vec<FileRecord>) {
        self.documents = Arc::new(documents);
    }

    /// Puts `records` in front of the list, keeping their order. A record
    /// whose id is already listed replaces the old copy.
    pub fn prepend(&mut self, records: &[FileRecord]) {
        if records.is_empty() {
            return;
        }
        let incoming: HashSet<&str> = records.iter().map(|file| file.id.as_str()).collect();
        let mut next = Vec::with_capacity(records.len() + self.documents.len());
        next.extend(records.iter().cloned());
        next.extend(
            self.documents
                .iter()
                .filter(|file| !incoming.contains(file.id.as_str()))
                .cloned(),
        );
        self.documents = Arc::new(next);
    }

    pub fn remove_document(&mut self, file_id: &str) -> Option<FileRecord> {
        let index = self.documents.iter().position(|file| file.id == file_id)?;
        Some(Arc::make_mut(&mut self.documents).remove(index))
    }

    /// Applies `update` to the listed record and returns the updated copy.
    pub fn update_document(
        &mut self,
        file_id: &str,
        update: impl FnOnce(&mut FileRecord),
    ) -> Option<FileRecord> {
        let index = self.documents.iter().position(|file| file.id == file_id)?;
        let documents = Arc::make_mut(&mut self.documents);
        update(&mut documents[index]);
        Some(documents[index].clone())
    }

    pub fn remove_folder_documents(&mut self, folder_id: &str) -> usize {
        let before = self.documents.len();
        if self.documents.iter().any(|file| file.folder_id == folder_id) {
            Arc::make_mut(&mut self.documents).retain(|file| file.folder_id != folder_id);
        }
        before - self.documents.len()
    }
}

/// Ids with a mutation in progress, so the screen can show a busy state and
/// refuse a second submit for the same id.
#[derive(Debug, Clone, Default)]
pub struct BusySet {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl BusySet {
    /// Marks `id` busy until the returned guard is dropped, or returns `None`
    /// when it already is.
    pub fn try_acquire(&self, id: &str) -> Option<BusyGuard> {
        if !self.lock().insert(id.to_string()) {
            return None;
        }
        Some(BusyGuard {
            ids: Arc::clone(&self.ids),
            id: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the busy mark on drop, whichever way the operation ended.
#[derive(Debug)]
pub struct BusyGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

pub(crate) fn sort_newest_first(files: &mut [FileRecord]) {
    files.sort_by(|a, b| {
        b.uploaded_at
            .cmp(&a.uploaded_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
