use std::sync::Arc;

use folio_core::{
    FileMetadataPatch, FileRecord, FolderRecord, FolioError, Gateway, NewFolder, UploadFile,
};
use tracing::{debug, info, warn};

use crate::error::DocsError;
use crate::state::SharedState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpload {
    pub file_name: String,
    pub error: DocsError,
}

/// Per-file account of one upload call. Partial failure is a normal outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOutcome {
    pub succeeded: Vec<FileRecord>,
    pub failed: Vec<FailedUpload>,
}

impl UploadOutcome {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_total_failure(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }

    /// e.g. "3 of 5 files uploaded"
    pub fn summary(&self) -> String {
        format!(
            "{} of {} files uploaded",
            self.succeeded.len(),
            self.total()
        )
    }

    fn all_failed(files: &[UploadFile], error: &DocsError) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: files
                .iter()
                .map(|file| FailedUpload {
                    file_name: file.file_name.clone(),
                    error: error.clone(),
                })
                .collect(),
        }
    }
}

/// Runs mutations against the gateway and reconciles local state with the
/// result: the affected folder's cache entry is invalidated and the document
/// list is updated only after the server confirmed the change.
pub struct UploadOrchestrator {
    gateway: Arc<dyn Gateway>,
    state: SharedState,
}

impl UploadOrchestrator {
    pub fn new(gateway: Arc<dyn Gateway>, state: SharedState) -> Self {
        Self { gateway, state }
    }

    /// Uploads one file and puts the returned record at the top of the
    /// document list, whatever the active filter.
    pub async fn upload_single(
        &self,
        file: &UploadFile,
        folder_id: &str,
        description: &str,
    ) -> Result<FileRecord, DocsError> {
        let folder_id = require_folder(folder_id)?;
        let uploaded = self
            .gateway
            .upload_one(file, folder_id, description)
            .await
            .map_err(|err| report_failure("upload", &file.file_name, err))?;

        let mut adopted = self.adopt(folder_id, vec![uploaded.file]).await;
        let record = adopted.remove(0);
        info!(
            file_id = %record.id,
            folder_id,
            size_bytes = uploaded.size_bytes,
            "file uploaded"
        );
        Ok(record)
    }

    /// Sends the whole set in one gateway call. Every accepted item is put at
    /// the top of the document list, whatever the active filter. A failure
    /// of the call itself is reported as every item failed with the same
    /// error.
    pub async fn upload_batch(
        &self,
        files: &[UploadFile],
        folder_id: &str,
        description: &str,
    ) -> UploadOutcome {
        if files.is_empty() {
            return UploadOutcome::default();
        }
        let folder_id = match require_folder(folder_id) {
            Ok(folder_id) => folder_id,
            Err(err) => return UploadOutcome::all_failed(files, &err),
        };

        let batch = match self.gateway.upload_many(files, folder_id, description).await {
            Ok(batch) => batch,
            Err(err) => {
                let error = report_failure("batch upload", folder_id, err);
                return UploadOutcome::all_failed(files, &error);
            }
        };

        if batch.summary.successful != batch.successful.len()
            || batch.summary.failed != batch.failed.len()
        {
            debug!(
                reported_ok = batch.summary.successful,
                reported_failed = batch.summary.failed,
                "batch summary disagrees with item lists, using item lists"
            );
        }

        let failed = batch
            .failed
            .into_iter()
            .map(|item| FailedUpload {
                error: DocsError::from_reason(item.reason),
                file_name: item.file_name,
            })
            .collect();
        let succeeded = if batch.successful.is_empty() {
            Vec::new()
        } else {
            self.adopt(folder_id, batch.successful).await
        };

        let outcome = UploadOutcome { succeeded, failed };
        if outcome.is_complete_success() {
            info!(folder_id, "{}", outcome.summary());
        } else {
            warn!(folder_id, failed = outcome.failed.len(), "{}", outcome.summary());
        }
        outcome
    }

    /// Picks the single-file endpoint for one file and the batch endpoint
    /// for more.
    pub async fn upload(
        &self,
        files: Vec<UploadFile>,
        folder_id: &str,
        description: &str,
    ) -> UploadOutcome {
        match files.as_slice() {
            [] => UploadOutcome::default(),
            [file] => match self.upload_single(file, folder_id, description).await {
                Ok(record) => UploadOutcome {
                    succeeded: vec![record],
                    failed: Vec::new(),
                },
                Err(error) => UploadOutcome {
                    succeeded: Vec::new(),
                    failed: vec![FailedUpload {
                        file_name: file.file_name.clone(),
                        error,
                    }],
                },
            },
            _ => self.upload_batch(&files, folder_id, description).await,
        }
    }

    /// Deletes the file while holding its busy mark. A second call for the
    /// same id while the first is running fails with a conflict.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), DocsError> {
        let file_id = require_id(file_id, "file id")?;
        let _busy = self.state.busy.try_acquire(file_id).ok_or_else(|| {
            DocsError::conflict(format!("file {file_id} is already being deleted"))
        })?;

        let folder_id = self.folder_of(file_id).await;
        self.gateway
            .delete_file(file_id)
            .await
            .map_err(|err| report_failure("delete", file_id, err))?;

        let mut cache = self.state.cache.write().await;
        if let Some(folder_id) = &folder_id {
            cache.invalidate(folder_id);
        }
        self.state.view.write().await.remove_document(file_id);
        info!(file_id, folder_id = folder_id.as_deref().unwrap_or(""), "file deleted");
        Ok(())
    }

    /// Applies `patch` on the server and returns the server's record, which
    /// also replaces the listed one. The file's folder entry is invalidated
    /// so the next read reconciles.
    pub async fn update_file(
        &self,
        file_id: &str,
        patch: FileMetadataPatch,
    ) -> Result<FileRecord, DocsError> {
        let file_id = require_id(file_id, "file id")?;
        if patch.is_empty() {
            return Err(DocsError::validation("nothing to update"));
        }

        let previous_folder = self.folder_of(file_id).await;
        let mut updated = self
            .gateway
            .update_file_metadata(file_id, &patch)
            .await
            .map_err(|err| report_failure("update", file_id, err))?;

        let mut cache = self.state.cache.write().await;
        if let Some(folder_id) = &previous_folder {
            cache.invalidate(folder_id);
        }
        if !updated.folder_id.is_empty()
            && previous_folder.as_deref() != Some(updated.folder_id.as_str())
        {
            cache.invalidate(&updated.folder_id);
        }
        self.state.registry.read().await.decorate(&mut updated);
        let listed = self
            .state
            .view
            .write()
            .await
            .update_document(file_id, |record| take_server_fields(record, &updated))
            .is_some();

        debug!(file_id, listed, "file metadata updated");
        Ok(updated)
    }

    pub async fn create_folder(&self, new_folder: NewFolder) -> Result<FolderRecord, DocsError> {
        if new_folder.name.trim().is_empty() {
            return Err(DocsError::validation("folder name is required"));
        }
        let folder = self
            .gateway
            .create_folder(&new_folder)
            .await
            .map_err(|err| report_failure("create folder", &new_folder.name, err))?;

        self.state.registry.write().await.insert(folder.clone());
        info!(folder_id = %folder.id, name = %folder.name, "folder created");
        Ok(folder)
    }

    /// Deletes the folder and forgets everything known about it locally.
    pub async fn delete_folder(&self, folder_id: &str) -> Result<(), DocsError> {
        let folder_id = require_id(folder_id, "folder id")?;
        self.gateway
            .delete_folder(folder_id)
            .await
            .map_err(|err| report_failure("delete folder", folder_id, err))?;

        let mut cache = self.state.cache.write().await;
        cache.invalidate(folder_id);
        self.state.registry.write().await.remove(folder_id);
        let removed = self
            .state
            .view
            .write()
            .await
            .remove_folder_documents(folder_id);
        drop(cache);
        info!(folder_id, documents = removed, "folder deleted");
        Ok(())
    }

    /// Invalidates the folder's entry, fills in folder context and puts the
    /// records at the top of the document list.
    async fn adopt(&self, folder_id: &str, mut records: Vec<FileRecord>) -> Vec<FileRecord> {
        let mut cache = self.state.cache.write().await;
        cache.invalidate(folder_id);
        {
            let registry = self.state.registry.read().await;
            for record in &mut records {
                if record.folder_id.is_empty() {
                    record.folder_id = folder_id.to_string();
                }
                registry.decorate(record);
            }
        }
        self.state.view.write().await.prepend(&records);
        drop(cache);
        records
    }

    async fn folder_of(&self, file_id: &str) -> Option<String> {
        let cache = self.state.cache.read().await;
        if let Some(record) = cache.find_file(file_id) {
            return Some(record.folder_id.clone());
        }
        self.state
            .view
            .read()
            .await
            .find(file_id)
            .map(|record| record.folder_id.clone())
    }
}

fn require_folder(folder_id: &str) -> Result<&str, DocsError> {
    require_id(folder_id, "target folder")
}

fn require_id<'a>(id: &'a str, what: &str) -> Result<&'a str, DocsError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(DocsError::validation(format!("{what} is required")));
    }
    Ok(id)
}

fn report_failure(operation: &str, subject: &str, err: FolioError) -> DocsError {
    let err = DocsError::from(err);
    warn!(subject, kind = %err.kind, "{operation} failed: {}", err.message);
    err
}

/// Replaces the listed record with the server's copy, keeping the folder
/// context the server left out.
fn take_server_fields(record: &mut FileRecord, server: &FileRecord) {
    let mut merged = server.clone();
    if merged.folder_id.is_empty() {
        merged.folder_id = std::mem::take(&mut record.folder_id);
    }
    if merged.folder_name.is_empty() {
        merged.folder_name = std::mem::take(&mut record.folder_name);
    }
    if merged.folder_color.is_empty() {
        merged.folder_color = std::mem::take(&mut record.folder_color);
    }
    *record = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheSettings;
    use crate::coordinator::QueryCoordinator;
    use crate::test_support::{FakeGateway, file, upload};
    use crate::view::Filter;
    use folio_core::{ErrorKind, StatusCode};

    struct Harness {
        fake: Arc<FakeGateway>,
        state: SharedState,
        coordinator: QueryCoordinator,
        orchestrator: UploadOrchestrator,
    }

    fn harness() -> Harness {
        let fake = FakeGateway::new();
        let settings = CacheSettings::default();
        let state = SharedState::new(settings.ttl);
        Harness {
            coordinator: QueryCoordinator::new(fake.clone(), state.clone(), settings),
            orchestrator: UploadOrchestrator::new(fake.clone(), state.clone()),
            state,
            fake,
        }
    }

    #[tokio::test]
    async fn batch_with_partial_failure_reports_each_item() {
        let h = harness();
        h.fake.add_folder("F1", "Invoices", vec![]);
        let files = ["a.txt", "bad-1.exe", "b.txt", "bad-2.exe", "c.txt"].map(upload);

        let outcome = h.orchestrator.upload_batch(&files, "F1", "scans").await;

        assert_eq!(h.fake.calls("upload_many"), 1);
        assert_eq!(outcome.succeeded.len(), 3);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.summary(), "3 of 5 files uploaded");
        assert!(!outcome.is_complete_success());
        assert!(!outcome.is_total_failure());
        assert_eq!(outcome.failed[0].file_name, "bad-1.exe");
        assert_eq!(outcome.failed[0].error.message, "File type not allowed");
        assert_eq!(h.state.view.read().await.documents().len(), 3);
    }

    #[tokio::test]
    async fn single_upload_invalidates_and_count_waits_for_next_fetch() {
        let h = harness();
        h.fake
            .add_folder("F1", "Invoices", vec![file("a", "F1", 1), file("b", "F1", 1)]);
        h.coordinator.refresh_folders().await.unwrap();
        h.state
            .view
            .write()
            .await
            .set_filter(Filter::Folder("F1".into()));
        h.coordinator.reload_now().await.unwrap();
        assert_eq!(h.state.view.read().await.documents().len(), 2);

        let record = h
            .orchestrator
            .upload_single(&upload("notes.txt"), "F1", "desc")
            .await
            .unwrap();

        assert_eq!(record.folder_name, "Invoices");
        assert_eq!(record.description, "desc");
        let documents = h.state.view.read().await.documents();
        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0].id, record.id);
        assert!(h.state.cache.read().await.get("F1").is_none());
        assert_eq!(h.state.registry.read().await.get("F1").unwrap().file_count, 2);

        h.coordinator.load_folder("F1", false).await.unwrap();
        assert_eq!(h.fake.calls("list_files:F1"), 2);
        assert_eq!(h.state.registry.read().await.get("F1").unwrap().file_count, 3);
    }

    #[tokio::test]
    async fn upload_is_listed_whatever_the_active_filter() {
        let h = harness();
        h.fake.add_folder("F1", "Invoices", vec![]);
        h.fake.add_folder("F2", "Contracts", vec![]);
        h.coordinator.refresh_folders().await.unwrap();
        h.state
            .view
            .write()
            .await
            .set_filter(Filter::Folder("F2".into()));

        h.orchestrator
            .upload_single(&upload("a.txt"), "F1", "")
            .await
            .unwrap();

        let documents = h.state.view.read().await.documents();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].name, "a.txt");
        assert_eq!(documents[0].folder_name, "Invoices");
    }

    #[tokio::test]
    async fn single_upload_requires_target_folder() {
        let h = harness();

        let err = h
            .orchestrator
            .upload_single(&upload("a.txt"), " ", "")
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(h.fake.calls("upload_one"), 0);
    }

    #[tokio::test]
    async fn failed_batch_call_fails_every_item_with_its_error() {
        let h = harness();
        h.fake.add_folder("F1", "Invoices", vec![]);
        h.fake
            .fail("upload_many", StatusCode::SERVICE_UNAVAILABLE, "gateway down");

        let outcome = h
            .orchestrator
            .upload_batch(&[upload("a.txt"), upload("b.txt")], "F1", "")
            .await;

        assert!(outcome.is_total_failure());
        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome.failed.iter().all(|item| {
            item.error.kind == ErrorKind::Transport && item.error.message == "gateway down"
        }));
        assert!(h.state.view.read().await.documents().is_empty());
    }

    #[tokio::test]
    async fn batch_without_folder_fails_every_item_without_a_call() {
        let h = harness();

        let outcome = h
            .orchestrator
            .upload_batch(&[upload("a.txt"), upload("b.txt")], "", "")
            .await;

        assert_eq!(outcome.failed.len(), 2);
        assert!(outcome
            .failed
            .iter()
            .all(|item| item.error.kind == ErrorKind::Validation));
        assert_eq!(h.fake.calls("upload_many"), 0);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let h = harness();

        let outcome = h.orchestrator.upload_batch(&[], "F1", "").await;

        assert_eq!(outcome.total(), 0);
        assert_eq!(h.fake.calls("upload_many"), 0);
    }

    #[tokio::test]
    async fn upload_picks_endpoint_by_count() {
        let h = harness();
        h.fake.add_folder("F1", "Invoices", vec![]);

        let one = h.orchestrator.upload(vec![upload("a.txt")], "F1", "").await;
        let many = h
            .orchestrator
            .upload(vec![upload("b.txt"), upload("c.txt")], "F1", "")
            .await;

        assert_eq!(h.fake.calls("upload_one"), 1);
        assert_eq!(h.fake.calls("upload_many"), 1);
        assert_eq!(one.succeeded[0].name, "a.txt");
        assert_eq!(many.succeeded.len(), 2);
        assert_eq!(one.succeeded[0].folder_id, many.succeeded[0].folder_id);
    }

    #[tokio::test]
    async fn deleting_missing_file_keeps_record_and_clears_busy_mark() {
        let h = harness();
        h.state
            .view
            .write()
            .await
            .replace_documents(vec![file("gone", "F1", 1)]);

        let err = h.orchestrator.delete_file("gone").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(h.state.view.read().await.find("gone").is_some());
        assert!(!h.state.busy.contains("gone"));
    }

    #[tokio::test]
    async fn delete_removes_record_and_invalidates_folder() {
        let h = harness();
        h.fake
            .add_folder("F1", "Invoices", vec![file("a", "F1", 1), file("b", "F1", 1)]);
        h.coordinator.reload_now().await.unwrap();

        h.orchestrator.delete_file("a").await.unwrap();

        assert!(h.state.view.read().await.find("a").is_none());
        assert!(h.state.cache.read().await.get("F1").is_none());
        assert!(h.state.busy.is_empty());
    }

    #[tokio::test]
    async fn delete_in_progress_is_refused() {
        let h = harness();
        let _held = h.state.busy.try_acquire("a").unwrap();

        let err = h.orchestrator.delete_file("a").await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(h.fake.calls("delete_file"), 0);
    }

    #[tokio::test]
    async fn update_returns_server_record_and_invalidates_folder() {
        let h = harness();
        h.fake.add_folder("F1", "Invoices", vec![file("a", "F1", 1)]);
        h.coordinator.reload_now().await.unwrap();

        let updated = h
            .orchestrator
            .update_file(
                "a",
                FileMetadataPatch {
                    name: Some("  renamed.txt ".into()),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "renamed.txt");
        assert_eq!(updated.folder_name, "Invoices");
        assert_eq!(h.state.view.read().await.find("a").unwrap(), &updated);
        assert!(h.state.cache.read().await.get("F1").is_none());
    }

    #[tokio::test]
    async fn update_rejects_empty_patch() {
        let h = harness();

        let err = h
            .orchestrator
            .update_file("a", FileMetadataPatch::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(h.fake.calls("update_file"), 0);
    }

    #[tokio::test]
    async fn failed_update_leaves_record_untouched() {
        let h = harness();
        h.state
            .view
            .write()
            .await
            .replace_documents(vec![file("a", "F1", 1)]);
        h.fake.fail("update_file", StatusCode::FORBIDDEN, "Forbidden");

        let err = h
            .orchestrator
            .update_file(
                "a",
                FileMetadataPatch {
                    name: Some("x".into()),
                    description: None,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Auth);
        assert_eq!(h.state.view.read().await.find("a").unwrap().name, "a");
    }

    #[tokio::test]
    async fn create_folder_registers_it_and_reports_duplicates() {
        let h = harness();
        h.fake.add_folder("F1", "Invoices", vec![]);
        let new_folder = |name: &str| NewFolder {
            name: name.into(),
            description: None,
            color: "#10b981".into(),
            icon: "folder".into(),
        };

        let created = h.orchestrator.create_folder(new_folder("Receipts")).await.unwrap();
        let duplicate = h
            .orchestrator
            .create_folder(new_folder("Invoices"))
            .await
            .unwrap_err();
        let blank = h.orchestrator.create_folder(new_folder("  ")).await.unwrap_err();

        assert!(h.state.registry.read().await.get(&created.id).is_some());
        assert_eq!(duplicate.kind, ErrorKind::Conflict);
        assert_eq!(blank.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn delete_folder_forgets_local_state() {
        let h = harness();
        h.fake.add_folder("F1", "Invoices", vec![file("a", "F1", 1)]);
        h.fake.add_folder("F2", "Contracts", vec![file("b", "F2", 1)]);
        h.coordinator.reload_now().await.unwrap();

        h.orchestrator.delete_folder("F1").await.unwrap();

        assert!(h.state.registry.read().await.get("F1").is_none());
        assert!(h.state.cache.read().await.get("F1").is_none());
        let documents = h.state.view.read().await.documents();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "b");
    }
}
