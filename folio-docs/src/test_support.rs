use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio_core::{
    BatchFailure, BatchSummary, BatchUpload, FileMetadataPatch, FileRecord, FolderRecord,
    FolioError, Gateway, NewFolder, StatusCode, UploadFile, UploadedFile,
};
use tokio::sync::Notify;

pub(crate) fn file(id: &str, folder_id: &str, size_bytes: u64) -> FileRecord {
    file_at(id, folder_id, size_bytes, 1_700_000_000)
}

pub(crate) fn file_at(id: &str, folder_id: &str, size_bytes: u64, uploaded_at: i64) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        name: id.to_string(),
        mime_type: "text/plain".to_string(),
        size_bytes,
        folder_id: folder_id.to_string(),
        folder_name: String::new(),
        folder_color: String::new(),
        uploaded_at,
        url: format!("/files/{id}"),
        description: String::new(),
    }
}

pub(crate) fn folder(id: &str, name: &str, file_count: u64) -> FolderRecord {
    FolderRecord {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        color: "#3b82f6".to_string(),
        icon: "folder".to_string(),
        file_count,
        total_size_bytes: 0,
    }
}

pub(crate) fn upload(name: &str) -> UploadFile {
    UploadFile::new(name, name.as_bytes().to_vec())
}

/// In-memory stand-in for the record API that counts calls and can be told
/// to fail or to hold folder listings until released.
#[derive(Default)]
pub(crate) struct FakeGateway {
    folders: Mutex<Vec<FolderRecord>>,
    files: Mutex<HashMap<String, Vec<FileRecord>>>,
    calls: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, (StatusCode, String)>>,
    listing_gate: Mutex<Option<Arc<Notify>>>,
    next_id: Mutex<u64>,
}

impl FakeGateway {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add_folder(&self, id: &str, name: &str, files: Vec<FileRecord>) {
        let mut record = folder(id, name, files.len() as u64);
        record.total_size_bytes = files.iter().map(|f| f.size_bytes).sum();
        self.folders.lock().unwrap().push(record);
        self.files.lock().unwrap().insert(id.to_string(), files);
    }

    pub(crate) fn add_server_file(&self, record: FileRecord) {
        self.files
            .lock()
            .unwrap()
            .entry(record.folder_id.clone())
            .or_default()
            .push(record);
    }

    /// Makes every call to `op` fail until [`FakeGateway::recover`] is called.
    pub(crate) fn fail(&self, op: &str, status: StatusCode, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(op.to_string(), (status, message.to_string()));
    }

    pub(crate) fn recover(&self, op: &str) {
        self.failures.lock().unwrap().remove(op);
    }

    pub(crate) fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    /// Folder listings wait for a permit on the returned gate.
    pub(crate) fn hold_listings(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.listing_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    fn record_call(&self, op: &str) -> Result<(), FolioError> {
        *self.calls.lock().unwrap().entry(op.to_string()).or_default() += 1;
        match self.failures.lock().unwrap().get(op) {
            Some((status, message)) => Err(FolioError::Api {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> u64 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }

    fn store_upload(&self, file: &UploadFile, folder_id: &str, description: &str) -> FileRecord {
        let n = self.next_id();
        let record = FileRecord {
            id: format!("up-{n}"),
            name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.bytes.len() as u64,
            folder_id: folder_id.to_string(),
            folder_name: String::new(),
            folder_color: String::new(),
            uploaded_at: 1_800_000_000 + n as i64,
            url: format!("/files/up-{n}"),
            description: description.to_string(),
        };
        self.add_server_file(record.clone());
        record
    }

    fn not_found(message: &str) -> FolioError {
        FolioError::Api {
            status: StatusCode::NOT_FOUND,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn list_folders(&self) -> Result<Vec<FolderRecord>, FolioError> {
        self.record_call("list_folders")?;
        Ok(self.folders.lock().unwrap().clone())
    }

    async fn list_files_in_folder(&self, folder_id: &str) -> Result<Vec<FileRecord>, FolioError> {
        let op = format!("list_files:{folder_id}");
        let gate = self.listing_gate.lock().unwrap().clone();
        *self.calls.lock().unwrap().entry(op.clone()).or_default() += 1;
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some((status, message)) = self.failures.lock().unwrap().get(&op) {
            return Err(FolioError::Api {
                status: *status,
                message: message.clone(),
            });
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .get(folder_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_folder(&self, new_folder: &NewFolder) -> Result<FolderRecord, FolioError> {
        self.record_call("create_folder")?;
        let mut folders = self.folders.lock().unwrap();
        if folders.iter().any(|f| f.name == new_folder.name) {
            return Err(FolioError::Api {
                status: StatusCode::CONFLICT,
                message: "A folder with this name already exists".into(),
            });
        }
        let record = FolderRecord {
            id: format!("F-new-{}", folders.len() + 1),
            name: new_folder.name.clone(),
            description: new_folder.description.clone().unwrap_or_default(),
            color: new_folder.color.clone(),
            icon: new_folder.icon.clone(),
            file_count: 0,
            total_size_bytes: 0,
        };
        folders.push(record.clone());
        Ok(record)
    }

    async fn delete_folder(&self, folder_id: &str) -> Result<(), FolioError> {
        self.record_call("delete_folder")?;
        let mut folders = self.folders.lock().unwrap();
        let before = folders.len();
        folders.retain(|f| f.id != folder_id);
        if folders.len() == before {
            return Err(Self::not_found("Folder not found"));
        }
        self.files.lock().unwrap().remove(folder_id);
        Ok(())
    }

    async fn upload_one(
        &self,
        file: &UploadFile,
        folder_id: &str,
        description: &str,
    ) -> Result<UploadedFile, FolioError> {
        self.record_call("upload_one")?;
        let record = self.store_upload(file, folder_id, description);
        Ok(UploadedFile {
            size_bytes: record.size_bytes,
            file: record,
        })
    }

    /// Files whose name starts with `bad` are rejected per item.
    async fn upload_many(
        &self,
        files: &[UploadFile],
        folder_id: &str,
        description: &str,
    ) -> Result<BatchUpload, FolioError> {
        self.record_call("upload_many")?;
        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for file in files {
            if file.file_name.starts_with("bad") {
                failed.push(BatchFailure {
                    file_name: file.file_name.clone(),
                    reason: "File type not allowed".into(),
                });
            } else {
                successful.push(self.store_upload(file, folder_id, description));
            }
        }
        let summary = BatchSummary {
            successful: successful.len(),
            failed: failed.len(),
        };
        Ok(BatchUpload {
            successful,
            failed,
            summary,
        })
    }

    /// Stored names are trimmed, so the returned record can differ from the
    /// patch that was sent.
    async fn update_file_metadata(
        &self,
        file_id: &str,
        patch: &FileMetadataPatch,
    ) -> Result<FileRecord, FolioError> {
        self.record_call("update_file")?;
        let mut files = self.files.lock().unwrap();
        let record = files
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|f| f.id == file_id)
            .ok_or_else(|| Self::not_found("File not found"))?;
        patch.apply_to(record);
        record.name = record.name.trim().to_string();
        Ok(record.clone())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), FolioError> {
        self.record_call("delete_file")?;
        let mut files = self.files.lock().unwrap();
        let mut removed = false;
        for list in files.values_mut() {
            let before = list.len();
            list.retain(|f| f.id != file_id);
            removed |= list.len() != before;
        }
        if !removed {
            return Err(Self::not_found("File not found"));
        }
        Ok(())
    }
}
