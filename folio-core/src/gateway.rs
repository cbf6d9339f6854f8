use async_trait::async_trait;

use crate::client::{FolioClient, FolioError};
use crate::model::{
    BatchUpload, FileMetadataPatch, FileRecord, FolderRecord, NewFolder, UploadFile,
    UploadedFile,
};

/// Remote folder/file API as consumed by the document cache and upload
/// orchestration. Every call is fallible; implementations must report an
/// unsuccessful envelope as an error rather than as data.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn list_folders(&self) -> Result<Vec<FolderRecord>, FolioError>;

    async fn list_files_in_folder(&self, folder_id: &str) -> Result<Vec<FileRecord>, FolioError>;

    async fn create_folder(&self, folder: &NewFolder) -> Result<FolderRecord, FolioError>;

    async fn delete_folder(&self, folder_id: &str) -> Result<(), FolioError>;

    async fn upload_one(
        &self,
        file: &UploadFile,
        folder_id: &str,
        description: &str,
    ) -> Result<UploadedFile, FolioError>;

    /// One request for the whole set; the server reports per-item results.
    async fn upload_many(
        &self,
        files: &[UploadFile],
        folder_id: &str,
        description: &str,
    ) -> Result<BatchUpload, FolioError>;

    async fn update_file_metadata(
        &self,
        file_id: &str,
        patch: &FileMetadataPatch,
    ) -> Result<FileRecord, FolioError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), FolioError>;
}

#[async_trait]
impl Gateway for FolioClient {
    async fn list_folders(&self) -> Result<Vec<FolderRecord>, FolioError> {
        FolioClient::list_folders(self).await
    }

    async fn list_files_in_folder(&self, folder_id: &str) -> Result<Vec<FileRecord>, FolioError> {
        FolioClient::list_files_in_folder(self, folder_id).await
    }

    async fn create_folder(&self, folder: &NewFolder) -> Result<FolderRecord, FolioError> {
        FolioClient::create_folder(self, folder).await
    }

    async fn delete_folder(&self, folder_id: &str) -> Result<(), FolioError> {
        FolioClient::delete_folder(self, folder_id).await
    }

    async fn upload_one(
        &self,
        file: &UploadFile,
        folder_id: &str,
        description: &str,
    ) -> Result<UploadedFile, FolioError> {
        FolioClient::upload_one(self, file, folder_id, description).await
    }

    async fn upload_many(
        &self,
        files: &[UploadFile],
        folder_id: &str,
        description: &str,
    ) -> Result<BatchUpload, FolioError> {
        FolioClient::upload_many(self, files, folder_id, description).await
    }

    async fn update_file_metadata(
        &self,
        file_id: &str,
        patch: &FileMetadataPatch,
    ) -> Result<FileRecord, FolioError> {
        FolioClient::update_file_metadata(self, file_id, patch).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), FolioError> {
        FolioClient::delete_file(self, file_id).await
    }
}
