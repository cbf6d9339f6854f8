mod client;
mod gateway;
mod model;

pub use client::{ErrorKind, FolioClient, FolioError};
pub use gateway::Gateway;
pub use model::{
    BatchFailure, BatchSummary, BatchUpload, FileMetadataPatch, FileRecord, FolderRecord,
    NewFolder, UploadFile, UploadedFile, parse_size_text,
};
pub use reqwest::StatusCode;
