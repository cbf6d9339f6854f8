use std::fmt;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use thiserror::Error;
use url::Url;

use crate::model::{
    BatchUpload, FileMetadataPatch, FileRecord, FolderRecord, NewFolder, UploadFile,
    UploadedFile, WireBatchUpload, WireFile, WireFolder, WireUploadOne,
};

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum FolioError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("base url cannot carry a path: {0}")]
    BaseUrl(String),
    #[error("api returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("api rejected request: {0}")]
    Rejected(String),
    #[error("api response missing data")]
    MissingData,
    #[error("failed to read upload source: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure taxonomy shared by every caller of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Auth,
    NotFound,
    Conflict,
    Transport,
    Unknown,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "authorization",
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transport => "transport",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone)]
pub struct FolioClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl FolioClient {
    pub fn new(token: impl Into<String>) -> Result<Self, FolioError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, FolioError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(FolioError::BaseUrl(base_url.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn list_folders(&self) -> Result<Vec<FolderRecord>, FolioError> {
        let url = self.endpoint(&["api", "folders"])?;
        let response = self.authorized(self.http.get(url)).send().await?;
        let folders: Vec<WireFolder> = Self::expect_data(response).await?;
        Ok(folders.into_iter().map(WireFolder::into_record).collect())
    }

    pub async fn list_files_in_folder(
        &self,
        folder_id: &str,
    ) -> Result<Vec<FileRecord>, FolioError> {
        let url = self.endpoint(&["api", "folders", folder_id, "files"])?;
        let response = self.authorized(self.http.get(url)).send().await?;
        let files: Vec<WireFile> = Self::expect_data(response).await?;
        Ok(files
            .into_iter()
            .map(|file| file.into_record(Some(folder_id)))
            .collect())
    }

    pub async fn create_folder(&self, folder: &NewFolder) -> Result<FolderRecord, FolioError> {
        let url = self.endpoint(&["api", "folders"])?;
        let response = self
            .authorized(self.http.post(url))
            .json(folder)
            .send()
            .await?;
        let created: WireFolder = Self::expect_data(response).await?;
        Ok(created.into_record())
    }

    pub async fn delete_folder(&self, folder_id: &str) -> Result<(), FolioError> {
        let url = self.endpoint(&["api", "folders", folder_id])?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        Self::handle_envelope::<IgnoredAny>(response).await?;
        Ok(())
    }

    pub async fn upload_one(
        &self,
        file: &UploadFile,
        folder_id: &str,
        description: &str,
    ) -> Result<UploadedFile, FolioError> {
        let url = self.endpoint(&["api", "files", "upload"])?;
        let form = Form::new()
            .part("file", file_part(file)?)
            .text("folderId", folder_id.to_string())
            .text("description", description.to_string());
        let response = self
            .authorized(self.http.post(url))
            .multipart(form)
            .send()
            .await?;
        let uploaded: WireUploadOne = Self::expect_data(response).await?;
        Ok(uploaded.into_uploaded(folder_id))
    }

    pub async fn upload_many(
        &self,
        files: &[UploadFile],
        folder_id: &str,
        description: &str,
    ) -> Result<BatchUpload, FolioError> {
        let url = self.endpoint(&["api", "files", "upload-multiple"])?;
        let mut form = Form::new();
        for file in files {
            form = form.part("files", file_part(file)?);
        }
        let form = form
            .text("folderId", folder_id.to_string())
            .text("description", description.to_string());
        let response = self
            .authorized(self.http.post(url))
            .multipart(form)
            .send()
            .await?;
        let batch: WireBatchUpload = Self::expect_data(response).await?;
        Ok(batch.into_batch(folder_id))
    }

    pub async fn update_file_metadata(
        &self,
        file_id: &str,
        patch: &FileMetadataPatch,
    ) -> Result<FileRecord, FolioError> {
        let url = self.endpoint(&["api", "files", file_id])?;
        let response = self
            .authorized(self.http.patch(url))
            .json(patch)
            .send()
            .await?;
        let updated: WireFile = Self::expect_data(response).await?;
        Ok(updated.into_record(None))
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), FolioError> {
        let url = self.endpoint(&["api", "files", file_id])?;
        let response = self.authorized(self.http.delete(url)).send().await?;
        Self::handle_envelope::<IgnoredAny>(response).await?;
        Ok(())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FolioError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FolioError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn expect_data<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FolioError> {
        Self::handle_envelope(response)
            .await?
            .ok_or(FolioError::MissingData)
    }

    async fn handle_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Option<T>, FolioError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FolioError::Api {
                status,
                message: error_message(&body, status),
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let envelope: Envelope<T> = response.json().await?;
        if !envelope.success {
            return Err(FolioError::Rejected(
                envelope
                    .message
                    .or(envelope.error)
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }
        Ok(envelope.data)
    }
}

impl FolioError {
    pub fn classification(&self) -> ErrorKind {
        match self {
            FolioError::Api { status, .. } => classify_api_status(*status),
            FolioError::Request(err) if err.is_decode() => ErrorKind::Unknown,
            FolioError::Request(err) => err
                .status()
                .map(classify_api_status)
                .unwrap_or(ErrorKind::Transport),
            FolioError::Rejected(message) => classify_message(message),
            FolioError::Io(_) => ErrorKind::Validation,
            FolioError::Url(_) | FolioError::BaseUrl(_) | FolioError::MissingData => {
                ErrorKind::Unknown
            }
        }
    }

    /// Short reason suitable for showing next to a failed item.
    pub fn reason(&self) -> String {
        match self {
            FolioError::Api { message, .. } => message.clone(),
            FolioError::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

fn classify_api_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorKind::Validation,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Auth,
        StatusCode::NOT_FOUND | StatusCode::GONE => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::Conflict,
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Transport,
        _ => ErrorKind::Unknown,
    }
}

fn classify_message(message: &str) -> ErrorKind {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("not found") {
        ErrorKind::NotFound
    } else if lowered.contains("already exists") || lowered.contains("duplicate") {
        ErrorKind::Conflict
    } else if lowered.contains("unauthorized") || lowered.contains("forbidden") {
        ErrorKind::Auth
    } else if lowered.contains("required") || lowered.contains("invalid") {
        ErrorKind::Validation
    } else {
        ErrorKind::Unknown
    }
}

fn error_message(body: &str, status: StatusCode) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(message) = parsed.message.or(parsed.error)
    {
        return message;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_ascii_lowercase()
}

fn file_part(file: &UploadFile) -> Result<Part, FolioError> {
    Ok(Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str(&file.mime_type)?)
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
    error: Option<String>,
}
