use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::client::FolioError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color: String,
    pub icon: String,
    pub file_count: u64,
    pub total_size_bytes: u64,
}

/// A file as seen by the document screen, normalized from whatever shape the
/// API returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub folder_id: String,
    pub folder_name: String,
    pub folder_color: String,
    /// Unix seconds; 0 when the API omitted or mangled the timestamp.
    pub uploaded_at: i64,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFolder {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileMetadataPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FileMetadataPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }

    pub fn apply_to(&self, record: &mut FileRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, FolioError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file: FileRecord,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
}

/// Server-side split of a multi-file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUpload {
    pub successful: Vec<FileRecord>,
    pub failed: Vec<BatchFailure>,
    pub summary: BatchSummary,
}

/// Parses sizes such as `"512 B"`, `"1.5 KB"` or `"2 MB"` into bytes (1024-based).
pub fn parse_size_text(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let number: f64 = number.replace(',', "").parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" | "BYTE" | "BYTES" => 1,
        "K" | "KB" | "KIB" => 1 << 10,
        "M" | "MB" | "MIB" => 1 << 20,
        "G" | "GB" | "GIB" => 1 << 30,
        "T" | "TB" | "TIB" => 1 << 40,
        _ => return None,
    };
    Some((number * multiplier as f64).round() as u64)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Text(value) => value,
            WireId::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireSize {
    Bytes(u64),
    Fractional(f64),
    Text(String),
}

impl WireSize {
    fn to_bytes(&self) -> u64 {
        match self {
            WireSize::Bytes(value) => *value,
            WireSize::Fractional(value) if value.is_finite() && *value >= 0.0 => {
                value.round() as u64
            }
            WireSize::Fractional(_) => 0,
            WireSize::Text(text) => parse_size_text(text).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireTimestamp {
    Text(String),
    Number(i64),
}

impl WireTimestamp {
    fn to_unix_seconds(&self) -> i64 {
        match self {
            WireTimestamp::Text(text) => OffsetDateTime::parse(text, &Rfc3339)
                .map(|parsed| parsed.unix_timestamp())
                .unwrap_or(0),
            // Anything past year 5138 in seconds is really milliseconds.
            WireTimestamp::Number(value) if *value > 100_000_000_000 => value / 1000,
            WireTimestamp::Number(value) => *value,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WireFolderRef {
    id: Option<WireId>,
    name: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireFile {
    id: WireId,
    #[serde(alias = "originalName", alias = "filename")]
    name: Option<String>,
    #[serde(alias = "mimetype")]
    mime_type: Option<String>,
    size: Option<WireSize>,
    folder_id: Option<WireId>,
    folder_name: Option<String>,
    folder_color: Option<String>,
    folder: Option<WireFolderRef>,
    #[serde(alias = "createdAt")]
    uploaded_at: Option<WireTimestamp>,
    url: Option<String>,
    description: Option<String>,
}

impl WireFile {
    /// `fallback_folder` is used when the payload itself does not say which
    /// folder the file lives in.
    pub(crate) fn into_record(self, fallback_folder: Option<&str>) -> FileRecord {
        let nested = self.folder.unwrap_or_default();
        let folder_id = self
            .folder_id
            .or(nested.id)
            .map(WireId::into_string)
            .or_else(|| fallback_folder.map(str::to_string))
            .unwrap_or_default();
        FileRecord {
            id: self.id.into_string(),
            name: self.name.unwrap_or_default(),
            mime_type: self
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            size_bytes: self.size.as_ref().map(WireSize::to_bytes).unwrap_or(0),
            folder_id,
            folder_name: self.folder_name.or(nested.name).unwrap_or_default(),
            folder_color: self.folder_color.or(nested.color).unwrap_or_default(),
            uploaded_at: self
                .uploaded_at
                .as_ref()
                .map(WireTimestamp::to_unix_seconds)
                .unwrap_or(0),
            url: self.url.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireFolder {
    id: WireId,
    name: String,
    description: Option<String>,
    color: Option<String>,
    icon: Option<String>,
    #[serde(alias = "filesCount", alias = "count")]
    file_count: Option<WireSize>,
    #[serde(alias = "totalSize", alias = "size")]
    total_size_bytes: Option<WireSize>,
}

impl WireFolder {
    pub(crate) fn into_record(self) -> FolderRecord {
        FolderRecord {
            id: self.id.into_string(),
            name: self.name,
            description: self.description.unwrap_or_default(),
            color: self.color.unwrap_or_default(),
            icon: self.icon.unwrap_or_default(),
            file_count: self.file_count.as_ref().map(WireSize::to_bytes).unwrap_or(0),
            total_size_bytes: self
                .total_size_bytes
                .as_ref()
                .map(WireSize::to_bytes)
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WireUploadMetadata {
    size: Option<WireSize>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireUploadOne {
    file: WireFile,
    metadata: Option<WireUploadMetadata>,
}

impl WireUploadOne {
    pub(crate) fn into_uploaded(self, folder_id: &str) -> UploadedFile {
        let mut file = self.file.into_record(Some(folder_id));
        if let Some(size) = self
            .metadata
            .and_then(|metadata| metadata.size)
            .as_ref()
            .map(WireSize::to_bytes)
            && file.size_bytes == 0
        {
            file.size_bytes = size;
        }
        UploadedFile {
            size_bytes: file.size_bytes,
            file,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireBatchSuccess {
    file: WireFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireFailedFile {
    Name(String),
    Described {
        #[serde(alias = "originalName", alias = "filename")]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireBatchFailure {
    file: WireFailedFile,
    #[serde(alias = "message")]
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct WireBatchSummary {
    successful: Option<usize>,
    failed: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireBatchUpload {
    #[serde(default)]
    successful: Vec<WireBatchSuccess>,
    #[serde(default)]
    failed: Vec<WireBatchFailure>,
    #[serde(default)]
    summary: WireBatchSummary,
}

impl WireBatchUpload {
    pub(crate) fn into_batch(self, folder_id: &str) -> BatchUpload {
        let successful: Vec<FileRecord> = self
            .successful
            .into_iter()
            .map(|item| item.file.into_record(Some(folder_id)))
            .collect();
        let failed: Vec<BatchFailure> = self
            .failed
            .into_iter()
            .map(|item| BatchFailure {
                file_name: match item.file {
                    WireFailedFile::Name(name) => name,
                    WireFailedFile::Described { name } => name.unwrap_or_default(),
                },
                reason: item.error.unwrap_or_else(|| "upload failed".to_string()),
            })
            .collect();
        let summary = BatchSummary {
            successful: self.summary.successful.unwrap_or(successful.len()),
            failed: self.summary.failed.unwrap_or(failed.len()),
        };
        BatchUpload {
            successful,
            failed,
            summary,
        }
    }
}
