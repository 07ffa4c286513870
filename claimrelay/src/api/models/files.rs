use crate::db::models::stored_files::StoredFile;
use crate::types::FileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters accepted by `POST /files`
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct UploadQuery {
    /// Claim the uploaded files belong to; alternative to a `claim_id` form field
    pub claim_id: Option<String>,
}

/// Query parameters accepted by `GET /files/{file_id}`
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// `true` serves the file as an attachment, anything else displays it inline
    pub download: Option<String>,
}

impl DownloadQuery {
    pub fn as_attachment(&self) -> bool {
        self.download.as_deref() == Some("true")
    }
}

/// Ids of the stored files, in the order the parts were sent
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    #[serde(rename = "fileIds")]
    #[schema(value_type = Vec<String>)]
    pub file_ids: Vec<FileId>,
}

/// Stored file metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileInfo {
    #[schema(value_type = String, format = "uuid")]
    pub file_id: FileId,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub claim_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<StoredFile> for FileInfo {
    fn from(file: StoredFile) -> Self {
        Self {
            file_id: file.id,
            filename: file.filename,
            content_type: file.content_type,
            claim_id: file.claim_id,
            user_id: file.user_id,
            size_bytes: file.size_bytes,
            uploaded_at: file.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileInfo>,
}
