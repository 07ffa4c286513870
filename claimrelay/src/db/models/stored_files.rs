use crate::types::FileId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata supplied when opening a write stream
#[derive(Debug, Clone)]
pub struct NewStoredFile {
    pub filename: String,
    pub content_type: Option<String>,
    /// Claim the file belongs to. Trusted from the caller.
    pub claim_id: String,
    pub user_id: Option<String>,
}

/// A file held by the blob store. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredFile {
    pub id: FileId,
    pub filename: String,
    pub content_type: Option<String>,
    pub claim_id: String,
    pub user_id: Option<String>,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl StoredFile {
    /// Record for a file that has been opened but not yet written
    pub(crate) fn pending(id: FileId, metadata: NewStoredFile) -> Self {
        Self {
            id,
            filename: metadata.filename,
            content_type: metadata.content_type,
            claim_id: metadata.claim_id,
            user_id: metadata.user_id,
            size_bytes: 0,
            uploaded_at: Utc::now(),
        }
    }
}
