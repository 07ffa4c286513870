use uuid::Uuid;

/// Identifier of a file in the blob store
pub type FileId = Uuid;

/// Default content type for stored files that carry none
pub const OCTET_STREAM: &str = "application/octet-stream";
