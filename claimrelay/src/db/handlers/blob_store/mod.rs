//! Blob store client: byte storage for claim attachments.
//!
//! Two backends implement [`BlobStore`]:
//!
//! - [`PostgresBlobStore`]: metadata rows plus fixed-size content chunks in PostgreSQL
//! - [`LocalBlobStore`]: a directory of content files with JSON metadata sidecars
//!
//! Writes are streamed through a [`BlobWriter`] handle and reads come back as a
//! [`ByteStream`], so neither direction holds a whole document in memory.

mod local;
mod postgres;

pub use local::LocalBlobStore;
pub use postgres::PostgresBlobStore;

use crate::config::StoreConfig;
use crate::db::errors::Result;
use crate::db::models::stored_files::{NewStoredFile, StoredFile};
use crate::types::FileId;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Stream of file content, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Handle for a file being written. Dropping it without calling
/// [`BlobWriter::finish`] discards everything written so far.
#[async_trait]
pub trait BlobWriter: Send {
    /// Append a chunk of content
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()>;

    /// Number of bytes accepted so far
    fn bytes_written(&self) -> u64;

    /// Complete the write and return the stored record with its generated id
    async fn finish(self: Box<Self>) -> Result<StoredFile>;
}

/// Trait for blob store backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open a write stream for a new file
    async fn open_write(&self, metadata: NewStoredFile) -> Result<Box<dyn BlobWriter>>;

    /// Open a read stream for a stored file, together with its metadata
    async fn open_read(&self, id: FileId) -> Result<(StoredFile, ByteStream)>;

    /// Look up metadata without opening the content
    async fn get_by_id(&self, id: FileId) -> Result<StoredFile>;

    /// Up to `limit` files belonging to the claim, in the store's natural order
    async fn find_by_claim(&self, claim_id: &str, limit: usize) -> Result<Vec<StoredFile>>;

    /// Remove a file. Fails with `NotFound` when nothing is stored under `id`,
    /// including on a repeated delete.
    async fn delete_by_id(&self, id: FileId) -> Result<()>;

    /// Release connections held by the backend
    async fn close(&self) {}

    /// Write an in-memory buffer as a single file
    async fn store_bytes(&self, metadata: NewStoredFile, content: Bytes) -> Result<StoredFile> {
        let mut writer = self.open_write(metadata).await?;
        writer.write_chunk(content).await?;
        writer.finish().await
    }
}

/// Create a blob store backend based on configuration
pub async fn create_blob_store(config: &StoreConfig) -> Result<Arc<dyn BlobStore>> {
    match config {
        StoreConfig::Postgres { url, database, pool } => {
            tracing::info!("Creating PostgreSQL blob store (database: {})", database);
            let store = PostgresBlobStore::connect(url, database, pool).await?;
            Ok(Arc::new(store))
        }
        StoreConfig::Local { path } => {
            tracing::info!("Creating local blob store (path: {:?})", path);
            let store = LocalBlobStore::open(path.clone()).await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    pub(crate) fn new_file(claim_id: &str, filename: &str) -> NewStoredFile {
        NewStoredFile {
            filename: filename.to_string(),
            content_type: Some("application/pdf".to_string()),
            claim_id: claim_id.to_string(),
            user_id: None,
        }
    }

    pub(crate) async fn read_all(stream: ByteStream) -> Vec<u8> {
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_store_bytes_default_method() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlobStore> = create_blob_store(&StoreConfig::Local {
            path: temp_dir.path().to_path_buf(),
        })
        .await
        .unwrap();

        let stored = store
            .store_bytes(new_file("MH-2025-0001", "intake.pdf"), Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 8);

        let (_, stream) = store.open_read(stored.id).await.unwrap();
        assert_eq!(read_all(stream).await, b"%PDF-1.7");
    }
}
