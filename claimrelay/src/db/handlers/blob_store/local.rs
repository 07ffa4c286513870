use super::{BlobStore, BlobWriter, ByteStream};
use crate::db::{
    errors::{Result, StoreError},
    models::stored_files::{NewStoredFile, StoredFile},
};
use crate::types::FileId;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Local filesystem blob store - `<id>.dat` holds content, `<id>.json` holds metadata.
/// Useful for development and testing
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Open a store rooted at `base_path`, creating the directory if needed
    pub async fn open(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to create local storage directory {:?}: {}", base_path, e))
        })?;
        Ok(Self { base_path })
    }

    fn content_path(&self, id: FileId) -> PathBuf {
        self.base_path.join(format!("{id}.dat"))
    }

    fn metadata_path(&self, id: FileId) -> PathBuf {
        self.base_path.join(format!("{id}.json"))
    }

    async fn read_metadata(path: &Path) -> Result<StoredFile> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|e| StoreError::Other(anyhow::anyhow!("Corrupt metadata in {:?}: {}", path, e)))
    }
}

/// Content goes to a `.partial` file that is renamed into place on finish;
/// metadata is written last so readers never see a half-written file
struct LocalBlobWriter {
    file: Option<fs::File>,
    record: StoredFile,
    partial_path: PathBuf,
    content_path: PathBuf,
    metadata_path: PathBuf,
    written: u64,
}

#[async_trait]
impl BlobWriter for LocalBlobWriter {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("write after finish")))?;
        file.write_all(&chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }

    async fn finish(mut self: Box<Self>) -> Result<StoredFile> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        if let Err(e) = fs::rename(&self.partial_path, &self.content_path).await {
            let _ = fs::remove_file(&self.partial_path).await;
            return Err(e.into());
        }

        let mut record = self.record.clone();
        record.size_bytes = self.written as i64;
        let metadata = serde_json::to_vec_pretty(&record).map_err(|e| StoreError::Other(e.into()))?;
        if let Err(e) = fs::write(&self.metadata_path, metadata).await {
            // Content without metadata is invisible to readers; drop it
            let _ = fs::remove_file(&self.content_path).await;
            return Err(e.into());
        }

        Ok(record)
    }
}

impl Drop for LocalBlobWriter {
    fn drop(&mut self) {
        // Still holding the handle means finish() never ran
        if self.file.is_some() {
            let _ = std::fs::remove_file(&self.partial_path);
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn open_write(&self, metadata: NewStoredFile) -> Result<Box<dyn BlobWriter>> {
        let id = uuid::Uuid::new_v4();
        let content_path = self.content_path(id);
        let partial_path = self.base_path.join(format!("{id}.dat.partial"));

        let file = fs::File::create(&partial_path).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to create {:?}: {}", partial_path, e))
        })?;

        Ok(Box::new(LocalBlobWriter {
            file: Some(file),
            record: StoredFile::pending(id, metadata),
            partial_path,
            content_path,
            metadata_path: self.metadata_path(id),
            written: 0,
        }))
    }

    async fn open_read(&self, id: FileId) -> Result<(StoredFile, ByteStream)> {
        let record = Self::read_metadata(&self.metadata_path(id)).await?;

        let file = match fs::File::open(self.content_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };

        let stream = ReaderStream::new(file).map_err(StoreError::from).boxed();
        Ok((record, stream))
    }

    async fn get_by_id(&self, id: FileId) -> Result<StoredFile> {
        Self::read_metadata(&self.metadata_path(id)).await
    }

    async fn find_by_claim(&self, claim_id: &str, limit: usize) -> Result<Vec<StoredFile>> {
        let mut files = Vec::new();
        if limit == 0 {
            return Ok(files);
        }

        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let record = match Self::read_metadata(&path).await {
                Ok(record) => record,
                // Deleted between listing and reading
                Err(StoreError::NotFound) => continue,
                Err(e) => return Err(e),
            };

            if record.claim_id == claim_id {
                files.push(record);
                if files.len() >= limit {
                    break;
                }
            }
        }

        Ok(files)
    }

    async fn delete_by_id(&self, id: FileId) -> Result<()> {
        match fs::remove_file(self.metadata_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        }

        match fs::remove_file(self.content_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
