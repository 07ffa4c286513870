use super::{BlobStore, BlobWriter, ByteStream};
use crate::config::PoolSettings;
use crate::db::{
    errors::{Result, StoreError},
    models::stored_files::{NewStoredFile, StoredFile},
};
use crate::types::FileId;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;

/// Content is stored in rows of this size (same as GridFS' default chunk size)
const CHUNK_SIZE: usize = 255 * 1024;

const SELECT_FILE: &str = "SELECT id, filename, content_type, claim_id, user_id, size_bytes, uploaded_at FROM stored_files";

/// PostgreSQL blob store: one metadata row per file in `stored_files`, content
/// split across `stored_file_chunks`
pub struct PostgresBlobStore {
    pool: PgPool,
}

impl PostgresBlobStore {
    /// Connect to the store database, creating it if it doesn't exist, and run migrations
    ///
    /// # Arguments
    /// * `database_url` - Server URL (e.g., postgres://user@host:5432/postgres)
    /// * `database` - Name of the database holding the files; overrides the one in the URL
    pub async fn connect(database_url: &str, database: &str, settings: &PoolSettings) -> Result<Self> {
        let base_options =
            PgConnectOptions::from_str(database_url).map_err(|e| StoreError::Other(anyhow::anyhow!("Invalid store URL: {}", e)))?;
        let options = base_options.clone().database(database);

        let pool = match pool_options(settings).connect_with(options.clone()).await {
            Ok(pool) => {
                tracing::debug!("Connected to existing store database: {}", database);
                pool
            }
            Err(e) if e.to_string().contains("does not exist") => {
                tracing::info!("Store database '{}' doesn't exist, creating it...", database);

                let admin_pool = PgPool::connect_with(base_options.database("postgres"))
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("Failed to connect to postgres database to create store: {}", e)))?;

                let create_db_query = format!(r#"CREATE DATABASE "{}""#, database.replace('"', "\"\""));
                sqlx::query(&create_db_query)
                    .execute(&admin_pool)
                    .await
                    .map_err(|e| StoreError::Other(anyhow::anyhow!("Failed to create store database '{}': {}", database, e)))?;

                tracing::info!("Created store database: {}", database);
                admin_pool.close().await;

                pool_options(settings)
                    .connect_with(options)
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("Failed to connect to new store database '{}': {}", database, e)))?
            }
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "Failed to connect to store database '{}': {}",
                    database, e
                )));
            }
        };

        crate::migrator()
            .run(&pool)
            .await
            .map_err(|e| StoreError::Other(anyhow::anyhow!("Failed to run store migrations: {}", e)))?;

        tracing::info!(
            "PostgreSQL blob store initialized (database: {}, pool: {} connections)",
            database,
            pool.options().get_max_connections()
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations must already have been applied.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    options
}

/// Writes chunks inside a single transaction; the metadata row and all chunks
/// become visible together on commit
struct PostgresBlobWriter {
    tx: Transaction<'static, Postgres>,
    file: StoredFile,
    buffer: BytesMut,
    next_seq: i32,
    written: u64,
}

impl PostgresBlobWriter {
    async fn flush_chunk(&mut self, chunk: Bytes) -> Result<()> {
        sqlx::query("INSERT INTO stored_file_chunks (file_id, seq, data) VALUES ($1, $2, $3)")
            .bind(self.file.id)
            .bind(self.next_seq)
            .bind(&chunk[..])
            .execute(&mut *self.tx)
            .await?;
        self.next_seq += 1;
        Ok(())
    }
}

#[async_trait]
impl BlobWriter for PostgresBlobWriter {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.written += chunk.len() as u64;
        self.buffer.extend_from_slice(&chunk);

        while self.buffer.len() >= CHUNK_SIZE {
            let full = self.buffer.split_to(CHUNK_SIZE).freeze();
            self.flush_chunk(full).await?;
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }

    async fn finish(mut self: Box<Self>) -> Result<StoredFile> {
        if !self.buffer.is_empty() {
            let rest = self.buffer.split().freeze();
            self.flush_chunk(rest).await?;
        }

        let size_bytes = self.written as i64;
        sqlx::query("UPDATE stored_files SET size_bytes = $2 WHERE id = $1")
            .bind(self.file.id)
            .bind(size_bytes)
            .execute(&mut *self.tx)
            .await?;

        let PostgresBlobWriter { tx, mut file, .. } = *self;
        tx.commit().await?;

        file.size_bytes = size_bytes;
        Ok(file)
    }
}

#[async_trait]
impl BlobStore for PostgresBlobStore {
    async fn open_write(&self, metadata: NewStoredFile) -> Result<Box<dyn BlobWriter>> {
        let mut tx = self.pool.begin().await?;
        let file = StoredFile::pending(uuid::Uuid::new_v4(), metadata);

        sqlx::query(
            "INSERT INTO stored_files (id, filename, content_type, claim_id, user_id, size_bytes, uploaded_at)
             VALUES ($1, $2, $3, $4, $5, 0, $6)",
        )
        .bind(file.id)
        .bind(&file.filename)
        .bind(&file.content_type)
        .bind(&file.claim_id)
        .bind(&file.user_id)
        .bind(file.uploaded_at)
        .execute(&mut *tx)
        .await?;

        Ok(Box::new(PostgresBlobWriter {
            tx,
            file,
            buffer: BytesMut::with_capacity(CHUNK_SIZE),
            next_seq: 0,
            written: 0,
        }))
    }

    async fn open_read(&self, id: FileId) -> Result<(StoredFile, ByteStream)> {
        let file = self.get_by_id(id).await?;

        // One query per chunk keeps at most one chunk in memory per reader
        let pool = self.pool.clone();
        let stream = futures::stream::try_unfold(0i32, move |seq| {
            let pool = pool.clone();
            async move {
                let data: Option<Vec<u8>> = sqlx::query_scalar("SELECT data FROM stored_file_chunks WHERE file_id = $1 AND seq = $2")
                    .bind(id)
                    .bind(seq)
                    .fetch_optional(&pool)
                    .await?;
                Ok::<_, StoreError>(data.map(|data| (Bytes::from(data), seq + 1)))
            }
        });

        Ok((file, stream.boxed()))
    }

    async fn get_by_id(&self, id: FileId) -> Result<StoredFile> {
        let query = format!("{SELECT_FILE} WHERE id = $1");
        sqlx::query_as::<_, StoredFile>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_claim(&self, claim_id: &str, limit: usize) -> Result<Vec<StoredFile>> {
        let query = format!("{SELECT_FILE} WHERE claim_id = $1 LIMIT $2");
        let files = sqlx::query_as::<_, StoredFile>(&query)
            .bind(claim_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    async fn delete_by_id(&self, id: FileId) -> Result<()> {
        let result = sqlx::query("DELETE FROM stored_files WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
