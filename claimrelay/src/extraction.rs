//! Outbound client for the claim extraction API.
//!
//! A batch is sent as a single multipart POST with one `files` part per document. Parts are
//! streamed straight out of the blob store, so the request body is never assembled in memory.

use crate::config::ExtractionConfig;
use crate::db::handlers::ByteStream;
use crate::db::models::stored_files::StoredFile;
use crate::errors::{Error, Result};
use reqwest::{
    Body, Client,
    multipart::{Form, Part},
};
use tracing::{debug, instrument};
use url::Url;

/// Content type sent for parts whose stored metadata has none
pub const DEFAULT_PART_CONTENT_TYPE: &str = "application/pdf";

/// Name of the repeated multipart field the extraction API reads
const FILES_FIELD: &str = "files";

/// One document of an outbound batch: stored metadata plus an open read stream
pub struct BatchDocument {
    pub file: StoredFile,
    pub content: ByteStream,
}

#[derive(Clone)]
pub struct ExtractionClient {
    client: Client,
    url: Url,
}

impl ExtractionClient {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| Error::Internal {
            operation: format!("create extraction HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send the documents and return the API's JSON response unchanged
    #[instrument(skip_all, fields(url = %self.url, documents = documents.len()))]
    pub async fn extract(&self, documents: Vec<BatchDocument>) -> Result<serde_json::Value> {
        let mut form = Form::new();
        for BatchDocument { file, content } in documents {
            let content_type = file.content_type.as_deref().unwrap_or(DEFAULT_PART_CONTENT_TYPE);
            let part = Part::stream_with_length(Body::wrap_stream(content), file.size_bytes.max(0) as u64)
                .file_name(file.filename.clone())
                .mime_str(content_type)
                .map_err(|e| Error::BadRequest {
                    message: format!("Stored file {} has an invalid content type '{}': {}", file.id, content_type, e),
                })?;
            form = form.part(FILES_FIELD, part);
        }

        let response = self.client.post(self.url.clone()).multipart(form).send().await.map_err(|e| {
            tracing::warn!("Extraction request failed: {:#}", e);
            Error::Unavailable {
                message: format!("Extraction API unreachable: {e}"),
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::BadGateway {
            message: format!("Failed to read extraction response: {e}"),
        })?;

        if !status.is_success() {
            return Err(Error::BadGateway {
                message: format!("Backend returned {}: {}", status.as_u16(), body),
            });
        }

        debug!("Extraction API answered {} ({} bytes)", status, body.len());

        serde_json::from_str(&body).map_err(|e| Error::BadGateway {
            message: format!("Backend returned invalid JSON: {e}"),
        })
    }
}
