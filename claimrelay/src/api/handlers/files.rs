use crate::{
    AppState,
    api::models::files::{DownloadQuery, FileInfo, UploadQuery, UploadResponse},
    db::{errors::StoreError, models::stored_files::NewStoredFile},
    errors::{Error, Result},
    types::{FileId, OCTET_STREAM},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;

/// Field names accepted for file parts
const FILE_FIELDS: [&str; 2] = ["files", "file"];

/// A malformed id cannot name a stored file
fn parse_file_id(raw: &str) -> Result<FileId> {
    raw.parse::<FileId>().map_err(|_| Error::NotFound {
        message: "File not found".to_string(),
    })
}

fn not_found(err: StoreError) -> Error {
    match err {
        StoreError::NotFound => Error::NotFound {
            message: "File not found".to_string(),
        },
        other => other.into(),
    }
}

fn content_disposition(filename: &str, as_attachment: bool) -> HeaderValue {
    let disposition = if as_attachment { "attachment" } else { "inline" };
    let escaped = filename.replace(['\r', '\n'], "").replace('"', "\\\"");
    HeaderValue::from_bytes(format!("{disposition}; filename=\"{escaped}\"").as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    summary = "Upload claim documents",
    description = "Store one or more documents for a claim. Send the claim id as the `claim_id` query parameter or as a `claim_id` form field before the file parts; files go in parts named `files` (or `file`). Each file is streamed into the store as it arrives.",
    request_body(
        content_type = "multipart/form-data",
        description = "`claim_id`, optional `user_id`, then one or more `files` parts"
    ),
    params(UploadQuery),
    responses(
        (status = 201, description = "Files stored", body = UploadResponse),
        (status = 400, description = "Missing claim id or files"),
        (status = 413, description = "A file exceeds the size limit"),
        (status = 503, description = "File store unavailable")
    )
)]
#[tracing::instrument(skip_all, fields(claim_id = tracing::field::Empty))]
pub async fn upload_files(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let max_file_size = state.config.files.max_file_size;

    let mut claim_id = query.claim_id.filter(|id| !id.trim().is_empty());
    let mut user_id: Option<String> = None;
    let mut file_ids = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {}", e),
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "claim_id" => {
                let value = field.text().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read claim_id field: {}", e),
                })?;
                if !value.trim().is_empty() {
                    claim_id = Some(value.trim().to_string());
                }
            }
            "user_id" => {
                let value = field.text().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read user_id field: {}", e),
                })?;
                user_id = Some(value).filter(|v| !v.trim().is_empty());
            }
            name if FILE_FIELDS.contains(&name) => {
                let claim_id = claim_id.clone().ok_or_else(|| Error::BadRequest {
                    message: "Missing required field: claim_id".to_string(),
                })?;
                tracing::Span::current().record("claim_id", claim_id.as_str());

                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("upload-{}", file_ids.len() + 1));
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .or_else(|| mime_guess::from_path(&filename).first().map(|mime| mime.to_string()));

                let mut writer = state
                    .store
                    .open_write(NewStoredFile {
                        filename: filename.clone(),
                        content_type,
                        claim_id,
                        user_id: user_id.clone(),
                    })
                    .await?;

                while let Some(chunk) = field.chunk().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read file chunk: {}", e),
                })? {
                    if writer.bytes_written() + chunk.len() as u64 > max_file_size {
                        tracing::warn!(
                            filename = %filename,
                            max_file_size = max_file_size,
                            "File size limit exceeded, aborting upload"
                        );
                        // Dropping the writer discards the partial file
                        return Err(Error::PayloadTooLarge {
                            message: format!(
                                "File '{}' exceeds maximum allowed size of {} bytes ({} MB)",
                                filename,
                                max_file_size,
                                max_file_size / (1024 * 1024)
                            ),
                        });
                    }
                    writer.write_chunk(chunk).await?;
                }

                let stored = writer.finish().await?;
                tracing::info!(
                    file_id = %stored.id,
                    filename = %stored.filename,
                    size_bytes = stored.size_bytes,
                    "Stored claim document"
                );
                metrics::counter!("claimrelay_files_uploaded_total").increment(1);
                metrics::counter!("claimrelay_bytes_uploaded_total").increment(stored.size_bytes as u64);
                file_ids.push(stored.id);
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    if claim_id.is_none() {
        return Err(Error::BadRequest {
            message: "Missing required field: claim_id".to_string(),
        });
    }
    if file_ids.is_empty() {
        return Err(Error::BadRequest {
            message: "Missing required field: files".to_string(),
        });
    }

    Ok((StatusCode::CREATED, Json(UploadResponse { file_ids })))
}

#[utoipa::path(
    get,
    path = "/files/{file_id}",
    tag = "files",
    summary = "Stream a file",
    description = "Stream the stored bytes unmodified. `download=true` asks the browser to save the file instead of displaying it.",
    params(
        ("file_id" = String, Path, description = "The ID of the file to stream"),
        DownloadQuery
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "File not found")
    )
)]
#[tracing::instrument(skip_all, fields(file_id = %file_id))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let id = parse_file_id(&file_id)?;
    let (file, content) = state.store.open_read(id).await.map_err(not_found)?;

    let content_type = file.content_type.as_deref().unwrap_or(OCTET_STREAM);
    let content_type = HeaderValue::from_str(content_type).unwrap_or_else(|_| HeaderValue::from_static(OCTET_STREAM));

    metrics::counter!("claimrelay_files_downloaded_total").increment(1);

    let body = Body::from_stream(content.inspect_err(|e| tracing::error!("Store read failed mid-stream: {:#}", e)));
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(&file.filename, query.as_attachment()));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file.size_bytes.max(0) as u64));

    Ok(response)
}

#[utoipa::path(
    get,
    path = "/files/{file_id}/metadata",
    tag = "files",
    summary = "Get file metadata",
    params(
        ("file_id" = String, Path, description = "The ID of the file")
    ),
    responses(
        (status = 200, description = "File metadata", body = FileInfo),
        (status = 404, description = "File not found")
    )
)]
#[tracing::instrument(skip_all, fields(file_id = %file_id))]
pub async fn get_file_metadata(State(state): State<AppState>, Path(file_id): Path<String>) -> Result<Json<FileInfo>> {
    let id = parse_file_id(&file_id)?;
    let file = state.store.get_by_id(id).await.map_err(not_found)?;
    Ok(Json(file.into()))
}

#[utoipa::path(
    delete,
    path = "/files/{file_id}",
    tag = "files",
    summary = "Delete a file",
    description = "Remove a stored file. Deleting an id that is not stored, including a second delete, returns 404.",
    params(
        ("file_id" = String, Path, description = "The ID of the file to delete")
    ),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "File not found")
    )
)]
#[tracing::instrument(skip_all, fields(file_id = %file_id))]
pub async fn delete_file(State(state): State<AppState>, Path(file_id): Path<String>) -> Result<StatusCode> {
    let id = parse_file_id(&file_id)?;
    state.store.delete_by_id(id).await.map_err(not_found)?;
    tracing::info!("Deleted claim document");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::files::{FileInfo, UploadResponse};
    use crate::test_utils::{create_test_app, create_test_config};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use bytes::Bytes;

    fn pdf_part(filename: &str, content: &[u8]) -> Part {
        Part::bytes(content.to_vec()).file_name(filename).mime_type("application/pdf")
    }

    #[tokio::test]
    async fn test_upload_then_download_is_byte_identical() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(temp_dir.path())).await;

        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 256) as u8).collect();
        let response = server
            .post("/files")
            .multipart(
                MultipartForm::new()
                    .add_text("claim_id", "MH-2025-0001")
                    .add_part("files", pdf_part("discharge.pdf", &content)),
            )
            .await;

        response.assert_status(StatusCode::CREATED);
        let upload: UploadResponse = response.json();
        assert_eq!(upload.file_ids.len(), 1);

        let download = server.get(&format!("/files/{}", upload.file_ids[0])).await;
        download.assert_status_ok();
        assert_eq!(download.as_bytes(), &Bytes::from(content.clone()));
        assert_eq!(download.header("content-type"), "application/pdf");
        assert_eq!(download.header("content-disposition"), "inline; filename=\"discharge.pdf\"");
        assert_eq!(download.header("content-length"), content.len().to_string().as_str());
    }

    #[tokio::test]
    async fn test_upload_preserves_part_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(temp_dir.path())).await;

        let response = server
            .post("/files")
            .multipart(
                MultipartForm::new()
                    .add_text("claim_id", "MH-2025-0001")
                    .add_text("user_id", "patient-42")
                    .add_part("files", pdf_part("first.pdf", b"one"))
                    .add_part("file", pdf_part("second.pdf", b"two"))
                    .add_part("files", pdf_part("third.pdf", b"three")),
            )
            .await;

        response.assert_status(StatusCode::CREATED);
        let upload: UploadResponse = response.json();
        assert_eq!(upload.file_ids.len(), 3);

        let mut names = Vec::new();
        for id in &upload.file_ids {
            let info: FileInfo = server.get(&format!("/files/{id}/metadata")).await.json();
            assert_eq!(info.claim_id, "MH-2025-0001");
            assert_eq!(info.user_id.as_deref(), Some("patient-42"));
            names.push(info.filename);
        }
        assert_eq!(names, vec!["first.pdf", "second.pdf", "third.pdf"]);
    }

    #[tokio::test]
    async fn test_upload_with_claim_id_query_parameter() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(temp_dir.path())).await;

        let response = server
            .post("/files")
            .add_query_param("claim_id", "MH-2025-0007")
            .multipart(MultipartForm::new().add_part("file", pdf_part("scan.pdf", b"%PDF")))
            .await;

        response.assert_status(StatusCode::CREATED);
        let upload: UploadResponse = response.json();
        let info: FileInfo = server.get(&format!("/files/{}/metadata", upload.file_ids[0])).await.json();
        assert_eq!(info.claim_id, "MH-2025-0007");
    }

    #[tokio::test]
    async fn test_upload_without_claim_id_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(temp_dir.path())).await;

        let response = server
            .post("/files")
            .multipart(MultipartForm::new().add_part("files", pdf_part("orphan.pdf", b"%PDF")))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("claim_id"));
    }

    #[tokio::test]
    async fn test_upload_without_files_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(temp_dir.path())).await;

        let response = server
            .post("/files")
            .multipart(MultipartForm::new().add_text("claim_id", "MH-2025-0001"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("files"));
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_and_not_stored() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config(temp_dir.path());
        config.files.max_file_size = 1024;
        let server = create_test_app(config).await;

        let response = server
            .post("/files")
            .multipart(
                MultipartForm::new()
                    .add_text("claim_id", "MH-2025-0001")
                    .add_part("files", pdf_part("huge.pdf", &vec![7u8; 4096])),
            )
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let listing: serde_json::Value = server.get("/claims/MH-2025-0001/files").await.json();
        assert_eq!(listing["files"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_download_attachment_disposition() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(temp_dir.path())).await;

        let upload: UploadResponse = server
            .post("/files")
            .multipart(
                MultipartForm::new()
                    .add_text("claim_id", "MH-2025-0001")
                    .add_part("files", Part::bytes(b"plain notes".to_vec()).file_name("notes")),
            )
            .await
            .json();

        let response = server
            .get(&format!("/files/{}", upload.file_ids[0]))
            .add_query_param("download", "true")
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("content-disposition"), "attachment; filename=\"notes\"");
        assert_eq!(response.header("content-type"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_download_missing_or_malformed_id_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(temp_dir.path())).await;

        let response = server.get(&format!("/files/{}", uuid::Uuid::new_v4())).await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "File not found");

        server.get("/files/not-a-file-id").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_then_download_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(temp_dir.path())).await;

        let upload: UploadResponse = server
            .post("/files")
            .multipart(
                MultipartForm::new()
                    .add_text("claim_id", "MH-2025-0001")
                    .add_part("files", pdf_part("a.pdf", b"%PDF")),
            )
            .await
            .json();
        let id = upload.file_ids[0];

        server.delete(&format!("/files/{id}")).await.assert_status(StatusCode::NO_CONTENT);
        server.get(&format!("/files/{id}")).await.assert_status(StatusCode::NOT_FOUND);
        server.get(&format!("/files/{id}/metadata")).await.assert_status(StatusCode::NOT_FOUND);
        server.delete(&format!("/files/{id}")).await.assert_status(StatusCode::NOT_FOUND);
    }
}
