use crate::{
    AppState,
    api::models::{
        claims::ProcessResponse,
        files::{FileInfo, FileListResponse},
    },
    errors::{Error, Result},
    extraction::BatchDocument,
};
use axum::{
    Json,
    extract::{Path, State},
};

#[utoipa::path(
    get,
    path = "/claims/{claim_id}/files",
    tag = "claims",
    summary = "List a claim's files",
    params(
        ("claim_id" = String, Path, description = "Claim identifier, e.g. MH-2025-0001")
    ),
    responses(
        (status = 200, description = "Stored files for the claim", body = FileListResponse),
        (status = 503, description = "File store unavailable")
    )
)]
#[tracing::instrument(skip_all, fields(claim_id = %claim_id))]
pub async fn list_claim_files(State(state): State<AppState>, Path(claim_id): Path<String>) -> Result<Json<FileListResponse>> {
    let files = state.store.find_by_claim(&claim_id, state.config.files.list_limit).await?;
    Ok(Json(FileListResponse {
        files: files.into_iter().map(FileInfo::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/claims/{claim_id}/process",
    tag = "claims",
    summary = "Extract claim data",
    description = "Send the claim's stored documents (up to the configured batch size) to the extraction API in one multipart request and return its JSON response unchanged.",
    params(
        ("claim_id" = String, Path, description = "Claim identifier, e.g. MH-2025-0001")
    ),
    responses(
        (status = 200, description = "Extraction result", body = ProcessResponse),
        (status = 404, description = "No files stored for the claim"),
        (status = 502, description = "Extraction API returned an error"),
        (status = 503, description = "Extraction API or file store unavailable")
    )
)]
#[tracing::instrument(skip_all, fields(claim_id = %claim_id))]
pub async fn process_claim(State(state): State<AppState>, Path(claim_id): Path<String>) -> Result<Json<ProcessResponse>> {
    let files = state.store.find_by_claim(&claim_id, state.config.extraction.max_files).await?;

    if files.is_empty() {
        metrics::counter!("claimrelay_process_requests_total", "outcome" => "no_files").increment(1);
        return Err(Error::NotFound {
            message: "No PDF files found for this claim".to_string(),
        });
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let (file, content) = state.store.open_read(file.id).await?;
        documents.push(BatchDocument { file, content });
    }

    tracing::info!(documents = documents.len(), "Relaying claim documents to extraction API");

    match state.extraction.extract(documents).await {
        Ok(data) => {
            metrics::counter!("claimrelay_process_requests_total", "outcome" => "success").increment(1);
            Ok(Json(ProcessResponse { success: true, data }))
        }
        Err(e) => {
            metrics::counter!("claimrelay_process_requests_total", "outcome" => "upstream_error").increment(1);
            Err(e)
        }
    }
}
