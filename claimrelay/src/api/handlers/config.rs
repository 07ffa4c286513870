//! HTTP handler exposing client-facing configuration.

use axum::{Json, extract::State};

use crate::{AppState, api::models::config::PublicConfig};

#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    summary = "Get client config",
    description = "Settings the browser client needs: where to submit claims to the insurer and the upload limits.",
    responses(
        (status = 200, description = "Client configuration", body = PublicConfig),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_config(State(state): State<AppState>) -> Json<PublicConfig> {
    Json(PublicConfig {
        insurance_api_url: state.config.insurance_api_url.as_ref().map(|url| url.to_string()),
        max_files_per_batch: state.config.extraction.max_files,
        max_file_size: state.config.files.max_file_size,
    })
}
