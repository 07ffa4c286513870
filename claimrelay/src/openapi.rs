//! OpenAPI document for the relay, rendered at `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Claims Document Relay",
        description = "Stores claim attachments, streams them back, and relays a claim's documents to the extraction API."
    ),
    paths(
        api::handlers::files::upload_files,
        api::handlers::files::download_file,
        api::handlers::files::get_file_metadata,
        api::handlers::files::delete_file,
        api::handlers::claims::list_claim_files,
        api::handlers::claims::process_claim,
        api::handlers::config::get_config,
    ),
    components(
        schemas(
            api::models::files::UploadResponse,
            api::models::files::FileInfo,
            api::models::files::FileListResponse,
            api::models::claims::ProcessResponse,
            api::models::config::PublicConfig,
        )
    ),
    tags(
        (name = "files", description = "Claim document storage"),
        (name = "claims", description = "Per-claim listing and extraction"),
        (name = "config", description = "Client configuration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_documents_all_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/files",
            "/files/{file_id}",
            "/files/{file_id}/metadata",
            "/claims/{claim_id}/files",
            "/claims/{claim_id}/process",
            "/config",
        ] {
            assert!(paths.contains(&expected), "missing {expected} in {paths:?}");
        }
    }
}
