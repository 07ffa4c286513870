use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Settings the browser client needs to talk to the rest of the claims stack
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PublicConfig {
    /// Base URL of the insurance-submission API, if configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_api_url: Option<String>,
    /// Maximum number of a claim's files sent per extraction request
    pub max_files_per_batch: usize,
    /// Largest accepted upload, in bytes
    pub max_file_size: u64,
}
