use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of relaying a claim's documents to the extraction API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProcessResponse {
    pub success: bool,
    /// Extraction API response, passed through unchanged
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}
