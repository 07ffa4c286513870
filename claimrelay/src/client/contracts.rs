//! Typed shapes of the external APIs the facade talks to.
//!
//! Responses are deserialized into these types and then checked with [`Contract::validate`];
//! anything that does not fit is reported as [`super::ClientError::Schema`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub trait Contract {
    /// Checks beyond what deserialization enforces
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// One claim extracted from a batch of documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedClaim {
    pub condition: String,
    pub date: String,
    pub health_insurance_provider: String,
    pub requested_treatment: String,
    pub explanation: String,
}

impl Contract for ExtractedClaim {}

impl Contract for Vec<ExtractedClaim> {
    fn validate(&self) -> Result<(), String> {
        self.iter().try_for_each(|claim| claim.validate())
    }
}

/// Relay envelope around the extraction API's answer
#[derive(Debug, Deserialize)]
pub(crate) struct ProcessEnvelope {
    pub success: bool,
    pub data: Vec<ExtractedClaim>,
}

impl Contract for ProcessEnvelope {
    fn validate(&self) -> Result<(), String> {
        if !self.success {
            return Err("process response reported success=false".to_string());
        }
        self.data.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppealGuidance {
    pub guidelines: Vec<String>,
    pub reasoning: String,
}

impl Contract for AppealGuidance {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalLikelihood {
    pub success: bool,
    /// Between 0.0 and 1.0
    pub approval_probability: f64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributing_factors: Option<Vec<serde_json::Value>>,
}

impl Contract for ApprovalLikelihood {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.approval_probability) {
            return Err(format!(
                "approval_probability must be within [0, 1], got {}",
                self.approval_probability
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmissionRequest<'a> {
    pub claim_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Contract for SubmissionReceipt {
    fn validate(&self) -> Result<(), String> {
        if self.success && self.tracking_id.as_deref().is_none_or(str::is_empty) {
            return Err("successful submission is missing tracking_id".to_string());
        }
        Ok(())
    }
}

/// A claim's file as the facade reports it, online or from the offline ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimFile {
    pub file_id: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileListEnvelope {
    pub files: Vec<ClaimFile>,
}

impl Contract for FileListEnvelope {}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadEnvelope {
    #[serde(rename = "fileIds")]
    pub file_ids: Vec<String>,
}

impl Contract for UploadEnvelope {}

#[derive(Debug, Deserialize)]
pub(crate) struct RelayConfig {
    #[serde(default)]
    pub insurance_api_url: Option<url::Url>,
}

impl Contract for RelayConfig {}
