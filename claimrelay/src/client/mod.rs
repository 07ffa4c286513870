//! Client facade over the relay and the claim-analysis services.
//!
//! [`RelayClient`] is what the UI layer calls. Every request goes through one loop:
//!
//! - candidate base URLs ([`ClientConfig::relay_urls`]) are tried in order within a round, and the
//!   first success wins
//! - a 4xx answer is returned immediately as [`ClientError::Status`]; transport errors and 5xx
//!   answers move on to the next candidate
//! - failed rounds are retried per [`RetryPolicy`], and running out yields
//!   [`ClientError::Exhausted`]
//!
//! With [`ClientConfig::offline_dir`] set, uploads and listings that exhaust their retries fall
//! back to an [`OfflineLedger`] and come back as [`Delivery::Offline`]. Placeholder ids minted this
//! way start with `offline-` and never name a stored file.
//!
//! Responses are decoded into the types in [`contracts`] and validated; a mismatch is a
//! [`ClientError::Schema`].

pub mod contracts;
pub mod offline;
pub mod retry;

pub use contracts::{AppealGuidance, ApprovalLikelihood, ClaimFile, ExtractedClaim, SubmissionReceipt};
pub use offline::{LedgerEntry, OfflineLedger};
pub use retry::RetryPolicy;

use bytes::Bytes;
use chrono::Utc;
use contracts::{Contract, FileListEnvelope, ProcessEnvelope, RelayConfig, SubmissionRequest, UploadEnvelope};
use reqwest::{
    Client, RequestBuilder, Response,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Relay base URLs, tried in order
    pub relay_urls: Vec<Url>,
    /// Claim-analysis backend serving `/get-appeal-guidance` and `/get-claim-likelihood`
    pub backend_url: Option<Url>,
    /// Insurance-submission API. When unset it is discovered through the relay's `/config`.
    pub insurance_url: Option<Url>,
    pub retry: RetryPolicy,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Directory for the offline ledger; unset disables offline mode
    pub offline_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_urls: vec![Url::parse("http://localhost:3001").expect("default relay URL is valid")],
            backend_url: None,
            insurance_url: None,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(15),
            offline_dir: None,
        }
    }
}

#[derive(Debug, ThisError)]
pub enum ClientError {
    /// Every candidate failed in every round
    #[error("All {attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: String },

    /// The service rejected the request (4xx); retrying would not help
    #[error("Request rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response did not match the expected contract
    #[error("Response does not match the expected schema: {0}")]
    Schema(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Offline ledger error: {0}")]
    Ledger(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Outcome of a call that may have been served from the offline ledger
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    /// The relay answered
    Online(T),
    /// The relay was unreachable; the value comes from the offline ledger
    Offline(T),
}

impl<T> Delivery<T> {
    pub fn is_offline(&self) -> bool {
        matches!(self, Delivery::Offline(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Delivery::Online(value) | Delivery::Offline(value) => value,
        }
    }
}

/// A document to upload, held in memory so it can be resent on retry
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Bytes,
}

impl UploadFile {
    pub fn pdf(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: Some("application/pdf".to_string()),
            content: content.into(),
        }
    }
}

/// Append path segments to a base URL, percent-encoding each one
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::Url(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn decode<T>(response: Response) -> Result<T>
where
    T: DeserializeOwned + Contract,
{
    let body = response.bytes().await?;
    let value: T = serde_json::from_slice(&body).map_err(|e| ClientError::Schema(format!("{}: {}", std::any::type_name::<T>(), e)))?;
    value.validate().map_err(ClientError::Schema)?;
    Ok(value)
}

pub struct RelayClient {
    http: Client,
    config: ClientConfig,
    ledger: Option<OfflineLedger>,
}

impl RelayClient {
    /// Build a client. A rustls crypto provider must already be installed.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        if config.relay_urls.is_empty() {
            return Err(ClientError::NotConfigured("relay_urls"));
        }
        config.retry.validate().map_err(ClientError::InvalidConfig)?;

        let http = Client::builder().timeout(config.request_timeout).build()?;
        let ledger = match &config.offline_dir {
            Some(dir) => Some(OfflineLedger::open(dir.clone()).await?),
            None => None,
        };

        Ok(Self { http, config, ledger })
    }

    /// Run the failover/retry loop. `build` is called once per try so bodies can be rebuilt.
    async fn send<F>(&self, candidates: &[Url], build: F) -> Result<Response>
    where
        F: Fn(&Client, &Url) -> Result<RequestBuilder>,
    {
        let rounds = self.config.retry.rounds();
        let mut last = "no candidate URLs".to_string();

        for attempt in 1..=rounds {
            for base in candidates {
                match build(&self.http, base)?.send().await {
                    Ok(response) if response.status().is_success() => return Ok(response),
                    Ok(response) if response.status().is_client_error() => {
                        let status = response.status().as_u16();
                        let body = response.text().await.unwrap_or_default();
                        return Err(ClientError::Status { status, body });
                    }
                    Ok(response) => {
                        last = format!("{} answered {}", base, response.status());
                        warn!(attempt, candidate = %base, status = %response.status(), "Candidate failed, trying next");
                    }
                    Err(e) => {
                        last = format!("{base}: {e}");
                        warn!(attempt, candidate = %base, error = %e, "Candidate unreachable, trying next");
                    }
                }
            }

            if attempt < rounds {
                tokio::time::sleep(self.config.retry.next_delay(attempt)).await;
            }
        }

        Err(ClientError::Exhausted { attempts: rounds, last })
    }

    /// Upload documents for a claim. Ids come back in the order the files were given.
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub async fn upload_files(&self, claim_id: &str, files: Vec<UploadFile>) -> Result<Delivery<Vec<String>>> {
        let result = self
            .send(&self.config.relay_urls, |http, base| {
                // claim_id goes first; the relay needs it before any file part
                let mut form = Form::new().text("claim_id", claim_id.to_string());
                for file in &files {
                    let mut part = Part::stream_with_length(file.content.clone(), file.content.len() as u64).file_name(file.filename.clone());
                    if let Some(content_type) = &file.content_type {
                        part = part.mime_str(content_type)?;
                    }
                    form = form.part("files", part);
                }
                Ok(http.post(endpoint(base, &["files"])?).multipart(form))
            })
            .await;

        let (file_ids, delivered) = match (result, &self.ledger) {
            (Ok(response), _) => {
                let envelope: UploadEnvelope = decode(response).await?;
                if envelope.file_ids.len() != files.len() {
                    return Err(ClientError::Schema(format!(
                        "expected {} file ids, got {}",
                        files.len(),
                        envelope.file_ids.len()
                    )));
                }
                (envelope.file_ids, true)
            }
            (Err(ClientError::Exhausted { attempts, last }), Some(_)) => {
                warn!(attempts, last = %last, "Relay unreachable, recording upload offline");
                (files.iter().map(|_| offline::new_offline_id()).collect(), false)
            }
            (Err(e), _) => return Err(e),
        };

        if let Some(ledger) = &self.ledger {
            let now = Utc::now();
            let entries = file_ids
                .iter()
                .zip(&files)
                .map(|(file_id, file)| LedgerEntry {
                    file_id: file_id.clone(),
                    filename: file.filename.clone(),
                    content_type: file.content_type.clone(),
                    recorded_at: now,
                })
                .collect();
            match ledger.record(claim_id, entries).await {
                Ok(()) => {}
                // The relay already holds the files; the caller must still get their ids
                Err(e) if delivered => warn!(error = %e, "Failed to record uploaded files in the offline ledger"),
                // Placeholders exist nowhere else
                Err(e) => return Err(e.into()),
            }
        }

        Ok(if delivered {
            Delivery::Online(file_ids)
        } else {
            Delivery::Offline(file_ids)
        })
    }

    #[instrument(skip(self))]
    pub async fn list_claim_files(&self, claim_id: &str) -> Result<Delivery<Vec<ClaimFile>>> {
        let result = self
            .send(&self.config.relay_urls, |http, base| {
                Ok(http.get(endpoint(base, &["claims", claim_id, "files"])?))
            })
            .await;

        match (result, &self.ledger) {
            (Ok(response), _) => {
                let envelope: FileListEnvelope = decode(response).await?;
                Ok(Delivery::Online(envelope.files))
            }
            (Err(ClientError::Exhausted { .. }), Some(ledger)) => {
                let files = ledger
                    .entries(claim_id)
                    .await?
                    .into_iter()
                    .map(|entry| ClaimFile {
                        file_id: entry.file_id,
                        filename: entry.filename,
                        content_type: entry.content_type,
                        size_bytes: None,
                        uploaded_at: Some(entry.recorded_at),
                    })
                    .collect();
                Ok(Delivery::Offline(files))
            }
            (Err(e), _) => Err(e),
        }
    }

    /// Run extraction over the claim's stored documents
    #[instrument(skip(self))]
    pub async fn process_claim(&self, claim_id: &str) -> Result<Vec<ExtractedClaim>> {
        let response = self
            .send(&self.config.relay_urls, |http, base| {
                Ok(http.post(endpoint(base, &["claims", claim_id, "process"])?))
            })
            .await?;

        let envelope: ProcessEnvelope = decode(response).await?;
        debug!(claims = envelope.data.len(), "Extraction finished");
        Ok(envelope.data)
    }

    /// Delete a stored file, or drop a placeholder id from the offline ledger
    #[instrument(skip(self))]
    pub async fn delete_file(&self, file_id: &str) -> Result<Delivery<()>> {
        if offline::is_offline_id(file_id) {
            let ledger = self.ledger.as_ref().ok_or(ClientError::NotConfigured("offline_dir"))?;
            if !ledger.remove(file_id).await? {
                return Err(ClientError::Status {
                    status: 404,
                    body: "File not found".to_string(),
                });
            }
            return Ok(Delivery::Offline(()));
        }

        self.send(&self.config.relay_urls, |http, base| {
            Ok(http.delete(endpoint(base, &["files", file_id])?))
        })
        .await?;

        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.remove(file_id).await {
                warn!(error = %e, "Failed to drop deleted file from the offline ledger");
            }
        }
        Ok(Delivery::Online(()))
    }

    /// URL that streams the file from the first relay candidate. Absolute URLs are returned as
    /// given; offline placeholders have no URL.
    pub fn file_stream_url(&self, file_id: &str, download: bool) -> Option<Url> {
        if file_id.starts_with("http://") || file_id.starts_with("https://") {
            return Url::parse(file_id).ok();
        }
        if file_id.is_empty() || offline::is_offline_id(file_id) {
            return None;
        }

        let mut url = endpoint(self.config.relay_urls.first()?, &["files", file_id]).ok()?;
        if download {
            url.set_query(Some("download=true"));
        }
        Some(url)
    }

    #[instrument(skip_all)]
    pub async fn appeal_guidance(&self, claim: &ExtractedClaim) -> Result<AppealGuidance> {
        let backend = self.config.backend_url.as_ref().ok_or(ClientError::NotConfigured("backend_url"))?;
        let response = self
            .send(std::slice::from_ref(backend), |http, base| {
                Ok(http.post(endpoint(base, &["get-appeal-guidance"])?).json(claim))
            })
            .await?;
        decode(response).await
    }

    #[instrument(skip_all)]
    pub async fn claim_likelihood(&self, claim: &ExtractedClaim) -> Result<ApprovalLikelihood> {
        let backend = self.config.backend_url.as_ref().ok_or(ClientError::NotConfigured("backend_url"))?;
        let response = self
            .send(std::slice::from_ref(backend), |http, base| {
                Ok(http.post(endpoint(base, &["get-claim-likelihood"])?).json(claim))
            })
            .await?;
        decode(response).await
    }

    async fn insurance_url(&self) -> Result<Url> {
        if let Some(url) = &self.config.insurance_url {
            return Ok(url.clone());
        }

        let response = self
            .send(&self.config.relay_urls, |http, base| Ok(http.get(endpoint(base, &["config"])?)))
            .await?;
        let relay_config: RelayConfig = decode(response).await?;
        relay_config.insurance_api_url.ok_or(ClientError::NotConfigured("insurance_url"))
    }

    #[instrument(skip(self))]
    pub async fn submit_to_insurance(&self, claim_id: &str, provider_id: Option<&str>) -> Result<SubmissionReceipt> {
        let insurance = self.insurance_url().await?;
        let request = SubmissionRequest { claim_id, provider_id };
        let response = self
            .send(std::slice::from_ref(&insurance), |http, base| {
                Ok(http.post(endpoint(base, &["insurance", "submit"])?).json(&request))
            })
            .await?;
        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_config, install_crypto_provider};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEAD_RELAY: &str = "http://127.0.0.1:9";

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
        }
    }

    async fn client(relay_urls: Vec<&str>, configure: impl FnOnce(&mut ClientConfig)) -> RelayClient {
        install_crypto_provider();
        let mut config = ClientConfig {
            relay_urls: relay_urls.into_iter().map(|u| Url::parse(u).unwrap()).collect(),
            retry: fast_retry(2),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        configure(&mut config);
        RelayClient::new(config).await.unwrap()
    }

    fn sample_claim() -> ExtractedClaim {
        ExtractedClaim {
            condition: "Generalized anxiety disorder".to_string(),
            date: "2025-02-10".to_string(),
            health_insurance_provider: "Acme Health".to_string(),
            requested_treatment: "Cognitive behavioural therapy".to_string(),
            explanation: "Twelve sessions recommended by the treating psychiatrist".to_string(),
        }
    }

    #[tokio::test]
    async fn test_falls_over_to_second_candidate() {
        let relay = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "fileIds": ["f-1", "f-2"] })))
            .expect(1)
            .mount(&relay)
            .await;

        let client = client(vec![DEAD_RELAY, relay.uri().as_str()], |_| {}).await;
        let delivery = client
            .upload_files(
                "MH-2025-0001",
                vec![UploadFile::pdf("a.pdf", &b"%PDF a"[..]), UploadFile::pdf("b.pdf", &b"%PDF b"[..])],
            )
            .await
            .unwrap();

        assert_eq!(delivery, Delivery::Online(vec!["f-1".to_string(), "f-2".to_string()]));
    }

    #[tokio::test]
    async fn test_server_error_moves_to_next_candidate() {
        let failing = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&failing)
            .await;
        let healthy = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/claims/MH-2025-0001/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{ "file_id": "f-1", "filename": "a.pdf", "claim_id": "MH-2025-0001", "size_bytes": 6 }]
            })))
            .mount(&healthy)
            .await;

        let client = client(vec![failing.uri().as_str(), healthy.uri().as_str()], |_| {}).await;
        let files = client.list_claim_files("MH-2025-0001").await.unwrap();

        assert!(!files.is_offline());
        let files = files.into_inner();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "a.pdf");
        assert_eq!(files[0].size_bytes, Some(6));
    }

    #[tokio::test]
    async fn test_exhausted_after_capped_attempts() {
        let relay = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&relay)
            .await;

        let client = client(vec![relay.uri().as_str()], |config| config.retry = fast_retry(3)).await;
        let err = client.process_claim("MH-2025-0001").await.unwrap_err();

        match err {
            ClientError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.contains("500"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let relay = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "No PDF files found for this claim" })))
            .expect(1)
            .mount(&relay)
            .await;

        let client = client(vec![relay.uri().as_str()], |config| config.retry = fast_retry(5)).await;
        let err = client.process_claim("MH-2025-0002").await.unwrap_err();

        match err {
            ClientError::Status { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("No PDF files found"));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_offline_upload_is_listed_back() {
        let ledger_dir = tempfile::tempdir().unwrap();
        let client = client(vec![DEAD_RELAY], |config| {
            config.offline_dir = Some(ledger_dir.path().to_path_buf());
        })
        .await;

        let delivery = client
            .upload_files(
                "MH-2025-0003",
                vec![UploadFile::pdf("intake.pdf", &b"%PDF"[..]), UploadFile::pdf("referral.pdf", &b"%PDF"[..])],
            )
            .await
            .unwrap();

        assert!(delivery.is_offline());
        let ids = delivery.into_inner();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.starts_with("offline-")));

        let listing = client.list_claim_files("MH-2025-0003").await.unwrap();
        assert!(listing.is_offline());
        let files = listing.into_inner();
        let listed: Vec<&str> = files.iter().map(|f| f.file_id.as_str()).collect();
        assert_eq!(listed, ids.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(files[0].filename, "intake.pdf");

        assert!(client.file_stream_url(&ids[0], false).is_none());
        assert!(client.delete_file(&ids[0]).await.unwrap().is_offline());
        assert_eq!(client.list_claim_files("MH-2025-0003").await.unwrap().into_inner().len(), 1);

        let err = client.delete_file(&ids[0]).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
        let err = client.delete_file("offline-never-recorded").await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_uploaded_ids_survive_a_broken_ledger() {
        let relay = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "fileIds": ["f-1"] })))
            .expect(1)
            .mount(&relay)
            .await;

        let ledger_dir = tempfile::tempdir().unwrap();
        let client = client(vec![relay.uri().as_str()], |config| {
            config.offline_dir = Some(ledger_dir.path().to_path_buf());
        })
        .await;

        let claim_file = OfflineLedger::open(ledger_dir.path()).await.unwrap().claim_path("MH-2025-0001");
        std::fs::write(&claim_file, b"{ not json").unwrap();

        let delivery = client
            .upload_files("MH-2025-0001", vec![UploadFile::pdf("intake.pdf", &b"%PDF"[..])])
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Online(vec!["f-1".to_string()]));
    }

    #[tokio::test]
    async fn test_invalid_retry_policy_is_rejected() {
        install_crypto_provider();
        let config = ClientConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(500),
                multiplier: -2.0,
            },
            ..Default::default()
        };

        let err = RelayClient::new(config).await.err().unwrap();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_without_offline_dir_exhaustion_is_an_error() {
        let client = client(vec![DEAD_RELAY], |_| {}).await;
        let err = client
            .upload_files("MH-2025-0003", vec![UploadFile::pdf("intake.pdf", &b"%PDF"[..])])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Exhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_process_claim_is_typed() {
        let relay = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/claims/MH-2025-0001/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [sample_claim()]
            })))
            .mount(&relay)
            .await;
        Mock::given(method("POST"))
            .and(path("/claims/MH-2025-0005/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "claims": [] }
            })))
            .mount(&relay)
            .await;

        let client = client(vec![relay.uri().as_str()], |_| {}).await;
        assert_eq!(client.process_claim("MH-2025-0001").await.unwrap(), vec![sample_claim()]);
        assert!(matches!(
            client.process_claim("MH-2025-0005").await.unwrap_err(),
            ClientError::Schema(_)
        ));
    }

    #[tokio::test]
    async fn test_schema_mismatch_fails_loudly() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/get-claim-likelihood"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "approval_probability": 1.7,
                "message": "Likely approved"
            })))
            .mount(&backend)
            .await;
        Mock::given(method("POST"))
            .and(path("/get-appeal-guidance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "guidance": "Attach the referral" })))
            .mount(&backend)
            .await;

        let backend_url = Url::parse(&backend.uri()).unwrap();
        let client = client(vec![DEAD_RELAY], |config| config.backend_url = Some(backend_url)).await;

        assert!(matches!(
            client.claim_likelihood(&sample_claim()).await.unwrap_err(),
            ClientError::Schema(_)
        ));
        assert!(matches!(
            client.appeal_guidance(&sample_claim()).await.unwrap_err(),
            ClientError::Schema(_)
        ));
    }

    #[tokio::test]
    async fn test_analysis_calls_decode_contracts() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/get-claim-likelihood"))
            .and(body_json(json!(sample_claim())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "approval_probability": 0.82,
                "message": "Likely approved",
                "contributing_factors": [{ "factor": "in-network provider", "weight": 0.3 }]
            })))
            .mount(&backend)
            .await;
        Mock::given(method("POST"))
            .and(path("/get-appeal-guidance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "guidelines": ["Attach the psychiatrist's referral"],
                "reasoning": "Similar appeals succeeded with documented referrals"
            })))
            .mount(&backend)
            .await;

        let backend_url = Url::parse(&backend.uri()).unwrap();
        let client = client(vec![DEAD_RELAY], |config| config.backend_url = Some(backend_url)).await;

        let likelihood = client.claim_likelihood(&sample_claim()).await.unwrap();
        assert_eq!(likelihood.approval_probability, 0.82);
        assert_eq!(likelihood.contributing_factors.unwrap().len(), 1);

        let guidance = client.appeal_guidance(&sample_claim()).await.unwrap();
        assert_eq!(guidance.guidelines, vec!["Attach the psychiatrist's referral"]);
    }

    #[tokio::test]
    async fn test_submit_discovers_insurance_url_from_relay() {
        let insurance = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/insurance/submit"))
            .and(body_json(json!({ "claim_id": "MH-2025-0001" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "tracking_id": "INS-MH-2025-0001-TRACK",
                "message": "Claim submitted successfully",
                "details": { "status": "RECEIVED" }
            })))
            .expect(1)
            .mount(&insurance)
            .await;

        let relay = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "insurance_api_url": insurance.uri(),
                "max_files_per_batch": 3,
                "max_file_size": 52428800
            })))
            .mount(&relay)
            .await;

        let client = client(vec![relay.uri().as_str()], |_| {}).await;
        let receipt = client.submit_to_insurance("MH-2025-0001", None).await.unwrap();
        assert_eq!(receipt.tracking_id.as_deref(), Some("INS-MH-2025-0001-TRACK"));
    }

    #[tokio::test]
    async fn test_file_stream_url() {
        let client = client(vec!["http://relay.internal:3001/api"], |_| {}).await;

        assert_eq!(
            client.file_stream_url("6f1c2a9e", false).unwrap().as_str(),
            "http://relay.internal:3001/api/files/6f1c2a9e"
        );
        assert_eq!(
            client.file_stream_url("6f1c2a9e", true).unwrap().as_str(),
            "http://relay.internal:3001/api/files/6f1c2a9e?download=true"
        );
        assert_eq!(
            client.file_stream_url("https://cdn.example.com/a.pdf", false).unwrap().as_str(),
            "https://cdn.example.com/a.pdf"
        );
        assert!(client.file_stream_url("", false).is_none());
    }

    #[tokio::test]
    async fn test_end_to_end_against_relay() {
        let store_dir = tempfile::tempdir().unwrap();
        install_crypto_provider();
        let router = crate::Application::new(create_test_config(store_dir.path()))
            .await
            .unwrap()
            .into_router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service()).await.unwrap();
        });

        let relay_url = format!("http://{address}");
        let client = client(vec![DEAD_RELAY, relay_url.as_str()], |_| {}).await;

        let ids = client
            .upload_files(
                "MH-2025-0001",
                vec![
                    UploadFile::pdf("summary.pdf", &b"%PDF-1.7 summary"[..]),
                    UploadFile::pdf("records.pdf", &b"%PDF-1.7 records"[..]),
                ],
            )
            .await
            .unwrap()
            .into_inner();
        assert_eq!(ids.len(), 2);

        let files = client.list_claim_files("MH-2025-0001").await.unwrap().into_inner();
        assert_eq!(files.len(), 2);

        // file_stream_url points at the first candidate, so resolve against the live relay here
        let stream_url = format!("{relay_url}/files/{}?download=true", ids[0]);
        let response = reqwest::get(&stream_url).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"summary.pdf\""
        );
        assert_eq!(response.bytes().await.unwrap(), &b"%PDF-1.7 summary"[..]);

        assert_eq!(client.delete_file(&ids[0]).await.unwrap(), Delivery::Online(()));
        let err = client.delete_file(&ids[0]).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
    }
}
