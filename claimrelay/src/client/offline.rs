//! On-disk ledger of a claim's file ids, used by the facade's offline mode.
//!
//! One JSON file per claim (`claim-<hex of id>.json`) holding the entries in upload order. Entries are
//! recorded for every successful upload, and for placeholder ids minted while the relay was
//! unreachable, so an offline listing can still show what the user attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Prefix of ids minted while offline; they never name a stored file
pub const OFFLINE_ID_PREFIX: &str = "offline-";

pub fn new_offline_id() -> String {
    format!("{OFFLINE_ID_PREFIX}{}", uuid::Uuid::new_v4())
}

pub fn is_offline_id(file_id: &str) -> bool {
    file_id.starts_with(OFFLINE_ID_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub file_id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

pub struct OfflineLedger {
    dir: PathBuf,
    // Serializes read-modify-write of claim files within this process
    lock: Mutex<()>,
}

impl OfflineLedger {
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir, lock: Mutex::new(()) })
    }

    /// Ledger file for a claim. The id is hex-encoded so distinct ids never share a file.
    pub(crate) fn claim_path(&self, claim_id: &str) -> PathBuf {
        let encoded: String = claim_id.bytes().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("claim-{encoded}.json"))
    }

    async fn read(path: &Path) -> std::io::Result<Vec<LedgerEntry>> {
        match fs::read(path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn write(path: &Path, entries: &[LedgerEntry]) -> std::io::Result<()> {
        let raw = serde_json::to_vec_pretty(entries).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, path).await
    }

    /// Append entries to the claim's ledger, skipping ids already present
    pub async fn record(&self, claim_id: &str, entries: Vec<LedgerEntry>) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.claim_path(claim_id);
        let mut existing = Self::read(&path).await?;
        for entry in entries {
            if !existing.iter().any(|e| e.file_id == entry.file_id) {
                existing.push(entry);
            }
        }
        Self::write(&path, &existing).await
    }

    pub async fn entries(&self, claim_id: &str) -> std::io::Result<Vec<LedgerEntry>> {
        let _guard = self.lock.lock().await;
        Self::read(&self.claim_path(claim_id)).await
    }

    /// Drop `file_id` from whichever claim lists it. Returns whether anything was removed.
    pub async fn remove(&self, file_id: &str) -> std::io::Result<bool> {
        let _guard = self.lock.lock().await;
        let mut removed = false;

        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let mut entries = Self::read(&path).await?;
            let before = entries.len();
            entries.retain(|e| e.file_id != file_id);
            if entries.len() != before {
                Self::write(&path, &entries).await?;
                removed = true;
            }
        }

        Ok(removed)
    }
}
