use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::db;
use crate::keys::DIRTY_PREFIX;
use crate::store::LocalStore;

pub const EXPORT_FORMAT: &str = "daybook-export";
pub const EXPORT_VERSION: u32 = 1;

/// Full dump of the local key space. Values are the stored JSON text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportDocument {
    pub format: String,
    pub version: u32,
    pub exported_at: String,
    pub sha256: String,
    pub entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped_markers: usize,
    pub legacy: bool,
}

pub fn export(store: &LocalStore) -> Result<ExportDocument, TransferError> {
    let entries: BTreeMap<String, String> = store.entries()?.into_iter().collect();
    let document = ExportDocument {
        format: EXPORT_FORMAT.to_string(),
        version: EXPORT_VERSION,
        exported_at: db::now_utc_rfc3339(),
        sha256: checksum(&entries),
        entries,
    };
    info!(entries = document.entries.len(), "exported local records");
    Ok(document)
}

/// Replaces every local record with the contents of `raw`. Imported data
/// is presumed to match a remote snapshot already, so nothing is marked
/// dirty and existing markers are dropped.
pub fn import(store: &LocalStore, raw: &str) -> Result<ImportSummary, TransferError> {
    let (entries, legacy) = parse(raw)?;
    let total = entries.len();
    let kept: Vec<(String, String)> = entries
        .into_iter()
        .filter(|(key, _)| !key.starts_with(DIRTY_PREFIX))
        .collect();
    let summary = ImportSummary {
        imported: kept.len(),
        skipped_markers: total - kept.len(),
        legacy,
    };
    store.replace_all(&kept)?;
    info!(
        imported = summary.imported,
        legacy = summary.legacy,
        "imported local records"
    );
    Ok(summary)
}

fn parse(raw: &str) -> Result<(BTreeMap<String, String>, bool), TransferError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(object) = value else {
        return Err(TransferError::InvalidDocument(
            "expected a JSON object".to_string(),
        ));
    };

    if object.get("format").and_then(Value::as_str) == Some(EXPORT_FORMAT) {
        let document: ExportDocument = serde_json::from_value(Value::Object(object))?;
        if document.version > EXPORT_VERSION {
            return Err(TransferError::UnsupportedVersion(document.version));
        }
        let actual = checksum(&document.entries);
        if actual != document.sha256 {
            return Err(TransferError::ChecksumMismatch {
                expected: document.sha256,
                actual,
            });
        }
        return Ok((document.entries, false));
    }

    // Older backups are a flat map of stored text; non-string values are
    // re-encoded so every record stays valid JSON text.
    let entries = object
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => (key, text),
            other => (key, other.to_string()),
        })
        .collect();
    Ok((entries, true))
}

fn checksum(entries: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in entries {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[derive(Debug)]
pub enum TransferError {
    Db(rusqlite::Error),
    Json(serde_json::Error),
    InvalidDocument(String),
    UnsupportedVersion(u32),
    ChecksumMismatch { expected: String, actual: String },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Db(err) => write!(f, "database error: {}", err),
            TransferError::Json(err) => write!(f, "JSON parse error: {}", err),
            TransferError::InvalidDocument(message) => {
                write!(f, "invalid backup document: {}", message)
            }
            TransferError::UnsupportedVersion(version) => write!(
                f,
                "backup version {} is newer than supported version {}",
                version, EXPORT_VERSION
            ),
            TransferError::ChecksumMismatch { expected, actual } => write!(
                f,
                "backup checksum mismatch: expected {}, computed {}",
                expected, actual
            ),
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransferError::Db(err) => Some(err),
            TransferError::Json(err) => Some(err),
            TransferError::InvalidDocument(_)
            | TransferError::UnsupportedVersion(_)
            | TransferError::ChecksumMismatch { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for TransferError {
    fn from(value: rusqlite::Error) -> Self {
        TransferError::Db(value)
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(value: serde_json::Error) -> Self {
        TransferError::Json(value)
    }
}
