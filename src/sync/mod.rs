use std::error::Error;
use std::fmt;

use serde::Serialize;
use time::Date;
use tracing::{info, warn};

use crate::db;
use crate::locks::LockError;
use crate::remote::{RemoteError, RemoteGateway};
use crate::store::LocalStore;

mod pull;
mod push;

pub const DEFAULT_LIST_ICON: &str = "📝";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeyFailure {
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PushSummary {
    pub attempted: u64,
    pub pushed: u64,
    pub cleared_without_push: u64,
    pub failures: Vec<KeyFailure>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PullSummary {
    pub written: u64,
    pub pruned: u64,
    pub habit_checks: u64,
    pub failures: Vec<KeyFailure>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncSummary {
    pub push: PushSummary,
    pub pull: PullSummary,
    pub last_error: Option<String>,
}

/// Result of the user-triggered full upload.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UploadSummary {
    pub count: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Pending(usize),
    Error(String),
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Pending(count) => write!(f, "pending ({count})"),
            SyncStatus::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// A recorded error outranks pending uploads.
pub fn current_status(store: &LocalStore) -> rusqlite::Result<SyncStatus> {
    if let Some(message) = db::get_meta(store.conn(), db::META_LAST_SYNC_ERROR)? {
        return Ok(SyncStatus::Error(message));
    }
    match store.count_dirty()? {
        0 => Ok(SyncStatus::Synced),
        pending => Ok(SyncStatus::Pending(pending)),
    }
}

pub fn record_last_error(store: &LocalStore, last_error: Option<&str>) -> rusqlite::Result<()> {
    match last_error {
        Some(message) => db::set_meta(store.conn(), db::META_LAST_SYNC_ERROR, message),
        None => db::delete_meta(store.conn(), db::META_LAST_SYNC_ERROR),
    }
}

pub struct SyncEngine<'a> {
    store: &'a LocalStore,
    remote: &'a dyn RemoteGateway,
    today: Date,
    default_icon: &'a str,
}

impl<'a> SyncEngine<'a> {
    pub fn new(store: &'a LocalStore, remote: &'a dyn RemoteGateway, today: Date) -> Self {
        Self {
            store,
            remote,
            today,
            default_icon: DEFAULT_LIST_ICON,
        }
    }

    pub fn with_default_icon(mut self, icon: &'a str) -> Self {
        self.default_icon = icon;
        self
    }

    pub(crate) fn store(&self) -> &'a LocalStore {
        self.store
    }

    /// Push every dirty key, then pull canonical remote state.
    pub fn sync(&self) -> Result<SyncSummary, SyncError> {
        if !self.remote.is_authenticated() {
            return Err(SyncError::NotAuthenticated);
        }
        info!(pending = self.store.count_dirty()?, "sync started");

        let push = self.push_dirty()?;
        let pull = self.pull()?;

        let last_error = push
            .failures
            .iter()
            .chain(pull.failures.iter())
            .last()
            .map(|failure| failure.message.clone());
        record_last_error(self.store, last_error.as_deref())?;
        db::set_meta(
            self.store.conn(),
            db::META_LAST_SYNCED_AT,
            &db::now_utc_rfc3339(),
        )?;

        if let Some(message) = &last_error {
            warn!(error = %message, "sync finished with errors");
        } else {
            info!(
                pushed = push.pushed,
                written = pull.written,
                pruned = pull.pruned,
                "sync finished"
            );
        }
        Ok(SyncSummary {
            push,
            pull,
            last_error,
        })
    }
}

#[derive(Debug)]
pub enum SyncError {
    NotAuthenticated,
    RemoteWriteFailed { key: String, source: RemoteError },
    RemoteReadFailed { resource: String, source: RemoteError },
    MalformedLocalRecord(String),
    Db(rusqlite::Error),
    Lock(LockError),
}

impl SyncError {
    fn from_remote_write(key: &str, source: RemoteError) -> Self {
        if source.is_not_authenticated() {
            return SyncError::NotAuthenticated;
        }
        SyncError::RemoteWriteFailed {
            key: key.to_string(),
            source,
        }
    }

    fn from_remote_read(resource: &str, source: RemoteError) -> Self {
        if source.is_not_authenticated() {
            return SyncError::NotAuthenticated;
        }
        SyncError::RemoteReadFailed {
            resource: resource.to_string(),
            source,
        }
    }

    /// Failures that stay scoped to one key or one pull step.
    fn is_isolated(&self) -> bool {
        !matches!(self, SyncError::Db(_) | SyncError::Lock(_))
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::NotAuthenticated => {
                write!(f, "not logged in: no active remote session")
            }
            SyncError::RemoteWriteFailed { key, source } => {
                write!(f, "remote write failed for '{}': {}", key, source)
            }
            SyncError::RemoteReadFailed { resource, source } => {
                write!(f, "remote read failed for {}: {}", resource, source)
            }
            SyncError::MalformedLocalRecord(key) => {
                write!(f, "local record '{}' is not valid JSON for its family", key)
            }
            SyncError::Db(err) => write!(f, "database error: {}", err),
            SyncError::Lock(err) => write!(f, "{}", err),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SyncError::RemoteWriteFailed { source, .. } => Some(source),
            SyncError::RemoteReadFailed { source, .. } => Some(source),
            SyncError::Db(err) => Some(err),
            SyncError::Lock(err) => Some(err),
            SyncError::NotAuthenticated | SyncError::MalformedLocalRecord(_) => None,
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(value: rusqlite::Error) -> Self {
        SyncError::Db(value)
    }
}

impl From<LockError> for SyncError {
    fn from(value: LockError) -> Self {
        SyncError::Lock(value)
    }
}

#[cfg(test)]
mod error_tests;
