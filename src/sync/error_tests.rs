use std::error::Error;
use std::path::PathBuf;

use super::SyncError;
use crate::locks::LockError;
use crate::remote::RemoteError;

#[test]
fn remote_session_loss_maps_to_not_authenticated() {
    let write = SyncError::from_remote_write("goals-2024-0-1", RemoteError::NotAuthenticated);
    assert!(matches!(write, SyncError::NotAuthenticated));

    let read = SyncError::from_remote_read("habits", RemoteError::NotAuthenticated);
    assert!(matches!(read, SyncError::NotAuthenticated));

    let rejected = SyncError::from_remote_write(
        "goals-2024-0-1",
        RemoteError::Rejected("quota".to_string()),
    );
    assert!(matches!(
        rejected,
        SyncError::RemoteWriteFailed { ref key, .. } if key == "goals-2024-0-1"
    ));
}

#[test]
fn only_local_storage_failures_abort_a_batch() {
    assert!(SyncError::NotAuthenticated.is_isolated());
    assert!(SyncError::MalformedLocalRecord("backlog".to_string()).is_isolated());
    assert!(SyncError::from_remote_read("lists", RemoteError::Rejected("down".into())).is_isolated());

    let db: SyncError = rusqlite::Error::InvalidQuery.into();
    assert!(!db.is_isolated());
    let lock: SyncError = LockError::Busy {
        path: PathBuf::from("/tmp/sync.lock"),
        holder: None,
    }
    .into();
    assert!(!lock.is_isolated());
}

#[test]
fn sync_error_display_and_source_cover_all_variants() {
    let unauthenticated = SyncError::NotAuthenticated;
    assert!(unauthenticated.to_string().contains("not logged in"));
    assert!(unauthenticated.source().is_none());

    let write = SyncError::from_remote_write("week-2024-W1", RemoteError::Rejected("no".into()));
    assert!(write.to_string().contains("remote write failed for 'week-2024-W1'"));
    assert!(write.source().is_some());

    let read = SyncError::from_remote_read("all goals", RemoteError::Rejected("no".into()));
    assert!(read.to_string().contains("remote read failed for all goals"));
    assert!(read.source().is_some());

    let malformed = SyncError::MalformedLocalRecord("list-x".to_string());
    assert!(malformed.to_string().contains("'list-x' is not valid JSON"));
    assert!(malformed.source().is_none());

    let db: SyncError = rusqlite::Error::InvalidQuery.into();
    assert!(db.to_string().contains("database error"));
    assert!(db.source().is_some());

    let lock: SyncError = LockError::Busy {
        path: PathBuf::from("/tmp/sync.lock"),
        holder: None,
    }
    .into();
    assert!(lock.to_string().contains("busy"));
    assert!(lock.source().is_some());
}
