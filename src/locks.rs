use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

pub const SYNC_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum LockError {
    Busy { path: PathBuf, holder: Option<String> },
    Io(std::io::Error),
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::Busy { path, holder } => match holder {
                Some(holder) => write!(
                    f,
                    "sync lock busy: {} (held by {})",
                    path.display(),
                    holder
                ),
                None => write!(f, "sync lock busy: {}", path.display()),
            },
            LockError::Io(err) => write!(f, "sync lock I/O error: {}", err),
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LockError::Busy { .. } => None,
            LockError::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LockError {
    fn from(value: std::io::Error) -> Self {
        LockError::Io(value)
    }
}

/// Serializes sync cycles against one local database across processes.
/// The lock file sits next to the database and is removed on drop.
#[derive(Debug)]
pub struct SyncLock {
    path: PathBuf,
    _file: File,
}

impl SyncLock {
    pub fn path_for(db_path: &str) -> PathBuf {
        PathBuf::from(format!("{db_path}.sync.lock"))
    }

    pub fn acquire(db_path: &str, timeout: Duration) -> Result<Self, LockError> {
        let path = Self::path_for(db_path);
        let start = Instant::now();
        loop {
            match try_acquire(&path)? {
                Some(guard) => return Ok(guard),
                None if start.elapsed() >= timeout => {
                    return Err(LockError::Busy {
                        holder: read_holder(&path),
                        path,
                    });
                }
                None => thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    pub fn try_acquire(db_path: &str) -> Result<Option<Self>, LockError> {
        try_acquire(&Self::path_for(db_path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn try_acquire(path: &Path) -> Result<Option<SyncLock>, LockError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            writeln!(file, "pid {}", std::process::id())?;
            debug!(path = %path.display(), "sync lock acquired");
            Ok(Some(SyncLock {
                path: path.to_path_buf(),
                _file: file,
            }))
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(err) => Err(LockError::Io(err)),
    }
}

fn read_holder(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let holder = raw.trim();
    (!holder.is_empty()).then(|| holder.to_string())
}
