use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod sqlite;

pub use sqlite::SqliteRemote;

/// Board payload on the wire: column name to ordered items.
pub type RemoteBoard = BTreeMap<String, Vec<Value>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteList {
    pub name: String,
    pub items: Vec<Value>,
    pub icon: String,
}

/// Contract for the hosted data service. Every call is independent and
/// fallible; without a session every call returns `NotAuthenticated`
/// without touching the backend.
///
/// Day-scoped lists (goals and calendar tasks) share one snapshot-capable
/// family; everything else is fetched per scope.
pub trait RemoteGateway {
    fn session(&self) -> Option<&Session>;

    fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    fn get_goals(&self, scope: &str) -> Result<Vec<Value>, RemoteError>;
    fn set_goals(&self, scope: &str, items: &[Value]) -> Result<(), RemoteError>;
    fn get_all_goals(&self) -> Result<BTreeMap<String, Vec<Value>>, RemoteError>;

    fn get_notes(&self, scope: &str) -> Result<Option<String>, RemoteError>;
    fn set_notes(&self, scope: &str, content: &str) -> Result<(), RemoteError>;

    fn get_habits(&self) -> Result<Vec<Value>, RemoteError>;
    fn set_habits(&self, habits: &[Value]) -> Result<(), RemoteError>;

    fn get_kanban(&self, week_key: &str) -> Result<RemoteBoard, RemoteError>;
    fn set_kanban(&self, week_key: &str, board: &RemoteBoard) -> Result<(), RemoteError>;

    fn get_backlog(&self) -> Result<RemoteBoard, RemoteError>;
    fn set_backlog(&self, board: &RemoteBoard) -> Result<(), RemoteError>;

    fn get_list(&self, name: &str) -> Result<Option<RemoteList>, RemoteError>;
    fn set_list(&self, name: &str, items: &[Value], icon: &str) -> Result<(), RemoteError>;
    fn get_all_lists(&self) -> Result<Vec<RemoteList>, RemoteError>;
    fn delete_list(&self, name: &str) -> Result<(), RemoteError>;

    fn get_setting(&self, key: &str) -> Result<Option<Value>, RemoteError>;
    fn set_setting(&self, key: &str, value: &Value) -> Result<(), RemoteError>;
}

#[derive(Debug)]
pub enum RemoteError {
    NotAuthenticated,
    Db(rusqlite::Error),
    Json(serde_json::Error),
    Rejected(String),
}

impl RemoteError {
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, RemoteError::NotAuthenticated)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::NotAuthenticated => write!(f, "no active remote session"),
            RemoteError::Db(err) => write!(f, "remote database error: {}", err),
            RemoteError::Json(err) => write!(f, "remote payload error: {}", err),
            RemoteError::Rejected(message) => write!(f, "remote rejected request: {}", message),
        }
    }
}

impl Error for RemoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RemoteError::Db(err) => Some(err),
            RemoteError::Json(err) => Some(err),
            RemoteError::NotAuthenticated | RemoteError::Rejected(_) => None,
        }
    }
}

impl From<rusqlite::Error> for RemoteError {
    fn from(value: rusqlite::Error) -> Self {
        RemoteError::Db(value)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(value: serde_json::Error) -> Self {
        RemoteError::Json(value)
    }
}

/// Gateway used when no remote store is configured.
#[derive(Debug, Default)]
pub struct Offline;

impl RemoteGateway for Offline {
    fn session(&self) -> Option<&Session> {
        None
    }

    fn get_goals(&self, _scope: &str) -> Result<Vec<Value>, RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn set_goals(&self, _scope: &str, _items: &[Value]) -> Result<(), RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn get_all_goals(&self) -> Result<BTreeMap<String, Vec<Value>>, RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn get_notes(&self, _scope: &str) -> Result<Option<String>, RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn set_notes(&self, _scope: &str, _content: &str) -> Result<(), RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn get_habits(&self) -> Result<Vec<Value>, RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn set_habits(&self, _habits: &[Value]) -> Result<(), RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn get_kanban(&self, _week_key: &str) -> Result<RemoteBoard, RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn set_kanban(&self, _week_key: &str, _board: &RemoteBoard) -> Result<(), RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn get_backlog(&self) -> Result<RemoteBoard, RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn set_backlog(&self, _board: &RemoteBoard) -> Result<(), RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn get_list(&self, _name: &str) -> Result<Option<RemoteList>, RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn set_list(&self, _name: &str, _items: &[Value], _icon: &str) -> Result<(), RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn get_all_lists(&self) -> Result<Vec<RemoteList>, RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn delete_list(&self, _name: &str) -> Result<(), RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn get_setting(&self, _key: &str) -> Result<Option<Value>, RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }

    fn set_setting(&self, _key: &str, _value: &Value) -> Result<(), RemoteError> {
        Err(RemoteError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests;
