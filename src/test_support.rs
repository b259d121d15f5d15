use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use time::{Date, Month};
use uuid::Uuid;

use crate::remote::{RemoteBoard, RemoteError, RemoteGateway, RemoteList, Session};

pub fn unique_db_path(prefix: &str) -> String {
    std::env::temp_dir()
        .join(format!("{prefix}-{}.sqlite", Uuid::now_v7()))
        .display()
        .to_string()
}

pub fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }
}

pub fn date(year: i32, month: Month, day: u8) -> Date {
    Date::from_calendar_date(year, month, day).expect("valid test date")
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FakeState {
    pub goals: BTreeMap<String, Vec<Value>>,
    pub notes: BTreeMap<String, String>,
    pub habits: Vec<Value>,
    pub kanban: BTreeMap<String, RemoteBoard>,
    pub backlog: RemoteBoard,
    pub lists: Vec<RemoteList>,
    pub settings: BTreeMap<String, Value>,
}

/// In-memory gateway with call recording and per-scope fault injection.
pub struct FakeRemote {
    session: Option<Session>,
    pub state: RefCell<FakeState>,
    pub calls: RefCell<Vec<String>>,
    failing_writes: RefCell<HashSet<String>>,
    failing_reads: RefCell<HashSet<String>>,
}

impl FakeRemote {
    pub fn signed_in(user: &str) -> Self {
        Self {
            session: Some(Session::new(user)),
            state: RefCell::new(FakeState::default()),
            calls: RefCell::new(Vec::new()),
            failing_writes: RefCell::new(HashSet::new()),
            failing_reads: RefCell::new(HashSet::new()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            session: None,
            ..Self::signed_in("nobody")
        }
    }

    /// Writes to `scope` (a record key, list name or singleton name) fail.
    pub fn fail_writes_to(&self, scope: &str) {
        self.failing_writes.borrow_mut().insert(scope.to_string());
    }

    pub fn heal_writes_to(&self, scope: &str) {
        self.failing_writes.borrow_mut().remove(scope);
    }

    /// Reads of `resource` (e.g. `all_goals`, `habits`, `kanban`) fail.
    pub fn fail_reads_of(&self, resource: &str) {
        self.failing_reads.borrow_mut().insert(resource.to_string());
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.split(':').next() == Some(name))
            .count()
    }

    fn write(&self, op: &str, scope: &str) -> Result<(), RemoteError> {
        self.calls.borrow_mut().push(format!("{op}:{scope}"));
        if self.session.is_none() {
            return Err(RemoteError::NotAuthenticated);
        }
        if self.failing_writes.borrow().contains(scope) {
            return Err(RemoteError::Rejected(format!("write to {scope} refused")));
        }
        Ok(())
    }

    fn read(&self, resource: &str) -> Result<(), RemoteError> {
        self.calls.borrow_mut().push(format!("get_{resource}"));
        if self.session.is_none() {
            return Err(RemoteError::NotAuthenticated);
        }
        if self.failing_reads.borrow().contains(resource) {
            return Err(RemoteError::Rejected(format!("read of {resource} refused")));
        }
        Ok(())
    }
}

impl RemoteGateway for FakeRemote {
    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn get_goals(&self, scope: &str) -> Result<Vec<Value>, RemoteError> {
        self.read("goals")?;
        Ok(self
            .state
            .borrow()
            .goals
            .get(scope)
            .cloned()
            .unwrap_or_default())
    }

    fn set_goals(&self, scope: &str, items: &[Value]) -> Result<(), RemoteError> {
        self.write("set_goals", scope)?;
        let mut state = self.state.borrow_mut();
        if items.is_empty() {
            state.goals.remove(scope);
        } else {
            state.goals.insert(scope.to_string(), items.to_vec());
        }
        Ok(())
    }

    fn get_all_goals(&self) -> Result<BTreeMap<String, Vec<Value>>, RemoteError> {
        self.read("all_goals")?;
        Ok(self.state.borrow().goals.clone())
    }

    fn get_notes(&self, scope: &str) -> Result<Option<String>, RemoteError> {
        self.read("notes")?;
        Ok(self.state.borrow().notes.get(scope).cloned())
    }

    fn set_notes(&self, scope: &str, content: &str) -> Result<(), RemoteError> {
        self.write("set_notes", scope)?;
        self.state
            .borrow_mut()
            .notes
            .insert(scope.to_string(), content.to_string());
        Ok(())
    }

    fn get_habits(&self) -> Result<Vec<Value>, RemoteError> {
        self.read("habits")?;
        Ok(self.state.borrow().habits.clone())
    }

    fn set_habits(&self, habits: &[Value]) -> Result<(), RemoteError> {
        self.write("set_habits", "habits")?;
        self.state.borrow_mut().habits = habits.to_vec();
        Ok(())
    }

    fn get_kanban(&self, week_key: &str) -> Result<RemoteBoard, RemoteError> {
        self.read("kanban")?;
        Ok(self
            .state
            .borrow()
            .kanban
            .get(week_key)
            .cloned()
            .unwrap_or_default())
    }

    fn set_kanban(&self, week_key: &str, board: &RemoteBoard) -> Result<(), RemoteError> {
        self.write("set_kanban", week_key)?;
        self.state
            .borrow_mut()
            .kanban
            .insert(week_key.to_string(), board.clone());
        Ok(())
    }

    fn get_backlog(&self) -> Result<RemoteBoard, RemoteError> {
        self.read("backlog")?;
        Ok(self.state.borrow().backlog.clone())
    }

    fn set_backlog(&self, board: &RemoteBoard) -> Result<(), RemoteError> {
        self.write("set_backlog", "backlog")?;
        self.state.borrow_mut().backlog = board.clone();
        Ok(())
    }

    fn get_list(&self, name: &str) -> Result<Option<RemoteList>, RemoteError> {
        self.read("list")?;
        Ok(self
            .state
            .borrow()
            .lists
            .iter()
            .find(|list| list.name == name)
            .cloned())
    }

    fn set_list(&self, name: &str, items: &[Value], icon: &str) -> Result<(), RemoteError> {
        self.write("set_list", name)?;
        let mut state = self.state.borrow_mut();
        let list = RemoteList {
            name: name.to_string(),
            items: items.to_vec(),
            icon: icon.to_string(),
        };
        match state.lists.iter_mut().find(|existing| existing.name == name) {
            Some(existing) => *existing = list,
            None => state.lists.push(list),
        }
        Ok(())
    }

    fn get_all_lists(&self) -> Result<Vec<RemoteList>, RemoteError> {
        self.read("lists")?;
        Ok(self.state.borrow().lists.clone())
    }

    fn delete_list(&self, name: &str) -> Result<(), RemoteError> {
        self.write("delete_list", name)?;
        self.state.borrow_mut().lists.retain(|list| list.name != name);
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Result<Option<Value>, RemoteError> {
        self.read(key)?;
        Ok(self.state.borrow().settings.get(key).cloned())
    }

    fn set_setting(&self, key: &str, value: &Value) -> Result<(), RemoteError> {
        self.write("set_setting", key)?;
        self.state
            .borrow_mut()
            .settings
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}
