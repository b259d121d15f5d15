use serde_json::Value;
use tracing::{debug, info, warn};

use super::{KeyFailure, PushSummary, SyncEngine, SyncError, UploadSummary};
use crate::keys::{
    self, BACKLOG_KEY, CALENDAR_PREFIX, GOALS_PREFIX, HABITS_KEY, HABIT_CHECKS_KEY, LIST_META_KEY,
    LIST_PREFIX, NOTES_PREFIX, REVIEW_PREFIX, WEEK_PREFIX,
};
use crate::model::ListMeta;
use crate::remote::RemoteBoard;

/// Remote operation responsible for a key family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushTarget {
    Goals,
    Notes,
    Habits,
    Setting,
    Backlog,
    Kanban,
    List { list_id: String },
}

pub fn classify(key: &str) -> Option<PushTarget> {
    if key.starts_with(GOALS_PREFIX) || key.starts_with(CALENDAR_PREFIX) {
        return Some(PushTarget::Goals);
    }
    if key.starts_with(NOTES_PREFIX) || key.starts_with(REVIEW_PREFIX) {
        return Some(PushTarget::Notes);
    }
    if key.starts_with(WEEK_PREFIX) {
        return Some(PushTarget::Kanban);
    }
    if let Some(list_id) = key.strip_prefix(LIST_PREFIX) {
        return Some(PushTarget::List {
            list_id: list_id.to_string(),
        });
    }
    match key {
        HABITS_KEY => Some(PushTarget::Habits),
        HABIT_CHECKS_KEY | LIST_META_KEY => Some(PushTarget::Setting),
        BACKLOG_KEY => Some(PushTarget::Backlog),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Pushed,
    NothingToPush,
}

impl SyncEngine<'_> {
    /// Pushes every dirty key. A failing key keeps its marker and never
    /// stops the rest of the batch.
    pub fn push_dirty(&self) -> Result<PushSummary, SyncError> {
        let dirty = self.store.dirty_keys()?;
        let mut summary = PushSummary::default();
        if !dirty.is_empty() {
            info!(count = dirty.len(), "pushing dirty records");
        }

        for key in dirty {
            summary.attempted += 1;
            match self.push_key(&key) {
                Ok(PushOutcome::Pushed) => summary.pushed += 1,
                Ok(PushOutcome::NothingToPush) => summary.cleared_without_push += 1,
                Err(err) if err.is_isolated() => {
                    warn!(key = %key, error = %err, "push failed, record stays dirty");
                    summary.failures.push(KeyFailure {
                        key,
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(summary)
    }

    /// Pushes the current local value of `key` and clears its marker only
    /// after the remote confirms the write.
    pub(crate) fn push_key(&self, key: &str) -> Result<PushOutcome, SyncError> {
        let Some(target) = classify(key) else {
            debug!(key, "no remote family for key, clearing marker");
            self.store.clear_dirty(key)?;
            return Ok(PushOutcome::NothingToPush);
        };
        let Some(value) = self.read_value(key)? else {
            self.store.clear_dirty(key)?;
            return Ok(PushOutcome::NothingToPush);
        };

        self.send(key, &target, &value)?;
        self.store.clear_dirty(key)?;
        debug!(key, "pushed");
        Ok(PushOutcome::Pushed)
    }

    /// Removes a list from the remote store by title.
    pub(crate) fn delete_remote_list(&self, title: &str) -> Result<(), SyncError> {
        self.remote
            .delete_list(title)
            .map_err(|err| SyncError::from_remote_write(title, err))
    }

    fn read_value(&self, key: &str) -> Result<Option<Value>, SyncError> {
        match self.store.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|_| SyncError::MalformedLocalRecord(key.to_string())),
            None => Ok(None),
        }
    }

    fn send(&self, key: &str, target: &PushTarget, value: &Value) -> Result<(), SyncError> {
        let result = match target {
            PushTarget::Goals => self.remote.set_goals(key, as_items(key, value)?),
            PushTarget::Notes => {
                let text = value
                    .as_str()
                    .ok_or_else(|| SyncError::MalformedLocalRecord(key.to_string()))?;
                self.remote.set_notes(key, text)
            }
            PushTarget::Habits => self.remote.set_habits(as_items(key, value)?),
            PushTarget::Setting => self.remote.set_setting(key, value),
            PushTarget::Backlog => self.remote.set_backlog(&as_board(key, value)?),
            PushTarget::Kanban => self.remote.set_kanban(key, &as_board(key, value)?),
            PushTarget::List { list_id } => {
                let title = self.list_title(list_id)?;
                let icon = self.list_icon(list_id)?;
                self.remote.set_list(&title, as_items(key, value)?, &icon)
            }
        };
        result.map_err(|err| SyncError::from_remote_write(key, err))
    }

    /// Remote lists are named by title; ids never leave the device.
    fn list_title(&self, list_id: &str) -> Result<String, SyncError> {
        let meta: Vec<ListMeta> = self.store.get(LIST_META_KEY, Vec::new())?;
        Ok(meta
            .into_iter()
            .find(|entry| entry.id == list_id)
            .map(|entry| entry.title)
            .unwrap_or_else(|| list_id.to_string()))
    }

    fn list_icon(&self, list_id: &str) -> Result<String, SyncError> {
        Ok(self
            .store
            .get(&keys::list_icon_key(list_id), self.default_icon.to_string())?)
    }

    /// Uploads every local record regardless of dirty state and collects
    /// per-record errors for the caller. Dirty markers are left untouched.
    pub fn upload_all(&self) -> Result<UploadSummary, SyncError> {
        if !self.remote.is_authenticated() {
            return Err(SyncError::NotAuthenticated);
        }
        info!("manual upload started");
        let mut summary = UploadSummary::default();

        for key in self.day_list_keys()? {
            self.upload_counted(&mut summary, &key, "Goal", PushTarget::Goals)?;
        }
        let mut note_keys = self.store.keys_with_prefix(NOTES_PREFIX)?;
        note_keys.extend(self.store.keys_with_prefix(REVIEW_PREFIX)?);
        for key in note_keys {
            self.upload_counted(&mut summary, &key, "Note", PushTarget::Notes)?;
        }

        let habits: Value = self.store.get(HABITS_KEY, Value::Array(Vec::new()))?;
        self.upload_singleton(&mut summary, "Habits", || {
            self.send(HABITS_KEY, &PushTarget::Habits, &habits)
        });
        let checks: Value = self.store.get(HABIT_CHECKS_KEY, Value::Object(Default::default()))?;
        self.upload_singleton(&mut summary, "HabitChecks", || {
            self.send(HABIT_CHECKS_KEY, &PushTarget::Setting, &checks)
        });
        let backlog: Value = self.store.get(BACKLOG_KEY, Value::Object(Default::default()))?;
        self.upload_singleton(&mut summary, "Backlog", || {
            self.send(BACKLOG_KEY, &PushTarget::Backlog, &backlog)
        });

        for key in self.store.keys_with_prefix(WEEK_PREFIX)? {
            self.upload_counted(&mut summary, &key, "Kanban", PushTarget::Kanban)?;
        }

        let meta: Vec<ListMeta> = self.store.get(LIST_META_KEY, Vec::new())?;
        let meta_value = serde_json::to_value(&meta)
            .map_err(|_| SyncError::MalformedLocalRecord(LIST_META_KEY.to_string()))?;
        self.upload_singleton(&mut summary, "List Metadata", || {
            self.send(LIST_META_KEY, &PushTarget::Setting, &meta_value)
        });
        for list in &meta {
            let items: Value = self
                .store
                .get(&keys::list_key(&list.id), Value::Array(Vec::new()))?;
            let target = PushTarget::List {
                list_id: list.id.clone(),
            };
            match self.send(&keys::list_key(&list.id), &target, &items) {
                Ok(()) => summary.count += 1,
                Err(err) => summary.errors.push(format!("List {}: {}", list.title, err)),
            }
        }

        info!(
            count = summary.count,
            errors = summary.errors.len(),
            "manual upload finished"
        );
        Ok(summary)
    }

    pub(crate) fn day_list_keys(&self) -> Result<Vec<String>, SyncError> {
        let mut keys = self.store.keys_with_prefix(GOALS_PREFIX)?;
        keys.extend(self.store.keys_with_prefix(CALENDAR_PREFIX)?);
        Ok(keys)
    }

    fn upload_counted(
        &self,
        summary: &mut UploadSummary,
        key: &str,
        label: &str,
        target: PushTarget,
    ) -> Result<(), SyncError> {
        let outcome = match self.read_value(key) {
            Ok(Some(value)) => self.send(key, &target, &value),
            Ok(None) => return Ok(()),
            Err(SyncError::Db(err)) => return Err(SyncError::Db(err)),
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => summary.count += 1,
            Err(err) => {
                warn!(key, error = %err, "manual upload failed for record");
                summary.errors.push(format!("{label} {key}: {err}"));
            }
        }
        Ok(())
    }

    fn upload_singleton(
        &self,
        summary: &mut UploadSummary,
        label: &str,
        send: impl FnOnce() -> Result<(), SyncError>,
    ) {
        if let Err(err) = send() {
            warn!(record = label, error = %err, "manual upload failed for record");
            summary.errors.push(format!("{label}: {err}"));
        }
    }
}

fn as_items<'v>(key: &str, value: &'v Value) -> Result<&'v [Value], SyncError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| SyncError::MalformedLocalRecord(key.to_string()))
}

fn as_board(key: &str, value: &Value) -> Result<RemoteBoard, SyncError> {
    serde_json::from_value(value.clone())
        .map_err(|_| SyncError::MalformedLocalRecord(key.to_string()))
}
