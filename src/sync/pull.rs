use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{KeyFailure, PullSummary, SyncEngine, SyncError};
use crate::keys::{
    self, BACKLOG_KEY, HABITS_KEY, HABIT_CHECKS_KEY, HABIT_DATA_PREFIX, LIST_META_KEY,
};
use crate::model::ListMeta;
use crate::remote::RemoteBoard;
use crate::store::Origin;

impl SyncEngine<'_> {
    /// Fetches canonical remote state and writes it locally as clean
    /// records. Each step is independent: a failed fetch keeps the last
    /// known local value and the remaining steps still run.
    pub fn pull(&self) -> Result<PullSummary, SyncError> {
        let mut summary = PullSummary::default();

        let steps: [(&str, fn(&Self, &mut PullSummary) -> Result<(), SyncError>); 7] = [
            ("habitChecks", Self::pull_habit_checks),
            ("customListsMeta", Self::pull_list_meta),
            ("goals", Self::pull_goals),
            ("notes", Self::pull_notes),
            ("habits", Self::pull_habits),
            ("kanban", Self::pull_boards),
            ("lists", Self::pull_lists),
        ];
        for (resource, step) in steps {
            match step(self, &mut summary) {
                Ok(()) => {}
                Err(err) if err.is_isolated() => {
                    warn!(resource, error = %err, "pull step failed, keeping local state");
                    summary.failures.push(KeyFailure {
                        key: resource.to_string(),
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            written = summary.written,
            pruned = summary.pruned,
            "pull finished"
        );
        Ok(summary)
    }

    fn write_clean(
        &self,
        summary: &mut PullSummary,
        key: &str,
        value: &Value,
    ) -> Result<(), SyncError> {
        self.store.set(key, value, Origin::Remote)?;
        summary.written += 1;
        Ok(())
    }

    fn pull_habit_checks(&self, summary: &mut PullSummary) -> Result<(), SyncError> {
        let fetched = self
            .remote
            .get_setting(HABIT_CHECKS_KEY)
            .map_err(|err| SyncError::from_remote_read(HABIT_CHECKS_KEY, err))?;
        let Some(checks) = fetched.filter(Value::is_object) else {
            return Ok(());
        };
        self.write_clean(summary, HABIT_CHECKS_KEY, &checks)?;

        let Some(entries) = checks.as_object() else {
            return Ok(());
        };
        let mut checked = BTreeSet::new();
        for (key, flag) in entries {
            if !keys::is_habit_check_key(key) {
                warn!(key = %key, "ignoring habitChecks entry that is not a habit check key");
                continue;
            }
            if is_truthy(flag) {
                self.store.set_untracked(key, &true)?;
                checked.insert(key.as_str());
                summary.habit_checks += 1;
            } else {
                self.store.remove_untracked(key)?;
            }
        }
        // The aggregate is authoritative: presence keys it no longer lists
        // were unchecked elsewhere.
        for key in self.store.keys_with_prefix(HABIT_DATA_PREFIX)? {
            if keys::is_habit_check_key(&key) && !checked.contains(key.as_str()) {
                self.store.remove_untracked(&key)?;
            }
        }
        Ok(())
    }

    fn pull_list_meta(&self, summary: &mut PullSummary) -> Result<(), SyncError> {
        let fetched = self
            .remote
            .get_setting(LIST_META_KEY)
            .map_err(|err| SyncError::from_remote_read(LIST_META_KEY, err))?;
        match fetched {
            Some(meta) if meta.as_array().is_some_and(|lists| !lists.is_empty()) => {
                self.write_clean(summary, LIST_META_KEY, &meta)
            }
            _ => Ok(()),
        }
    }

    /// Goals and calendar days arrive as a full snapshot, which is what
    /// makes pruning by absence safe for these two families only.
    fn pull_goals(&self, summary: &mut PullSummary) -> Result<(), SyncError> {
        let snapshot = self
            .remote
            .get_all_goals()
            .map_err(|err| SyncError::from_remote_read("all goals", err))?;

        for (key, items) in &snapshot {
            self.write_clean(summary, key, &Value::Array(items.clone()))?;
        }

        for key in self.day_list_keys()? {
            if snapshot.contains_key(&key) || self.store.is_dirty(&key)? {
                continue;
            }
            debug!(key = %key, "pruning record deleted upstream");
            self.store.delete(&key, Origin::Remote)?;
            summary.pruned += 1;
        }
        Ok(())
    }

    fn pull_notes(&self, summary: &mut PullSummary) -> Result<(), SyncError> {
        let mut first_error = None;
        for key in [keys::notes_key(self.today), keys::review_key(self.today)] {
            match self.remote.get_notes(&key) {
                Ok(Some(text)) if !text.is_empty() => {
                    self.write_clean(summary, &key, &Value::String(text))?;
                }
                Ok(_) => {}
                Err(err) => {
                    first_error = first_error.or(Some(SyncError::from_remote_read(&key, err)));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn pull_habits(&self, summary: &mut PullSummary) -> Result<(), SyncError> {
        let habits = self
            .remote
            .get_habits()
            .map_err(|err| SyncError::from_remote_read(HABITS_KEY, err))?;
        if habits.is_empty() {
            return Ok(());
        }
        self.write_clean(summary, HABITS_KEY, &Value::Array(habits))
    }

    fn pull_boards(&self, summary: &mut PullSummary) -> Result<(), SyncError> {
        let week_key = keys::week_key(self.today);
        let kanban = self.remote.get_kanban(&week_key);
        let backlog = self.remote.get_backlog();

        let mut first_error = None;
        match kanban {
            Ok(board) if !board.is_empty() => {
                self.write_clean(summary, &week_key, &board_value(board))?;
            }
            Ok(_) => {}
            Err(err) => first_error = Some(SyncError::from_remote_read(&week_key, err)),
        }
        match backlog {
            Ok(board) if !board.is_empty() => {
                self.write_clean(summary, BACKLOG_KEY, &board_value(board))?;
            }
            Ok(_) => {}
            Err(err) => {
                first_error = first_error.or(Some(SyncError::from_remote_read(BACKLOG_KEY, err)));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Remote lists are matched to local metadata by title.
    fn pull_lists(&self, summary: &mut PullSummary) -> Result<(), SyncError> {
        let lists = self
            .remote
            .get_all_lists()
            .map_err(|err| SyncError::from_remote_read("lists", err))?;
        if lists.is_empty() {
            return Ok(());
        }
        let meta: Vec<ListMeta> = self.store.get(LIST_META_KEY, Vec::new())?;
        for remote_list in lists {
            let Some(local) = meta.iter().find(|entry| entry.title == remote_list.name) else {
                debug!(name = %remote_list.name, "remote list has no local metadata");
                continue;
            };
            self.write_clean(
                summary,
                &keys::list_key(&local.id),
                &Value::Array(remote_list.items),
            )?;
        }
        Ok(())
    }
}

fn board_value(board: RemoteBoard) -> Value {
    Value::Object(
        board
            .into_iter()
            .map(|(column, items)| (column, Value::Array(items)))
            .collect(),
    )
}

fn is_truthy(flag: &Value) -> bool {
    match flag {
        Value::Bool(value) => *value,
        Value::Null => false,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
