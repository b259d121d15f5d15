use std::error::Error;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration};
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::db;
use crate::keys::{self, BACKLOG_KEY, HABITS_KEY, HABIT_CHECKS_KEY, LIST_META_KEY};
use crate::locks::{SyncLock, SYNC_LOCK_TIMEOUT};
use crate::model::{
    match_column, normalize_all, normalize_board, Board, FromLegacy, Goal, Habit, Priority,
    Stored, Task, BACKLOG_COLUMNS, WEEK_COLUMNS,
};
use crate::outbox::{Outbox, OutboxTask, SettleReport};
use crate::remote::{Offline, RemoteError, RemoteGateway, Session, SqliteRemote};
use crate::store::{LocalStore, Origin};
use crate::sync::{
    self, current_status, record_last_error, PullSummary, PushSummary, SyncEngine, SyncError,
    SyncStatus, SyncSummary, UploadSummary,
};
use crate::transfer::{self, ExportDocument, ImportSummary, TransferError};

mod lists;

const ROLLOVER_WINDOW_DAYS: i64 = 30;

/// Explicit session context: the local store, the remote gateway for the
/// signed-in user, queued background pushes and the date being viewed.
pub struct App {
    store: LocalStore,
    remote: Box<dyn RemoteGateway>,
    remote_path: Option<String>,
    outbox: Outbox,
    db_path: String,
    default_icon: String,
    today: Date,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusView {
    pub status: String,
    pub pending: usize,
    pub queued: usize,
    pub user: Option<String>,
    pub remote: Option<String>,
    pub last_error: Option<String>,
    pub last_synced_at: Option<String>,
}

impl App {
    pub fn open(db_path: &str, config: &Config, today: Date) -> Result<Self, AppError> {
        ensure_parent_dir(db_path)?;
        let store = LocalStore::open(db_path)?;
        let session = db::get_meta(store.conn(), db::META_SESSION_USER)?.map(Session::new);
        let remote = connect(config.remote_path.as_deref(), session)?;
        Ok(Self {
            store,
            remote,
            remote_path: config.remote_path.clone(),
            outbox: Outbox::new(),
            db_path: db_path.to_string(),
            default_icon: config.default_icon.clone(),
            today,
        })
    }

    /// Builds an app around an already connected gateway.
    pub fn with_remote(
        db_path: &str,
        remote: Box<dyn RemoteGateway>,
        today: Date,
    ) -> Result<Self, AppError> {
        ensure_parent_dir(db_path)?;
        Ok(Self {
            store: LocalStore::open(db_path)?,
            remote,
            remote_path: None,
            outbox: Outbox::new(),
            db_path: db_path.to_string(),
            default_icon: sync::DEFAULT_LIST_ICON.to_string(),
            today,
        })
    }

    pub fn today(&self) -> Date {
        self.today
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn remote(&self) -> &dyn RemoteGateway {
        self.remote.as_ref()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn on_status_change(&mut self, listener: impl Fn(usize) + 'static) {
        self.store.set_status_listener(listener);
    }

    fn engine(&self) -> SyncEngine<'_> {
        SyncEngine::new(&self.store, self.remote.as_ref(), self.today)
            .with_default_icon(&self.default_icon)
    }

    fn read_records<T: FromLegacy + DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Vec<T>, AppError> {
        let stored: Vec<Stored<T>> = self.store.get(key, Vec::new())?;
        Ok(normalize_all(stored))
    }

    fn read_board(&self, key: &str) -> Result<Board, AppError> {
        Ok(normalize_board(self.store.get(key, Default::default())?))
    }

    /// Local write first; the remote push runs when the outbox settles.
    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        self.store.set(key, value, Origin::Local)?;
        self.queue(OutboxTask::Push {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Without a session the record simply stays dirty until a later sync.
    fn queue(&self, task: OutboxTask) {
        if self.remote.is_authenticated() {
            self.outbox.enqueue(task);
        }
    }

    // Goals and calendar

    pub fn goals(&self, date: Date) -> Result<Vec<Goal>, AppError> {
        self.read_records(&keys::goals_key(date))
    }

    pub fn set_goals(&self, date: Date, goals: &[Goal]) -> Result<(), AppError> {
        self.write(&keys::goals_key(date), goals)
    }

    pub fn add_goal(
        &self,
        date: Date,
        text: &str,
        urgency: Option<Priority>,
    ) -> Result<Vec<Goal>, AppError> {
        let mut goals = self.goals(date)?;
        goals.push(Goal {
            text: required_text(text, "goal")?,
            done: false,
            urgency,
            rolled_from: None,
        });
        self.set_goals(date, &goals)?;
        Ok(goals)
    }

    pub fn set_goal_done(&self, date: Date, index: usize, done: bool) -> Result<Goal, AppError> {
        let mut goals = self.goals(date)?;
        let goal = item_mut(&mut goals, index, "goal")?;
        goal.done = done;
        let updated = goal.clone();
        self.set_goals(date, &goals)?;
        Ok(updated)
    }

    pub fn remove_goal(&self, date: Date, index: usize) -> Result<Goal, AppError> {
        let mut goals = self.goals(date)?;
        let removed = take_item(&mut goals, index, "goal")?;
        self.set_goals(date, &goals)?;
        Ok(removed)
    }

    /// Moves unfinished goals from the previous 30 days onto `today`.
    /// Source days keep only their completed goals. Returns how many goals
    /// were carried over.
    pub fn rollover_incomplete_goals(&self, today: Date) -> Result<usize, AppError> {
        let mut today_goals = self.goals(today)?;
        let mut moved = 0usize;
        let mut rolled_any = false;

        for days_ago in 1..=ROLLOVER_WINDOW_DAYS {
            let past = today - Duration::days(days_ago);
            let past_goals = self.goals(past)?;
            if past_goals.is_empty() {
                continue;
            }
            let (completed, incomplete): (Vec<Goal>, Vec<Goal>) =
                past_goals.into_iter().partition(|goal| goal.done);
            if incomplete.is_empty() {
                continue;
            }

            rolled_any = true;
            self.set_goals(past, &completed)?;
            let rolled_from = midnight_utc(past)?;
            for goal in incomplete {
                if today_goals.iter().any(|existing| existing.text == goal.text) {
                    continue;
                }
                today_goals.push(Goal {
                    text: goal.text,
                    done: false,
                    urgency: None,
                    rolled_from: Some(rolled_from.clone()),
                });
                moved += 1;
            }
        }

        if rolled_any {
            self.set_goals(today, &today_goals)?;
            info!(moved, "rolled over incomplete goals");
        }
        Ok(moved)
    }

    pub fn calendar_tasks(&self, date: Date) -> Result<Vec<Task>, AppError> {
        self.read_records(&keys::calendar_key(date))
    }

    pub fn set_calendar_tasks(&self, date: Date, tasks: &[Task]) -> Result<(), AppError> {
        self.write(&keys::calendar_key(date), tasks)
    }

    pub fn add_calendar_task(
        &self,
        date: Date,
        text: &str,
        priority: Option<Priority>,
    ) -> Result<Vec<Task>, AppError> {
        let mut tasks = self.calendar_tasks(date)?;
        tasks.push(Task {
            text: required_text(text, "task")?,
            done: false,
            priority,
        });
        self.set_calendar_tasks(date, &tasks)?;
        Ok(tasks)
    }

    pub fn set_calendar_done(&self, date: Date, index: usize, done: bool) -> Result<Task, AppError> {
        let mut tasks = self.calendar_tasks(date)?;
        let task = item_mut(&mut tasks, index, "task")?;
        task.done = done;
        let updated = task.clone();
        self.set_calendar_tasks(date, &tasks)?;
        Ok(updated)
    }

    pub fn remove_calendar_task(&self, date: Date, index: usize) -> Result<Task, AppError> {
        let mut tasks = self.calendar_tasks(date)?;
        let removed = take_item(&mut tasks, index, "task")?;
        self.set_calendar_tasks(date, &tasks)?;
        Ok(removed)
    }

    // Notes and weekly review

    pub fn notes(&self, date: Date) -> Result<String, AppError> {
        Ok(self.store.get(&keys::notes_key(date), String::new())?)
    }

    pub fn set_notes(&self, date: Date, text: &str) -> Result<(), AppError> {
        self.write(&keys::notes_key(date), text)
    }

    pub fn weekly_review(&self, date: Date) -> Result<String, AppError> {
        Ok(self.store.get(&keys::review_key(date), String::new())?)
    }

    pub fn set_weekly_review(&self, date: Date, text: &str) -> Result<(), AppError> {
        self.write(&keys::review_key(date), text)
    }

    // Habits

    pub fn habits(&self) -> Result<Vec<Habit>, AppError> {
        self.read_records(HABITS_KEY)
    }

    pub fn set_habits(&self, habits: &[Habit]) -> Result<(), AppError> {
        self.write(HABITS_KEY, habits)
    }

    pub fn add_habit(&self, name: &str, color: Option<&str>) -> Result<Vec<Habit>, AppError> {
        let mut habits = self.habits()?;
        habits.push(Habit {
            name: required_text(name, "habit name")?,
            color: color.map(str::to_string),
        });
        self.set_habits(&habits)?;
        Ok(habits)
    }

    /// Removes the habit and its seven check keys for `week`.
    pub fn delete_habit(&self, index: usize, week: Date) -> Result<Habit, AppError> {
        let mut habits = self.habits()?;
        let removed = take_item(&mut habits, index, "habit")?;

        let mut checks = self.habit_checks()?;
        for day in 0..WEEK_COLUMNS.len() {
            let key = keys::habit_check_key(week, index, day);
            self.store.remove_untracked(&key)?;
            checks.remove(&key);
        }
        self.set_habits(&habits)?;
        self.write(HABIT_CHECKS_KEY, &checks)?;
        Ok(removed)
    }

    fn habit_checks(&self) -> Result<Map<String, Value>, AppError> {
        Ok(self.store.get(HABIT_CHECKS_KEY, Map::new())?)
    }

    pub fn habit_check(&self, week: Date, habit: usize, day: usize) -> Result<bool, AppError> {
        Ok(self
            .store
            .contains(&keys::habit_check_key(week, habit, day))?)
    }

    /// Keeps the sparse presence key and the `habitChecks` aggregate in
    /// step; only the aggregate is pushed.
    pub fn set_habit_check(
        &self,
        week: Date,
        habit: usize,
        day: usize,
        checked: bool,
    ) -> Result<(), AppError> {
        if day >= WEEK_COLUMNS.len() {
            return Err(AppError::InvalidArgument(format!(
                "day index {} is outside the week (0-6)",
                day
            )));
        }
        let habit_count = self.habits()?.len();
        if habit >= habit_count {
            return Err(AppError::NotFound(format!("habit #{}", habit + 1)));
        }

        let key = keys::habit_check_key(week, habit, day);
        let mut checks = self.habit_checks()?;
        if checked {
            self.store.set_untracked(&key, &true)?;
            checks.insert(key, Value::Bool(true));
        } else {
            self.store.remove_untracked(&key)?;
            checks.remove(&key);
        }
        self.write(HABIT_CHECKS_KEY, &checks)
    }

    // Boards

    pub fn kanban(&self, week: Date) -> Result<Board, AppError> {
        self.read_board(&keys::week_key(week))
    }

    pub fn set_kanban(&self, week: Date, board: &Board) -> Result<(), AppError> {
        self.write(&keys::week_key(week), board)
    }

    /// Adds to the named weekday column, or to the column of `week`'s own
    /// weekday when none is given.
    pub fn add_kanban_task(
        &self,
        week: Date,
        column: Option<&str>,
        text: &str,
        priority: Option<Priority>,
    ) -> Result<Board, AppError> {
        let column = match column {
            Some(raw) => resolve_column(&WEEK_COLUMNS, raw)?,
            None => WEEK_COLUMNS[keys::weekday_index(week)],
        };
        let mut board = self.kanban(week)?;
        push_task(&mut board, column, text, priority)?;
        self.set_kanban(week, &board)?;
        Ok(board)
    }

    pub fn remove_kanban_task(
        &self,
        week: Date,
        column: &str,
        index: usize,
    ) -> Result<Task, AppError> {
        let column = resolve_column(&WEEK_COLUMNS, column)?;
        let mut board = self.kanban(week)?;
        let removed = take_task(&mut board, column, index)?;
        self.set_kanban(week, &board)?;
        Ok(removed)
    }

    pub fn backlog(&self) -> Result<Board, AppError> {
        self.read_board(BACKLOG_KEY)
    }

    pub fn set_backlog(&self, board: &Board) -> Result<(), AppError> {
        self.write(BACKLOG_KEY, board)
    }

    pub fn add_backlog_task(
        &self,
        column: &str,
        text: &str,
        priority: Option<Priority>,
    ) -> Result<Board, AppError> {
        let column = resolve_column(&BACKLOG_COLUMNS, column)?;
        let mut board = self.backlog()?;
        push_task(&mut board, column, text, priority)?;
        self.set_backlog(&board)?;
        Ok(board)
    }

    pub fn remove_backlog_task(&self, column: &str, index: usize) -> Result<Task, AppError> {
        let column = resolve_column(&BACKLOG_COLUMNS, column)?;
        let mut board = self.backlog()?;
        let removed = take_task(&mut board, column, index)?;
        self.set_backlog(&board)?;
        Ok(removed)
    }

    // Settings

    pub fn setting(&self, key: &str) -> Result<Option<Value>, AppError> {
        ensure_setting_key(key)?;
        Ok(self
            .store
            .get_raw(key)?
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    pub fn set_setting(&self, key: &str, value: &Value) -> Result<(), AppError> {
        ensure_setting_key(key)?;
        self.write(key, value)
    }

    // Session

    pub fn session_user(&self) -> Result<Option<String>, AppError> {
        Ok(db::get_meta(self.store.conn(), db::META_SESSION_USER)?)
    }

    pub fn login(&mut self, user: &str) -> Result<(), AppError> {
        let user = required_text(user, "user id")?;
        db::set_meta(self.store.conn(), db::META_SESSION_USER, &user)?;
        if self.remote_path.is_some() {
            self.remote = connect(self.remote_path.as_deref(), Some(Session::new(&user)))?;
        }
        info!(user = %user, "signed in");
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), AppError> {
        db::delete_meta(self.store.conn(), db::META_SESSION_USER)?;
        self.remote = connect(self.remote_path.as_deref(), None)?;
        info!("signed out");
        Ok(())
    }

    // Synchronization

    pub fn status(&self) -> Result<StatusView, AppError> {
        let status = current_status(&self.store)?;
        let last_error = match &status {
            SyncStatus::Error(message) => Some(message.clone()),
            SyncStatus::Synced | SyncStatus::Pending(_) => None,
        };
        Ok(StatusView {
            status: status.to_string(),
            pending: self.store.count_dirty()?,
            queued: self.outbox.len(),
            user: self.session_user()?,
            remote: self.remote_path.clone(),
            last_error,
            last_synced_at: db::get_meta(self.store.conn(), db::META_LAST_SYNCED_AT)?,
        })
    }

    /// Drains queued background pushes.
    pub fn settle(&self) -> Result<SettleReport, AppError> {
        if self.outbox.is_empty() {
            return Ok(SettleReport::default());
        }
        debug!(queued = self.outbox.len(), "settling background pushes");
        Ok(self.outbox.settle(&self.engine())?)
    }

    pub fn sync(&self) -> Result<SyncSummary, AppError> {
        self.require_session()?;
        let _lock = self.sync_lock()?;
        self.settle()?;
        Ok(self.engine().sync()?)
    }

    pub fn push(&self) -> Result<PushSummary, AppError> {
        self.require_session()?;
        let _lock = self.sync_lock()?;
        self.settle()?;
        let summary = self.engine().push_dirty()?;
        let last_error = summary.failures.last().map(|failure| failure.message.as_str());
        record_last_error(&self.store, last_error)?;
        Ok(summary)
    }

    pub fn pull(&self) -> Result<PullSummary, AppError> {
        self.require_session()?;
        let _lock = self.sync_lock()?;
        let summary = self.engine().pull()?;
        let last_error = summary.failures.last().map(|failure| failure.message.as_str());
        record_last_error(&self.store, last_error)?;
        Ok(summary)
    }

    pub fn upload(&self) -> Result<UploadSummary, AppError> {
        self.require_session()?;
        let _lock = self.sync_lock()?;
        Ok(self.engine().upload_all()?)
    }

    fn sync_lock(&self) -> Result<SyncLock, AppError> {
        Ok(SyncLock::acquire(&self.db_path, SYNC_LOCK_TIMEOUT).map_err(SyncError::from)?)
    }

    fn require_session(&self) -> Result<(), AppError> {
        if self.remote.is_authenticated() {
            Ok(())
        } else {
            Err(AppError::Sync(SyncError::NotAuthenticated))
        }
    }

    // Backup

    pub fn export(&self) -> Result<ExportDocument, AppError> {
        Ok(transfer::export(&self.store)?)
    }

    pub fn import(&self, raw: &str) -> Result<ImportSummary, AppError> {
        Ok(transfer::import(&self.store, raw)?)
    }
}

fn connect(
    remote_path: Option<&str>,
    session: Option<Session>,
) -> Result<Box<dyn RemoteGateway>, AppError> {
    match remote_path {
        Some(path) => {
            ensure_parent_dir(path)?;
            Ok(Box::new(SqliteRemote::open(path, session)?))
        }
        None => Ok(Box::new(Offline)),
    }
}

fn ensure_parent_dir(path: &str) -> Result<(), AppError> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn ensure_setting_key(key: &str) -> Result<(), AppError> {
    match key {
        HABIT_CHECKS_KEY | LIST_META_KEY => Ok(()),
        other => Err(AppError::InvalidArgument(format!(
            "unknown setting '{}', expected {} or {}",
            other, HABIT_CHECKS_KEY, LIST_META_KEY
        ))),
    }
}

fn midnight_utc(date: Date) -> Result<String, AppError> {
    date.midnight()
        .assume_utc()
        .format(&Rfc3339)
        .map_err(|err| AppError::InvalidArgument(format!("cannot format {}: {}", date, err)))
}

fn required_text(raw: &str, what: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument(format!(
            "{} cannot be empty",
            what
        )));
    }
    Ok(trimmed.to_string())
}

fn item_mut<'v, T>(items: &'v mut [T], index: usize, what: &str) -> Result<&'v mut T, AppError> {
    items
        .get_mut(index)
        .ok_or_else(|| AppError::NotFound(format!("{} #{}", what, index + 1)))
}

fn take_item<T>(items: &mut Vec<T>, index: usize, what: &str) -> Result<T, AppError> {
    if index >= items.len() {
        return Err(AppError::NotFound(format!("{} #{}", what, index + 1)));
    }
    Ok(items.remove(index))
}

fn resolve_column(columns: &[&'static str], raw: &str) -> Result<&'static str, AppError> {
    match_column(columns, raw).ok_or_else(|| {
        AppError::InvalidArgument(format!(
            "unknown column '{}', expected one of: {}",
            raw,
            columns.join(", ")
        ))
    })
}

fn push_task(
    board: &mut Board,
    column: &str,
    text: &str,
    priority: Option<Priority>,
) -> Result<(), AppError> {
    board.entry(column.to_string()).or_default().push(Task {
        text: required_text(text, "task")?,
        done: false,
        priority,
    });
    Ok(())
}

fn take_task(board: &mut Board, column: &str, index: usize) -> Result<Task, AppError> {
    let tasks = board
        .get_mut(column)
        .ok_or_else(|| AppError::NotFound(format!("task #{} in {}", index + 1, column)))?;
    if index >= tasks.len() {
        return Err(AppError::NotFound(format!(
            "task #{} in {}",
            index + 1,
            column
        )));
    }
    Ok(tasks.remove(index))
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Config(ConfigError),
    Remote(RemoteError),
    Sync(SyncError),
    Transfer(TransferError),
    InvalidArgument(String),
    NotFound(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Db(err) => write!(f, "database error: {}", err),
            AppError::Config(err) => write!(f, "{}", err),
            AppError::Remote(err) => write!(f, "{}", err),
            AppError::Sync(err) => write!(f, "sync error: {}", err),
            AppError::Transfer(err) => write!(f, "{}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
            AppError::NotFound(what) => write!(f, "{} not found", what),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Db(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::Remote(err) => Some(err),
            AppError::Sync(err) => Some(err),
            AppError::Transfer(err) => Some(err),
            AppError::InvalidArgument(_) => None,
            AppError::NotFound(_) => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        AppError::Db(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<RemoteError> for AppError {
    fn from(value: RemoteError) -> Self {
        AppError::Remote(value)
    }
}

impl From<SyncError> for AppError {
    fn from(value: SyncError) -> Self {
        AppError::Sync(value)
    }
}

impl From<TransferError> for AppError {
    fn from(value: TransferError) -> Self {
        AppError::Transfer(value)
    }
}
