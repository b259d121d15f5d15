use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension, Params};
use serde_json::Value;
use tracing::debug;

use super::{RemoteBoard, RemoteError, RemoteGateway, RemoteList, Session};
use crate::db::{self, Migration};

const REMOTE_SCHEMA_VERSION: i64 = 1;

const REMOTE_MIGRATIONS: [Migration; 1] = [Migration {
    version: 1,
    name: "baseline_remote_schema_v1",
    sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS goals (
    user_id TEXT NOT NULL,
    scope TEXT NOT NULL,
    position INTEGER NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (user_id, scope, position)
);

CREATE TABLE IF NOT EXISTS notes (
    user_id TEXT NOT NULL,
    scope TEXT NOT NULL,
    content TEXT NOT NULL,
    PRIMARY KEY (user_id, scope)
);

CREATE TABLE IF NOT EXISTS habits (
    user_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (user_id, position)
);

CREATE TABLE IF NOT EXISTS kanban_tasks (
    user_id TEXT NOT NULL,
    week_key TEXT NOT NULL,
    column_name TEXT NOT NULL,
    position INTEGER NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (user_id, week_key, column_name, position)
);

CREATE TABLE IF NOT EXISTS backlog_tasks (
    user_id TEXT NOT NULL,
    column_name TEXT NOT NULL,
    position INTEGER NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (user_id, column_name, position)
);

CREATE TABLE IF NOT EXISTS lists (
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    items TEXT NOT NULL,
    icon TEXT NOT NULL,
    PRIMARY KEY (user_id, name)
);

CREATE TABLE IF NOT EXISTS settings (
    user_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (user_id, key)
);
"#,
}];

/// Remote store backed by a shared SQLite file, partitioned per user.
pub struct SqliteRemote {
    conn: Connection,
    session: Option<Session>,
}

impl SqliteRemote {
    pub fn open(path: &str, session: Option<Session>) -> Result<Self, RemoteError> {
        let mut conn = Connection::open(path)?;
        db::configure_for_speed(&conn)?;
        db::apply_migrations(&mut conn, &REMOTE_MIGRATIONS, REMOTE_SCHEMA_VERSION)?;
        Ok(Self { conn, session })
    }

    fn user(&self) -> Result<&str, RemoteError> {
        self.session
            .as_ref()
            .map(|session| session.user_id.as_str())
            .ok_or(RemoteError::NotAuthenticated)
    }

    fn read_board<P: Params>(&self, sql: &str, args: P) -> Result<RemoteBoard, RemoteError> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(args)?;
        let mut board = RemoteBoard::new();
        while let Some(row) = rows.next()? {
            let column: String = row.get(0)?;
            let payload: String = row.get(1)?;
            board
                .entry(column)
                .or_default()
                .push(serde_json::from_str(&payload)?);
        }
        Ok(board)
    }
}

impl RemoteGateway for SqliteRemote {
    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn get_goals(&self, scope: &str) -> Result<Vec<Value>, RemoteError> {
        let user = self.user()?;
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM goals WHERE user_id = ?1 AND scope = ?2 ORDER BY position",
        )?;
        let mut rows = stmt.query(params![user, scope])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            items.push(serde_json::from_str(&payload)?);
        }
        Ok(items)
    }

    fn set_goals(&self, scope: &str, items: &[Value]) -> Result<(), RemoteError> {
        let user = self.user()?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM goals WHERE user_id = ?1 AND scope = ?2",
            params![user, scope],
        )?;
        for (position, item) in items.iter().enumerate() {
            tx.execute(
                "INSERT INTO goals (user_id, scope, position, payload) VALUES (?1, ?2, ?3, ?4)",
                params![user, scope, position as i64, serde_json::to_string(item)?],
            )?;
        }
        tx.commit()?;
        debug!(scope, count = items.len(), "remote goals replaced");
        Ok(())
    }

    fn get_all_goals(&self) -> Result<BTreeMap<String, Vec<Value>>, RemoteError> {
        let user = self.user()?;
        let mut stmt = self.conn.prepare(
            "SELECT scope, payload FROM goals WHERE user_id = ?1 ORDER BY scope, position",
        )?;
        let mut rows = stmt.query(params![user])?;
        let mut grouped: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let scope: String = row.get(0)?;
            let payload: String = row.get(1)?;
            grouped
                .entry(scope)
                .or_default()
                .push(serde_json::from_str(&payload)?);
        }
        Ok(grouped)
    }

    fn get_notes(&self, scope: &str) -> Result<Option<String>, RemoteError> {
        let user = self.user()?;
        Ok(self
            .conn
            .query_row(
                "SELECT content FROM notes WHERE user_id = ?1 AND scope = ?2",
                params![user, scope],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_notes(&self, scope: &str, content: &str) -> Result<(), RemoteError> {
        let user = self.user()?;
        self.conn.execute(
            r#"
INSERT INTO notes (user_id, scope, content)
VALUES (?1, ?2, ?3)
ON CONFLICT(user_id, scope) DO UPDATE SET content = excluded.content
"#,
            params![user, scope, content],
        )?;
        Ok(())
    }

    fn get_habits(&self) -> Result<Vec<Value>, RemoteError> {
        let user = self.user()?;
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM habits WHERE user_id = ?1 ORDER BY position")?;
        let mut rows = stmt.query(params![user])?;
        let mut habits = Vec::new();
        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            habits.push(serde_json::from_str(&payload)?);
        }
        Ok(habits)
    }

    fn set_habits(&self, habits: &[Value]) -> Result<(), RemoteError> {
        let user = self.user()?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM habits WHERE user_id = ?1", params![user])?;
        for (position, habit) in habits.iter().enumerate() {
            tx.execute(
                "INSERT INTO habits (user_id, position, payload) VALUES (?1, ?2, ?3)",
                params![user, position as i64, serde_json::to_string(habit)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_kanban(&self, week_key: &str) -> Result<RemoteBoard, RemoteError> {
        let user = self.user()?;
        self.read_board(
            r#"
SELECT column_name, payload FROM kanban_tasks
WHERE user_id = ?1 AND week_key = ?2
ORDER BY column_name, position
"#,
            params![user, week_key],
        )
    }

    fn set_kanban(&self, week_key: &str, board: &RemoteBoard) -> Result<(), RemoteError> {
        let user = self.user()?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM kanban_tasks WHERE user_id = ?1 AND week_key = ?2",
            params![user, week_key],
        )?;
        for (column, tasks) in board {
            for (position, task) in tasks.iter().enumerate() {
                tx.execute(
                    r#"
INSERT INTO kanban_tasks (user_id, week_key, column_name, position, payload)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
                    params![
                        user,
                        week_key,
                        column,
                        position as i64,
                        serde_json::to_string(task)?
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_backlog(&self) -> Result<RemoteBoard, RemoteError> {
        let user = self.user()?;
        self.read_board(
            r#"
SELECT column_name, payload FROM backlog_tasks
WHERE user_id = ?1
ORDER BY column_name, position
"#,
            params![user],
        )
    }

    fn set_backlog(&self, board: &RemoteBoard) -> Result<(), RemoteError> {
        let user = self.user()?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM backlog_tasks WHERE user_id = ?1", params![user])?;
        for (column, tasks) in board {
            for (position, task) in tasks.iter().enumerate() {
                tx.execute(
                    r#"
INSERT INTO backlog_tasks (user_id, column_name, position, payload)
VALUES (?1, ?2, ?3, ?4)
"#,
                    params![user, column, position as i64, serde_json::to_string(task)?],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_list(&self, name: &str) -> Result<Option<RemoteList>, RemoteError> {
        let user = self.user()?;
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT items, icon FROM lists WHERE user_id = ?1 AND name = ?2",
                params![user, name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((items, icon)) => Ok(Some(RemoteList {
                name: name.to_string(),
                items: serde_json::from_str(&items)?,
                icon,
            })),
            None => Ok(None),
        }
    }

    fn set_list(&self, name: &str, items: &[Value], icon: &str) -> Result<(), RemoteError> {
        let user = self.user()?;
        self.conn.execute(
            r#"
INSERT INTO lists (user_id, name, items, icon)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(user_id, name) DO UPDATE SET items = excluded.items, icon = excluded.icon
"#,
            params![user, name, serde_json::to_string(items)?, icon],
        )?;
        Ok(())
    }

    fn get_all_lists(&self) -> Result<Vec<RemoteList>, RemoteError> {
        let user = self.user()?;
        let mut stmt = self
            .conn
            .prepare("SELECT name, items, icon FROM lists WHERE user_id = ?1 ORDER BY rowid")?;
        let mut rows = stmt.query(params![user])?;
        let mut lists = Vec::new();
        while let Some(row) = rows.next()? {
            let items: String = row.get(1)?;
            lists.push(RemoteList {
                name: row.get(0)?,
                items: serde_json::from_str(&items)?,
                icon: row.get(2)?,
            });
        }
        Ok(lists)
    }

    fn delete_list(&self, name: &str) -> Result<(), RemoteError> {
        let user = self.user()?;
        self.conn.execute(
            "DELETE FROM lists WHERE user_id = ?1 AND name = ?2",
            params![user, name],
        )?;
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Result<Option<Value>, RemoteError> {
        let user = self.user()?;
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user, key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_setting(&self, key: &str, value: &Value) -> Result<(), RemoteError> {
        let user = self.user()?;
        self.conn.execute(
            r#"
INSERT INTO settings (user_id, key, value)
VALUES (?1, ?2, ?3)
ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value
"#,
            params![user, key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }
}
