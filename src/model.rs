use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePriorityError(String);

impl fmt::Display for ParsePriorityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown priority '{}', expected high|medium|low", self.0)
    }
}

impl std::error::Error for ParsePriorityError {}

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            _ => Err(ParsePriorityError(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Goal {
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Priority>,
    #[serde(
        rename = "rolledFrom",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rolled_from: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListItem {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListMeta {
    pub id: String,
    pub title: String,
}

pub type Board = BTreeMap<String, Vec<Task>>;

/// Week board columns, Monday first.
pub const WEEK_COLUMNS: [&str; 7] = ["MO", "DI", "MI", "DO", "FR", "SA", "SO"];
pub const BACKLOG_COLUMNS: [&str; 3] = ["To Do", "Waiting", "Ideas"];

/// Resolves a user-supplied column name against `columns`, ignoring case.
pub fn match_column(columns: &[&'static str], raw: &str) -> Option<&'static str> {
    let wanted = raw.trim();
    columns
        .iter()
        .copied()
        .find(|column| column.eq_ignore_ascii_case(wanted))
}

/// Records written by older clients are sometimes bare strings.
pub trait FromLegacy {
    fn from_legacy(text: String) -> Self;
}

impl FromLegacy for Task {
    fn from_legacy(text: String) -> Self {
        Task {
            text,
            done: false,
            priority: None,
        }
    }
}

impl FromLegacy for Goal {
    fn from_legacy(text: String) -> Self {
        Goal {
            text,
            done: false,
            urgency: None,
            rolled_from: None,
        }
    }
}

impl FromLegacy for Habit {
    fn from_legacy(name: String) -> Self {
        Habit { name, color: None }
    }
}

impl FromLegacy for ListItem {
    fn from_legacy(text: String) -> Self {
        ListItem { text, done: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Stored<T> {
    Full(T),
    Legacy(String),
}

impl<T: FromLegacy> Stored<T> {
    pub fn normalize(self) -> T {
        match self {
            Stored::Full(record) => record,
            Stored::Legacy(text) => T::from_legacy(text),
        }
    }
}

pub fn normalize_all<T: FromLegacy>(stored: Vec<Stored<T>>) -> Vec<T> {
    stored.into_iter().map(Stored::normalize).collect()
}

pub fn normalize_board(stored: BTreeMap<String, Vec<Stored<Task>>>) -> Board {
    stored
        .into_iter()
        .map(|(column, tasks)| (column, normalize_all(tasks)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{
        match_column, normalize_all, normalize_board, Goal, Habit, Priority, Stored, Task,
        BACKLOG_COLUMNS, WEEK_COLUMNS,
    };

    #[test]
    fn legacy_strings_normalize_into_records() {
        let raw = r#"["Water plants", {"text": "Ship it", "done": true, "urgency": "high"}]"#;
        let stored: Vec<Stored<Goal>> = serde_json::from_str(raw).expect("goals should parse");
        let goals = normalize_all(stored);
        assert_eq!(goals[0].text, "Water plants");
        assert!(!goals[0].done);
        assert_eq!(goals[1].urgency, Some(Priority::High));
        assert!(goals[1].done);
    }

    #[test]
    fn goal_serializes_rolled_from_in_camel_case() {
        let goal = Goal {
            text: "Buy milk".to_string(),
            done: false,
            urgency: None,
            rolled_from: Some("2024-01-04T00:00:00Z".to_string()),
        };
        let json = serde_json::to_value(&goal).expect("goal should serialize");
        assert_eq!(json["rolledFrom"], "2024-01-04T00:00:00Z");
        assert!(json.get("urgency").is_none());
    }

    #[test]
    fn habits_accept_extra_remote_fields() {
        let raw = r##"[{"id": 4, "name": "Run", "color": "#f00", "history": {}}, "Read"]"##;
        let stored: Vec<Stored<Habit>> = serde_json::from_str(raw).expect("habits should parse");
        let habits = normalize_all(stored);
        assert_eq!(habits[0].color.as_deref(), Some("#f00"));
        assert_eq!(habits[1].name, "Read");
    }

    #[test]
    fn boards_normalize_each_column() {
        let mut raw = BTreeMap::new();
        raw.insert("MO".to_string(), vec![Stored::Legacy("plan".to_string())]);
        let board = normalize_board(raw);
        assert_eq!(
            board["MO"],
            vec![Task {
                text: "plan".to_string(),
                done: false,
                priority: None
            }]
        );
    }

    #[test]
    fn priority_parses_short_and_long_forms() {
        assert_eq!("H".parse::<Priority>(), Ok(Priority::High));
        assert_eq!("medium".parse::<Priority>(), Ok(Priority::Medium));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn columns_match_case_insensitively() {
        assert_eq!(match_column(&WEEK_COLUMNS, "fr"), Some("FR"));
        assert_eq!(match_column(&BACKLOG_COLUMNS, " to do "), Some("To Do"));
        assert_eq!(match_column(&WEEK_COLUMNS, "Friday"), None);
    }
}
