use std::io::{self, IsTerminal};

use crate::app::StatusView;
use crate::model::{Board, Goal, Habit, ListItem, ListMeta, Priority, Task, WEEK_COLUMNS};
use crate::sync::{KeyFailure, PullSummary, PushSummary, SyncSummary, UploadSummary};

pub fn print_status(view: &StatusView) {
    let palette = Palette::auto();
    println!("{} {}", palette.heading("Sync"), palette.status(&view.status));
    let user = view.user.as_deref().unwrap_or("signed out");
    println!("  user:    {}", user);
    let remote = view.remote.as_deref().unwrap_or("offline");
    println!("  remote:  {}", palette.dim(remote));
    println!("  pending: {}", view.pending);
    if view.queued > 0 {
        println!("  queued:  {}", view.queued);
    }
    if let Some(at) = view.last_synced_at.as_deref() {
        println!("  synced:  {}", palette.dim(at));
    }
}

pub fn print_goals(title: &str, goals: &[Goal]) {
    let palette = Palette::auto();
    println!("{}", palette.heading(title));
    if goals.is_empty() {
        println!("{}", palette.dim("no goals"));
        return;
    }
    for (index, goal) in goals.iter().enumerate() {
        println!("{}", format_goal_row(index, goal, &palette));
    }
}

pub fn print_tasks(title: &str, tasks: &[Task]) {
    let palette = Palette::auto();
    println!("{}", palette.heading(title));
    if tasks.is_empty() {
        println!("{}", palette.dim("no tasks"));
        return;
    }
    for (index, task) in tasks.iter().enumerate() {
        println!("{}", format_task_row(index, task, &palette));
    }
}

pub fn print_text(title: &str, text: &str) {
    let palette = Palette::auto();
    println!("{}", palette.heading(title));
    if text.trim().is_empty() {
        println!("{}", palette.dim("(empty)"));
    } else {
        println!("{text}");
    }
}

pub fn print_habits(title: &str, habits: &[Habit], checks: &[[bool; 7]]) {
    let palette = Palette::auto();
    println!("{}", palette.heading(title));
    if habits.is_empty() {
        println!("{}", palette.dim("no habits"));
        return;
    }
    println!("{}", palette.dim(&format!("     {}", WEEK_COLUMNS.join(" "))));
    for (index, habit) in habits.iter().enumerate() {
        let week = checks.get(index).copied().unwrap_or_default();
        println!("{}", format_habit_row(index, habit, &week, &palette));
    }
}

pub fn print_board(title: &str, columns: &[&str], board: &Board) {
    let palette = Palette::auto();
    println!("{}", palette.heading(title));
    for column in columns {
        let tasks = board.get(*column).map(Vec::as_slice).unwrap_or_default();
        println!("{}", palette.column(&format!("{column} ({})", tasks.len())));
        for (index, task) in tasks.iter().enumerate() {
            println!("  {}", format_task_row(index, task, &palette));
        }
    }
}

pub fn print_lists(lists: &[(ListMeta, String)]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Lists"));
    if lists.is_empty() {
        println!("{}", palette.dim("no lists"));
        return;
    }
    for (meta, icon) in lists {
        println!("{} {} {}", icon, meta.title, palette.id(&meta.id));
    }
}

pub fn print_list_items(title: &str, items: &[ListItem]) {
    let palette = Palette::auto();
    println!("{}", palette.heading(title));
    if items.is_empty() {
        println!("{}", palette.dim("no items"));
        return;
    }
    for (index, item) in items.iter().enumerate() {
        println!(
            "{:>3}. {} {}",
            index + 1,
            palette.checkbox(item.done),
            item.text
        );
    }
}

pub fn print_keys(keys: &[(&str, String)]) {
    let palette = Palette::auto();
    for (label, key) in keys {
        println!("{:<12} {}", label, palette.id(key));
    }
}

pub fn print_push_summary(summary: &PushSummary) {
    let palette = Palette::auto();
    println!(
        "push: {} pushed, {} cleared, {} failed",
        summary.pushed,
        summary.cleared_without_push,
        summary.failures.len()
    );
    print_failures(&summary.failures, &palette);
}

pub fn print_pull_summary(summary: &PullSummary) {
    let palette = Palette::auto();
    println!(
        "pull: {} written, {} pruned, {} habit checks, {} failed",
        summary.written,
        summary.pruned,
        summary.habit_checks,
        summary.failures.len()
    );
    print_failures(&summary.failures, &palette);
}

pub fn print_sync_summary(summary: &SyncSummary) {
    print_push_summary(&summary.push);
    print_pull_summary(&summary.pull);
}

pub fn print_upload_summary(summary: &UploadSummary) {
    let palette = Palette::auto();
    println!("upload: {} record(s) sent", summary.count);
    for error in &summary.errors {
        println!("  {}", palette.error(error));
    }
}

fn print_failures(failures: &[KeyFailure], palette: &Palette) {
    for failure in failures {
        println!(
            "  {} {}",
            palette.id(&failure.key),
            palette.error(&failure.message)
        );
    }
}

fn format_goal_row(index: usize, goal: &Goal, palette: &Palette) -> String {
    let mut line = format!("{:>3}. {} {}", index + 1, palette.checkbox(goal.done), goal.text);
    if let Some(urgency) = goal.urgency {
        line.push(' ');
        line.push_str(&palette.priority(urgency));
    }
    if let Some(from) = goal.rolled_from.as_deref() {
        let day = from.split('T').next().unwrap_or(from);
        line.push(' ');
        line.push_str(&palette.dim(&format!("(from {day})")));
    }
    line
}

fn format_task_row(index: usize, task: &Task, palette: &Palette) -> String {
    let mut line = format!("{:>3}. {} {}", index + 1, palette.checkbox(task.done), task.text);
    if let Some(priority) = task.priority {
        line.push(' ');
        line.push_str(&palette.priority(priority));
    }
    line
}

fn format_habit_row(index: usize, habit: &Habit, week: &[bool; 7], palette: &Palette) -> String {
    let marks = week
        .iter()
        .map(|checked| if *checked { " x" } else { " ." })
        .collect::<Vec<_>>()
        .join(" ");
    format!("{:>3}. {} {}", index + 1, marks, palette.habit(habit))
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn column(&self, text: &str) -> String {
        self.paint("1;33", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn error(&self, text: &str) -> String {
        self.paint("31", text)
    }

    fn checkbox(&self, done: bool) -> String {
        if done {
            self.paint("32", "[x]")
        } else {
            "[ ]".to_string()
        }
    }

    fn priority(&self, priority: Priority) -> String {
        self.paint(
            priority_color_code(priority),
            &format!("!{}", priority.as_str()),
        )
    }

    fn habit(&self, habit: &Habit) -> String {
        match habit.color.as_deref() {
            Some(color) => format!("{} {}", habit.name, self.dim(color)),
            None => habit.name.clone(),
        }
    }

    fn status(&self, status: &str) -> String {
        self.paint(status_color_code(status), &format!("[{status}]"))
    }
}

fn priority_color_code(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "31",
        Priority::Medium => "33",
        Priority::Low => "34",
    }
}

fn status_color_code(status: &str) -> &'static str {
    if status == "synced" {
        "32"
    } else if status.starts_with("pending") {
        "33"
    } else {
        "31"
    }
}

#[cfg(test)]
mod tests {
    use super::{format_goal_row, format_habit_row, format_task_row, Palette};
    use crate::model::{Goal, Habit, Priority, Task};

    const PLAIN: Palette = Palette { enabled: false };

    #[test]
    fn goal_rows_show_position_urgency_and_origin_day() {
        let goal = Goal {
            text: "Ship".to_string(),
            done: false,
            urgency: Some(Priority::High),
            rolled_from: Some("2024-01-02T00:00:00Z".to_string()),
        };
        assert_eq!(
            format_goal_row(0, &goal, &PLAIN),
            "  1. [ ] Ship !high (from 2024-01-02)"
        );
    }

    #[test]
    fn task_rows_mark_done_items() {
        let task = Task {
            text: "Call".to_string(),
            done: true,
            priority: None,
        };
        assert_eq!(format_task_row(11, &task, &PLAIN), " 12. [x] Call");
    }

    #[test]
    fn habit_rows_render_one_mark_per_weekday() {
        let habit = Habit {
            name: "Run".to_string(),
            color: None,
        };
        let week = [true, false, false, false, false, false, true];
        assert_eq!(
            format_habit_row(0, &habit, &week, &PLAIN),
            "  1.  x  .  .  .  .  .  x Run"
        );
    }

    #[test]
    fn paint_is_a_no_op_without_color() {
        assert_eq!(PLAIN.priority(Priority::Low), "!low");
        let colored = Palette { enabled: true };
        assert_eq!(colored.dim("x"), "\x1b[2mx\x1b[0m");
    }
}
