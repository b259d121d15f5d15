use clap::{Args, Subcommand};

use crate::cli::{DateArg, JsonArgs};
use crate::model::Priority;

#[derive(Debug, Args)]
#[command(about = "Daily goals.", long_about = "Add, complete, remove or roll over daily goals.")]
pub struct GoalsArgs {
    #[command(subcommand)]
    pub command: GoalsSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum GoalsSubcommands {
    #[command(about = "List goals for a day.")]
    Ls(DayListArgs),
    #[command(about = "Add a goal to a day.")]
    Add(GoalAddArgs),
    #[command(about = "Mark a goal done (or undone with --undo).")]
    Done(DayToggleArgs),
    #[command(about = "Remove a goal.")]
    Rm(DayIndexArgs),
    #[command(about = "Move incomplete goals from the last 30 days to today.")]
    Rollover,
}

#[derive(Debug, Args)]
#[command(about = "Daily calendar tasks.")]
pub struct CalendarArgs {
    #[command(subcommand)]
    pub command: CalendarSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum CalendarSubcommands {
    #[command(about = "List calendar tasks for a day.")]
    Ls(DayListArgs),
    #[command(about = "Add a calendar task to a day.")]
    Add(TaskAddArgs),
    #[command(about = "Mark a task done (or undone with --undo).")]
    Done(DayToggleArgs),
    #[command(about = "Remove a task.")]
    Rm(DayIndexArgs),
}

#[derive(Debug, Args)]
pub struct DayListArgs {
    #[command(flatten)]
    pub date: DateArg,

    #[arg(long, help = "Render as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct GoalAddArgs {
    #[arg(help = "Goal text.")]
    pub text: String,

    #[arg(short = 'u', long, help = "Urgency: high, medium or low.")]
    pub urgency: Option<Priority>,

    #[command(flatten)]
    pub date: DateArg,
}

#[derive(Debug, Args)]
pub struct TaskAddArgs {
    #[arg(help = "Task text.")]
    pub text: String,

    #[arg(short = 'p', long, help = "Priority: high, medium or low.")]
    pub priority: Option<Priority>,

    #[command(flatten)]
    pub date: DateArg,
}

#[derive(Debug, Args)]
pub struct DayToggleArgs {
    #[arg(help = "1-based position as shown by ls.")]
    pub index: usize,

    #[arg(long, help = "Mark as not done.")]
    pub undo: bool,

    #[command(flatten)]
    pub date: DateArg,
}

#[derive(Debug, Args)]
pub struct DayIndexArgs {
    #[arg(help = "1-based position as shown by ls.")]
    pub index: usize,

    #[command(flatten)]
    pub date: DateArg,
}

#[derive(Debug, Args)]
#[command(about = "Free text for a day or week.")]
pub struct TextArgs {
    #[command(subcommand)]
    pub command: TextSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum TextSubcommands {
    #[command(about = "Print the stored text.")]
    Show(DayListArgs),
    #[command(about = "Replace the stored text.")]
    Set(TextSetArgs),
}

#[derive(Debug, Args)]
pub struct TextSetArgs {
    #[arg(help = "New text (empty clears it).")]
    pub text: String,

    #[command(flatten)]
    pub date: DateArg,
}

#[derive(Debug, Args)]
#[command(about = "Habits and weekly habit checks.")]
pub struct HabitsArgs {
    #[command(subcommand)]
    pub command: HabitsSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum HabitsSubcommands {
    #[command(about = "Show habits with this week's checks.")]
    Ls(DayListArgs),
    #[command(about = "Add a habit.")]
    Add(HabitAddArgs),
    #[command(about = "Delete a habit and its checks for the week.")]
    Rm(DayIndexArgs),
    #[command(about = "Check a habit for a weekday.")]
    Check(HabitCheckArgs),
    #[command(about = "Uncheck a habit for a weekday.")]
    Uncheck(HabitCheckArgs),
}

#[derive(Debug, Args)]
pub struct HabitAddArgs {
    #[arg(help = "Habit name.")]
    pub name: String,

    #[arg(long, help = "Display color, e.g. #4caf50.")]
    pub color: Option<String>,
}

#[derive(Debug, Args)]
pub struct HabitCheckArgs {
    #[arg(help = "1-based habit position as shown by ls.")]
    pub habit: usize,

    #[arg(help = "Weekday: MO..SO or 1-7 (Monday=1).")]
    pub day: String,

    #[command(flatten)]
    pub date: DateArg,
}

#[derive(Debug, Args)]
#[command(about = "Weekly kanban board.")]
pub struct KanbanArgs {
    #[command(subcommand)]
    pub command: KanbanSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum KanbanSubcommands {
    #[command(about = "Show the board for the week containing the date.")]
    Show(DayListArgs),
    #[command(about = "Add a task to a weekday column.")]
    Add(KanbanAddArgs),
    #[command(about = "Remove a task from a weekday column.")]
    Rm(KanbanRemoveArgs),
}

#[derive(Debug, Args)]
pub struct KanbanAddArgs {
    #[arg(help = "Task text.")]
    pub text: String,

    #[arg(long, help = "Column MO..SO (defaults to the date's weekday).")]
    pub column: Option<String>,

    #[arg(short = 'p', long, help = "Priority: high, medium or low.")]
    pub priority: Option<Priority>,

    #[command(flatten)]
    pub date: DateArg,
}

#[derive(Debug, Args)]
pub struct KanbanRemoveArgs {
    #[arg(help = "Column MO..SO.")]
    pub column: String,

    #[arg(help = "1-based position within the column.")]
    pub index: usize,

    #[command(flatten)]
    pub date: DateArg,
}

#[derive(Debug, Args)]
#[command(about = "Backlog board.")]
pub struct BacklogArgs {
    #[command(subcommand)]
    pub command: BacklogSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum BacklogSubcommands {
    #[command(about = "Show the backlog board.")]
    Show(JsonArgs),
    #[command(about = "Add a task to a backlog column.")]
    Add(BacklogAddArgs),
    #[command(about = "Remove a task from a backlog column.")]
    Rm(BacklogRemoveArgs),
}

#[derive(Debug, Args)]
pub struct BacklogAddArgs {
    #[arg(help = "Task text.")]
    pub text: String,

    #[arg(long, default_value = "To Do", help = "Column: To Do, Waiting or Ideas.")]
    pub column: String,

    #[arg(short = 'p', long, help = "Priority: high, medium or low.")]
    pub priority: Option<Priority>,
}

#[derive(Debug, Args)]
pub struct BacklogRemoveArgs {
    #[arg(help = "Column: To Do, Waiting or Ideas.")]
    pub column: String,

    #[arg(help = "1-based position within the column.")]
    pub index: usize,
}

#[derive(Debug, Args)]
#[command(about = "Custom lists.")]
pub struct ListsArgs {
    #[command(subcommand)]
    pub command: ListsSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum ListsSubcommands {
    #[command(about = "List all lists (seeds the defaults on first use).")]
    Ls(JsonArgs),
    #[command(about = "Create a list.")]
    New(ListNewArgs),
    #[command(about = "Rename a list.")]
    Rename(ListRenameArgs),
    #[command(about = "Delete a list and its items.")]
    Rm(ListIdArgs),
    #[command(about = "Show the items of a list.")]
    Items(ListItemsArgs),
    #[command(about = "Add an item to a list.")]
    Add(ListAddArgs),
    #[command(about = "Mark a list item done (or undone with --undo).")]
    Done(ListDoneArgs),
}

#[derive(Debug, Args)]
pub struct ListNewArgs {
    #[arg(help = "List title.")]
    pub title: String,
}

#[derive(Debug, Args)]
pub struct ListRenameArgs {
    #[arg(help = "List id.")]
    pub id: String,

    #[arg(help = "New title.")]
    pub title: String,
}

#[derive(Debug, Args)]
pub struct ListIdArgs {
    #[arg(help = "List id.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ListItemsArgs {
    #[arg(help = "List id.")]
    pub id: String,

    #[arg(long, help = "Render as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ListAddArgs {
    #[arg(help = "List id.")]
    pub id: String,

    #[arg(help = "Item text.")]
    pub text: String,
}

#[derive(Debug, Args)]
pub struct ListDoneArgs {
    #[arg(help = "List id.")]
    pub id: String,

    #[arg(help = "1-based item position.")]
    pub index: usize,

    #[arg(long, help = "Mark as not done.")]
    pub undo: bool,
}
