use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use time::macros::format_description;
use time::Date;

pub use crate::cli_ops::*;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

pub fn styled_command() -> clap::Command {
    Cli::command()
}

/// Parses `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<Date, String> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), format).map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

#[derive(Debug, Parser)]
#[command(name = "daybook")]
#[command(bin_name = "daybook")]
#[command(version)]
#[command(about = "Local-first daybook with dirty-key sync")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        global = true,
        env = "DAYBOOK_DB_PATH",
        default_value = ".daybook/state.sqlite",
        help = "Path to the local SQLite database."
    )]
    pub db: String,

    #[arg(
        short = 'c',
        long,
        global = true,
        env = "DAYBOOK_CONFIG",
        default_value = ".daybook/config.toml",
        help = "Path to the TOML config file."
    )]
    pub config: PathBuf,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v info, -vv debug)."
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Show sync status and pending record count.")]
    Status(JsonArgs),
    #[command(about = "Push dirty records, then pull remote state.")]
    Sync(JsonArgs),
    #[command(about = "Push dirty records only.")]
    Push(JsonArgs),
    #[command(about = "Pull remote state only.")]
    Pull(JsonArgs),
    #[command(about = "Upload every local record regardless of dirty state.")]
    Upload(JsonArgs),
    #[command(about = "Start a remote session for a user.")]
    Login(LoginArgs),
    #[command(about = "End the remote session.")]
    Logout,
    #[command(about = "Daily goals.")]
    Goals(GoalsArgs),
    #[command(about = "Daily calendar tasks.")]
    Cal(CalendarArgs),
    #[command(about = "Daily notes.")]
    Notes(TextArgs),
    #[command(about = "Weekly review text.")]
    Review(TextArgs),
    #[command(about = "Habits and weekly habit checks.")]
    Habits(HabitsArgs),
    #[command(about = "Weekly kanban board.")]
    Kanban(KanbanArgs),
    #[command(about = "Backlog board.")]
    Backlog(BacklogArgs),
    #[command(about = "Custom lists.")]
    Lists(ListsArgs),
    #[command(about = "Write every local record to a JSON backup.")]
    Export(ExportArgs),
    #[command(about = "Replace local data with a JSON backup.")]
    Import(ImportArgs),
    #[command(about = "Print the storage keys derived for a date.")]
    Keys(KeysArgs),
    #[command(about = "Generate or install shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(long, help = "Render as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DateArg {
    #[arg(
        long,
        value_parser = parse_date,
        help = "Date as YYYY-MM-DD (defaults to today)."
    )]
    pub date: Option<Date>,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(help = "User id that scopes remote records.")]
    pub user: String,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(
        short = 'o',
        long,
        help = "Write the backup to this file instead of stdout."
    )]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[arg(help = "Backup file produced by export (or a legacy flat backup).")]
    pub file: PathBuf,

    #[arg(long, help = "Render as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct KeysArgs {
    #[command(flatten)]
    pub date: DateArg,

    #[arg(long, help = "Render as JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish). Auto-detected if omitted.")]
    pub shell: Option<String>,

    #[arg(
        short = 'i',
        long = "install",
        help = "Write completions to the canonical path for the shell."
    )]
    pub install: bool,
}
