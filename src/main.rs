mod app;
mod cli;
mod cli_ops;
mod completions;
mod config;
mod db;
mod keys;
mod locks;
mod model;
mod outbox;
mod remote;
mod store;
mod sync;
#[cfg(test)]
mod test_support;
mod transfer;
mod ui;

use serde_json::json;
use time::{Date, OffsetDateTime};
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use app::{App, AppError};
use cli::{
    BacklogSubcommands, CalendarSubcommands, Commands, DateArg, GoalsSubcommands,
    HabitsSubcommands, KanbanSubcommands, ListsSubcommands, TextSubcommands,
};
use model::{match_column, BACKLOG_COLUMNS, WEEK_COLUMNS};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var("DAYBOOK_LOG")
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::InvalidArgument(format!("failed to render JSON: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn today_local() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

fn run() -> Result<(), AppError> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions(args) = &cli.command {
        return completions::run_completions_command(args.shell.as_deref(), args.install);
    }

    let today = today_local();
    let config = config::Config::load(&cli.config)?;
    let mut app = App::open(&cli.db, &config, today)?;
    app.on_status_change(|pending| debug!(pending, "sync status changed"));

    let wrote = dispatch(&mut app, cli.command)?;
    if wrote && config.push_on_write {
        let report = app.settle()?;
        for failure in &report.failures {
            eprintln!("warning: background push of {} failed: {}", failure.key, failure.message);
        }
    }
    Ok(())
}

/// Runs one command; returns true when it queued local writes.
fn dispatch(app: &mut App, command: Commands) -> Result<bool, AppError> {
    let today = app.today();
    match command {
        Commands::Status(args) => {
            let view = app.status()?;
            if args.json {
                print_json(&view)?;
            } else {
                ui::print_status(&view);
            }
            Ok(false)
        }
        Commands::Sync(args) => {
            let summary = app.sync()?;
            if args.json {
                print_json(&summary)?;
            } else {
                ui::print_sync_summary(&summary);
            }
            Ok(false)
        }
        Commands::Push(args) => {
            let summary = app.push()?;
            if args.json {
                print_json(&summary)?;
            } else {
                ui::print_push_summary(&summary);
            }
            Ok(false)
        }
        Commands::Pull(args) => {
            let summary = app.pull()?;
            if args.json {
                print_json(&summary)?;
            } else {
                ui::print_pull_summary(&summary);
            }
            Ok(false)
        }
        Commands::Upload(args) => {
            let summary = app.upload()?;
            if args.json {
                print_json(&summary)?;
            } else {
                ui::print_upload_summary(&summary);
            }
            Ok(false)
        }
        Commands::Login(args) => {
            app.login(&args.user)?;
            println!("signed in as {}", args.user.trim());
            Ok(false)
        }
        Commands::Logout => {
            app.logout()?;
            println!("signed out");
            Ok(false)
        }
        Commands::Goals(args) => run_goals(app, args.command, today),
        Commands::Cal(args) => run_calendar(app, args.command, today),
        Commands::Notes(args) => match args.command {
            TextSubcommands::Show(args) => {
                let date = day(&args.date, today);
                let text = app.notes(date)?;
                if args.json {
                    print_json(&json!({ "date": date.to_string(), "notes": text }))?;
                } else {
                    ui::print_text(&format!("Notes {date}"), &text);
                }
                Ok(false)
            }
            TextSubcommands::Set(args) => {
                app.set_notes(day(&args.date, today), &args.text)?;
                Ok(true)
            }
        },
        Commands::Review(args) => match args.command {
            TextSubcommands::Show(args) => {
                let date = day(&args.date, today);
                let text = app.weekly_review(date)?;
                let range = keys::format_week_range(date);
                if args.json {
                    print_json(&json!({ "week": range, "review": text }))?;
                } else {
                    ui::print_text(&format!("Review {range}"), &text);
                }
                Ok(false)
            }
            TextSubcommands::Set(args) => {
                app.set_weekly_review(day(&args.date, today), &args.text)?;
                Ok(true)
            }
        },
        Commands::Habits(args) => run_habits(app, args.command, today),
        Commands::Kanban(args) => run_kanban(app, args.command, today),
        Commands::Backlog(args) => run_backlog(app, args.command),
        Commands::Lists(args) => run_lists(app, args.command),
        Commands::Export(args) => {
            let document = app.export()?;
            let rendered = serde_json::to_string_pretty(&document).map_err(|err| {
                AppError::InvalidArgument(format!("failed to render backup: {err}"))
            })?;
            match args.output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!(
                        "exported {} record(s) to {}",
                        document.entries.len(),
                        path.display()
                    );
                }
                None => println!("{rendered}"),
            }
            Ok(false)
        }
        Commands::Import(args) => {
            let raw = std::fs::read_to_string(&args.file)?;
            let summary = app.import(&raw)?;
            if args.json {
                print_json(&summary)?;
            } else {
                println!("imported {} record(s)", summary.imported);
            }
            Ok(false)
        }
        Commands::Keys(args) => {
            let date = day(&args.date, today);
            let derived = derived_keys(date);
            if args.json {
                let map: serde_json::Map<String, serde_json::Value> = derived
                    .iter()
                    .map(|(label, key)| (label.to_string(), json!(key)))
                    .collect();
                print_json(&map)?;
            } else {
                ui::print_keys(&derived);
            }
            Ok(false)
        }
        Commands::Completions(args) => {
            completions::run_completions_command(args.shell.as_deref(), args.install)?;
            Ok(false)
        }
    }
}

fn run_goals(app: &App, command: GoalsSubcommands, today: Date) -> Result<bool, AppError> {
    match command {
        GoalsSubcommands::Ls(args) => {
            let date = day(&args.date, today);
            let goals = app.goals(date)?;
            if args.json {
                print_json(&goals)?;
            } else {
                ui::print_goals(&format!("Goals {date}"), &goals);
            }
            Ok(false)
        }
        GoalsSubcommands::Add(args) => {
            let date = day(&args.date, today);
            let goals = app.add_goal(date, &args.text, args.urgency)?;
            println!("added goal #{} for {date}", goals.len());
            Ok(true)
        }
        GoalsSubcommands::Done(args) => {
            let goal = app.set_goal_done(day(&args.date, today), position(args.index)?, !args.undo)?;
            println!("{}: {}", if goal.done { "done" } else { "open" }, goal.text);
            Ok(true)
        }
        GoalsSubcommands::Rm(args) => {
            let goal = app.remove_goal(day(&args.date, today), position(args.index)?)?;
            println!("removed: {}", goal.text);
            Ok(true)
        }
        GoalsSubcommands::Rollover => {
            let moved = app.rollover_incomplete_goals(today)?;
            println!("rolled over {moved} goal(s) to {today}");
            Ok(moved > 0)
        }
    }
}

fn run_calendar(app: &App, command: CalendarSubcommands, today: Date) -> Result<bool, AppError> {
    match command {
        CalendarSubcommands::Ls(args) => {
            let date = day(&args.date, today);
            let tasks = app.calendar_tasks(date)?;
            if args.json {
                print_json(&tasks)?;
            } else {
                ui::print_tasks(&format!("Calendar {date}"), &tasks);
            }
            Ok(false)
        }
        CalendarSubcommands::Add(args) => {
            let date = day(&args.date, today);
            let tasks = app.add_calendar_task(date, &args.text, args.priority)?;
            println!("added task #{} for {date}", tasks.len());
            Ok(true)
        }
        CalendarSubcommands::Done(args) => {
            let task =
                app.set_calendar_done(day(&args.date, today), position(args.index)?, !args.undo)?;
            println!("{}: {}", if task.done { "done" } else { "open" }, task.text);
            Ok(true)
        }
        CalendarSubcommands::Rm(args) => {
            let task = app.remove_calendar_task(day(&args.date, today), position(args.index)?)?;
            println!("removed: {}", task.text);
            Ok(true)
        }
    }
}

fn run_habits(app: &App, command: HabitsSubcommands, today: Date) -> Result<bool, AppError> {
    match command {
        HabitsSubcommands::Ls(args) => {
            let week = day(&args.date, today);
            let habits = app.habits()?;
            let mut checks = Vec::with_capacity(habits.len());
            for habit in 0..habits.len() {
                let mut row = [false; 7];
                for (weekday, checked) in row.iter_mut().enumerate() {
                    *checked = app.habit_check(week, habit, weekday)?;
                }
                checks.push(row);
            }
            if args.json {
                let rows: Vec<_> = habits
                    .iter()
                    .zip(&checks)
                    .map(|(habit, row)| json!({ "habit": habit, "checks": row }))
                    .collect();
                print_json(&rows)?;
            } else {
                let title = format!("Habits {}", keys::format_week_range(week));
                ui::print_habits(&title, &habits, &checks);
            }
            Ok(false)
        }
        HabitsSubcommands::Add(args) => {
            let habits = app.add_habit(&args.name, args.color.as_deref())?;
            println!("added habit #{}", habits.len());
            Ok(true)
        }
        HabitsSubcommands::Rm(args) => {
            let habit = app.delete_habit(position(args.index)?, day(&args.date, today))?;
            println!("removed habit: {}", habit.name);
            Ok(true)
        }
        HabitsSubcommands::Check(args) => {
            let weekday = weekday_index(&args.day)?;
            app.set_habit_check(day(&args.date, today), position(args.habit)?, weekday, true)?;
            Ok(true)
        }
        HabitsSubcommands::Uncheck(args) => {
            let weekday = weekday_index(&args.day)?;
            app.set_habit_check(day(&args.date, today), position(args.habit)?, weekday, false)?;
            Ok(true)
        }
    }
}

fn run_kanban(app: &App, command: KanbanSubcommands, today: Date) -> Result<bool, AppError> {
    match command {
        KanbanSubcommands::Show(args) => {
            let week = day(&args.date, today);
            let board = app.kanban(week)?;
            if args.json {
                print_json(&board)?;
            } else {
                let title = format!("Week {}", keys::format_week_range(week));
                ui::print_board(&title, &WEEK_COLUMNS, &board);
            }
            Ok(false)
        }
        KanbanSubcommands::Add(args) => {
            app.add_kanban_task(
                day(&args.date, today),
                args.column.as_deref(),
                &args.text,
                args.priority,
            )?;
            Ok(true)
        }
        KanbanSubcommands::Rm(args) => {
            let task =
                app.remove_kanban_task(day(&args.date, today), &args.column, position(args.index)?)?;
            println!("removed: {}", task.text);
            Ok(true)
        }
    }
}

fn run_backlog(app: &App, command: BacklogSubcommands) -> Result<bool, AppError> {
    match command {
        BacklogSubcommands::Show(args) => {
            let board = app.backlog()?;
            if args.json {
                print_json(&board)?;
            } else {
                ui::print_board("Backlog", &BACKLOG_COLUMNS, &board);
            }
            Ok(false)
        }
        BacklogSubcommands::Add(args) => {
            app.add_backlog_task(&args.column, &args.text, args.priority)?;
            Ok(true)
        }
        BacklogSubcommands::Rm(args) => {
            let task = app.remove_backlog_task(&args.column, position(args.index)?)?;
            println!("removed: {}", task.text);
            Ok(true)
        }
    }
}

fn run_lists(app: &App, command: ListsSubcommands) -> Result<bool, AppError> {
    match command {
        ListsSubcommands::Ls(args) => {
            let seeded = app.init_default_lists()?;
            let mut lists = Vec::new();
            for meta in app.list_meta()? {
                let icon = app.list_icon(&meta.id)?;
                lists.push((meta, icon));
            }
            if args.json {
                let rows: Vec<_> = lists
                    .iter()
                    .map(|(meta, icon)| json!({ "id": meta.id, "title": meta.title, "icon": icon }))
                    .collect();
                print_json(&rows)?;
            } else {
                ui::print_lists(&lists);
            }
            Ok(seeded)
        }
        ListsSubcommands::New(args) => {
            let created = app.create_list(&args.title)?;
            println!("created list {} ({})", created.title, created.id);
            Ok(true)
        }
        ListsSubcommands::Rename(args) => {
            let renamed = app.rename_list(&args.id, &args.title)?;
            println!("renamed list {} to {}", renamed.id, renamed.title);
            Ok(true)
        }
        ListsSubcommands::Rm(args) => {
            let removed = app.delete_list(&args.id)?;
            println!("deleted list {}", removed.title);
            Ok(true)
        }
        ListsSubcommands::Items(args) => {
            let items = app.list_items(&args.id)?;
            if args.json {
                print_json(&items)?;
            } else {
                ui::print_list_items(&args.id, &items);
            }
            Ok(false)
        }
        ListsSubcommands::Add(args) => {
            let items = app.add_list_item(&args.id, &args.text)?;
            println!("added item #{}", items.len());
            Ok(true)
        }
        ListsSubcommands::Done(args) => {
            let item = app.set_list_item_done(&args.id, position(args.index)?, !args.undo)?;
            println!("{}: {}", if item.done { "done" } else { "open" }, item.text);
            Ok(true)
        }
    }
}

fn day(arg: &DateArg, today: Date) -> Date {
    arg.date.unwrap_or(today)
}

/// Converts a 1-based position from the command line.
fn position(index: usize) -> Result<usize, AppError> {
    index
        .checked_sub(1)
        .ok_or_else(|| AppError::InvalidArgument("positions start at 1".to_string()))
}

/// Accepts a weekday column name (MO..SO) or 1-7 with Monday as 1.
fn weekday_index(raw: &str) -> Result<usize, AppError> {
    if let Ok(number) = raw.trim().parse::<usize>() {
        if (1..=WEEK_COLUMNS.len()).contains(&number) {
            return Ok(number - 1);
        }
    } else if let Some(column) = match_column(&WEEK_COLUMNS, raw) {
        if let Some(index) = WEEK_COLUMNS.iter().position(|name| *name == column) {
            return Ok(index);
        }
    }
    Err(AppError::InvalidArgument(format!(
        "unknown weekday '{}', expected {} or 1-7",
        raw,
        WEEK_COLUMNS.join("/")
    )))
}

fn derived_keys(date: Date) -> Vec<(&'static str, String)> {
    vec![
        ("goals", keys::goals_key(date)),
        ("calendar", keys::calendar_key(date)),
        ("notes", keys::notes_key(date)),
        ("kanban", keys::week_key(date)),
        ("review", keys::review_key(date)),
        ("habits", keys::habits_week_key(date)),
        ("week", keys::format_week_range(date)),
    ]
}
