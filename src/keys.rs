use time::{Date, Duration, Month, Weekday};

pub const GOALS_PREFIX: &str = "goals-";
pub const CALENDAR_PREFIX: &str = "cal-";
pub const NOTES_PREFIX: &str = "notes-";
pub const REVIEW_PREFIX: &str = "review-";
pub const WEEK_PREFIX: &str = "week-";
pub const HABIT_DATA_PREFIX: &str = "habitsData-";
pub const LIST_PREFIX: &str = "list-";
pub const LIST_ICON_PREFIX: &str = "listIcon_";
pub const DIRTY_PREFIX: &str = "dirty_";

pub const BACKLOG_KEY: &str = "backlog";
pub const HABITS_KEY: &str = "habits";
pub const HABIT_CHECKS_KEY: &str = "habitChecks";
pub const LIST_META_KEY: &str = "customListsMeta";
pub const LISTS_SEEDED_KEY: &str = "unifiedListsInited";

/// ISO-8601 week of year: shift to the Thursday of the date's Monday-based
/// week, then count whole weeks from January 1st of that Thursday's year.
pub fn week_number(date: Date) -> u8 {
    let day_num = i64::from(date.weekday().number_from_monday());
    let thursday = date + Duration::days(4 - day_num);
    let year_start = Date::from_ordinal_date(thursday.year(), 1).unwrap_or(thursday);
    let offset_days = (thursday - year_start).whole_days() + 1;
    // ceil(offset / 7) for a positive offset
    ((offset_days + 6) / 7) as u8
}

fn day_suffix(date: Date) -> String {
    let month_index = u8::from(date.month()) - 1;
    format!("{}-{}-{}", date.year(), month_index, date.day())
}

fn week_suffix(date: Date) -> String {
    format!("{}-W{}", date.year(), week_number(date))
}

pub fn calendar_key(date: Date) -> String {
    format!("{CALENDAR_PREFIX}{}", day_suffix(date))
}

pub fn goals_key(date: Date) -> String {
    format!("{GOALS_PREFIX}{}", day_suffix(date))
}

pub fn notes_key(date: Date) -> String {
    format!("{NOTES_PREFIX}{}", day_suffix(date))
}

pub fn week_key(date: Date) -> String {
    format!("{WEEK_PREFIX}{}", week_suffix(date))
}

pub fn review_key(date: Date) -> String {
    format!("{REVIEW_PREFIX}{}", week_suffix(date))
}

pub fn habits_week_key(date: Date) -> String {
    format!("{HABIT_DATA_PREFIX}{}", week_suffix(date))
}

pub fn habit_check_key(week_date: Date, habit_index: usize, day_index: usize) -> String {
    format!("{}-h{habit_index}-d{day_index}", habits_week_key(week_date))
}

pub fn list_key(list_id: &str) -> String {
    format!("{LIST_PREFIX}{list_id}")
}

pub fn list_icon_key(list_id: &str) -> String {
    format!("{LIST_ICON_PREFIX}{list_id}")
}

pub fn dirty_marker(key: &str) -> String {
    format!("{DIRTY_PREFIX}{key}")
}

/// Goal and calendar keys are the only families pulled as a full snapshot,
/// so they are the only ones eligible for absence-based pruning.
pub fn is_day_list_key(key: &str) -> bool {
    key.starts_with(GOALS_PREFIX) || key.starts_with(CALENDAR_PREFIX)
}

/// Recovers the date encoded in a day-scoped key (`goals-2024-0-5`).
pub fn parse_day_key(key: &str) -> Option<Date> {
    let suffix = [GOALS_PREFIX, CALENDAR_PREFIX, NOTES_PREFIX]
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))?;
    let mut parts = suffix.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month_index: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    let month = Month::try_from(month_index.checked_add(1)?).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Matches the sparse check key shape `habitsData-{year}-W{week}-h{i}-d{j}`
/// with a week of 1..=53 and a weekday index below 7.
pub fn is_habit_check_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix(HABIT_DATA_PREFIX) else {
        return false;
    };
    let mut parts = rest.split('-');
    let (Some(year), Some(week), Some(habit), Some(day), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let week = week.strip_prefix('W').and_then(|raw| raw.parse::<u8>().ok());
    let habit = habit.strip_prefix('h').and_then(|raw| raw.parse::<usize>().ok());
    let day = day.strip_prefix('d').and_then(|raw| raw.parse::<usize>().ok());
    year.parse::<i32>().is_ok()
        && week.is_some_and(|week| (1..=53).contains(&week))
        && habit.is_some()
        && day.is_some_and(|day| day < 7)
}

pub fn monday_of(date: Date) -> Date {
    let back = i64::from(date.weekday().number_days_from_monday());
    date - Duration::days(back)
}

pub fn format_week_range(date: Date) -> String {
    let monday = monday_of(date);
    let sunday = monday + Duration::days(6);
    format!("{} - {}", short_date(monday), short_date(sunday))
}

fn short_date(date: Date) -> String {
    format!(
        "{:02}.{:02}.{:02}",
        date.day(),
        u8::from(date.month()),
        date.year().rem_euclid(100)
    )
}

pub fn weekday_index(date: Date) -> usize {
    match date.weekday() {
        Weekday::Monday => 0,
        Weekday::Tuesday => 1,
        Weekday::Wednesday => 2,
        Weekday::Thursday => 3,
        Weekday::Friday => 4,
        Weekday::Saturday => 5,
        Weekday::Sunday => 6,
    }
}

#[cfg(test)]
mod tests {
    use time::{Date, Duration, Month};

    use super::{
        calendar_key, format_week_range, goals_key, habit_check_key, is_day_list_key,
        is_habit_check_key, parse_day_key, review_key, week_key, week_number, weekday_index,
    };

    fn date(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).expect("valid test date")
    }

    #[test]
    fn iso_week_boundaries_match_reference_values() {
        assert_eq!(week_number(date(2024, Month::January, 1)), 1);
        assert_eq!(week_number(date(2023, Month::December, 31)), 52);
        assert_eq!(week_number(date(2021, Month::January, 3)), 53);
        assert_eq!(week_number(date(2020, Month::December, 31)), 53);
        assert_eq!(week_number(date(2026, Month::October, 18)), 42);
    }

    #[test]
    fn week_numbers_agree_with_iso_calendar_across_decades() {
        let mut day = date(2000, Month::January, 1);
        let end = date(2030, Month::December, 31);
        while day <= end {
            assert_eq!(week_number(day), day.iso_week(), "mismatch on {day}");
            day += Duration::days(1);
        }
    }

    #[test]
    fn day_keys_use_zero_based_months_without_padding() {
        let day = date(2024, Month::January, 5);
        assert_eq!(goals_key(day), "goals-2024-0-5");
        assert_eq!(calendar_key(date(2023, Month::December, 31)), "cal-2023-11-31");
    }

    #[test]
    fn week_keys_keep_calendar_year_with_iso_week() {
        assert_eq!(week_key(date(2023, Month::December, 31)), "week-2023-W52");
        assert_eq!(week_key(date(2024, Month::January, 1)), "week-2024-W1");
        assert_eq!(review_key(date(2024, Month::December, 31)), "review-2024-W1");
        assert_ne!(
            week_key(date(2023, Month::December, 31)),
            week_key(date(2024, Month::January, 1))
        );
    }

    #[test]
    fn habit_check_key_appends_habit_and_day() {
        assert_eq!(
            habit_check_key(date(2024, Month::January, 3), 2, 6),
            "habitsData-2024-W1-h2-d6"
        );
    }

    #[test]
    fn habit_check_shape_rejects_other_records() {
        assert!(is_habit_check_key(&habit_check_key(
            date(2024, Month::January, 3),
            2,
            6
        )));
        assert!(is_habit_check_key("habitsData-2020-W53-h0-d0"));
        assert!(!is_habit_check_key("habits"));
        assert!(!is_habit_check_key("backlog"));
        assert!(!is_habit_check_key("habitsData-2024-W1"));
        assert!(!is_habit_check_key("habitsData-2024-W1-h2-d7"));
        assert!(!is_habit_check_key("habitsData-2024-W0-h2-d1"));
        assert!(!is_habit_check_key("habitsData-2024-W1-h2-d1-x"));
        assert!(!is_habit_check_key("habitsData-2024-W1-hx-d1"));
    }

    #[test]
    fn parse_day_key_inverts_day_keys() {
        let day = date(2024, Month::February, 29);
        assert_eq!(parse_day_key(&goals_key(day)), Some(day));
        assert_eq!(parse_day_key(&calendar_key(day)), Some(day));
        assert_eq!(parse_day_key("goals-2024-12-1"), None);
        assert_eq!(parse_day_key("week-2024-W1"), None);
    }

    #[test]
    fn prune_family_covers_only_goals_and_calendar() {
        assert!(is_day_list_key("goals-2024-0-1"));
        assert!(is_day_list_key("cal-2024-0-1"));
        assert!(!is_day_list_key("notes-2024-0-1"));
        assert!(!is_day_list_key("backlog"));
        assert!(!is_day_list_key("dirty_goals-2024-0-1"));
    }

    #[test]
    fn week_range_spans_monday_to_sunday() {
        assert_eq!(
            format_week_range(date(2024, Month::January, 3)),
            "01.01.24 - 07.01.24"
        );
        assert_eq!(weekday_index(date(2024, Month::January, 7)), 6);
    }
}
