use std::io::{self, Write};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Args;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::error::{Error, Result};
use crate::lifecycle::{
    arm, basis_of, complete_task, partition_due, replace_recurrence, restore_task, state_of,
    TaskState,
};
use crate::models::Task;
use crate::recurrence::{occurrences, parse_weekday, Frequency, RepetitionRule};
use crate::storage::{delete_database, load_task, load_tasks, next_id, save_task, save_tasks};

/// Repetition options shared by `add` and `edit`.
#[derive(Args, Debug, Default, Clone)]
pub struct RuleArgs {
    /// Repeat frequency (daily, weekly, monthly, yearly)
    #[arg(short, long)]
    pub recur: Option<String>,
    /// Number of frequency units between occurrences
    #[arg(short, long)]
    pub interval: Option<u32>,
    /// Weekdays for weekly rules, e.g. mon,thu or 1,4
    #[arg(long, value_delimiter = ',')]
    pub on: Vec<String>,
    /// Day of month (1-31) for monthly and yearly rules
    #[arg(long)]
    pub day_of_month: Option<u8>,
    /// Month (1-12) for yearly rules
    #[arg(long)]
    pub month: Option<u8>,
    /// Last day the rule may produce an occurrence
    #[arg(long)]
    pub until: Option<String>,
}

impl RuleArgs {
    fn is_empty(&self) -> bool {
        self.recur.is_none()
            && self.interval.is_none()
            && self.on.is_empty()
            && self.day_of_month.is_none()
            && self.month.is_none()
            && self.until.is_none()
    }

    /// Builds the validated rule, or `None` when no repetition was asked for.
    pub fn to_rule(&self) -> Result<Option<RepetitionRule>> {
        if self.is_empty() {
            return Ok(None);
        }
        let frequency: Frequency = self.recur.as_deref().ok_or(Error::MissingFrequency)?.parse()?;
        let mut builder = RepetitionRule::new(frequency).every(self.interval.unwrap_or(1));
        if !self.on.is_empty() {
            let days = self
                .on
                .iter()
                .map(|d| parse_weekday(d))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            builder = builder.on_days(days);
        }
        if let Some(d) = self.day_of_month {
            builder = builder.on_day_of_month(d);
        }
        if let Some(m) = self.month {
            builder = builder.in_month(m);
        }
        if let Some(u) = &self.until {
            builder = builder.until(parse_until(u)?);
        }
        Ok(Some(builder.build()?))
    }
}

/// Field changes for `cmd_edit`. `None` leaves a field as it is.
#[derive(Debug, Default, Clone)]
pub struct TaskEdit {
    pub name: Option<String>,
    pub project: Option<String>,
    pub description: Option<String>,
    pub due: Option<String>,
    pub rule: RuleArgs,
    /// Stop repeating the task.
    pub no_recur: bool,
}

/// Parses an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC).
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| Error::InvalidDate(s.to_string()))
}

/// Like [`parse_instant`], but a bare date means the end of that day so the
/// whole day stays inside the rule.
fn parse_until(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(end) = d.and_hms_opt(23, 59, 59) {
            return Ok(end.and_utc());
        }
    }
    parse_instant(s)
}

fn find_task(id: u64) -> Result<Task> {
    load_task(id)?.ok_or(Error::TaskNotFound(id))
}

fn fmt_instant(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Adds a new task to the database and returns its ID.
///
/// A recurring task's first occurrence is due immediately.
pub fn cmd_add(
    name: String,
    project: Option<String>,
    description: Option<String>,
    due: Option<String>,
    rule: &RuleArgs,
    now: DateTime<Utc>,
    silent: bool,
) -> Result<u64> {
    let due_date = due.as_deref().map(parse_instant).transpose()?;
    let recurrence = rule.to_rule()?;

    let mut tasks = load_tasks()?;
    let id = next_id(&tasks);
    let mut task = Task::new(id, name, now);
    task.project = project;
    task.description = description;
    task.due_date = due_date;
    task.recurrence = recurrence;
    arm(&mut task, now);

    tasks.push(task);
    save_tasks(&tasks)?;
    if !silent {
        println!("Task added (id = {})", id);
    }
    Ok(id)
}

/// Marks a task as complete by ID.
///
/// A recurring task is not closed: it disappears until its next occurrence.
pub fn cmd_complete(id: u64, now: DateTime<Utc>, silent: bool) -> Result<Task> {
    let task = find_task(id)?;
    let updated = complete_task(&task, now);
    if updated == task {
        if !silent {
            println!("Task {} is already complete.", id);
        }
        return Ok(task);
    }

    let saved = save_task(&updated)?;
    if !silent {
        match saved.next_due_at {
            Some(next) if !saved.is_completed() => {
                println!(
                    "Task {} done for this cycle. Next occurrence {}.",
                    id,
                    fmt_instant(next)
                )
            }
            _ if task.recurrence.is_some() => {
                println!("Task {} marked as complete. Its repetition has ended.", id)
            }
            _ => println!("Task {} marked as complete.", id),
        }
    }
    Ok(saved)
}

/// Reopens a completed task.
pub fn cmd_restore(id: u64, silent: bool) -> Result<Task> {
    let task = find_task(id)?;
    match restore_task(&task) {
        Some(restored) => {
            let saved = save_task(&restored)?;
            if !silent {
                println!("Task {} restored.", id);
            }
            Ok(saved)
        }
        None => {
            if !silent {
                println!("Task {} is not complete.", id);
            }
            Ok(task)
        }
    }
}

/// Removes a task from the database by ID.
pub fn cmd_remove(id: u64, silent: bool) -> Result<()> {
    let mut tasks = load_tasks()?;
    let len_before = tasks.len();
    tasks.retain(|t| t.id != id);
    if tasks.len() == len_before {
        return Err(Error::TaskNotFound(id));
    }
    save_tasks(&tasks)?;
    if !silent {
        println!("Task {} removed.", id);
    }
    Ok(())
}

/// Edits an existing task's details.
///
/// Only a rule change touches scheduling; the current occurrence is kept.
pub fn cmd_edit(id: u64, edit: TaskEdit, now: DateTime<Utc>, silent: bool) -> Result<Task> {
    let mut t = find_task(id)?;
    if let Some(n) = edit.name {
        t.name = n;
    }
    if let Some(p) = edit.project {
        t.project = Some(p);
    }
    if let Some(d) = edit.description {
        t.description = Some(d);
    }
    if let Some(d) = edit.due {
        t.due_date = Some(parse_instant(&d)?);
    }
    if edit.no_recur {
        replace_recurrence(&mut t, None, now);
    } else if let Some(rule) = edit.rule.to_rule()? {
        replace_recurrence(&mut t, Some(rule), now);
    }

    let saved = save_task(&t)?;
    if !silent {
        println!("Task {} updated.", id);
    }
    Ok(saved)
}

/// What `cmd_list` showed: the listed task IDs in display order, and how
/// many open tasks are due or still upcoming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub ids: Vec<u64>,
    pub due: usize,
    pub upcoming: usize,
}

/// Picks the tasks a listing shows, soonest first.
///
/// By default only open tasks that are actionable at `now`; `all` adds
/// upcoming and completed ones.
pub fn listed_tasks(tasks: &[Task], all: bool, now: DateTime<Utc>) -> Vec<&Task> {
    let mut shown: Vec<&Task> = if all {
        tasks.iter().collect()
    } else {
        partition_due(tasks, now).0
    };
    shown.sort_by_key(|t| {
        let due_at = t.next_due_at.or(t.due_date);
        (due_at.is_none(), due_at, t.id)
    });
    shown
}

/// Lists tasks in a formatted table, soonest first.
pub fn cmd_list(all: bool, now: DateTime<Utc>) -> Result<Listing> {
    let tasks = load_tasks()?;
    let (due, upcoming) = partition_due(&tasks, now);
    let shown = listed_tasks(&tasks, all, now);
    let listing = Listing {
        ids: shown.iter().map(|t| t.id).collect(),
        due: due.len(),
        upcoming: upcoming.len(),
    };
    if shown.is_empty() {
        println!("No tasks found.");
        return Ok(listing);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Project").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Repeats").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for t in shown {
        let state = state_of(t, now);
        let status_color = match state {
            TaskState::Active => Color::Yellow,
            TaskState::Dormant => Color::Grey,
            TaskState::Completed => Color::Green,
        };
        let due_at = t.next_due_at.or(t.due_date);
        let overdue = state == TaskState::Active && due_at.is_some_and(|d| d < now);

        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.name),
            Cell::new(t.project.as_deref().unwrap_or_default()),
            Cell::new(due_at.map(fmt_instant).unwrap_or_else(|| "-".into()))
                .fg(if overdue { Color::Red } else { Color::Reset }),
            Cell::new(t.recurrence.as_ref().map(|r| r.to_string()).unwrap_or_default()),
            Cell::new(state.label()).fg(status_color),
        ]);
    }

    println!("{table}");
    println!("{} due, {} upcoming", listing.due, listing.upcoming);
    Ok(listing)
}

/// Returns, and prints, the next `count` occurrences of a recurring task.
///
/// A pending occurrence that has not arrived yet is listed first, unless the
/// rule now ends before it.
pub fn cmd_next(
    id: u64,
    count: usize,
    now: DateTime<Utc>,
    silent: bool,
) -> Result<Vec<DateTime<Utc>>> {
    let task = find_task(id)?;
    let rule = task.recurrence.as_ref().ok_or(Error::NotRecurring(id))?;
    let basis = basis_of(&task, now);

    let upcoming: Vec<DateTime<Utc>> = std::iter::once(basis)
        .filter(|b| *b > now && rule.ends_at().map_or(true, |end| *b <= end))
        .chain(occurrences(basis, rule, now.max(basis)))
        .take(count)
        .collect();

    if !silent {
        if upcoming.is_empty() {
            println!("Task {} has no further occurrences.", id);
        }
        for at in &upcoming {
            println!("{}", fmt_instant(*at));
        }
    }
    Ok(upcoming)
}

/// Resets the database by deleting all tasks.
pub fn cmd_reset(force: bool) -> Result<()> {
    if !force {
        print!("Are you sure you want to delete all tasks? This cannot be undone. [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
    }

    delete_database()?;
    println!("Database reset successfully.");
    Ok(())
}
