//! Repetition rules and the next-occurrence evaluator.
//!
//! A [`RepetitionRule`] is validated once, where it is built or deserialized.
//! [`compute_next_occurrence`] then assumes a valid rule and never fails: it
//! either returns an instant strictly after `now` or reports that the rule
//! has run out.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors raised while building a [`RepetitionRule`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("interval must be at least 1")]
    ZeroInterval,
    #[error("weekday index {0} is out of range (0 = Sunday .. 6 = Saturday)")]
    WeekdayOutOfRange(u8),
    #[error("weekday index {0} is listed more than once")]
    DuplicateWeekday(u8),
    #[error("unknown weekday '{0}'")]
    UnknownWeekday(String),
    #[error("day of month {0} is out of range (1..=31)")]
    DayOfMonthOutOfRange(u8),
    #[error("month of year {0} is out of range (1..=12)")]
    MonthOutOfRange(u8),
    #[error("unknown frequency '{0}'. Supported: daily, weekly, monthly, yearly")]
    UnknownFrequency(String),
}

/// How often a rule repeats.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl FromStr for Frequency {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(RuleError::UnknownFrequency(s.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        };
        f.write_str(s)
    }
}

/// Parses a weekday given as an index (`0` = Sunday) or an English name or
/// three-letter abbreviation.
pub fn parse_weekday(s: &str) -> Result<u8, RuleError> {
    let s = s.trim().to_lowercase();
    if let Ok(n) = s.parse::<u8>() {
        return Ok(n);
    }
    const NAMES: [&str; 7] = [
        "sunday",
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
    ];
    NAMES
        .iter()
        .position(|name| s.len() >= 3 && name.starts_with(s.as_str()))
        .map(|i| i as u8)
        .ok_or(RuleError::UnknownWeekday(s))
}

/// Flat wire form of a rule, as it appears in task files and API payloads.
/// Convert with `RepetitionRule::try_from` to validate it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_of_year: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

/// A validated repetition rule.
///
/// Weekdays are kept sorted ascending. Fields that do not apply to the
/// frequency (for example `day_of_month` on a weekly rule) are carried along
/// unvalidated and ignored by the evaluator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RuleRecord", into = "RuleRecord")]
pub struct RepetitionRule {
    frequency: Frequency,
    interval: u32,
    days_of_week: Option<Vec<u8>>,
    day_of_month: Option<u8>,
    month_of_year: Option<u8>,
    ends_at: Option<DateTime<Utc>>,
}

/// Builder returned by [`RepetitionRule::new`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    record: RuleRecord,
}

impl RuleBuilder {
    pub fn every(mut self, interval: u32) -> Self {
        self.record.interval = interval;
        self
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.record.days_of_week = Some(days.into_iter().collect());
        self
    }

    pub fn on_day_of_month(mut self, day: u8) -> Self {
        self.record.day_of_month = Some(day);
        self
    }

    pub fn in_month(mut self, month: u8) -> Self {
        self.record.month_of_year = Some(month);
        self
    }

    pub fn until(mut self, ends_at: DateTime<Utc>) -> Self {
        self.record.ends_at = Some(ends_at);
        self
    }

    pub fn build(self) -> Result<RepetitionRule, RuleError> {
        RepetitionRule::try_from(self.record)
    }
}

impl RepetitionRule {
    /// Starts a rule that repeats every single unit of `frequency`.
    pub fn new(frequency: Frequency) -> RuleBuilder {
        RuleBuilder {
            record: RuleRecord {
                frequency,
                interval: 1,
                days_of_week: None,
                day_of_month: None,
                month_of_year: None,
                ends_at: None,
            },
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn days_of_week(&self) -> Option<&[u8]> {
        self.days_of_week.as_deref()
    }

    pub fn day_of_month(&self) -> Option<u8> {
        self.day_of_month
    }

    pub fn month_of_year(&self) -> Option<u8> {
        self.month_of_year
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }
}

impl TryFrom<RuleRecord> for RepetitionRule {
    type Error = RuleError;

    fn try_from(r: RuleRecord) -> Result<Self, Self::Error> {
        if r.interval == 0 {
            return Err(RuleError::ZeroInterval);
        }

        let mut days_of_week = r.days_of_week.filter(|d| !d.is_empty());
        if let (Frequency::Weekly, Some(days)) = (r.frequency, days_of_week.as_mut()) {
            days.sort_unstable();
            if let Some(&bad) = days.iter().find(|&&d| d > 6) {
                return Err(RuleError::WeekdayOutOfRange(bad));
            }
            if let Some(pair) = days.windows(2).find(|w| w[0] == w[1]) {
                return Err(RuleError::DuplicateWeekday(pair[0]));
            }
        }

        if matches!(r.frequency, Frequency::Monthly | Frequency::Yearly) {
            if let Some(day) = r.day_of_month.filter(|d| !(1..=31).contains(d)) {
                return Err(RuleError::DayOfMonthOutOfRange(day));
            }
        }
        if r.frequency == Frequency::Yearly {
            if let Some(month) = r.month_of_year.filter(|m| !(1..=12).contains(m)) {
                return Err(RuleError::MonthOutOfRange(month));
            }
        }

        Ok(RepetitionRule {
            frequency: r.frequency,
            interval: r.interval,
            days_of_week,
            day_of_month: r.day_of_month,
            month_of_year: r.month_of_year,
            ends_at: r.ends_at,
        })
    }
}

impl From<RepetitionRule> for RuleRecord {
    fn from(rule: RepetitionRule) -> Self {
        RuleRecord {
            frequency: rule.frequency,
            interval: rule.interval,
            days_of_week: rule.days_of_week,
            day_of_month: rule.day_of_month,
            month_of_year: rule.month_of_year,
            ends_at: rule.ends_at,
        }
    }
}

impl fmt::Display for RepetitionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.interval == 1 {
            write!(f, "{}", self.frequency)?;
        } else {
            let unit = match self.frequency {
                Frequency::Daily => "days",
                Frequency::Weekly => "weeks",
                Frequency::Monthly => "months",
                Frequency::Yearly => "years",
            };
            write!(f, "every {} {}", self.interval, unit)?;
        }
        match self.frequency {
            Frequency::Weekly => {
                if let Some(days) = &self.days_of_week {
                    const SHORT: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
                    let names: Vec<&str> = days.iter().map(|&d| SHORT[d as usize]).collect();
                    write!(f, " on {}", names.join(","))?;
                }
            }
            Frequency::Yearly => {
                if let Some(m) = self.month_of_year {
                    write!(f, " in month {}", m)?;
                }
                if let Some(d) = self.day_of_month {
                    write!(f, " on day {}", d)?;
                }
            }
            Frequency::Monthly => {
                if let Some(d) = self.day_of_month {
                    write!(f, " on day {}", d)?;
                }
            }
            Frequency::Daily => {}
        }
        if let Some(end) = self.ends_at {
            write!(f, " until {}", end.format("%Y-%m-%d"))?;
        }
        Ok(())
    }
}

/// Result of evaluating a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    Next(DateTime<Utc>),
    Exhausted,
}

/// Computes the first occurrence of `rule` after `basis` that is strictly
/// later than `now`.
///
/// A stale basis is advanced as many steps as needed. Every candidate is
/// checked against the rule's end bound, so a rule whose end falls before the
/// first future candidate is [`Occurrence::Exhausted`].
pub fn compute_next_occurrence(
    basis: DateTime<Utc>,
    rule: &RepetitionRule,
    now: DateTime<Utc>,
) -> Occurrence {
    let mut cursor = fast_forward(basis, rule, now);
    loop {
        let Some(candidate) = step(cursor, rule) else {
            warn!(%cursor, %rule, "recurrence left the representable calendar range");
            return Occurrence::Exhausted;
        };
        if rule.ends_at.is_some_and(|end| candidate > end) {
            return Occurrence::Exhausted;
        }
        if candidate > now {
            return Occurrence::Next(candidate);
        }
        cursor = candidate;
    }
}

/// Successive future occurrences of `rule`, starting with the first one after
/// `now`. Ends when the rule is exhausted.
pub fn occurrences(
    basis: DateTime<Utc>,
    rule: &RepetitionRule,
    now: DateTime<Utc>,
) -> Occurrences<'_> {
    Occurrences {
        rule,
        basis,
        now,
        done: false,
    }
}

/// Iterator returned by [`occurrences`].
pub struct Occurrences<'a> {
    rule: &'a RepetitionRule,
    basis: DateTime<Utc>,
    now: DateTime<Utc>,
    done: bool,
}

impl Iterator for Occurrences<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match compute_next_occurrence(self.basis, self.rule, self.now) {
            Occurrence::Next(at) => {
                self.basis = at;
                self.now = at;
                Some(at)
            }
            Occurrence::Exhausted => {
                self.done = true;
                None
            }
        }
    }
}

/// Fixed-length step of the rule, when it has one.
fn fixed_stride(rule: &RepetitionRule) -> Option<TimeDelta> {
    let days = match (rule.frequency, &rule.days_of_week) {
        (Frequency::Daily, _) => i64::from(rule.interval),
        (Frequency::Weekly, None) => 7 * i64::from(rule.interval),
        _ => return None,
    };
    TimeDelta::try_days(days)
}

/// Jumps a stale basis forward by whole strides so it lands at or before
/// `now`, skipping the intermediate steps. Calendar cadences are returned
/// unchanged because month clamping makes their steps uneven.
fn fast_forward(basis: DateTime<Utc>, rule: &RepetitionRule, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(stride) = fixed_stride(rule) else {
        return basis;
    };
    let gap = (now - basis).num_milliseconds();
    let stride_ms = stride.num_milliseconds();
    if gap < stride_ms {
        return basis;
    }
    i32::try_from(gap / stride_ms)
        .ok()
        .and_then(|whole| stride.checked_mul(whole))
        .and_then(|jump| basis.checked_add_signed(jump))
        .unwrap_or(basis)
}

/// Applies the rule once.
fn step(from: DateTime<Utc>, rule: &RepetitionRule) -> Option<DateTime<Utc>> {
    match rule.frequency {
        Frequency::Daily => from.checked_add_signed(TimeDelta::try_days(i64::from(rule.interval))?),
        Frequency::Weekly => match &rule.days_of_week {
            None => from.checked_add_signed(TimeDelta::try_weeks(i64::from(rule.interval))?),
            Some(days) => {
                let today = i64::from(from.weekday().num_days_from_sunday());
                let offset = match days.iter().map(|&d| i64::from(d)).find(|&d| d > today) {
                    Some(later) => later - today,
                    None => 7 * i64::from(rule.interval) - today + i64::from(days[0]),
                };
                from.checked_add_signed(TimeDelta::try_days(offset)?)
            }
        },
        Frequency::Monthly => {
            let moved = from.checked_add_months(Months::new(rule.interval))?;
            match rule.day_of_month {
                Some(day) => pin_date(moved, moved.year(), moved.month(), u32::from(day)),
                None => Some(moved),
            }
        }
        Frequency::Yearly => {
            let moved = from.checked_add_months(Months::new(rule.interval.checked_mul(12)?))?;
            let month = rule.month_of_year.map_or(moved.month(), u32::from);
            let day = rule.day_of_month.map_or(moved.day(), u32::from);
            pin_date(moved, moved.year(), month, day)
        }
    }
}

/// Moves `at` to the given calendar date, keeping its time of day. The day is
/// clamped to the last day of the target month.
fn pin_date(at: DateTime<Utc>, year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    let day = day.min(last_day_of_month(year, month)?);
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.and_time(at.time()).and_utc())
}

/// Number of days in `month` of `year`.
pub fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some(next.signed_duration_since(first).num_days() as u32)
}
