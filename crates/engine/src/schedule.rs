//! Calendar schedule rules.
//!
//! A rule keeps its cron fields exactly as authored (the strings are
//! business-calendar data and are never normalised). [`CronSpec`] is the
//! parsed form used to decide when a rule fires. Times are literal UTC.

use chrono::{DateTime, Datelike, Days, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// How far ahead [`CronSpec::next_after`] looks before giving up.
const SEARCH_HORIZON_DAYS: u64 = 366 * 8;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

// ---------------------------------------------------------------------------
// ScheduleRule
// ---------------------------------------------------------------------------

/// A named calendar trigger bound to the orchestrator's start action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub minute: String,
    pub hour: String,
    pub day: String,
    pub month: String,
    #[serde(default = "any_year")]
    pub year: String,
}

fn any_year() -> String {
    "*".to_string()
}

impl ScheduleRule {
    pub fn new(
        name: &str,
        description: &str,
        minute: &str,
        hour: &str,
        day: &str,
        month: &str,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            minute: minute.into(),
            hour: hour.into(),
            day: day.into(),
            month: month.into(),
            year: any_year(),
        }
    }

    /// Parse the fields into a matchable spec.
    pub fn spec(&self) -> Result<CronSpec, EngineError> {
        let field = |kind: FieldKind, value: &str| {
            CronField::parse(kind, value).ok_or_else(|| EngineError::InvalidCron {
                rule: self.name.clone(),
                field: kind.name(),
                value: value.to_string(),
            })
        };

        Ok(CronSpec {
            minute: field(FieldKind::Minute, &self.minute)?,
            hour: field(FieldKind::Hour, &self.hour)?,
            day: field(FieldKind::Day, &self.day)?,
            month: field(FieldKind::Month, &self.month)?,
            year: field(FieldKind::Year, &self.year)?,
        })
    }

    /// Provider cron expression, day-of-week left unspecified.
    pub fn expression(&self) -> String {
        format!(
            "cron({} {} {} {} ? {})",
            self.minute, self.hour, self.day, self.month, self.year
        )
    }
}

/// The academic-calendar table: a monthly run plus registration-period bursts.
pub fn syllabus_schedule() -> Vec<ScheduleRule> {
    vec![
        ScheduleRule::new("regular", "Scrape the syllabus every month.", "0", "16", "1", "*"),
        ScheduleRule::new("fall-pre", "Before fall registration.", "0", "16", "19,21,23", "JUL,AUG"),
        ScheduleRule::new("fall-reg1", "Fall registration, period 1.", "0", "16", "4,7,10,13,15,17", "SEP"),
        ScheduleRule::new("fall-reg2", "Fall registration, period 2.", "0", "16", "20,23,25", "SEP"),
        ScheduleRule::new("fall-reg3", "Fall registration, period 3.", "0", "16", "28,30", "SEP"),
        ScheduleRule::new("fall-reg4", "Fall registration, period 4.", "0", "16", "3,5,8", "OCT"),
        ScheduleRule::new("spring-pre", "Before spring registration.", "0", "16", "14,24", "FEB"),
        ScheduleRule::new("spring-reg1", "Spring registration, period 1.", "0", "16", "4,7,10,13,16,18,21,24,27", "MAR"),
        ScheduleRule::new("spring-reg2", "Spring registration, period 2.", "0", "16", "3,5,8", "APR"),
        ScheduleRule::new("spring-reg3", "Spring registration, period 3.", "0", "16", "16,20,24,26,28", "APR"),
        ScheduleRule::new("spring-reg4", "Spring registration, period 4.", "0", "16", "9,12,14,16", "MAY"),
    ]
}

// ---------------------------------------------------------------------------
// CronField / CronSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    fn range(self) -> (u32, u32) {
        match self {
            Self::Minute => (0, 59),
            Self::Hour => (0, 23),
            Self::Day => (1, 31),
            Self::Month => (1, 12),
            Self::Year => (1970, 2199),
        }
    }

    fn value(self, token: &str) -> Option<u32> {
        let value = match self {
            Self::Month => match MONTH_NAMES.iter().position(|m| m.eq_ignore_ascii_case(token)) {
                Some(pos) => pos as u32 + 1,
                None => token.parse().ok()?,
            },
            _ => token.parse().ok()?,
        };
        let (min, max) = self.range();
        (min..=max).contains(&value).then_some(value)
    }
}

/// One parsed cron field: wildcard or an explicit value list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronField {
    Any,
    Values(Vec<u32>),
}

impl CronField {
    fn parse(kind: FieldKind, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == "*" || (raw == "?" && kind == FieldKind::Day) {
            return Some(Self::Any);
        }
        let mut values = raw
            .split(',')
            .map(|token| kind.value(token.trim()))
            .collect::<Option<Vec<u32>>>()?;
        values.sort_unstable();
        values.dedup();
        Some(Self::Values(values))
    }

    pub fn contains(&self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Values(values) => values.binary_search(&value).is_ok(),
        }
    }
}

/// Parsed form of a [`ScheduleRule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSpec {
    pub minute: CronField,
    pub hour: CronField,
    pub day: CronField,
    pub month: CronField,
    pub year: CronField,
}

impl CronSpec {
    fn matches_date(&self, date: NaiveDate) -> bool {
        self.day.contains(date.day())
            && self.month.contains(date.month())
            && u32::try_from(date.year()).map_or(false, |y| self.year.contains(y))
    }

    /// Whether the rule fires during the minute containing `at`.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.matches_date(at.date_naive())
            && self.hour.contains(at.hour())
            && self.minute.contains(at.minute())
    }

    /// First firing instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.date_naive();
        for offset in 0..SEARCH_HORIZON_DAYS {
            let date = start.checked_add_days(Days::new(offset))?;
            if !self.matches_date(date) {
                continue;
            }
            for hour in (0..24).filter(|h| self.hour.contains(*h)) {
                for minute in (0..60).filter(|m| self.minute.contains(*m)) {
                    let candidate = date.and_hms_opt(hour, minute, 0)?.and_utc();
                    if candidate > after {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }
}
