// src/week.rs
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::directory::HolidayCalendar;
use crate::error::PortalError;
use crate::history::HistoryEntry;
use crate::model::{
    format_date, SubmissionRecord, HOLIDAY_TASKS, HOLIDAY_VACATION_HOURS, HOLIDAY_WORKED_HOURS,
    MAX_DAILY_HOURS,
};

/// Mon–Fri reporting period.
pub const WORK_DAYS_PER_WEEK: u64 = 5;

// Week arithmetic returns `None` at the edges of the chrono calendar.

/// The Monday of the week containing `date`.
pub fn week_start_for(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
}

pub fn week_end(week_start: NaiveDate) -> Option<NaiveDate> {
    week_start.checked_add_days(Days::new(WORK_DAYS_PER_WEEK - 1))
}

pub fn work_days(week_start: NaiveDate) -> Option<Vec<NaiveDate>> {
    (0..WORK_DAYS_PER_WEEK)
        .map(|offset| week_start.checked_add_days(Days::new(offset)))
        .collect()
}

pub fn in_work_week(week_start: NaiveDate, date: NaiveDate) -> bool {
    date >= week_start && week_end(week_start).is_some_and(|end| date <= end)
}

fn out_of_range(date: NaiveDate) -> PortalError {
    PortalError::InvalidEntry(format!("{} is outside the supported calendar range", date))
}

/// The Monday of `date`'s week, provided the whole Mon–Fri window is representable.
pub fn resolve_week(date: NaiveDate) -> Result<NaiveDate, PortalError> {
    let week_start = week_start_for(date).ok_or_else(|| out_of_range(date))?;
    week_end(week_start).ok_or_else(|| out_of_range(date))?;
    Ok(week_start)
}

/// One day as typed by the employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub hours: Decimal,
    #[serde(default)]
    pub tasks: String,
    #[serde(default)]
    pub vacation: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub label: String,
    pub is_holiday: bool,
    /// Holiday days are filled in automatically and cannot be edited.
    pub locked: bool,
    pub hours: Decimal,
    pub tasks: String,
    pub vacation: Decimal,
}

/// The editable week form, prefilled from holidays and prior submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekPlan {
    pub week_start: NaiveDate,
    pub days: Vec<DayPlan>,
}

impl WeekPlan {
    pub fn build(
        week_start: NaiveDate,
        holidays: &HolidayCalendar,
        history: &BTreeMap<String, HistoryEntry>,
    ) -> Result<Self, PortalError> {
        let days = work_days(week_start)
            .ok_or_else(|| out_of_range(week_start))?
            .into_iter()
            .map(|date| {
                let label = date.format("%A %Y-%m-%d").to_string();
                if holidays.contains(date) {
                    return DayPlan {
                        date,
                        label,
                        is_holiday: true,
                        locked: true,
                        hours: HOLIDAY_WORKED_HOURS,
                        tasks: HOLIDAY_TASKS.to_string(),
                        vacation: HOLIDAY_VACATION_HOURS,
                    };
                }
                let prior = history.get(&format_date(date));
                DayPlan {
                    date,
                    label,
                    is_holiday: false,
                    locked: false,
                    hours: prior.map(|p| p.hours).unwrap_or_default(),
                    tasks: prior.map(|p| p.tasks.clone()).unwrap_or_default(),
                    vacation: prior.map(|p| p.vacation).unwrap_or_default(),
                }
            })
            .collect();
        Ok(Self { week_start, days })
    }
}

fn check_hours(date: NaiveDate, field: &str, value: Decimal) -> Result<(), PortalError> {
    if value < Decimal::ZERO || value > MAX_DAILY_HOURS {
        return Err(PortalError::InvalidEntry(format!(
            "{} on {} must be between 0 and {}, got {}",
            field, date, MAX_DAILY_HOURS, value
        )));
    }
    Ok(())
}

/// Checks a week's input before anything touches the store.
pub fn validate_entries(week_start: NaiveDate, entries: &[DailyEntry]) -> Result<(), PortalError> {
    if week_start.weekday() != Weekday::Mon {
        return Err(PortalError::InvalidEntry(format!(
            "week start {} is not a Monday",
            week_start
        )));
    }
    week_end(week_start).ok_or_else(|| out_of_range(week_start))?;
    let mut seen = HashSet::new();
    for entry in entries {
        if !in_work_week(week_start, entry.date) {
            return Err(PortalError::InvalidEntry(format!(
                "{} is outside the work week starting {}",
                entry.date, week_start
            )));
        }
        if !seen.insert(entry.date) {
            return Err(PortalError::InvalidEntry(format!(
                "{} appears more than once",
                entry.date
            )));
        }
        check_hours(entry.date, "hours", entry.hours)?;
        check_hours(entry.date, "vacation", entry.vacation)?;
    }
    Ok(())
}

/// Turns validated input into submission records.
///
/// Holiday dates always become [`SubmissionRecord::holiday`] rows, whatever
/// was typed for them.
pub fn build_week_records(
    username: &str,
    week_start: NaiveDate,
    entries: &[DailyEntry],
    holidays: &HolidayCalendar,
    timestamp: NaiveDateTime,
) -> Result<Vec<SubmissionRecord>, PortalError> {
    validate_entries(week_start, entries)?;

    let records = entries
        .iter()
        .map(|entry| {
            if holidays.contains(entry.date) {
                let record = SubmissionRecord::holiday(username, entry.date, timestamp);
                if entry.hours != record.hours_worked
                    || entry.vacation != record.vacation_hours
                    || entry.tasks != record.tasks
                {
                    warn!(
                        "Overriding input for {} on holiday {} with the public holiday entry",
                        username, entry.date
                    );
                }
                record
            } else {
                SubmissionRecord {
                    username: username.to_string(),
                    date: entry.date,
                    hours_worked: entry.hours,
                    tasks: entry.tasks.trim().to_string(),
                    vacation_hours: entry.vacation,
                    timestamp: Some(timestamp),
                }
            }
        })
        .collect::<Vec<_>>();
    debug!(
        "Built {} records for {} week of {}",
        records.len(),
        username,
        week_start
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    fn entry(date: &str, hours: Decimal, tasks: &str, vacation: Decimal) -> DailyEntry {
        DailyEntry {
            date: d(date),
            hours,
            tasks: tasks.to_string(),
            vacation,
        }
    }

    fn ts() -> NaiveDateTime {
        d("2024-03-08").and_hms_opt(16, 0, 0).unwrap()
    }

    #[test]
    fn week_start_is_the_monday() {
        assert_eq!(week_start_for(d("2024-03-04")), Some(d("2024-03-04")));
        assert_eq!(week_start_for(d("2024-03-07")), Some(d("2024-03-04")));
        assert_eq!(week_start_for(d("2024-03-10")), Some(d("2024-03-04")), "Sunday belongs to the week before");
        assert_eq!(week_start_for(d("2024-01-03")), Some(d("2024-01-01")));
    }

    #[test]
    fn work_days_span_monday_to_friday() {
        let days = work_days(d("2024-02-26"));
        assert_eq!(
            days,
            Some(vec![d("2024-02-26"), d("2024-02-27"), d("2024-02-28"), d("2024-02-29"), d("2024-03-01")])
        );
        assert!(in_work_week(d("2024-02-26"), d("2024-03-01")));
        assert!(!in_work_week(d("2024-02-26"), d("2024-03-02")));
    }

    #[test]
    fn plan_marks_holidays_and_prefills_history() {
        let holidays = HolidayCalendar::from_dates([d("2024-12-25"), d("2024-12-26")]);
        let mut history = BTreeMap::new();
        history.insert(
            "2024-12-23".to_string(),
            HistoryEntry {
                hours: dec!(6),
                tasks: "Release prep".to_string(),
                vacation: dec!(2),
            },
        );

        let plan = WeekPlan::build(d("2024-12-23"), &holidays, &history).unwrap();
        assert_eq!(plan.days.len(), 5);

        let monday = &plan.days[0];
        assert_eq!(monday.label, "Monday 2024-12-23");
        assert_eq!(monday.hours, dec!(6));
        assert_eq!(monday.tasks, "Release prep");
        assert!(!monday.locked);

        let christmas = &plan.days[2];
        assert!(christmas.is_holiday && christmas.locked);
        assert_eq!(christmas.hours, Decimal::ZERO);
        assert_eq!(christmas.vacation, dec!(8));
        assert_eq!(christmas.tasks, "Public Holiday");

        let friday = &plan.days[4];
        assert_eq!(friday.hours, Decimal::ZERO);
        assert_eq!(friday.tasks, "");
    }

    #[test]
    fn holiday_input_is_replaced_by_holiday_shape() {
        let holidays = HolidayCalendar::from_dates([d("2024-12-25")]);
        let entries = vec![
            entry("2024-12-24", dec!(8), "Support rota", dec!(0)),
            entry("2024-12-25", dec!(5), "Sneaky overtime", dec!(0)),
        ];

        let records =
            build_week_records("alice", d("2024-12-23"), &entries, &holidays, ts()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].is_holiday_shape());
        assert_eq!(records[0].hours_worked, dec!(8));
        assert!(records[1].is_holiday_shape(), "Holiday row must use the fixed shape");
        assert!(records.iter().all(|r| r.timestamp == Some(ts()) && r.username == "alice"));
    }

    #[test]
    fn out_of_range_hours_are_rejected() {
        let holidays = HolidayCalendar::default();
        let too_many = vec![entry("2024-03-04", dec!(24.5), "", dec!(0))];
        let negative = vec![entry("2024-03-04", dec!(8), "", dec!(-1))];

        for entries in [too_many, negative] {
            let result = build_week_records("alice", d("2024-03-04"), &entries, &holidays, ts());
            assert!(
                matches!(result, Err(PortalError::InvalidEntry(_))),
                "Expected InvalidEntry but got: {:?}",
                result
            );
        }

        let boundary = vec![entry("2024-03-04", dec!(24), "", dec!(0))];
        assert!(build_week_records("alice", d("2024-03-04"), &boundary, &holidays, ts()).is_ok());
    }

    #[test]
    fn dates_must_be_unique_and_inside_the_week() {
        let outside = vec![entry("2024-03-09", dec!(1), "", dec!(0))];
        assert!(matches!(
            validate_entries(d("2024-03-04"), &outside),
            Err(PortalError::InvalidEntry(_))
        ));

        let duplicate = vec![
            entry("2024-03-05", dec!(1), "", dec!(0)),
            entry("2024-03-05", dec!(2), "", dec!(0)),
        ];
        assert!(matches!(
            validate_entries(d("2024-03-04"), &duplicate),
            Err(PortalError::InvalidEntry(_))
        ));

        assert!(matches!(
            validate_entries(d("2024-03-05"), &[]),
            Err(PortalError::InvalidEntry(_))
        ), "Week start must be a Monday");
    }

    #[test]
    fn calendar_edge_is_rejected_not_panicking() {
        let last = NaiveDate::MAX;
        assert_eq!(last.weekday(), Weekday::Mon);
        assert_eq!(week_start_for(last), Some(last));
        assert_eq!(week_end(last), None);
        assert_eq!(work_days(last), None);
        assert!(!in_work_week(last, last));
        assert!(matches!(resolve_week(last), Err(PortalError::InvalidEntry(_))));
        assert!(matches!(
            WeekPlan::build(last, &HolidayCalendar::default(), &BTreeMap::new()),
            Err(PortalError::InvalidEntry(_))
        ));
        assert!(matches!(validate_entries(last, &[]), Err(PortalError::InvalidEntry(_))));

        assert_eq!(week_start_for(NaiveDate::MIN), None, "No Monday before the first representable day");
        assert_eq!(resolve_week(d("2024-03-07")).unwrap(), d("2024-03-04"));
    }
}
