// src/model.rs
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::StoreError;
use crate::store::Row;

// --- Table Layout (column order is the persisted contract) ---

pub const SUBMISSIONS_TABLE: &str = "Submissions";
pub const SUBMISSIONS_HEADER: [&str; 6] =
    ["Username", "Date", "Hours", "Tasks", "Vacation", "Timestamp"];

pub const SUMMARIES_TABLE: &str = "Weekly_Summaries";
pub const SUMMARIES_HEADER: [&str; 4] = ["Username", "Week_Start", "Total_Hours", "Total_Vacation"];

pub const EMPLOYEES_TABLE: &str = "Employees";
pub const EMPLOYEES_HEADER: [&str; 3] = ["Username", "Password", "Name"];

pub const HOLIDAYS_TABLE: &str = "Holidays";
pub const HOLIDAYS_HEADER: [&str; 2] = ["Date", "Name"];

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// --- Business Constants ---

pub const HOLIDAY_TASKS: &str = "Public Holiday";
pub const HOLIDAY_WORKED_HOURS: Decimal = dec!(0);
pub const HOLIDAY_VACATION_HOURS: Decimal = dec!(8);
pub const MAX_DAILY_HOURS: Decimal = dec!(24);

// --- Cell Helpers ---

/// Parses a stored date cell into a calendar date.
///
/// Spreadsheets hand dates back in whatever display format the cell carries,
/// so ISO dates, ISO timestamps, slash-separated ISO and US `M/D/YYYY` are
/// all accepted.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT).map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y/%m/%d"))
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y"))
        .ok()
}

/// Normalized ISO key for a stored date cell, if it parses.
pub fn normalize_date_key(raw: &str) -> Option<String> {
    normalize_date(raw).map(format_date)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Empty numeric cells read as zero.
pub fn parse_decimal_cell(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(trimmed).map_err(|e| format!("'{}' is not a number: {}", trimmed, e))
}

/// Looks up a required column, failing with `MalformedRow` when absent.
pub fn required_cell<'a>(
    row: &'a Row,
    table: &str,
    index: usize,
    column: &str,
) -> Result<&'a str, StoreError> {
    row.get(column)
        .map(String::as_str)
        .ok_or_else(|| StoreError::malformed(table, index, format!("missing column '{}'", column)))
}

pub(crate) fn required_date(row: &Row, table: &str, index: usize, column: &str) -> Result<NaiveDate, StoreError> {
    let raw = required_cell(row, table, index, column)?;
    normalize_date(raw)
        .ok_or_else(|| StoreError::malformed(table, index, format!("unparseable date '{}'", raw)))
}

pub(crate) fn required_decimal(row: &Row, table: &str, index: usize, column: &str) -> Result<Decimal, StoreError> {
    let raw = required_cell(row, table, index, column)?;
    parse_decimal_cell(raw).map_err(|detail| StoreError::malformed(table, index, detail))
}

// --- Records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub username: String,
    pub date: NaiveDate,
    pub hours_worked: Decimal,
    pub tasks: String,
    pub vacation_hours: Decimal,
    /// Rows written before the Timestamp column existed carry none.
    pub timestamp: Option<NaiveDateTime>,
}

impl SubmissionRecord {
    /// The only shape a paid-holiday row may take.
    pub fn holiday(username: &str, date: NaiveDate, timestamp: NaiveDateTime) -> Self {
        Self {
            username: username.to_string(),
            date,
            hours_worked: HOLIDAY_WORKED_HOURS,
            tasks: HOLIDAY_TASKS.to_string(),
            vacation_hours: HOLIDAY_VACATION_HOURS,
            timestamp: Some(timestamp),
        }
    }

    pub fn is_holiday_shape(&self) -> bool {
        self.hours_worked == HOLIDAY_WORKED_HOURS
            && self.vacation_hours == HOLIDAY_VACATION_HOURS
            && self.tasks == HOLIDAY_TASKS
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.username.clone(),
            format_date(self.date),
            format_decimal(self.hours_worked),
            self.tasks.clone(),
            format_decimal(self.vacation_hours),
            self.timestamp.map(format_timestamp).unwrap_or_default(),
        ]
    }

    pub fn from_row(row: &Row, index: usize) -> Result<Self, StoreError> {
        let table = SUBMISSIONS_TABLE;
        // A missing Timestamp column reads the same as an empty cell.
        let raw_ts = row.get("Timestamp").map(|ts| ts.trim()).unwrap_or_default();
        let timestamp = if raw_ts.is_empty() {
            None
        } else {
            let parsed = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT)
                .ok()
                // Rows written without a time part still carry a usable date.
                .or_else(|| normalize_date(raw_ts).and_then(|d| d.and_hms_opt(0, 0, 0)))
                .ok_or_else(|| {
                    StoreError::malformed(table, index, format!("unparseable timestamp '{}'", raw_ts))
                })?;
            Some(parsed)
        };

        Ok(Self {
            username: required_cell(row, table, index, "Username")?.to_string(),
            date: required_date(row, table, index, "Date")?,
            hours_worked: required_decimal(row, table, index, "Hours")?,
            tasks: required_cell(row, table, index, "Tasks")?.to_string(),
            vacation_hours: required_decimal(row, table, index, "Vacation")?,
            timestamp,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub username: String,
    pub week_start: NaiveDate,
    pub total_hours: Decimal,
    pub total_vacation: Decimal,
}

impl WeeklySummary {
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.username.clone(),
            format_date(self.week_start),
            format_decimal(self.total_hours),
            format_decimal(self.total_vacation),
        ]
    }

    pub fn from_row(row: &Row, index: usize) -> Result<Self, StoreError> {
        let table = SUMMARIES_TABLE;
        Ok(Self {
            username: required_cell(row, table, index, "Username")?.to_string(),
            week_start: required_date(row, table, index, "Week_Start")?,
            total_hours: required_decimal(row, table, index, "Total_Hours")?,
            total_vacation: required_decimal(row, table, index, "Total_Vacation")?,
        })
    }
}

/// Admin-managed account. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Employee {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub display_name: String,
}

impl Employee {
    pub fn from_row(row: &Row, index: usize) -> Result<Self, StoreError> {
        let table = EMPLOYEES_TABLE;
        let username = required_cell(row, table, index, "Username")?.trim().to_string();
        let password = required_cell(row, table, index, "Password")?.to_string();
        let display_name = row
            .get("Name")
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| username.clone());
        Ok(Self {
            username,
            password,
            display_name,
        })
    }
}
