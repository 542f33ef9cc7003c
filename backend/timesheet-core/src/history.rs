// src/history.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::{
    format_date, required_cell, required_date, required_decimal, SubmissionRecord, SUBMISSIONS_TABLE,
};
use crate::store::{RecordStore, Row};
use crate::week::in_work_week;

/// Previously submitted values for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub hours: Decimal,
    pub tasks: String,
    pub vacation: Decimal,
}

impl From<&SubmissionRecord> for HistoryEntry {
    fn from(record: &SubmissionRecord) -> Self {
        Self {
            hours: record.hours_worked,
            tasks: record.tasks.clone(),
            vacation: record.vacation_hours,
        }
    }
}

impl HistoryEntry {
    /// Reads only the Date, Hours, Tasks and Vacation cells of a submissions row.
    pub fn from_row(row: &Row, index: usize) -> Result<(NaiveDate, Self), StoreError> {
        let table = SUBMISSIONS_TABLE;
        let date = required_date(row, table, index, "Date")?;
        Ok((
            date,
            Self {
                hours: required_decimal(row, table, index, "Hours")?,
                tasks: required_cell(row, table, index, "Tasks")?.to_string(),
                vacation: required_decimal(row, table, index, "Vacation")?,
            },
        ))
    }
}

/// Builds date-keyed lookups of a user's prior entries. Never writes.
#[derive(Clone)]
pub struct HistoryLoader {
    store: Arc<dyn RecordStore>,
}

impl HistoryLoader {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// All of `username`'s submissions keyed by ISO date (`YYYY-MM-DD`).
    ///
    /// An absent submissions table reads as no history. Later rows win when
    /// a date appears twice.
    pub async fn load_history(
        &self,
        username: &str,
    ) -> Result<BTreeMap<String, HistoryEntry>, StoreError> {
        let rows = match self.store.fetch_all(SUBMISSIONS_TABLE).await {
            Ok(rows) => rows,
            Err(StoreError::TableMissing(_)) => {
                debug!("No {} table yet; history for {} is empty", SUBMISSIONS_TABLE, username);
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(e),
        };

        let mut history = BTreeMap::new();
        for (index, row) in rows.iter().enumerate() {
            if required_cell(row, SUBMISSIONS_TABLE, index, "Username")? != username {
                continue;
            }
            let (date, entry) = HistoryEntry::from_row(row, index)?;
            history.insert(format_date(date), entry);
        }
        info!("Loaded {} history entries for {}", history.len(), username);
        Ok(history)
    }

    /// History narrowed to the Mon–Fri window starting at `week_start`.
    pub async fn load_week(
        &self,
        username: &str,
        week_start: NaiveDate,
    ) -> Result<BTreeMap<String, HistoryEntry>, StoreError> {
        let history = self.load_history(username).await?;
        Ok(history
            .into_iter()
            .filter(|(key, _)| {
                NaiveDate::parse_from_str(key, "%Y-%m-%d")
                    .map(|date| in_work_week(week_start, date))
                    .unwrap_or(false)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SUBMISSIONS_HEADER;
    use crate::store::memory::MemoryStore;
    use rust_decimal_macros::dec;
    use tokio::runtime::Runtime;

    fn seeded_store() -> MemoryStore {
        MemoryStore::new().with_table(
            SUBMISSIONS_TABLE,
            &SUBMISSIONS_HEADER,
            vec![
                vec!["alice", "2024-03-04", "8", "Planning", "0", "2024-03-08 17:00:00"],
                vec!["bob", "2024-03-04", "6", "Support", "2", "2024-03-08 17:00:00"],
                vec!["alice", "3/5/2024", "7.5", "Reviews", "0.5", "2024-03-08 17:00:00"],
                vec!["alice", "2024-03-11", "4", "Offsite", "4", "2024-03-15 12:00:00"],
                vec!["alice", "2024-02-26", "8", "Old week", "0", ""],
            ],
        )
    }

    #[test]
    fn history_is_filtered_and_normalized() {
        let rt = Runtime::new().unwrap();
        let loader = HistoryLoader::new(Arc::new(seeded_store()));

        let history = rt.block_on(async { loader.load_history("alice").await }).unwrap();
        assert_eq!(history.len(), 4, "Rows without a timestamp are still history");
        assert_eq!(
            history.get("2024-03-05"),
            Some(&HistoryEntry {
                hours: dec!(7.5),
                tasks: "Reviews".to_string(),
                vacation: dec!(0.5),
            }),
            "US-formatted dates are keyed in ISO form"
        );
        assert_eq!(history.get("2024-03-04").map(|e| e.tasks.as_str()), Some("Planning"));
        assert_eq!(history.get("2024-02-26").map(|e| e.hours), Some(dec!(8)));
    }

    #[test]
    fn unknown_user_and_missing_table_give_empty_history() {
        let rt = Runtime::new().unwrap();

        let loader = HistoryLoader::new(Arc::new(seeded_store()));
        let history = rt.block_on(async { loader.load_history("carol").await }).unwrap();
        assert!(history.is_empty());

        let loader = HistoryLoader::new(Arc::new(MemoryStore::new()));
        let history = rt.block_on(async { loader.load_history("alice").await }).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn load_week_keeps_only_that_week() {
        let rt = Runtime::new().unwrap();
        let loader = HistoryLoader::new(Arc::new(seeded_store()));
        let week_start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        let week = rt
            .block_on(async { loader.load_week("alice", week_start).await })
            .unwrap();
        let keys: Vec<&str> = week.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2024-03-04", "2024-03-05"]);
    }

    #[test]
    fn loading_history_does_not_touch_the_store() {
        let rt = Runtime::new().unwrap();
        let store = seeded_store();
        let before = store.snapshot(SUBMISSIONS_TABLE);
        let loader = HistoryLoader::new(Arc::new(store.clone()));

        rt.block_on(async { loader.load_history("alice").await }).unwrap();
        assert_eq!(store.snapshot(SUBMISSIONS_TABLE), before);
    }
}
