// src/summary.rs
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::history::HistoryEntry;
use crate::model::{
    format_date, normalize_date_key, required_cell, WeeklySummary, SUMMARIES_HEADER,
    SUMMARIES_TABLE,
};
use crate::store::RecordStore;
use crate::week::in_work_week;

/// Hour totals for one Mon–Fri week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeekTotals {
    pub total_hours: Decimal,
    pub total_vacation: Decimal,
}

impl WeekTotals {
    /// Sums entries dated within `[week_start, week_start + 4]`.
    pub fn for_week(entries: &BTreeMap<NaiveDate, HistoryEntry>, week_start: NaiveDate) -> Self {
        entries
            .iter()
            .filter(|(date, _)| in_work_week(week_start, **date))
            .fold(Self::default(), |acc, (_, e)| Self {
                total_hours: acc.total_hours + e.hours,
                total_vacation: acc.total_vacation + e.vacation,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryUpsert {
    Inserted,
    Updated { index: usize },
}

/// Keeps one Weekly_Summaries row per (username, week start).
#[derive(Clone)]
pub struct SummaryAggregator {
    store: Arc<dyn RecordStore>,
}

impl SummaryAggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn upsert_summary(
        &self,
        username: &str,
        week_start: NaiveDate,
        total_hours: Decimal,
        total_vacation: Decimal,
    ) -> Result<SummaryUpsert, StoreError> {
        if week_start.weekday() != Weekday::Mon {
            return Err(StoreError::InvalidWeekStart(week_start));
        }

        if self.store.ensure_table(SUMMARIES_TABLE, &SUMMARIES_HEADER).await? {
            info!("Created {} table", SUMMARIES_TABLE);
        }

        let summary = WeeklySummary {
            username: username.to_string(),
            week_start,
            total_hours,
            total_vacation,
        };
        let key = format_date(week_start);
        let rows = self.store.fetch_all(SUMMARIES_TABLE).await?;

        let mut found = None;
        for (index, row) in rows.iter().enumerate() {
            if required_cell(row, SUMMARIES_TABLE, index, "Username")? != username {
                continue;
            }
            let raw_week = required_cell(row, SUMMARIES_TABLE, index, "Week_Start")?;
            match normalize_date_key(raw_week) {
                Some(stored) if stored == key => {
                    if found.is_some() {
                        warn!(
                            "Duplicate summary rows for {} week {}; only the first is updated",
                            username, key
                        );
                        break;
                    }
                    found = Some(index);
                }
                Some(_) => {}
                None => warn!(
                    "Skipping summary row {} with unparseable week start '{}'",
                    index, raw_week
                ),
            }
        }

        match found {
            Some(index) => {
                self.store
                    .update_row(SUMMARIES_TABLE, index, summary.to_row())
                    .await?;
                info!(
                    "Updated summary for {} week {}: {} h, {} h vacation",
                    username, key, total_hours, total_vacation
                );
                Ok(SummaryUpsert::Updated { index })
            }
            None => {
                self.store.append_row(SUMMARIES_TABLE, summary.to_row()).await?;
                info!(
                    "Inserted summary for {} week {}: {} h, {} h vacation",
                    username, key, total_hours, total_vacation
                );
                Ok(SummaryUpsert::Inserted)
            }
        }
    }

    /// All summaries; an absent table reads as none.
    pub async fn list_summaries(&self) -> Result<Vec<WeeklySummary>, StoreError> {
        let rows = match self.store.fetch_all(SUMMARIES_TABLE).await {
            Ok(rows) => rows,
            Err(StoreError::TableMissing(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let summaries = rows
            .iter()
            .enumerate()
            .map(|(index, row)| WeeklySummary::from_row(row, index))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Listed {} weekly summaries", summaries.len());
        Ok(summaries)
    }
}
