// src/reconcile.rs
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::history::HistoryEntry;
use crate::model::{normalize_date, required_cell, SubmissionRecord, SUBMISSIONS_HEADER, SUBMISSIONS_TABLE};
use crate::store::{row_values, RecordStore};
use crate::week::{in_work_week, week_end, week_start_for};

/// What a reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub username: String,
    /// Monday of the submitted week; `None` for an empty batch.
    pub week_start: Option<NaiveDate>,
    /// Existing rows dropped because the batch supersedes them.
    pub replaced: usize,
    /// Rows left untouched (other users, other dates).
    pub retained: usize,
    /// The batch as written, stamped with the reconciliation time.
    pub written: Vec<SubmissionRecord>,
    /// The submitting user's Mon–Fri entries after the rewrite.
    pub week_entries: BTreeMap<NaiveDate, HistoryEntry>,
}

/// Replace-by-key merge of a user's week into the submissions table.
#[derive(Clone)]
pub struct WeekReconciler {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl WeekReconciler {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Drops the user's existing rows on the batch's dates, appends the batch
    /// and rewrites the whole table.
    ///
    /// Rows of other users, and of this user on other dates, keep their
    /// relative order and cell text. Only the user's rows inside the batch's
    /// Mon–Fri week are read beyond their date. An absent submissions table
    /// is fatal.
    pub async fn reconcile(
        &self,
        new_entries: Vec<SubmissionRecord>,
    ) -> Result<ReconcileReport, StoreError> {
        let username = match new_entries.first() {
            Some(first) => first.username.clone(),
            None => {
                debug!("Empty submission batch; nothing to reconcile");
                return Ok(ReconcileReport::default());
            }
        };
        if let Some(stray) = new_entries.iter().find(|e| e.username != username) {
            return Err(StoreError::InvalidBatch(format!(
                "batch for {} contains an entry for {}",
                username, stray.username
            )));
        }
        let week_start = new_entries
            .first()
            .and_then(|first| week_start_for(first.date))
            .filter(|monday| week_end(*monday).is_some())
            .ok_or_else(|| {
                StoreError::InvalidBatch(format!("batch for {} has no representable week", username))
            })?;
        let mut dates = BTreeSet::new();
        for entry in &new_entries {
            if !in_work_week(week_start, entry.date) {
                return Err(StoreError::InvalidBatch(format!(
                    "batch for {} spans more than the week of {}",
                    username, week_start
                )));
            }
            if !dates.insert(entry.date) {
                return Err(StoreError::InvalidBatch(format!(
                    "batch for {} lists {} twice",
                    username, entry.date
                )));
            }
        }

        let rows = self.store.fetch_all(SUBMISSIONS_TABLE).await?;
        let existing = rows.len();

        let mut output = Vec::with_capacity(existing + new_entries.len());
        let mut week_entries = BTreeMap::new();
        let mut replaced = 0;
        for (index, row) in rows.iter().enumerate() {
            if required_cell(row, SUBMISSIONS_TABLE, index, "Username")? == username {
                let raw_date = required_cell(row, SUBMISSIONS_TABLE, index, "Date")?;
                let date = normalize_date(raw_date).ok_or_else(|| {
                    StoreError::malformed(SUBMISSIONS_TABLE, index, format!("unparseable date '{}'", raw_date))
                })?;
                if dates.contains(&date) {
                    debug!("Superseding {} row for {} (table row {})", username, date, index);
                    replaced += 1;
                    continue;
                }
                if in_work_week(week_start, date) {
                    let (_, entry) = HistoryEntry::from_row(row, index)?;
                    week_entries.insert(date, entry);
                }
            }
            output.push(row_values(row, &SUBMISSIONS_HEADER));
        }
        let retained = output.len();

        let now = self.clock.now();
        let written: Vec<SubmissionRecord> = new_entries
            .into_iter()
            .map(|mut entry| {
                entry.timestamp = Some(now);
                entry
            })
            .collect();
        output.extend(written.iter().map(SubmissionRecord::to_row));

        self.store
            .replace_all(SUBMISSIONS_TABLE, &SUBMISSIONS_HEADER, output)
            .await?;
        info!(
            "Reconciled {} entries for {}: {} replaced, {} retained ({} rows before)",
            written.len(),
            username,
            replaced,
            retained,
            existing
        );

        week_entries.extend(written.iter().map(|r| (r.date, HistoryEntry::from(r))));
        Ok(ReconcileReport {
            username,
            week_start: Some(week_start),
            replaced,
            retained,
            written,
            week_entries,
        })
    }
}
