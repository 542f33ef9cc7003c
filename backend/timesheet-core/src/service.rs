// src/service.rs
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::directory::{EmployeeDirectory, HolidayCalendar};
use crate::error::{PortalError, StoreError};
use crate::history::{HistoryEntry, HistoryLoader};
use crate::model::{required_cell, SubmissionRecord, WeeklySummary, SUBMISSIONS_TABLE};
use crate::reconcile::WeekReconciler;
use crate::session::{Role, Session, SessionRegistry};
use crate::store::RecordStore;
use crate::summary::{SummaryAggregator, SummaryUpsert, WeekTotals};
use crate::week::{build_week_records, resolve_week, DailyEntry, WeekPlan};

/// What happened to the weekly summary after the submissions were saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum SummaryStatus {
    Inserted,
    Updated,
    /// Nothing was submitted, so the summary was left alone.
    Skipped,
    /// Submissions are saved but the summary is stale.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub week_start: NaiveDate,
    pub replaced: usize,
    pub written: usize,
    pub totals: WeekTotals,
    pub summary: SummaryStatus,
}

/// The portal's operations, each taking the caller's [`Session`] explicitly.
pub struct TimesheetService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    directory: EmployeeDirectory,
    history: HistoryLoader,
    reconciler: WeekReconciler,
    aggregator: SummaryAggregator,
    sessions: SessionRegistry,
    admin_users: Vec<String>,
    // Serializes read-modify-rewrite of the submissions table within this process.
    submit_lock: Mutex<()>,
}

impl TimesheetService {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, admin_users: Vec<String>) -> Self {
        Self {
            directory: EmployeeDirectory::new(store.clone()),
            history: HistoryLoader::new(store.clone()),
            reconciler: WeekReconciler::new(store.clone(), clock.clone()),
            aggregator: SummaryAggregator::new(store.clone()),
            sessions: SessionRegistry::new(),
            store,
            clock,
            admin_users,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, PortalError> {
        let username = username.trim();
        let employee = match self.directory.lookup_employee(username).await? {
            Some(employee) => employee,
            None => {
                warn!("Login attempt for unknown user {}", username);
                return Err(PortalError::InvalidCredentials);
            }
        };
        if employee.password != password {
            warn!("Wrong password for {}", username);
            return Err(PortalError::InvalidCredentials);
        }
        let role = if self.admin_users.iter().any(|admin| admin.trim() == username) {
            Role::Admin
        } else {
            Role::Employee
        };
        Ok(self.sessions.open(&employee, role).await)
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.close(token).await
    }

    /// Resolves a bearer token to its session.
    pub async fn authenticate(&self, token: &str) -> Result<Session, PortalError> {
        self.sessions
            .resolve(token)
            .await
            .ok_or(PortalError::Unauthorized)
    }

    /// The editable form for the week containing `date`.
    pub async fn week_form(&self, session: &Session, date: NaiveDate) -> Result<WeekPlan, PortalError> {
        let week_start = resolve_week(date)?;
        let holidays = HolidayCalendar::load(self.store.as_ref()).await?;
        let history = self.history.load_week(&session.username, week_start).await?;
        WeekPlan::build(week_start, &holidays, &history)
    }

    /// Saves a week of entries, then refreshes the weekly summary.
    ///
    /// A summary failure does not undo the saved entries; it is logged and
    /// reported as [`SummaryStatus::Failed`].
    pub async fn submit_week(
        &self,
        session: &Session,
        week_start: NaiveDate,
        entries: Vec<DailyEntry>,
    ) -> Result<SubmitOutcome, PortalError> {
        let holidays = HolidayCalendar::load(self.store.as_ref()).await?;
        let records = build_week_records(
            &session.username,
            week_start,
            &entries,
            &holidays,
            self.clock.now(),
        )?;

        let _guard = self.submit_lock.lock().await;
        let report = self.reconciler.reconcile(records).await?;

        if report.written.is_empty() {
            info!("Empty submission from {} for week {}", session.username, week_start);
            return Ok(SubmitOutcome {
                week_start,
                replaced: 0,
                written: 0,
                totals: WeekTotals::default(),
                summary: SummaryStatus::Skipped,
            });
        }

        let totals = WeekTotals::for_week(&report.week_entries, week_start);
        let summary = match self
            .aggregator
            .upsert_summary(
                &session.username,
                week_start,
                totals.total_hours,
                totals.total_vacation,
            )
            .await
        {
            Ok(SummaryUpsert::Inserted) => SummaryStatus::Inserted,
            Ok(SummaryUpsert::Updated { .. }) => SummaryStatus::Updated,
            Err(e) => {
                error!(
                    "Submissions for {} week {} saved but summary update failed: {}",
                    session.username, week_start, e
                );
                SummaryStatus::Failed(e.to_string())
            }
        };

        info!(
            "{} submitted week {}: {} h worked, {} h vacation",
            session.username, week_start, totals.total_hours, totals.total_vacation
        );
        Ok(SubmitOutcome {
            week_start,
            replaced: report.replaced,
            written: report.written.len(),
            totals,
            summary,
        })
    }

    pub async fn history(&self, session: &Session) -> Result<BTreeMap<String, HistoryEntry>, PortalError> {
        Ok(self.history.load_history(&session.username).await?)
    }

    pub async fn admin_summaries(&self, session: &Session) -> Result<Vec<WeeklySummary>, PortalError> {
        require_admin(session)?;
        Ok(self.aggregator.list_summaries().await?)
    }

    /// Every submission, optionally narrowed to one user. Admin only.
    pub async fn admin_submissions(
        &self,
        session: &Session,
        username: Option<&str>,
    ) -> Result<Vec<SubmissionRecord>, PortalError> {
        require_admin(session)?;
        let rows = match self.store.fetch_all(SUBMISSIONS_TABLE).await {
            Ok(rows) => rows,
            Err(StoreError::TableMissing(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if let Some(filter) = username {
                if required_cell(row, SUBMISSIONS_TABLE, index, "Username")? != filter {
                    continue;
                }
            }
            records.push(SubmissionRecord::from_row(row, index)?);
        }
        Ok(records)
    }
}

fn require_admin(session: &Session) -> Result<(), PortalError> {
    if session.is_admin() {
        Ok(())
    } else {
        warn!("{} attempted an admin operation", session.username);
        Err(PortalError::Forbidden)
    }
}
