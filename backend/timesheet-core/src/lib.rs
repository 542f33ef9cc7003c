// src/lib.rs

pub mod api;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod history;
pub mod model;
pub mod reconcile;
pub mod service;
pub mod session;
pub mod store;
pub mod summary;
pub mod week;


pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, StoreBackend};
pub use directory::{EmployeeDirectory, HolidayCalendar};
pub use error::{PortalError, StoreError};
pub use history::{HistoryEntry, HistoryLoader};
pub use model::{Employee, SubmissionRecord, WeeklySummary};
pub use reconcile::{ReconcileReport, WeekReconciler};
pub use service::{SubmitOutcome, SummaryStatus, TimesheetService};
pub use session::{Role, Session, SessionRegistry};
pub use store::{csv_store::CsvStore, memory::MemoryStore, sheets::SheetsStore, RecordStore, Row};
pub use summary::{SummaryAggregator, SummaryUpsert, WeekTotals};
pub use week::{DailyEntry, DayPlan, WeekPlan};
