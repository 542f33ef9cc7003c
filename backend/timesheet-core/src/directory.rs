// src/directory.rs
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::model::{normalize_date, required_cell, Employee, EMPLOYEES_TABLE, HOLIDAYS_TABLE};
use crate::store::RecordStore;

/// Read-only view of the admin-managed Employees table.
#[derive(Clone)]
pub struct EmployeeDirectory {
    store: Arc<dyn RecordStore>,
}

impl EmployeeDirectory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Finds an employee by exact username. Credential checks are left to the caller.
    pub async fn lookup_employee(&self, username: &str) -> Result<Option<Employee>, StoreError> {
        let rows = self.store.fetch_all(EMPLOYEES_TABLE).await?;
        for (index, row) in rows.iter().enumerate() {
            let stored = required_cell(row, EMPLOYEES_TABLE, index, "Username")?;
            if stored.trim() == username {
                return Employee::from_row(row, index).map(Some);
            }
        }
        debug!("No employee named {}", username);
        Ok(None)
    }
}

/// Paid public holidays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayCalendar {
    dates: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn from_dates<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// Reads the Holidays table. An absent table means no holidays.
    pub async fn load(store: &dyn RecordStore) -> Result<Self, StoreError> {
        let rows = match store.fetch_all(HOLIDAYS_TABLE).await {
            Ok(rows) => rows,
            Err(StoreError::TableMissing(_)) => {
                warn!("No {} table found; treating every day as a workday", HOLIDAYS_TABLE);
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };

        let mut dates = BTreeSet::new();
        for (index, row) in rows.iter().enumerate() {
            let raw = required_cell(row, HOLIDAYS_TABLE, index, "Date")?;
            if raw.trim().is_empty() {
                continue;
            }
            let date = normalize_date(raw).ok_or_else(|| {
                StoreError::malformed(HOLIDAYS_TABLE, index, format!("unparseable date '{}'", raw))
            })?;
            dates.insert(date);
        }
        info!("Loaded {} holiday dates", dates.len());
        Ok(Self { dates })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn dates(&self) -> &BTreeSet<NaiveDate> {
        &self.dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EMPLOYEES_HEADER, HOLIDAYS_HEADER};
    use crate::store::memory::MemoryStore;
    use tokio::runtime::Runtime;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    #[test]
    fn lookup_is_exact_match() {
        let rt = Runtime::new().unwrap();
        let store = MemoryStore::new().with_table(
            EMPLOYEES_TABLE,
            &EMPLOYEES_HEADER,
            vec![
                vec!["alice", "secret", "Alice Andersson"],
                vec!["bob", "hunter2", ""],
            ],
        );
        let directory = EmployeeDirectory::new(Arc::new(store));

        let alice = rt
            .block_on(async { directory.lookup_employee("alice").await })
            .unwrap()
            .expect("alice should exist");
        assert_eq!(alice.display_name, "Alice Andersson");
        assert_eq!(alice.password, "secret");

        let bob = rt
            .block_on(async { directory.lookup_employee("bob").await })
            .unwrap()
            .expect("bob should exist");
        assert_eq!(bob.display_name, "bob");

        let nobody = rt
            .block_on(async { directory.lookup_employee("Alice").await })
            .unwrap();
        assert!(nobody.is_none(), "Usernames are case sensitive");
    }

    #[test]
    fn missing_employees_table_propagates() {
        let rt = Runtime::new().unwrap();
        let directory = EmployeeDirectory::new(Arc::new(MemoryStore::new()));

        let result = rt.block_on(async { directory.lookup_employee("alice").await });
        assert!(matches!(result, Err(StoreError::TableMissing(_))));
    }

    #[test]
    fn holidays_load_and_missing_table_is_empty() {
        let rt = Runtime::new().unwrap();
        let store = MemoryStore::new().with_table(
            HOLIDAYS_TABLE,
            &HOLIDAYS_HEADER,
            vec![
                vec!["2024-12-25", "Christmas Day"],
                vec!["12/26/2024", "Boxing Day"],
                vec!["", ""],
            ],
        );

        let calendar = rt.block_on(async { HolidayCalendar::load(&store).await }).unwrap();
        assert_eq!(calendar.dates().len(), 2);
        assert!(calendar.contains(d("2024-12-25")));
        assert!(calendar.contains(d("2024-12-26")));
        assert!(!calendar.contains(d("2024-12-27")));

        let empty = rt
            .block_on(async { HolidayCalendar::load(&MemoryStore::new()).await })
            .unwrap();
        assert!(empty.dates().is_empty());
    }

    #[test]
    fn bad_holiday_date_is_malformed() {
        let rt = Runtime::new().unwrap();
        let store = MemoryStore::new().with_table(
            HOLIDAYS_TABLE,
            &HOLIDAYS_HEADER,
            vec![vec!["Christmas", "Christmas Day"]],
        );

        let result = rt.block_on(async { HolidayCalendar::load(&store).await });
        assert!(matches!(result, Err(StoreError::MalformedRow { .. })));
    }
}
