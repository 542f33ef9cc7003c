// src/store/memory.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{rows_from_grid, RecordStore, Row};
use crate::error::StoreError;

#[derive(Debug, Clone, Default, PartialEq)]
struct MemoryTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// In-process workbook. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<String, MemoryTable>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds (or replaces) a table.
    pub fn with_table(self, table: &str, header: &[&str], rows: Vec<Vec<&str>>) -> Self {
        self.lock().insert(
            table.to_string(),
            MemoryTable {
                header: header.iter().map(|h| h.to_string()).collect(),
                rows: rows
                    .into_iter()
                    .map(|r| r.into_iter().map(str::to_string).collect())
                    .collect(),
            },
        );
        self
    }

    /// Raw data rows of a table, `None` if it does not exist.
    pub fn snapshot(&self, table: &str) -> Option<Vec<Vec<String>>> {
        self.lock().get(table).map(|t| t.rows.clone())
    }

    pub fn header(&self, table: &str) -> Option<Vec<String>> {
        self.lock().get(table).map(|t| t.header.clone())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryTable>> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let tables = self.lock();
        let stored = tables
            .get(table)
            .ok_or_else(|| StoreError::TableMissing(table.to_string()))?;
        debug!("Memory store: read {} rows from {}", stored.rows.len(), table);
        Ok(rows_from_grid(&stored.header, stored.rows.clone()))
    }

    async fn replace_all(
        &self,
        table: &str,
        header: &[&str],
        rows: Vec<Vec<String>>,
    ) -> Result<(), StoreError> {
        debug!("Memory store: rewriting {} with {} rows", table, rows.len());
        self.lock().insert(
            table.to_string(),
            MemoryTable {
                header: header.iter().map(|h| h.to_string()).collect(),
                rows,
            },
        );
        Ok(())
    }

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let stored = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableMissing(table.to_string()))?;
        stored.rows.push(row);
        Ok(())
    }

    async fn update_row(&self, table: &str, index: usize, row: Vec<String>) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let stored = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableMissing(table.to_string()))?;
        let slot = stored.rows.get_mut(index).ok_or_else(|| {
            StoreError::malformed(table, index, "row index out of range for update")
        })?;
        *slot = row;
        Ok(())
    }

    async fn ensure_table(&self, table: &str, header: &[&str]) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        if tables.contains_key(table) {
            return Ok(false);
        }
        tables.insert(
            table.to_string(),
            MemoryTable {
                header: header.iter().map(|h| h.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        Ok(true)
    }
}
