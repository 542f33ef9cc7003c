// src/store/csv_store.rs
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::{debug, info};

use super::{rows_from_grid, RecordStore, Row};
use crate::error::StoreError;

/// Workbook kept as a directory with one `<table>.csv` file per table.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

// Helper to create context-aware store errors from I/O failures
fn io_context<S: Into<String>>(source: std::io::Error, context: S) -> StoreError {
    StoreError::unreachable(context, source)
}

impl CsvStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| io_context(e, format!("Failed to create data directory {:?}", dir)))?;
        info!("CSV record store rooted at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table))
    }

    fn read_grid(&self, table: &str) -> Result<(Vec<String>, Vec<Vec<String>>), StoreError> {
        let path = self.table_path(table);
        if !path.exists() {
            return Err(StoreError::TableMissing(table.to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut grid = Vec::new();
        for record in reader.records() {
            let record = record?;
            grid.push(record.iter().map(str::to_string).collect());
        }
        debug!("Read {} rows from {:?}", grid.len(), path);
        Ok((header, grid))
    }

    fn write_grid<H: AsRef<str>>(
        &self,
        table: &str,
        header: &[H],
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        let path = self.table_path(table);
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(&path)?;
        writer.write_record(header.iter().map(|h| h.as_ref()))?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .map_err(|e| io_context(e, format!("Failed to flush {:?}", path)))?;
        debug!("Wrote {} rows to {:?}", rows.len(), path);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for CsvStore {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let (header, grid) = self.read_grid(table)?;
        Ok(rows_from_grid(&header, grid))
    }

    async fn replace_all(
        &self,
        table: &str,
        header: &[&str],
        rows: Vec<Vec<String>>,
    ) -> Result<(), StoreError> {
        self.write_grid(table, header, &rows)
    }

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<(), StoreError> {
        let path = self.table_path(table);
        if !path.exists() {
            return Err(StoreError::TableMissing(table.to_string()));
        }
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| io_context(e, format!("Failed to open {:?} for append", path)))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        writer.write_record(&row)?;
        writer
            .flush()
            .map_err(|e| io_context(e, format!("Failed to flush {:?}", path)))?;
        Ok(())
    }

    async fn update_row(&self, table: &str, index: usize, row: Vec<String>) -> Result<(), StoreError> {
        let (header, mut grid) = self.read_grid(table)?;
        let slot = grid.get_mut(index).ok_or_else(|| {
            StoreError::malformed(table, index, "row index out of range for update")
        })?;
        *slot = row;
        self.write_grid(table, &header, &grid)
    }

    async fn ensure_table(&self, table: &str, header: &[&str]) -> Result<bool, StoreError> {
        if self.table_path(table).exists() {
            return Ok(false);
        }
        info!("Creating table {} in {}", table, self.dir.display());
        self.write_grid(table, header, &[])?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::runtime::Runtime;

    fn get_test_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("timesheet_csv_store_{}", test_name))
    }

    fn setup(test_name: &str) -> CsvStore {
        teardown(test_name);
        CsvStore::new(get_test_dir(test_name)).unwrap()
    }

    fn teardown(test_name: &str) {
        let _ = fs::remove_dir_all(get_test_dir(test_name));
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn absent_file_is_table_missing() {
        let test_name = "absent_file";
        let store = setup(test_name);
        let rt = Runtime::new().unwrap();

        let result = rt.block_on(async { store.fetch_all("Submissions").await });
        assert!(
            matches!(result, Err(StoreError::TableMissing(_))),
            "Expected TableMissing but got: {:?}",
            result
        );

        let result = rt.block_on(async { store.append_row("Submissions", strings(&["a"])).await });
        assert!(matches!(result, Err(StoreError::TableMissing(_))));

        teardown(test_name);
    }

    #[test]
    fn replace_append_update_roundtrip() {
        let test_name = "replace_append_update";
        let store = setup(test_name);
        let rt = Runtime::new().unwrap();

        rt.block_on(async {
            store
                .replace_all(
                    "Weekly_Summaries",
                    &["Username", "Week_Start", "Total_Hours", "Total_Vacation"],
                    vec![strings(&["alice", "2024-03-04", "40", "0"])],
                )
                .await
                .unwrap();
            store
                .append_row("Weekly_Summaries", strings(&["bob", "2024-03-04", "32", "8"]))
                .await
                .unwrap();
            store
                .update_row("Weekly_Summaries", 0, strings(&["alice", "2024-03-04", "20", "0"]))
                .await
                .unwrap();
        });

        let rows = rt
            .block_on(async { store.fetch_all("Weekly_Summaries").await })
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Total_Hours").map(String::as_str), Some("20"));
        assert_eq!(rows[1].get("Username").map(String::as_str), Some("bob"));
        assert_eq!(rows[1].get("Total_Vacation").map(String::as_str), Some("8"));

        teardown(test_name);
    }

    #[test]
    fn ensure_table_writes_header_once() {
        let test_name = "ensure_table";
        let store = setup(test_name);
        let rt = Runtime::new().unwrap();

        let header = ["Username", "Week_Start", "Total_Hours", "Total_Vacation"];
        assert!(rt.block_on(async { store.ensure_table("S", &header).await }).unwrap());
        assert!(!rt.block_on(async { store.ensure_table("S", &header).await }).unwrap());

        let contents = fs::read_to_string(store.table_path("S")).unwrap();
        assert_eq!(contents, "Username,Week_Start,Total_Hours,Total_Vacation\n");
        let rows = rt.block_on(async { store.fetch_all("S").await }).unwrap();
        assert!(rows.is_empty(), "Header-only table reads as empty");

        teardown(test_name);
    }

    #[test]
    fn tasks_with_commas_survive() {
        let test_name = "quoted_cells";
        let store = setup(test_name);
        let rt = Runtime::new().unwrap();

        rt.block_on(async {
            store
                .replace_all("T", &["Tasks"], vec![strings(&["review, deploy \"v2\""])])
                .await
                .unwrap()
        });
        let rows = rt.block_on(async { store.fetch_all("T").await }).unwrap();
        assert_eq!(
            rows[0].get("Tasks").map(String::as_str),
            Some("review, deploy \"v2\"")
        );

        teardown(test_name);
    }
}
