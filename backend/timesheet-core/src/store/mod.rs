// src/store/mod.rs
use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::StoreError;

pub mod csv_store;
pub mod memory;
pub mod sheets;

/// One data row keyed by column header, as read back from a table.
pub type Row = HashMap<String, String>;

/// Accessor over a workbook of named tables.
///
/// Every table carries a header row; `index` arguments count data rows only,
/// starting at zero. `fetch_all` reports an absent table as
/// [`StoreError::TableMissing`] and an existing but empty one as `Ok(vec![])`;
/// each caller decides what an absent table means for it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError>;

    /// Overwrites the whole table (header included) with `rows`.
    async fn replace_all(
        &self,
        table: &str,
        header: &[&str],
        rows: Vec<Vec<String>>,
    ) -> Result<(), StoreError>;

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<(), StoreError>;

    async fn update_row(&self, table: &str, index: usize, row: Vec<String>) -> Result<(), StoreError>;

    /// Creates the table with `header` if absent. Returns `true` when created.
    async fn ensure_table(&self, table: &str, header: &[&str]) -> Result<bool, StoreError>;
}

/// Turns a header plus raw value rows into keyed rows.
///
/// Short rows are padded with empty cells (spreadsheets drop trailing blanks);
/// cells beyond the header are ignored.
pub fn rows_from_grid(header: &[String], grid: Vec<Vec<String>>) -> Vec<Row> {
    grid.into_iter()
        .map(|values| {
            let mut values = values.into_iter();
            header
                .iter()
                .map(|column| (column.clone(), values.next().unwrap_or_default()))
                .collect()
        })
        .collect()
}

/// Projects a keyed row back onto a column order, leaving unknown columns empty.
pub fn row_values(row: &Row, header: &[&str]) -> Vec<String> {
    header
        .iter()
        .map(|column| row.get(*column).cloned().unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_are_padded() {
        let header = vec!["Date".to_string(), "Name".to_string()];
        let rows = rows_from_grid(
            &header,
            vec![
                vec!["2024-12-25".to_string()],
                vec!["2024-12-26".to_string(), "Boxing Day".to_string(), "extra".to_string()],
            ],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Name").map(String::as_str), Some(""));
        assert_eq!(rows[1].get("Name").map(String::as_str), Some("Boxing Day"));
        assert_eq!(rows[1].len(), 2);
    }

    #[test]
    fn row_values_follow_header_order() {
        let row: Row = [("B", "2"), ("A", "1")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(row_values(&row, &["A", "B", "C"]), vec!["1", "2", ""]);
    }
}
