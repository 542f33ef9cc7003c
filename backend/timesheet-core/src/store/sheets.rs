// src/store/sheets.rs
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use super::{rows_from_grid, RecordStore, Row};
use crate::error::StoreError;

pub const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

// --- Sheets API Response Structures ---

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize, Debug)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize, Debug)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize, Debug, Default)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Google Sheets backed workbook; one worksheet per table.
///
/// The bearer token is obtained outside this crate (service account flow)
/// and handed in through configuration.
#[derive(Clone)]
pub struct SheetsStore {
    http_client: Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
}

impl SheetsStore {
    pub fn new(
        spreadsheet_id: String,
        access_token: String,
        base_url: Option<String>,
    ) -> Result<Self, StoreError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let base_url = base_url.unwrap_or_else(|| SHEETS_API_BASE_URL.to_string());
        info!(
            "Sheets record store configured for spreadsheet {} at {}",
            spreadsheet_id, base_url
        );
        Ok(Self {
            http_client,
            base_url,
            spreadsheet_id,
            access_token,
        })
    }

    /// `'<table>'<suffix>`. Quoting keeps names with spaces valid A1 ranges.
    fn range(table: &str, suffix: &str) -> String {
        format!("'{}'{}", table.replace('\'', "''"), suffix)
    }

    fn url_with_segments(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StoreError::unreachable("Invalid Sheets API base URL", e))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::unreachable("Invalid Sheets API base URL", "cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, StoreError> {
        self.url_with_segments(&[self.spreadsheet_id.as_str(), "values", range])
    }

    fn build_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
    }

    /// Maps non-success responses onto store error kinds.
    async fn check_status(
        &self,
        response: Response,
        table: &str,
        context: &str,
    ) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && error_text.contains("Unable to parse range") {
            debug!("Sheet {} does not exist", table);
            return Err(StoreError::TableMissing(table.to_string()));
        }
        error!(
            "Sheets API request failed ({}). Status: {}, Body: {}",
            context, status, error_text
        );
        Err(StoreError::unreachable(
            context,
            format!("status {}: {}", status, error_text),
        ))
    }

    async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        table: &str,
        context: &str,
    ) -> Result<T, StoreError> {
        let response = request_builder.send().await?;
        let response = self.check_status(response, table, context).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::unreachable(context, e))
    }

    async fn write_values(
        &self,
        table: &str,
        range: String,
        values: Vec<Vec<String>>,
        context: &str,
    ) -> Result<(), StoreError> {
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let request = self
            .build_request(Method::PUT, url)
            .json(&json!({ "majorDimension": "ROWS", "values": values }));
        let _: Value = self.send_and_deserialize(request, table, context).await?;
        Ok(())
    }

    async fn sheet_titles(&self) -> Result<Vec<String>, StoreError> {
        let mut url = self.url_with_segments(&[self.spreadsheet_id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let request = self.build_request(Method::GET, url);
        let meta: SpreadsheetMeta = self
            .send_and_deserialize(request, "", "list worksheets")
            .await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }
}

#[async_trait]
impl RecordStore for SheetsStore {
    async fn fetch_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        let url = self.values_url(&Self::range(table, ""))?;
        let request = self.build_request(Method::GET, url);
        let value_range: ValueRange = self
            .send_and_deserialize(request, table, "fetch rows")
            .await?;

        let mut grid = value_range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect::<Vec<String>>());
        let header = match grid.next() {
            Some(header) => header,
            None => return Ok(Vec::new()),
        };
        let rows = rows_from_grid(&header, grid.collect());
        debug!("Fetched {} rows from sheet {}", rows.len(), table);
        Ok(rows)
    }

    async fn replace_all(
        &self,
        table: &str,
        header: &[&str],
        rows: Vec<Vec<String>>,
    ) -> Result<(), StoreError> {
        let clear_url = self.values_url(&Self::range(table, ":clear"))?;
        let request = self.build_request(Method::POST, clear_url).json(&json!({}));
        let _: Value = self
            .send_and_deserialize(request, table, "clear sheet")
            .await?;

        let mut values: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
        values.push(header.iter().map(|h| h.to_string()).collect());
        values.extend(rows);
        info!("Rewriting sheet {} with {} rows", table, values.len() - 1);
        self.write_values(table, Self::range(table, "!A1"), values, "rewrite sheet")
            .await
    }

    async fn append_row(&self, table: &str, row: Vec<String>) -> Result<(), StoreError> {
        let mut url = self.values_url(&Self::range(table, "!A1:append"))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let request = self
            .build_request(Method::POST, url)
            .json(&json!({ "majorDimension": "ROWS", "values": [row] }));
        let _: Value = self
            .send_and_deserialize(request, table, "append row")
            .await?;
        Ok(())
    }

    async fn update_row(&self, table: &str, index: usize, row: Vec<String>) -> Result<(), StoreError> {
        // Data row `index` sits below the header, and sheet rows are 1-based.
        let range = Self::range(table, &format!("!A{}", index + 2));
        self.write_values(table, range, vec![row], "update row").await
    }

    async fn ensure_table(&self, table: &str, header: &[&str]) -> Result<bool, StoreError> {
        if self.sheet_titles().await?.iter().any(|t| t == table) {
            return Ok(false);
        }

        info!("Creating worksheet {}", table);
        let batch_segment = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url_with_segments(&[batch_segment.as_str()])?;
        let request = self.build_request(Method::POST, url).json(&json!({
            "requests": [{ "addSheet": { "properties": { "title": table } } }]
        }));
        let _: Value = self
            .send_and_deserialize(request, table, "add worksheet")
            .await?;

        let header_row = vec![header.iter().map(|h| h.to_string()).collect()];
        self.write_values(table, Self::range(table, "!A1"), header_row, "write header")
            .await?;
        Ok(true)
    }
}
