// src/error.rs
use axum::http::StatusCode as AxumStatusCode;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{error, warn};

/// Errors raised by the record store and the modules that sit directly on it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record store unreachable ({context}): {message}")]
    StoreUnreachable { context: String, message: String },

    #[error("Table '{0}' does not exist")]
    TableMissing(String),

    #[error("Malformed row {row} in table '{table}': {detail}")]
    MalformedRow {
        table: String,
        row: usize,
        detail: String,
    },

    #[error("Week start {0} is not a Monday")]
    InvalidWeekStart(NaiveDate),

    #[error("Invalid submission batch: {0}")]
    InvalidBatch(String),
}

impl StoreError {
    pub fn unreachable<C: Into<String>, M: ToString>(context: C, message: M) -> Self {
        StoreError::StoreUnreachable {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed<T: Into<String>, D: Into<String>>(table: T, row: usize, detail: D) -> Self {
        StoreError::MalformedRow {
            table: table.into(),
            row,
            detail: detail.into(),
        }
    }

    pub fn is_table_missing(&self) -> bool {
        matches!(self, StoreError::TableMissing(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::unreachable("HTTP request failed", e)
    }
}

impl From<csv::Error> for StoreError {
    fn from(e: csv::Error) -> Self {
        StoreError::unreachable("CSV processing failed", e)
    }
}

/// Errors surfaced by the portal service and its HTTP shell.
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Record store error")]
    Store(#[from] StoreError),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Missing or unknown session token")]
    Unauthorized,

    #[error("Administrator role required")]
    Forbidden,

    #[error("Invalid timesheet entry: {0}")]
    InvalidEntry(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match &self {
            PortalError::Store(store_err) => match store_err {
                StoreError::StoreUnreachable { context, message } => {
                    error!("Record store unreachable ({}): {}", context, message);
                    (
                        AxumStatusCode::BAD_GATEWAY,
                        "The timesheet database could not be reached.".to_string(),
                    )
                }
                StoreError::TableMissing(table) => {
                    error!("Required table missing: {}", table);
                    (
                        AxumStatusCode::INTERNAL_SERVER_ERROR,
                        format!("Database table '{}' is missing.", table),
                    )
                }
                StoreError::MalformedRow { table, row, detail } => {
                    error!("Malformed row {} in {}: {}", row, table, detail);
                    (
                        AxumStatusCode::INTERNAL_SERVER_ERROR,
                        "The timesheet database contains malformed data.".to_string(),
                    )
                }
                StoreError::InvalidWeekStart(_) | StoreError::InvalidBatch(_) => {
                    (AxumStatusCode::BAD_REQUEST, store_err.to_string())
                }
            },
            PortalError::InvalidCredentials => {
                warn!("Rejected login attempt");
                (AxumStatusCode::UNAUTHORIZED, self.to_string())
            }
            PortalError::Unauthorized => (AxumStatusCode::UNAUTHORIZED, self.to_string()),
            PortalError::Forbidden => (AxumStatusCode::FORBIDDEN, self.to_string()),
            PortalError::InvalidEntry(_) => (AxumStatusCode::BAD_REQUEST, self.to_string()),
            PortalError::Config(msg) => {
                error!("Configuration error: {}", msg);
                (
                    AxumStatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error.".to_string(),
                )
            }
        };

        (
            status_code,
            Json(serde_json::json!({ "error": error_message })),
        )
            .into_response()
    }
}
