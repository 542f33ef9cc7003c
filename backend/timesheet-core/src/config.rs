// src/config.rs
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::PortalError;
use crate::model::{EMPLOYEES_HEADER, EMPLOYEES_TABLE, SUBMISSIONS_HEADER, SUBMISSIONS_TABLE};
use crate::store::{csv_store::CsvStore, memory::MemoryStore, sheets::SheetsStore, RecordStore};

pub const ENV_PREFIX: &str = "TIMESHEET_";

/// Which workbook the portal reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Csv,
    Sheets,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreBackend::Csv => "csv",
            StoreBackend::Sheets => "sheets",
            StoreBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_backend() -> StoreBackend {
    StoreBackend::Csv
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Server configuration, read from `TIMESHEET_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub sheets_spreadsheet_id: Option<String>,
    pub sheets_access_token: Option<String>,
    pub sheets_api_base: Option<String>,
    /// Comma-separated usernames granted the admin role.
    #[serde(default)]
    pub admin_users: Vec<String>,
    /// `username:password` accounts seeded into the memory backend's Employees table.
    #[serde(default)]
    pub memory_employees: Vec<String>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env::<Config>()
    }

    fn seeded_employees(&self) -> Result<Vec<Vec<String>>, PortalError> {
        self.memory_employees
            .iter()
            .map(|account| match account.trim().split_once(':') {
                Some((username, password)) if !username.trim().is_empty() => {
                    let username = username.trim().to_string();
                    Ok(vec![username.clone(), password.to_string(), username])
                }
                _ => Err(PortalError::Config(format!(
                    "TIMESHEET_MEMORY_EMPLOYEES entry '{}' is not username:password",
                    account
                ))),
            })
            .collect()
    }

    /// Both halves of the TLS pair, if configured.
    pub fn tls_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            (None, None) => None,
            _ => {
                warn!("Only one of cert_path/key_path is set; serving plain HTTP");
                None
            }
        }
    }

    pub fn build_store(&self) -> Result<Arc<dyn RecordStore>, PortalError> {
        info!("Using {} record store", self.backend);
        match self.backend {
            StoreBackend::Csv => {
                let store = CsvStore::new(self.data_dir.clone())?;
                Ok(Arc::new(store))
            }
            StoreBackend::Sheets => {
                let spreadsheet_id = self.sheets_spreadsheet_id.clone().ok_or_else(|| {
                    PortalError::Config("TIMESHEET_SHEETS_SPREADSHEET_ID is required".to_string())
                })?;
                let access_token = self.sheets_access_token.clone().ok_or_else(|| {
                    PortalError::Config("TIMESHEET_SHEETS_ACCESS_TOKEN is required".to_string())
                })?;
                let store =
                    SheetsStore::new(spreadsheet_id, access_token, self.sheets_api_base.clone())?;
                Ok(Arc::new(store))
            }
            StoreBackend::Memory => {
                let employees = self.seeded_employees()?;
                warn!(
                    "Memory store selected; data is lost on shutdown ({} seeded employees)",
                    employees.len()
                );
                let store = MemoryStore::new()
                    .with_table(SUBMISSIONS_TABLE, &SUBMISSIONS_HEADER, Vec::new())
                    .with_table(
                        EMPLOYEES_TABLE,
                        &EMPLOYEES_HEADER,
                        employees
                            .iter()
                            .map(|row| row.iter().map(String::as_str).collect())
                            .collect(),
                    );
                Ok(Arc::new(store))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::service::TimesheetService;
    use tokio::runtime::Runtime;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(Vec::<(String, String)>::new())
            .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.backend, StoreBackend::Csv);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.admin_users.is_empty());
        assert!(config.tls_paths().is_none());
    }

    #[test]
    fn reads_prefixed_values() {
        let config = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(vars(&[
                ("TIMESHEET_BACKEND", "sheets"),
                ("TIMESHEET_BIND_ADDR", "0.0.0.0:8443"),
                ("TIMESHEET_ADMIN_USERS", "carol,dave"),
                ("TIMESHEET_SHEETS_SPREADSHEET_ID", "sheet-123"),
                ("TIMESHEET_CERT_PATH", "cert.pem"),
                ("TIMESHEET_KEY_PATH", "key.pem"),
            ]))
            .unwrap();
        assert_eq!(config.backend, StoreBackend::Sheets);
        assert_eq!(config.bind_addr, "0.0.0.0:8443");
        assert_eq!(config.admin_users, vec!["carol", "dave"]);
        assert_eq!(config.sheets_spreadsheet_id.as_deref(), Some("sheet-123"));
        assert!(config.tls_paths().is_some());
    }

    #[test]
    fn sheets_backend_requires_credentials() {
        let config = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(vars(&[("TIMESHEET_BACKEND", "sheets")]))
            .unwrap();
        let result = config.build_store();
        assert!(matches!(result, Err(PortalError::Config(_))));
    }

    #[test]
    fn memory_backend_seeds_employees() {
        let rt = Runtime::new().unwrap();
        let config = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(vars(&[
                ("TIMESHEET_BACKEND", "memory"),
                ("TIMESHEET_MEMORY_EMPLOYEES", "alice:wonderland,carol:pw:with:colons"),
                ("TIMESHEET_ADMIN_USERS", "carol"),
            ]))
            .unwrap();
        let store = config.build_store().unwrap();
        let service = TimesheetService::new(
            store,
            Arc::new(FixedClock::new("2024-03-06 10:00:00")),
            config.admin_users.clone(),
        );

        rt.block_on(async {
            let alice = service.login("alice", "wonderland").await.unwrap();
            assert_eq!(alice.display_name, "alice");
            assert!(!alice.is_admin());
            let carol = service.login("carol", "pw:with:colons").await.unwrap();
            assert!(carol.is_admin());
            assert!(service.history(&alice).await.unwrap().is_empty());
        });
    }

    #[test]
    fn memory_backend_rejects_bad_accounts() {
        let config = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(vars(&[
                ("TIMESHEET_BACKEND", "memory"),
                ("TIMESHEET_MEMORY_EMPLOYEES", "alice"),
            ]))
            .unwrap();
        assert!(matches!(config.build_store(), Err(PortalError::Config(_))));

        let empty = envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Config>(vars(&[("TIMESHEET_BACKEND", "memory")]))
            .unwrap();
        assert!(empty.build_store().is_ok(), "No accounts is allowed");
    }
}
