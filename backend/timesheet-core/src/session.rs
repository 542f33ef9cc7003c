// src/session.rs
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::model::Employee;

pub const TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Admin,
}

/// The logged-in user, passed explicitly into every portal operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn generate_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// In-memory bearer token table. Sessions do not survive a restart.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, employee: &Employee, role: Role) -> Session {
        let session = Session {
            token: generate_token(),
            username: employee.username.clone(),
            display_name: employee.display_name.clone(),
            role,
        };
        self.sessions
            .lock()
            .await
            .insert(session.token.clone(), session.clone());
        info!("Opened {:?} session for {}", role, session.username);
        session
    }

    pub async fn resolve(&self, token: &str) -> Option<Session> {
        let found = self.sessions.lock().await.get(token).cloned();
        if found.is_none() {
            debug!("Unknown session token presented");
        }
        found
    }

    /// Returns whether a session was actually closed.
    pub async fn close(&self, token: &str) -> bool {
        match self.sessions.lock().await.remove(token) {
            Some(session) => {
                info!("Closed session for {}", session.username);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
