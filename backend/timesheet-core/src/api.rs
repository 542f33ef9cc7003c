// src/api.rs
use axum::{
    extract::{FromRequestParts, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::PortalError;
use crate::service::TimesheetService;
use crate::session::Session;
use crate::week::DailyEntry;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TimesheetService>,
}

// --- Request Shapes ---

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitWeekRequest {
    pub week_start: NaiveDate,
    #[serde(default)]
    pub entries: Vec<DailyEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionsQuery {
    pub username: Option<String>,
}

// --- Authentication ---

/// Session resolved from an `Authorization: Bearer <token>` header.
pub struct AuthSession(pub Session);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = PortalError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(PortalError::Unauthorized)?;
        let session = state.service.authenticate(token).await?;
        Ok(AuthSession(session))
    }
}

// --- Router ---

pub fn router(service: Arc<TimesheetService>) -> Router {
    let state = AppState { service };

    let admin_routes = Router::new()
        .route("/summaries", get(handle_admin_summaries))
        .route("/submissions", get(handle_admin_submissions));

    let api_routes = Router::new()
        .route("/login", post(handle_login))
        .route("/logout", post(handle_logout))
        .route("/week", get(handle_get_week).post(handle_submit_week))
        .route("/history", get(handle_history))
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(handle_health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Handlers ---

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, PortalError> {
    let session = state
        .service
        .login(&request.username, &request.password)
        .await?;
    info!("{} logged in", session.username);
    Ok(Json(session))
}

async fn handle_logout(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> impl IntoResponse {
    state.service.logout(&session.token).await;
    StatusCode::NO_CONTENT
}

async fn handle_get_week(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(query): Query<WeekQuery>,
) -> Result<impl IntoResponse, PortalError> {
    let date = query.date.unwrap_or_else(|| state.service.today());
    debug!("Week form for {} around {}", session.username, date);
    let plan = state.service.week_form(&session, date).await?;
    Ok(Json(plan))
}

async fn handle_submit_week(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(request): Json<SubmitWeekRequest>,
) -> Result<impl IntoResponse, PortalError> {
    let outcome = state
        .service
        .submit_week(&session, request.week_start, request.entries)
        .await?;
    Ok(Json(outcome))
}

async fn handle_history(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, PortalError> {
    let history = state.service.history(&session).await?;
    Ok(Json(history))
}

async fn handle_admin_summaries(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, PortalError> {
    let summaries = state.service.admin_summaries(&session).await?;
    Ok(Json(summaries))
}

async fn handle_admin_submissions(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(query): Query<SubmissionsQuery>,
) -> Result<impl IntoResponse, PortalError> {
    let records = state
        .service
        .admin_submissions(&session, query.username.as_deref())
        .await?;
    Ok(Json(records))
}
