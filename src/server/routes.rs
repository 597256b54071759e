//! HTTP routes for the dashboard API

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use super::pages;
use crate::error::HubError;
use crate::hub::Hub;
use crate::integrations::calendar::parse_days;
use crate::integrations::WeatherData;
use crate::monster::parse_limit;
use crate::ritual::{parse_step, RitualStatus, Scope};
use crate::store::call_blocking;

#[derive(Clone)]
pub struct HubState { pub hub: Arc<Hub>, pub app_name: String }

impl HubState {
    pub fn new(hub: Arc<Hub>, app_name: impl Into<String>) -> Self {
        Self { hub, app_name: app_name.into() }
    }
}

/// JSON error body `{error}` with a status.
#[derive(Debug)]
pub struct ApiError { status: StatusCode, message: String }

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

/// Validation errors become 400 with their message; everything else is logged
/// and answered with a generic 500.
fn fail(context: &'static str) -> impl FnOnce(HubError) -> ApiError {
    move |e| match e {
        HubError::InvalidInput(message) => ApiError::bad_request(message),
        other => {
            error!(error = %other, "{}", context);
            ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: context.into() }
        }
    }
}

fn today() -> String { Utc::now().format("%Y-%m-%d").to_string() }

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn create_router(hub: Arc<Hub>) -> Router { create_router_with_name(hub, "familyhub") }

pub fn create_router_with_name(hub: Arc<Hub>, app_name: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ritual/status", get(ritual_status))
        .route("/api/ritual/complete", post(ritual_complete))
        .route("/api/ritual/reset", post(ritual_reset))
        .route("/api/ritual/trigger-sleep-mode", post(trigger_sleep_mode))
        .route("/api/morning-ritual/status", get(morning_status))
        .route("/api/morning-ritual/complete", post(morning_complete))
        .route("/api/morning-ritual/reset", post(morning_reset))
        .route("/api/monster/scan", post(monster_scan))
        .route("/api/monster/history", get(monster_history))
        .route("/api/dashboard/calendar", get(dashboard_calendar))
        .route("/api/dashboard/weather", get(dashboard_weather))
        .route("/api/dashboard/home-status", get(home_status))
        .route("/api/settings", get(settings_list).post(settings_save))
        .route("/api/auth/google", get(google_auth))
        .route("/api/auth/google/callback", get(google_callback))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(HubState::new(hub, app_name))
}

async fn health(State(s): State<HubState>) -> impl IntoResponse {
    Json(json!({"status": "ok", "service": s.app_name}))
}

// Rituals

#[derive(Deserialize)]
struct DateQuery { date: Option<String> }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteRequest {
    date: Option<String>,
    step: Option<String>,
    total_steps: Option<usize>,
}

#[derive(Deserialize)]
struct ResetRequest { date: Option<String> }

async fn ritual_status(State(s): State<HubState>, Query(q): Query<DateQuery>) -> Result<Json<RitualStatus>, ApiError> {
    let date = non_empty(q.date).unwrap_or_else(today);
    Ok(Json(s.hub.ritual.status(&date).await.map_err(fail("Failed to get ritual status"))?))
}

async fn morning_status(State(s): State<HubState>, Query(q): Query<DateQuery>) -> Result<Json<RitualStatus>, ApiError> {
    let date = non_empty(q.date).unwrap_or_else(today);
    Ok(Json(s.hub.ritual.scope_status(&date, Scope::Morning).await.map_err(fail("Failed to get ritual status"))?))
}

async fn complete_in(s: &HubState, scope: Option<Scope>, body: Result<Json<CompleteRequest>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (Some(date), Some(step)) = (non_empty(body.date), non_empty(body.step)) else {
        return Err(ApiError::bad_request("Date and step are required"));
    };
    let step = parse_step(&step, scope).map_err(fail("Failed to complete step"))?;
    let done = s.hub.ritual.complete(&date, step, body.total_steps).await.map_err(fail("Failed to complete step"))?;
    Ok(Json(json!({"success": true, "completedSteps": done.completed_steps, "allDone": done.all_done})))
}

async fn ritual_complete(State(s): State<HubState>, body: Result<Json<CompleteRequest>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    complete_in(&s, None, body).await
}

async fn morning_complete(State(s): State<HubState>, body: Result<Json<CompleteRequest>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    complete_in(&s, Some(Scope::Morning), body).await
}

async fn reset_in(s: &HubState, scope: Scope, body: Result<Json<ResetRequest>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let date = non_empty(body.date).ok_or_else(|| ApiError::bad_request("Date is required"))?;
    s.hub.ritual.reset(&date, scope).await.map_err(fail("Failed to reset ritual"))?;
    Ok(Json(json!({"success": true})))
}

async fn ritual_reset(State(s): State<HubState>, body: Result<Json<ResetRequest>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    reset_in(&s, Scope::Evening, body).await
}

async fn morning_reset(State(s): State<HubState>, body: Result<Json<ResetRequest>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    reset_in(&s, Scope::Morning, body).await
}

async fn trigger_sleep_mode(State(s): State<HubState>) -> Json<Value> {
    Json(json!({"success": s.hub.ritual.trigger_sleep_mode().await}))
}

// Monster scanner

#[derive(Deserialize)]
struct LimitQuery { limit: Option<String> }

async fn monster_scan(State(s): State<HubState>) -> Result<Json<Value>, ApiError> {
    let outcome = s.hub.monster.perform_scan().await.map_err(fail("Failed to perform scan"))?;
    Ok(Json(json!({"status": "ok", "monstersFound": outcome.monsters_found, "scanId": outcome.scan_id})))
}

async fn monster_history(State(s): State<HubState>, Query(q): Query<LimitQuery>) -> Result<Json<Value>, ApiError> {
    let scans = s.hub.monster.history(parse_limit(q.limit.as_deref())).await.map_err(fail("Failed to get scan history"))?;
    Ok(Json(json!({"scans": scans})))
}

// Dashboard

#[derive(Deserialize)]
struct DaysQuery { days: Option<String> }

#[derive(Deserialize)]
struct LocationQuery { lat: Option<String>, lon: Option<String> }

async fn dashboard_calendar(State(s): State<HubState>, Query(q): Query<DaysQuery>) -> Json<Value> {
    Json(json!({"events": s.hub.calendar.upcoming_events(parse_days(q.days.as_deref())).await}))
}

async fn dashboard_weather(State(s): State<HubState>, Query(q): Query<LocationQuery>) -> Json<WeatherData> {
    let (default_lat, default_lon) = s.hub.weather.default_location();
    let coord = |raw: Option<String>, fallback: f64| {
        raw.and_then(|v| v.trim().parse::<f64>().ok()).filter(|v| v.is_finite()).unwrap_or(fallback)
    };
    let (lat, lon) = (coord(q.lat, default_lat), coord(q.lon, default_lon));
    Json(s.hub.weather.get_weather(lat, lon).await)
}

async fn home_status(State(s): State<HubState>) -> Json<Value> {
    if !s.hub.home.is_configured().await {
        return Json(json!({"configured": false, "entities": []}));
    }
    Json(json!({"configured": true, "entities": s.hub.home.get_dashboard_entities().await}))
}

// Settings

async fn settings_list(State(s): State<HubState>) -> Result<Json<Value>, ApiError> {
    let all = call_blocking(s.hub.store.clone(), |st| st.all_settings()).await.map_err(fail("Failed to get settings"))?;
    let map: Map<String, Value> = all.into_iter().map(|st| (st.key, Value::String(st.value))).collect();
    Ok(Json(Value::Object(map)))
}

async fn settings_save(State(s): State<HubState>, body: Result<Json<Value>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let key = body.get("key").and_then(|k| k.as_str()).map(str::trim).filter(|k| !k.is_empty());
    let (Some(key), Some(value)) = (key, body.get("value")) else {
        return Err(ApiError::bad_request("Key and value are required"));
    };
    let value = match value {
        Value::String(v) => v.clone(),
        other => other.to_string(),
    };
    let key = key.to_string();
    let setting = call_blocking(s.hub.store.clone(), move |st| st.set_setting(&key, &value))
        .await
        .map_err(fail("Failed to save setting"))?;
    Ok(Json(json!({"success": true, "setting": setting})))
}

// Google OAuth setup

#[derive(Deserialize)]
struct CallbackQuery { code: Option<String> }

async fn google_auth(State(s): State<HubState>) -> Response {
    match s.hub.calendar.auth_url() {
        Ok(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
        Err(e) => {
            warn!(error = %e, "google auth not configured");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::setup_error(&e.to_string()))).into_response()
        }
    }
}

async fn google_callback(State(s): State<HubState>, Query(q): Query<CallbackQuery>) -> Response {
    let Some(code) = non_empty(q.code) else {
        return (StatusCode::BAD_REQUEST, "No authorization code received").into_response();
    };
    match s.hub.calendar.exchange_code(&code).await {
        Ok(refresh_token) => Html(pages::connected(&refresh_token)).into_response(),
        Err(e) => {
            error!(error = %e, "oauth callback failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(pages::callback_error(&e.to_string()))).into_response()
        }
    }
}
