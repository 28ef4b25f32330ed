use crate::api::get_embedded_asset;
use crate::config::{Config, GOAL_NAME_MAX_CHARS};
use crate::db::{Database, GoalRow};
use crate::stats::{self, GoalStats};
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, put};
use axum::{Json, Router};
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/goals", get(goal_list).post(goal_create))
        .route("/api/goals/:id", patch(goal_rename).delete(goal_delete))
        .route("/api/goals/:id/checks", get(checks_get))
        .route("/api/goals/:id/checks/:day", put(check_put))
        .route("/api/goals/:id/stats", get(stats_get))
        .fallback(get(static_assets))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct GoalNamePayload {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ChecksQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckSetPayload {
    done: bool,
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    year: Option<i32>,
    month: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChecksPayload {
    checks: BTreeMap<String, bool>,
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "time": Utc::now().to_rfc3339() }))
}

async fn goal_list(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<GoalRow>>> {
    authorize(&state.config, &headers)?;

    let database = Database::open(&state.config.db_path)?;
    Ok(Json(database.list_goals()?))
}

async fn goal_create(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<GoalNamePayload>,
) -> ApiResult<Json<GoalRow>> {
    authorize(&state.config, &headers)?;
    let name = validate_goal_name(&payload.name)?;

    let database = Database::open(&state.config.db_path)?;
    let goal = database
        .create_goal(&name)?
        .ok_or_else(|| ApiError::BadRequest("Goal name already exists".to_string()))?;

    Ok(Json(goal))
}

async fn goal_rename(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(goal_id): Path<i64>,
    Json(payload): Json<GoalNamePayload>,
) -> ApiResult<Json<GoalRow>> {
    authorize(&state.config, &headers)?;
    let name = validate_goal_name(&payload.name)?;

    let database = Database::open(&state.config.db_path)?;
    require_goal(&database, goal_id)?;

    if !database.rename_goal(goal_id, &name)? {
        return Err(ApiError::BadRequest("Goal name already exists".to_string()));
    }

    let goal = require_goal(&database, goal_id)?;
    Ok(Json(goal))
}

async fn goal_delete(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(goal_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    authorize(&state.config, &headers)?;

    let database = Database::open(&state.config.db_path)?;
    if !database.delete_goal(goal_id)? {
        return Err(ApiError::NotFound("Goal not found".to_string()));
    }

    Ok(Json(json!({ "ok": true })))
}

async fn checks_get(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(goal_id): Path<i64>,
    Query(query): Query<ChecksQuery>,
) -> ApiResult<Json<ChecksPayload>> {
    authorize(&state.config, &headers)?;

    let database = Database::open(&state.config.db_path)?;
    require_goal(&database, goal_id)?;

    // The range only applies when both bounds are given.
    let range = match (query.start.as_deref(), query.end.as_deref()) {
        (Some(start), Some(end)) => Some((
            parse_day(start).map_err(|error| ApiError::BadRequest(error.to_string()))?,
            parse_day(end).map_err(|error| ApiError::BadRequest(error.to_string()))?,
        )),
        _ => None,
    };

    let marks = database.marks_for_goal(goal_id, range)?;
    let checks = marks
        .into_iter()
        .map(|(day, done)| (day.format("%Y-%m-%d").to_string(), done))
        .collect::<BTreeMap<_, _>>();

    Ok(Json(ChecksPayload { checks }))
}

async fn check_put(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((goal_id, day)): Path<(i64, String)>,
    Json(payload): Json<CheckSetPayload>,
) -> ApiResult<Json<Value>> {
    authorize(&state.config, &headers)?;

    let day = parse_day(&day).map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let database = Database::open(&state.config.db_path)?;
    require_goal(&database, goal_id)?;
    database.set_mark(goal_id, day, payload.done)?;

    Ok(Json(json!({
        "ok": true,
        "day": day.format("%Y-%m-%d").to_string(),
        "done": payload.done
    })))
}

async fn stats_get(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(goal_id): Path<i64>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<GoalStats>> {
    authorize(&state.config, &headers)?;

    let database = Database::open(&state.config.db_path)?;
    require_goal(&database, goal_id)?;

    // The rate is only computed when a full (year, month) pair arrives.
    let month = match (query.year, query.month) {
        (Some(year), Some(month)) => {
            if !(1..=12).contains(&month) {
                return Err(ApiError::BadRequest(format!(
                    "Invalid month: {month}. Expected 1-12"
                )));
            }
            Some((year, month))
        }
        _ => None,
    };

    let marks = database.marks_for_goal(goal_id, None)?;
    let today = Local::now().date_naive();

    Ok(Json(stats::goal_stats(&marks, today, month)))
}

async fn static_assets(uri: Uri) -> ApiResult<Response> {
    let path = uri.path();

    match get_embedded_asset(path) {
        Some((bytes, mime)) => {
            let mut response = Response::new(bytes.into_response().into_body());
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_str(&mime)?);
            Ok(response)
        }
        None => Err(ApiError::NotFound("Static asset not found".to_string())),
    }
}

/// Bearer-token gate. A missing `api_token` setting leaves the API open;
/// with one set, every guarded route requires a matching Authorization
/// header.
fn authorize(config: &Config, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = config.api_token.as_deref().filter(|token| !token.is_empty()) else {
        return Ok(());
    };

    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError::Unauthorized("Missing or invalid Authorization header".to_string())
        })?;

    let token = header
        .split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .ok_or_else(|| {
            ApiError::Unauthorized("Missing or invalid Authorization header".to_string())
        })?;

    if token != expected {
        return Err(ApiError::Forbidden("Invalid token".to_string()));
    }

    Ok(())
}

fn require_goal(database: &Database, goal_id: i64) -> Result<GoalRow, ApiError> {
    database
        .goal_by_id(goal_id)?
        .ok_or_else(|| ApiError::NotFound("Goal not found".to_string()))
}

fn validate_goal_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    let length = name.chars().count();

    if length == 0 || length > GOAL_NAME_MAX_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Goal name must be 1-{GOAL_NAME_MAX_CHARS} characters"
        )));
    }

    Ok(name.to_string())
}

fn parse_day(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .with_context(|| format!("Invalid day format: {input}. Expected YYYY-MM-DD"))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<axum::http::header::InvalidHeaderValue> for ApiError {
    fn from(value: axum::http::header::InvalidHeaderValue) -> Self {
        Self::Internal(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, authorize, parse_day, validate_goal_name};
    use crate::config::Config;
    use axum::http::{HeaderMap, HeaderValue, header};

    fn config_with_token(token: Option<&str>) -> Config {
        Config {
            api_token: token.map(ToOwned::to_owned),
            ..Config::default()
        }
    }

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn open_api_accepts_requests_without_header() {
        let config = config_with_token(None);
        assert!(authorize(&config, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn guarded_api_rejects_missing_or_malformed_header() {
        let config = config_with_token(Some("secret"));

        assert!(matches!(
            authorize(&config, &HeaderMap::new()),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            authorize(&config, &bearer("secret")),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn guarded_api_distinguishes_wrong_token_from_missing() {
        let config = config_with_token(Some("secret"));

        assert!(matches!(
            authorize(&config, &bearer("Bearer wrong")),
            Err(ApiError::Forbidden(_))
        ));
        assert!(authorize(&config, &bearer("Bearer secret")).is_ok());
        assert!(authorize(&config, &bearer("bearer secret")).is_ok());
    }

    #[test]
    fn goal_names_are_trimmed_and_bounded() {
        assert_eq!(validate_goal_name("  Read  ").expect("name"), "Read");
        assert!(validate_goal_name("   ").is_err());
        assert!(validate_goal_name(&"x".repeat(121)).is_err());
        assert!(validate_goal_name(&"x".repeat(120)).is_ok());
    }

    #[test]
    fn day_strings_must_be_iso_dates() {
        assert!(parse_day("2024-03-05").is_ok());
        assert!(parse_day("03/05/2024").is_err());
        assert!(parse_day("2024-03-05T00:00:00").is_err());
        assert!(parse_day("2024-02-30").is_err());
    }
}
