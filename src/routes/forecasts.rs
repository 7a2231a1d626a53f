//! Forecast HTTP endpoints.
//!
//! - GET  /api/v1/sessions/:session_id/forecast?region=&city=&date=&time=
//! - POST /api/v1/sessions/:session_id/forecast/save
//! - GET  /api/v1/forecasts/saved?region=&city=

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::{models, queries};
use crate::errors::{AppError, ErrorResponse};
use crate::services::catalog;
use crate::services::forecast::{
    resolve_for_session, FallbackPolicy, ForecastQuery, ForecastSource, Resolution, DATE_FORMAT,
    TIME_FORMAT,
};
use crate::services::history::HistoricalStore;
use crate::services::persistence::save_forecast;
use crate::services::sessions::SessionRegistry;

/// Shown whenever a forecast was synthesized rather than averaged.
const NO_HISTORY_NOTICE: &str = "No historical data found. Automatically forecasting temperature.";

/// Shared application state for forecast endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) pool: SqlitePool,
    pub(crate) history: Arc<HistoricalStore>,
    pub(crate) sessions: SessionRegistry,
    pub(crate) fallback: FallbackPolicy,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct ForecastParams {
    /// Region name from the catalog (e.g. "NCR")
    pub region: String,
    /// City within the region (e.g. "Manila")
    pub city: String,
    /// Forecast date as YYYY-MM-DD (defaults to today)
    pub date: Option<String>,
    /// Forecast time as HH:MM, 24-hour (defaults to the current hour)
    pub time: Option<String>,
}

/// Body of a save request. Same fields and defaults as the forecast query.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveForecastRequest {
    pub region: String,
    pub city: String,
    pub date: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SavedForecastsParams {
    /// Only rows for this region
    pub region: Option<String>,
    /// Only rows for this city
    pub city: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A resolved forecast for one (region, city, date, time).
#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastResponse {
    pub session_id: Uuid,
    pub region: String,
    pub city: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    /// Forecasted temperature in °C, one decimal
    pub temperature_c: f64,
    /// Forecasted max temperature in °C, one decimal
    pub max_temperature_c: f64,
    /// Temperature formatted for display (e.g. "35.0°C")
    pub temperature_display: String,
    /// Max temperature formatted for display (e.g. "37.0°C")
    pub max_temperature_display: String,
    /// Whether the value is an average of matching historical records
    pub historical_match: bool,
    /// Number of historical records averaged (0 for synthesized values)
    pub sample_count: usize,
    /// Whether this value was served from the session cache
    pub cached: bool,
    /// Present when no historical record matched and the value was synthesized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl ForecastResponse {
    fn new(session_id: Uuid, query: &ForecastQuery, resolution: &Resolution) -> Self {
        let (historical_match, sample_count, notice) = match resolution.source {
            ForecastSource::Historical { samples } => (true, samples, None),
            ForecastSource::Fallback => (false, 0, Some(NO_HISTORY_NOTICE.to_string())),
        };
        let result = &resolution.result;

        Self {
            session_id,
            region: query.region.clone(),
            city: query.city.clone(),
            date: query.date_str(),
            time: query.time_str(),
            temperature_c: result.temperature,
            max_temperature_c: result.max_temperature,
            temperature_display: format_celsius(result.temperature),
            max_temperature_display: format_celsius(result.max_temperature),
            historical_match,
            sample_count,
            cached: resolution.cached,
            notice,
        }
    }
}

/// Result of saving a forecast to both sinks.
#[derive(Debug, Serialize, ToSchema)]
pub struct SaveForecastResponse {
    /// The forecast that was saved
    pub forecast: ForecastResponse,
    /// Whether both the database insert and the CSV append succeeded
    pub saved: bool,
    /// Row id in `temperature_forecasts`, if the database insert succeeded
    pub database_id: Option<i64>,
    /// Whether the forecast was appended to the CSV store
    pub saved_to_csv: bool,
    /// One message per failed sink
    pub warnings: Vec<String>,
}

/// A forecast row read back from the database.
#[derive(Debug, Serialize, ToSchema)]
pub struct SavedForecastResponse {
    pub id: i64,
    pub region: String,
    pub city: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    pub temperature_c: f64,
    pub max_temperature_c: Option<f64>,
}

impl From<models::TemperatureForecast> for SavedForecastResponse {
    fn from(f: models::TemperatureForecast) -> Self {
        Self {
            id: f.id,
            region: f.region,
            city: f.city,
            date: f.date.format(DATE_FORMAT).to_string(),
            time: f.time.format(TIME_FORMAT).to_string(),
            temperature_c: f.temperature,
            max_temperature_c: f.max_temperature,
        }
    }
}

fn format_celsius(v: f64) -> String {
    format!("{:.1}°C", v)
}

/// Build a query from raw inputs, filling in today / the current hour.
///
/// Region and city must form a catalog pair.
fn parse_query(
    region: &str,
    city: &str,
    date: Option<&str>,
    time: Option<&str>,
    now: NaiveDateTime,
) -> Result<ForecastQuery, AppError> {
    if catalog::list_cities(region).is_none() {
        return Err(AppError::BadRequest(format!("Unknown region '{}'", region)));
    }
    if !catalog::contains(region, city) {
        return Err(AppError::BadRequest(format!(
            "Unknown city '{}' for region '{}'",
            city, region
        )));
    }

    let date = match date {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|e| {
            AppError::BadRequest(format!("Invalid date '{}' (expected YYYY-MM-DD): {}", raw, e))
        })?,
        None => now.date(),
    };

    let time = match time {
        Some(raw) => NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).map_err(|e| {
            AppError::BadRequest(format!("Invalid time '{}' (expected HH:MM): {}", raw, e))
        })?,
        None => NaiveTime::from_hms_opt(now.hour(), 0, 0)
            .ok_or_else(|| AppError::InternalError("Invalid current hour".to_string()))?,
    };

    Ok(ForecastQuery::new(region, city, date, time))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Resolve a forecast within a session.
///
/// Averages matching historical records, or synthesizes a value when none
/// match. The first resolution of a (region, city, date, time) is cached for
/// the session; later calls return the identical value.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}/forecast",
    tag = "Forecasts",
    params(
        ("session_id" = Uuid, Path, description = "Session UUID"),
        ForecastParams,
    ),
    responses(
        (status = 200, description = "Resolved forecast", body = ForecastResponse),
        (status = 400, description = "Unknown region/city or malformed date/time", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn get_session_forecast(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(params): Query<ForecastParams>,
) -> Result<Json<ForecastResponse>, AppError> {
    let query = parse_query(
        &params.region,
        &params.city,
        params.date.as_deref(),
        params.time.as_deref(),
        Local::now().naive_local(),
    )?;

    let resolution = resolve_for_session(
        &state.history,
        &state.sessions,
        &state.fallback,
        session_id,
        &query,
    )
    .await?;

    Ok(Json(ForecastResponse::new(session_id, &query, &resolution)))
}

/// Save the session's forecast for a query to the database and the CSV store.
///
/// The value saved is the one the session already shows (or resolves it first
/// if it has not been viewed yet). A failure in one sink is reported in
/// `warnings` and does not prevent the other write.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/forecast/save",
    tag = "Forecasts",
    params(
        ("session_id" = Uuid, Path, description = "Session UUID"),
    ),
    request_body = SaveForecastRequest,
    responses(
        (status = 200, description = "Save attempted; see `saved` and `warnings`", body = SaveForecastResponse),
        (status = 400, description = "Unknown region/city or malformed date/time", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn save_session_forecast(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<SaveForecastRequest>,
) -> Result<Json<SaveForecastResponse>, AppError> {
    let query = parse_query(
        &body.region,
        &body.city,
        body.date.as_deref(),
        body.time.as_deref(),
        Local::now().naive_local(),
    )?;

    let resolution = resolve_for_session(
        &state.history,
        &state.sessions,
        &state.fallback,
        session_id,
        &query,
    )
    .await?;

    let outcome = save_forecast(&state.pool, &state.history, &query, &resolution.result).await;

    let mut warnings = Vec::new();
    if let Err(e) = &outcome.database {
        warnings.push(format!("Failed to save to database: {}", e));
    }
    if let Err(e) = &outcome.csv {
        warnings.push(format!("Failed to save to CSV: {}", e));
    }

    Ok(Json(SaveForecastResponse {
        forecast: ForecastResponse::new(session_id, &query, &resolution),
        saved: outcome.is_complete(),
        database_id: outcome.database.as_ref().ok().copied(),
        saved_to_csv: outcome.csv.is_ok(),
        warnings,
    }))
}

/// List forecasts saved to the database, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/forecasts/saved",
    tag = "Forecasts",
    params(SavedForecastsParams),
    responses(
        (status = 200, description = "Saved forecasts", body = Vec<SavedForecastResponse>),
    )
)]
pub async fn list_saved_forecasts(
    State(pool): State<SqlitePool>,
    Query(params): Query<SavedForecastsParams>,
) -> Result<Json<Vec<SavedForecastResponse>>, AppError> {
    let rows =
        queries::list_forecasts(&pool, params.region.as_deref(), params.city.as_deref()).await?;
    Ok(Json(rows.into_iter().map(SavedForecastResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::history::HistoricalRecord;
    use sqlx::sqlite::SqlitePoolOptions;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(14, 37, 12)
            .unwrap()
    }

    async fn test_state(dir: &std::path::Path, records: Vec<HistoricalRecord>) -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        AppState {
            pool,
            history: Arc::new(HistoricalStore::from_records(dir.join("history.csv"), records)),
            sessions: SessionRegistry::new(),
            fallback: FallbackPolicy::default(),
        }
    }

    fn manila_record() -> HistoricalRecord {
        HistoricalRecord {
            region: "NCR".to_string(),
            city: "Manila".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            temperature: 35.0,
            max_temperature: 37.0,
        }
    }

    fn params(time: &str) -> ForecastParams {
        ForecastParams {
            region: "NCR".to_string(),
            city: "Manila".to_string(),
            date: Some("2024-06-01".to_string()),
            time: Some(time.to_string()),
        }
    }

    #[test]
    fn test_parse_query_defaults_to_today_and_current_hour() {
        let q = parse_query("NCR", "Manila", None, None, now()).unwrap();
        assert_eq!(q.date_str(), "2024-06-01");
        assert_eq!(q.time_str(), "14:00");
        assert_eq!(q.time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_query_explicit_values() {
        let q = parse_query("CAR", "Baguio", Some("2024-12-25"), Some("07:30"), now()).unwrap();
        assert_eq!(q.date_str(), "2024-12-25");
        assert_eq!(q.time_str(), "07:30");
    }

    #[test]
    fn test_parse_query_rejects_unknown_region() {
        let err = parse_query("Atlantis", "Manila", None, None, now()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("region")));
    }

    #[test]
    fn test_parse_query_rejects_city_outside_region() {
        let err = parse_query("NCR", "Baguio", None, None, now()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("Baguio")));
    }

    #[test]
    fn test_parse_query_rejects_bad_date_and_time() {
        assert!(parse_query("NCR", "Manila", Some("01/06/2024"), None, now()).is_err());
        assert!(parse_query("NCR", "Manila", None, Some("2pm"), now()).is_err());
        assert!(parse_query("NCR", "Manila", None, Some("25:00"), now()).is_err());
    }

    #[test]
    fn test_format_celsius() {
        assert_eq!(format_celsius(35.0), "35.0°C");
        assert_eq!(format_celsius(-2.5), "-2.5°C");
    }

    #[test]
    fn test_response_for_fallback_has_notice() {
        let q = parse_query("NCR", "Manila", None, None, now()).unwrap();
        let resolution = Resolution {
            result: crate::services::forecast::ForecastResult {
                temperature: 40.0,
                max_temperature: 42.5,
            },
            source: ForecastSource::Fallback,
            cached: false,
        };
        let response = ForecastResponse::new(Uuid::nil(), &q, &resolution);
        assert!(!response.historical_match);
        assert_eq!(response.notice.as_deref(), Some(NO_HISTORY_NOTICE));
        assert_eq!(response.max_temperature_display, "42.5°C");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["time"], "14:00");
        assert_eq!(json["sample_count"], 0);
    }

    #[test]
    fn test_response_for_history_omits_notice() {
        let q = parse_query("NCR", "Manila", None, None, now()).unwrap();
        let resolution = Resolution {
            result: crate::services::forecast::ForecastResult {
                temperature: 35.0,
                max_temperature: 37.0,
            },
            source: ForecastSource::Historical { samples: 2 },
            cached: true,
        };
        let json = serde_json::to_value(ForecastResponse::new(Uuid::nil(), &q, &resolution)).unwrap();
        assert!(json.get("notice").is_none());
        assert_eq!(json["historical_match"], true);
        assert_eq!(json["sample_count"], 2);
        assert_eq!(json["cached"], true);
    }

    #[tokio::test]
    async fn test_forecast_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), vec![manila_record()]).await;
        let session = state.sessions.create().await;

        let Json(hit) = get_session_forecast(State(state.clone()), Path(session), Query(params("14:00")))
            .await
            .unwrap();
        assert_eq!(hit.temperature_c, 35.0);
        assert_eq!(hit.max_temperature_c, 37.0);
        assert!(hit.historical_match);
        assert!(!hit.cached);

        let Json(miss) = get_session_forecast(State(state.clone()), Path(session), Query(params("15:00")))
            .await
            .unwrap();
        assert!(!miss.historical_match);
        assert!(miss.notice.is_some());
        assert!((32.0..=60.0).contains(&miss.temperature_c));

        let Json(again) = get_session_forecast(State(state), Path(session), Query(params("15:00")))
            .await
            .unwrap();
        assert!(again.cached);
        assert_eq!(again.temperature_c, miss.temperature_c);
        assert_eq!(again.max_temperature_c, miss.max_temperature_c);
    }

    #[tokio::test]
    async fn test_forecast_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), Vec::new()).await;

        let err = get_session_forecast(State(state), Path(Uuid::new_v4()), Query(params("14:00")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_save_persists_displayed_value() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), Vec::new()).await;
        let session = state.sessions.create().await;

        let Json(shown) = get_session_forecast(State(state.clone()), Path(session), Query(params("09:00")))
            .await
            .unwrap();

        let body = SaveForecastRequest {
            region: "NCR".to_string(),
            city: "Manila".to_string(),
            date: Some("2024-06-01".to_string()),
            time: Some("09:00".to_string()),
        };
        let Json(saved) = save_session_forecast(State(state.clone()), Path(session), Json(body))
            .await
            .unwrap();

        assert!(saved.saved);
        assert!(saved.warnings.is_empty());
        assert!(saved.database_id.is_some());
        assert_eq!(saved.forecast.temperature_c, shown.temperature_c);

        let Json(rows) = list_saved_forecasts(
            State(state.pool.clone()),
            Query(SavedForecastsParams {
                region: Some("NCR".to_string()),
                city: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].time, "09:00");
        assert_eq!(rows[0].temperature_c, shown.temperature_c);

        // The saved row is now history for new sessions.
        let fresh = state.sessions.create().await;
        let Json(next) = get_session_forecast(State(state), Path(fresh), Query(params("09:00")))
            .await
            .unwrap();
        assert!(next.historical_match);
        assert_eq!(next.temperature_c, shown.temperature_c);
    }
}
