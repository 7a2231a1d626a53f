//! Writes a resolved forecast to the relational table and the CSV store.
//!
//! The two sinks are independent: both writes are always attempted, neither
//! is rolled back when the other fails, and nothing is retried. Failures are
//! logged and returned to the caller as warnings.

use sqlx::SqlitePool;

use crate::db::queries::{self, InsertForecastParams};
use crate::services::forecast::{ForecastQuery, ForecastResult};
use crate::services::history::{HistoricalRecord, HistoricalStore, HistoryError};

/// Per-sink result of [`save_forecast`].
#[derive(Debug)]
pub struct SaveOutcome {
    /// Row id in `temperature_forecasts`.
    pub database: Result<i64, sqlx::Error>,
    pub csv: Result<(), HistoryError>,
}

impl SaveOutcome {
    pub fn is_complete(&self) -> bool {
        self.database.is_ok() && self.csv.is_ok()
    }
}

/// Persist `result` for `query` to both sinks.
pub async fn save_forecast(
    pool: &SqlitePool,
    history: &HistoricalStore,
    query: &ForecastQuery,
    result: &ForecastResult,
) -> SaveOutcome {
    let database = queries::insert_forecast(
        pool,
        InsertForecastParams {
            region: &query.region,
            city: &query.city,
            date: query.date,
            time: query.time,
            temperature: result.temperature,
            max_temperature: Some(result.max_temperature),
        },
    )
    .await
    .map_err(|e| {
        tracing::warn!(
            "Failed to save forecast for {} / {} to database: {}",
            query.region,
            query.city,
            e
        );
        e
    });

    let record = HistoricalRecord {
        region: query.region.clone(),
        city: query.city.clone(),
        date: query.date,
        time: query.time,
        temperature: result.temperature,
        max_temperature: result.max_temperature,
    };
    let csv = history.append(record).await.map_err(|e| {
        tracing::warn!(
            "Failed to append forecast for {} / {} to {}: {}",
            query.region,
            query.city,
            history.path().display(),
            e
        );
        e
    });

    if let Ok(id) = &database {
        tracing::info!(
            "Saved forecast {} for {} / {} at {} {}",
            id,
            query.region,
            query.city,
            query.date_str(),
            query.time_str()
        );
    }

    SaveOutcome { database, csv }
}
