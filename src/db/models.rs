use chrono::{NaiveDate, NaiveTime};
use sqlx::FromRow;

/// A forecast saved to the `temperature_forecasts` table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TemperatureForecast {
    pub id: i64,
    pub region: String,
    pub city: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub temperature: f64,
    /// Nullable in the schema; always set for rows written by this service.
    pub max_temperature: Option<f64>,
}
