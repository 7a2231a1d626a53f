use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;

use super::models::TemperatureForecast;

/// Parameters for inserting a saved forecast.
pub struct InsertForecastParams<'a> {
    pub region: &'a str,
    pub city: &'a str,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub temperature: f64,
    pub max_temperature: Option<f64>,
}

/// Insert a saved forecast, returning its auto-assigned id.
pub async fn insert_forecast(
    pool: &SqlitePool,
    params: InsertForecastParams<'_>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO temperature_forecasts (region, city, date, time, temperature, max_temperature)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id",
    )
    .bind(params.region)
    .bind(params.city)
    .bind(params.date)
    .bind(params.time)
    .bind(params.temperature)
    .bind(params.max_temperature)
    .fetch_one(pool)
    .await
}

/// List saved forecasts, newest first, optionally narrowed to a region and/or city.
pub async fn list_forecasts(
    pool: &SqlitePool,
    region: Option<&str>,
    city: Option<&str>,
) -> Result<Vec<TemperatureForecast>, sqlx::Error> {
    sqlx::query_as::<_, TemperatureForecast>(
        "SELECT id, region, city, date, time, temperature, max_temperature
         FROM temperature_forecasts
         WHERE (?1 IS NULL OR region = ?1)
           AND (?2 IS NULL OR city = ?2)
         ORDER BY id DESC",
    )
    .bind(region)
    .bind(city)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    // Every connection to `sqlite::memory:` is its own database, so the pool
    // is pinned to a single connection.
    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!().run(&pool).await.unwrap();
        pool
    }

    fn params(region: &'static str, city: &'static str, hour: u32) -> InsertForecastParams<'static> {
        InsertForecastParams {
            region,
            city,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            temperature: 35.0,
            max_temperature: Some(37.0),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let pool = memory_pool().await;
        let first = insert_forecast(&pool, params("NCR", "Manila", 14)).await.unwrap();
        let second = insert_forecast(&pool, params("NCR", "Manila", 15)).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_insert_round_trips_values() {
        let pool = memory_pool().await;
        let id = insert_forecast(&pool, params("NCR", "Manila", 14)).await.unwrap();

        let rows = list_forecasts(&pool, None, None).await.unwrap();
        assert_eq!(
            rows,
            vec![TemperatureForecast {
                id,
                region: "NCR".to_string(),
                city: "Manila".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                temperature: 35.0,
                max_temperature: Some(37.0),
            }]
        );
    }

    #[tokio::test]
    async fn test_max_temperature_is_optional() {
        let pool = memory_pool().await;
        let mut p = params("CAR", "Baguio", 8);
        p.max_temperature = None;
        insert_forecast(&pool, p).await.unwrap();

        let rows = list_forecasts(&pool, None, None).await.unwrap();
        assert_eq!(rows[0].max_temperature, None);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_newest_first() {
        let pool = memory_pool().await;
        insert_forecast(&pool, params("NCR", "Manila", 14)).await.unwrap();
        insert_forecast(&pool, params("NCR", "Pasig", 14)).await.unwrap();
        let latest = insert_forecast(&pool, params("NCR", "Manila", 15)).await.unwrap();
        insert_forecast(&pool, params("CAR", "Baguio", 14)).await.unwrap();

        let ncr = list_forecasts(&pool, Some("NCR"), None).await.unwrap();
        assert_eq!(ncr.len(), 3);

        let manila = list_forecasts(&pool, Some("NCR"), Some("Manila")).await.unwrap();
        assert_eq!(manila.len(), 2);
        assert_eq!(manila[0].id, latest);

        let all = list_forecasts(&pool, None, None).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].region, "CAR");
    }
}
