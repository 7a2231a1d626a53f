//! Forecast resolution service.
//!
//! Turns a (region, city, date, time) query plus the historical records that
//! match it into a temperature/max-temperature pair:
//!
//! - matching records → unweighted mean of each column, rounded to 1 decimal
//! - no match → random value in the fallback band, max = value + random offset
//!
//! Every result is memoized in the caller's [`ForecastCache`] under a
//! collision-free key, so a query never re-randomizes within one session,
//! even if the historical dataset changes afterwards.

use chrono::{NaiveDate, NaiveTime};
use rand::Rng;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::errors::AppError;
use crate::helpers::{mean_1dp, round_1dp};
use crate::services::history::{HistoricalRecord, HistoricalStore};
use crate::services::sessions::SessionRegistry;

/// Canonical date rendering used for matching, keys and storage.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical time rendering used for matching, keys and storage.
pub const TIME_FORMAT: &str = "%H:%M";

/// Lower bound of the synthesized temperature band.
pub const FALLBACK_MIN: f64 = 32.0;
/// Upper bound of the synthesized temperature band.
pub const FALLBACK_MAX: f64 = 60.0;
/// Smallest increment of max temperature over a synthesized temperature.
pub const MAX_OFFSET_MIN: f64 = 1.0;
/// Largest increment of max temperature over a synthesized temperature.
pub const MAX_OFFSET_MAX: f64 = 3.0;

/// The four-tuple identifying a forecast request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForecastQuery {
    pub region: String,
    pub city: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl ForecastQuery {
    pub fn new(
        region: impl Into<String>,
        city: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Self {
        Self {
            region: region.into(),
            city: city.into(),
            date,
            time,
        }
    }

    /// Date in canonical `YYYY-MM-DD` form.
    pub fn date_str(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// Time in canonical `HH:MM` form.
    pub fn time_str(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }

    /// Memoization key for this query.
    ///
    /// Region and city are length-prefixed, so names containing the separator
    /// cannot collide (`("A_B", "C")` vs `("A", "B_C")`). Date and time have
    /// fixed canonical widths and need no prefix.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}|{}:{}|{}|{}",
            self.region.len(),
            self.region,
            self.city.len(),
            self.city,
            self.date_str(),
            self.time_str()
        )
    }

    /// Whether a historical record was observed for exactly this query.
    pub fn matches(&self, record: &HistoricalRecord) -> bool {
        record.region == self.region
            && record.city == self.city
            && record.date == self.date
            && record.time == self.time
    }
}

/// A resolved forecast, both values rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastResult {
    pub temperature: f64,
    pub max_temperature: f64,
}

/// Where a resolved forecast came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastSource {
    /// Mean over this many matching historical records.
    Historical { samples: usize },
    /// Synthesized because no historical record matched.
    Fallback,
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub result: ForecastResult,
    pub source: ForecastSource,
    /// True when served from the session cache without recomputation.
    pub cached: bool,
}

/// Range configuration for synthesized forecasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPolicy {
    pub min: f64,
    pub max: f64,
    pub offset_min: f64,
    pub offset_max: f64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            min: FALLBACK_MIN,
            max: FALLBACK_MAX,
            offset_min: MAX_OFFSET_MIN,
            offset_max: MAX_OFFSET_MAX,
        }
    }
}

impl FallbackPolicy {
    pub fn new(
        min: f64,
        max: f64,
        offset_min: f64,
        offset_max: f64,
    ) -> Result<Self, ConfigError> {
        if ![min, max, offset_min, offset_max].iter().all(|v| v.is_finite()) {
            return Err(ConfigError::InvalidFallback(
                "all bounds must be finite numbers".to_string(),
            ));
        }
        if min > max {
            return Err(ConfigError::InvalidFallback(format!(
                "temperature band is inverted ({} > {})",
                min, max
            )));
        }
        if offset_min <= 0.0 || offset_min > offset_max {
            return Err(ConfigError::InvalidFallback(format!(
                "max offset band must satisfy 0 < min <= max, got {}..{}",
                offset_min, offset_max
            )));
        }
        Ok(Self {
            min,
            max,
            offset_min,
            offset_max,
        })
    }

    /// Draw a synthesized forecast.
    ///
    /// The max temperature is derived from the already-rounded temperature, so
    /// it never falls below it.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ForecastResult {
        let temperature = round_1dp(rng.random_range(self.min..=self.max));
        let offset = rng.random_range(self.offset_min..=self.offset_max);
        ForecastResult {
            temperature,
            max_temperature: round_1dp(temperature + offset),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    result: ForecastResult,
    source: ForecastSource,
}

/// Per-session memo of resolved forecasts.
///
/// Populated lazily by [`resolve`]; entries are never evicted.
#[derive(Debug, Default)]
pub struct ForecastCache {
    entries: HashMap<String, CacheEntry>,
}

impl ForecastCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve a forecast, computing it at most once per cache.
///
/// `matched` should be the historical records for which
/// [`ForecastQuery::matches`] holds. It is ignored when the query is already
/// cached.
pub fn resolve<'a, M, R>(
    cache: &mut ForecastCache,
    query: &ForecastQuery,
    matched: M,
    policy: &FallbackPolicy,
    rng: &mut R,
) -> Resolution
where
    M: IntoIterator<Item = &'a HistoricalRecord>,
    R: Rng,
{
    let key = query.cache_key();
    if let Some(entry) = cache.entries.get(&key) {
        return Resolution {
            result: entry.result,
            source: entry.source,
            cached: true,
        };
    }

    let matched: Vec<&HistoricalRecord> = matched.into_iter().collect();
    let entry = match (
        mean_1dp(matched.iter().map(|r| r.temperature)),
        mean_1dp(matched.iter().map(|r| r.max_temperature)),
    ) {
        (Some(temperature), Some(max_temperature)) => CacheEntry {
            result: ForecastResult {
                temperature,
                max_temperature,
            },
            source: ForecastSource::Historical {
                samples: matched.len(),
            },
        },
        _ => {
            tracing::debug!(
                "No historical data for {} / {} at {} {}, synthesizing forecast",
                query.region,
                query.city,
                query.date_str(),
                query.time_str()
            );
            CacheEntry {
                result: policy.sample(rng),
                source: ForecastSource::Fallback,
            }
        }
    };

    cache.entries.insert(key, entry);
    Resolution {
        result: entry.result,
        source: entry.source,
        cached: false,
    }
}

/// Resolve `query` against the historical store using the cache owned by
/// `session_id`.
pub async fn resolve_for_session(
    history: &HistoricalStore,
    sessions: &SessionRegistry,
    policy: &FallbackPolicy,
    session_id: Uuid,
    query: &ForecastQuery,
) -> Result<Resolution, AppError> {
    let matched = history.matching(query).await;

    sessions
        .with_cache(session_id, |cache| {
            resolve(cache, query, &matched, policy, &mut rand::rng())
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))
}
