//! Historical temperature store backed by a CSV file.
//!
//! The file has the header `region,city,date,time,temperature,max_temperature`
//! with dates as `YYYY-MM-DD` and times as `HH:MM`. Rows are parsed into typed
//! [`HistoricalRecord`]s at load time; a missing column or an unparsable field
//! fails the whole load.
//!
//! A missing or empty file is seeded with synthetic hourly readings for every
//! catalog city over the next few days.

use chrono::{NaiveDate, NaiveTime};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::services::catalog;
use crate::services::forecast::{FallbackPolicy, ForecastQuery, DATE_FORMAT, TIME_FORMAT};

/// Columns every historical CSV must provide.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "region",
    "city",
    "date",
    "time",
    "temperature",
    "max_temperature",
];

/// Number of days covered by a freshly seeded store, starting today.
pub const SEED_DAYS: usize = 5;

/// Errors that can occur while reading or writing the historical CSV.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error on historical store: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// One temperature reading for a city at a given date and hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub region: String,
    pub city: String,
    pub date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub time: NaiveTime,
    #[serde(deserialize_with = "finite")]
    pub temperature: f64,
    #[serde(deserialize_with = "finite")]
    pub max_temperature: f64,
}

impl HistoricalRecord {
    /// Text of `column` as written to the CSV; empty for unknown columns.
    fn column_value(&self, column: &str) -> String {
        match column {
            "region" => self.region.clone(),
            "city" => self.city.clone(),
            "date" => self.date.format(DATE_FORMAT).to_string(),
            "time" => self.time.format(TIME_FORMAT).to_string(),
            "temperature" => format!("{:?}", self.temperature),
            "max_temperature" => format!("{:?}", self.max_temperature),
            _ => String::new(),
        }
    }
}

fn finite<'de, D: serde::Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(d)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(serde::de::Error::custom(format!(
            "temperature must be a finite number, got {}",
            value
        )))
    }
}

/// `HH:MM` serde format for [`NaiveTime`].
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::services::forecast::TIME_FORMAT;

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format(TIME_FORMAT))
    }

    /// Only the zero-padded form is accepted, so `9:00` is rejected.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        let raw = raw.trim();
        let time = NaiveTime::parse_from_str(raw, TIME_FORMAT).map_err(serde::de::Error::custom)?;
        if time.format(TIME_FORMAT).to_string() != raw {
            return Err(serde::de::Error::custom(format!(
                "time '{}' is not in HH:MM form",
                raw
            )));
        }
        Ok(time)
    }
}

/// Records matching `query` on region, city, date and time.
pub fn filter<'a>(
    records: &'a [HistoricalRecord],
    query: &ForecastQuery,
) -> Vec<&'a HistoricalRecord> {
    records.iter().filter(|r| query.matches(r)).collect()
}

/// Load and validate every record in a CSV file.
pub fn load(path: &Path) -> Result<Vec<HistoricalRecord>, HistoryError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    check_columns(reader.headers()?)?;

    let records = reader
        .deserialize()
        .collect::<Result<Vec<HistoricalRecord>, csv::Error>>()?;
    Ok(records)
}

fn check_columns(headers: &csv::StringRecord) -> Result<(), HistoryError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(HistoryError::MissingColumns(missing))
    }
}

/// Overwrite `path` with `records`, header first.
pub fn write_all(path: &Path, records: &[HistoricalRecord]) -> Result<(), HistoryError> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Append one record, writing the header first if the file is absent or empty.
///
/// An existing file keeps its header: fields are written in that header's
/// column order, and extra columns are left empty.
pub fn append(path: &Path, record: &HistoricalRecord) -> Result<(), HistoryError> {
    if is_missing_or_empty(path) {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        return Ok(());
    }

    let headers = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?
        .headers()?
        .clone();
    check_columns(&headers)?;

    let row: csv::StringRecord = headers
        .iter()
        .map(|column| record.column_value(column))
        .collect();
    let file = OpenOptions::new().append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(&row)?;
    writer.flush()?;
    Ok(())
}

fn is_missing_or_empty(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.len() == 0)
        .unwrap_or(true)
}

/// Synthetic hourly readings for every catalog city over [`SEED_DAYS`] days.
pub fn generate_seed_records<R: Rng>(
    start: NaiveDate,
    policy: &FallbackPolicy,
    rng: &mut R,
) -> Vec<HistoricalRecord> {
    let dates: Vec<NaiveDate> = start.iter_days().take(SEED_DAYS).collect();
    let hours: Vec<NaiveTime> = (0..24)
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .collect();

    let mut records = Vec::with_capacity(dates.len() * hours.len() * catalog::pairs().count());
    for (region, city) in catalog::pairs() {
        for date in &dates {
            for time in &hours {
                let sample = policy.sample(rng);
                records.push(HistoricalRecord {
                    region: region.to_string(),
                    city: city.to_string(),
                    date: *date,
                    time: *time,
                    temperature: sample.temperature,
                    max_temperature: sample.max_temperature,
                });
            }
        }
    }
    records
}

/// Seed `path` if it is missing or empty. Returns whether seeding happened.
pub fn ensure_seeded<R: Rng>(
    path: &Path,
    start: NaiveDate,
    policy: &FallbackPolicy,
    rng: &mut R,
) -> Result<bool, HistoryError> {
    if !is_missing_or_empty(path) {
        return Ok(false);
    }
    let records = generate_seed_records(start, policy, rng);
    write_all(path, &records)?;
    tracing::info!(
        "Seeded {} with {} synthetic records",
        path.display(),
        records.len()
    );
    Ok(true)
}

/// In-memory copy of the historical CSV, kept in step with appends.
pub struct HistoricalStore {
    path: PathBuf,
    records: RwLock<Vec<HistoricalRecord>>,
}

impl HistoricalStore {
    /// Seed the file if needed, then load it.
    pub fn open(path: impl Into<PathBuf>, policy: &FallbackPolicy) -> Result<Self, HistoryError> {
        let path = path.into();
        let today = chrono::Local::now().date_naive();
        ensure_seeded(&path, today, policy, &mut rand::rng())?;

        let records = load(&path)?;
        tracing::info!(
            "Loaded {} historical records from {}",
            records.len(),
            path.display()
        );
        Ok(Self::from_records(path, records))
    }

    pub fn from_records(path: impl Into<PathBuf>, records: Vec<HistoricalRecord>) -> Self {
        Self {
            path: path.into(),
            records: RwLock::new(records),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Owned copies of the records matching `query`.
    pub async fn matching(&self, query: &ForecastQuery) -> Vec<HistoricalRecord> {
        let records = self.records.read().await;
        filter(&records, query).into_iter().cloned().collect()
    }

    /// Append a record to the CSV file, then to memory.
    ///
    /// Memory is only updated once the file write succeeded.
    pub async fn append(&self, record: HistoricalRecord) -> Result<(), HistoryError> {
        let mut records = self.records.write().await;

        let path = self.path.clone();
        let row = record.clone();
        tokio::task::spawn_blocking(move || append(&path, &row))
            .await
            .map_err(|e| HistoryError::Io(std::io::Error::other(e)))??;

        records.push(record);
        Ok(())
    }
}
