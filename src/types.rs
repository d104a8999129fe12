// types.rs
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One `(timestamp, price)` observation for a tracked symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub ts: DateTime<Utc>,
    pub price: f64,
}

impl Sample {
    pub fn new(ts: DateTime<Utc>, price: f64) -> Self {
        Self { ts, price }
    }
}

/// Latest row served by `/api/realtime/{symbol}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeRecord {
    #[serde(rename = "Time", deserialize_with = "de_timestamp")]
    pub time: DateTime<Utc>,
    #[serde(rename = "Close", deserialize_with = "de_number")]
    pub close: f64,
    #[serde(rename = "Open", default, deserialize_with = "de_opt_number")]
    pub open: Option<f64>,
    #[serde(rename = "High", default, deserialize_with = "de_opt_number")]
    pub high: Option<f64>,
    #[serde(rename = "Low", default, deserialize_with = "de_opt_number")]
    pub low: Option<f64>,
    #[serde(rename = "Volume", default, deserialize_with = "de_opt_number")]
    pub volume: Option<f64>,
}

impl RealtimeRecord {
    /// Converts the record into a sample, rejecting prices that cannot be charted.
    pub fn to_sample(&self) -> Result<Sample, String> {
        if !self.close.is_finite() || self.close < 0.0 {
            return Err(format!("invalid close price {}", self.close));
        }
        Ok(Sample::new(self.time, self.close))
    }
}

/// Daily candle served by `/api/historical-binance/{symbol}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CandleRecord {
    #[serde(rename = "Time", deserialize_with = "de_timestamp")]
    pub time: DateTime<Utc>,
    #[serde(rename = "Open", deserialize_with = "de_number")]
    pub open: f64,
    #[serde(rename = "High", deserialize_with = "de_number")]
    pub high: f64,
    #[serde(rename = "Low", deserialize_with = "de_number")]
    pub low: f64,
    #[serde(rename = "Close", deserialize_with = "de_number")]
    pub close: f64,
    #[serde(rename = "Volume", deserialize_with = "de_number")]
    pub volume: f64,
}

impl CandleRecord {
    pub fn close_sample(&self) -> Sample {
        Sample::new(self.time, self.close)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoinStatus {
    pub records: u64,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseStatus {
    pub database: String,
    pub coins: BTreeMap<String, CoinStatus>,
    pub timestamp: f64,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(f64),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimeRepr {
    Millis(i64),
    Text(String),
}

fn de_number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match NumOrStr::deserialize(d)? {
        NumOrStr::Num(v) => Ok(v),
        NumOrStr::Str(s) => s.trim().parse::<f64>().map_err(de::Error::custom),
    }
}

fn de_opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<NumOrStr>::deserialize(d)? {
        None => Ok(None),
        Some(NumOrStr::Num(v)) => Ok(Some(v)),
        Some(NumOrStr::Str(s)) => s.trim().parse::<f64>().map(Some).map_err(de::Error::custom),
    }
}

fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    match TimeRepr::deserialize(d)? {
        TimeRepr::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {ms}"))),
        TimeRepr::Text(s) => parse_timestamp(&s).map_err(de::Error::custom),
    }
}

/// Parses the timestamp shapes the backend emits. Naive values are UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let s = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(s) {
        return Ok(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t.and_utc());
        }
    }
    Err(format!("unrecognised timestamp: {raw}"))
}
