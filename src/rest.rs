// rest.rs
use crate::error::ApiError;
use crate::types::{
    CandleRecord, DatabaseStatus, ErrorBody, HealthStatus, RealtimeRecord, Sample,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Anything that can produce the latest sample for a symbol.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn latest(&self, symbol: &str) -> Result<Sample, ApiError>;
}

#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn realtime(&self, symbol: &str) -> Result<RealtimeRecord, ApiError> {
        let url = format!("{}/api/realtime/{}", self.base_url, symbol);
        self.get_json(&url, &[]).await
    }

    /// Daily candles between `start` and `end`, inclusive, in backend order.
    pub async fn historical(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CandleRecord>, ApiError> {
        check_range(start, end)?;
        let url = format!("{}/api/historical-binance/{}", self.base_url, symbol);
        let (s, e) = (start.to_string(), end.to_string());
        self.get_json(&url, &[("start", s.as_str()), ("end", e.as_str())])
            .await
    }

    /// Daily closes for the range. The backend answers 404 when the range
    /// holds no rows, which reads as an empty series.
    pub async fn historical_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Sample>, ApiError> {
        match self.historical(symbol, start, end).await {
            Ok(candles) => Ok(candles.iter().map(CandleRecord::close_sample).collect()),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn historical_csv(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Bytes, ApiError> {
        check_range(start, end)?;
        let url = format!("{}/api/historical-binance/{}", self.base_url, symbol);
        let (s, e) = (start.to_string(), end.to_string());
        self.get_bytes(
            &url,
            &[("start", s.as_str()), ("end", e.as_str()), ("download", "csv")],
        )
        .await
    }

    /// Everything the backend collected from its live stream for `symbol`.
    pub async fn realtime_csv(&self, symbol: &str) -> Result<Bytes, ApiError> {
        let url = format!("{}/api/realtime-history/{}", self.base_url, symbol);
        self.get_bytes(&url, &[("download", "csv")]).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let url = format!("{}/api/health", self.base_url);
        self.get_json(&url, &[]).await
    }

    pub async fn database_status(&self) -> Result<DatabaseStatus, ApiError> {
        let url = format!("{}/api/database-status", self.base_url);
        self.get_json(&url, &[]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let resp = self.send(url, query).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_bytes(&self, url: &str, query: &[(&str, &str)]) -> Result<Bytes, ApiError> {
        let resp = self.send(url, query).await?;
        Ok(resp.bytes().await?)
    }

    async fn send(&self, url: &str, query: &[(&str, &str)]) -> Result<Response, ApiError> {
        tracing::debug!(url, "GET");
        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.bytes().await.unwrap_or_default();
        Err(ApiError::Server {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

#[async_trait]
impl PriceSource for RestClient {
    async fn latest(&self, symbol: &str) -> Result<Sample, ApiError> {
        let record = self.realtime(symbol).await?;
        record.to_sample().map_err(|reason| ApiError::InvalidSample {
            symbol: symbol.to_string(),
            reason,
        })
    }
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
    if start > end {
        return Err(ApiError::InvalidRange { start, end });
    }
    Ok(())
}

fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(b) => b.error,
        Err(_) if body.is_empty() => "empty response body".to_string(),
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_body_is_unwrapped() {
        assert_eq!(
            error_message(br#"{"error": "No data available"}"#),
            "No data available"
        );
        assert_eq!(error_message(b"Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(b""), "empty response body");
    }

    #[test]
    fn reversed_range_is_rejected_before_any_request() {
        let start = NaiveDate::from_ymd_opt(2025, 8, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 8, 26).unwrap();
        assert!(matches!(
            check_range(start, end),
            Err(ApiError::InvalidRange { .. })
        ));
        assert!(check_range(end, start).is_ok());
        assert!(check_range(start, start).is_ok());
    }

    /// Serves one canned HTTP response on a local port.
    async fn serve_once(status: &str, body: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = sock.read(&mut buf).await;
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn missing_history_reads_as_empty() {
        let base = serve_once("404 NOT FOUND", r#"{"error":"No data found"}"#).await;
        let c = RestClient::new(&base, Duration::from_secs(5)).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 8, 26).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 8, 27).unwrap();
        let closes = c.historical_closes("BTCUSDT", start, end).await.unwrap();
        assert!(closes.is_empty());
    }

    #[tokio::test]
    async fn other_history_errors_still_surface() {
        let base = serve_once("500 INTERNAL SERVER ERROR", r#"{"error":"db down"}"#).await;
        let c = RestClient::new(&base, Duration::from_secs(5)).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 8, 26).unwrap();
        match c.historical_closes("BTCUSDT", day, day).await {
            Err(ApiError::Server { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "db down");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let c = RestClient::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.base_url(), "http://localhost:5000");
    }
}
