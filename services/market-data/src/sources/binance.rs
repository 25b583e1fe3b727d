use crate::types::*;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance caps a single klines request at 1000 rows
const MAX_LIMIT: usize = 1000;

/// Internal health tracking so `health()` never spends an API call
struct HealthTracker {
    /// Timestamp of last successful request (millis since epoch)
    last_success_ms: AtomicU64,
    /// Timestamp of last failed request (millis since epoch)
    last_failure_ms: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    last_latency_ms: AtomicU64,
}

impl HealthTracker {
    fn new() -> Self {
        Self {
            last_success_ms: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            last_latency_ms: AtomicU64::new(0),
        }
    }

    fn record_success(&self, latency_ms: u64) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_success_ms.store(now_ms, Ordering::Relaxed);
        self.last_latency_ms.store(latency_ms, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        let now_ms = Utc::now().timestamp_millis() as u64;
        self.last_failure_ms.store(now_ms, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    fn is_healthy(&self) -> bool {
        let last_success = self.last_success_ms.load(Ordering::Relaxed);
        let last_failure = self.last_failure_ms.load(Ordering::Relaxed);

        // Healthy if: had at least one success AND (no failures OR last success >= last failure)
        last_success > 0 && (last_failure == 0 || last_success >= last_failure)
    }

    fn success_rate(&self) -> f64 {
        let successes = self.success_count.load(Ordering::Relaxed);
        let failures = self.failure_count.load(Ordering::Relaxed);
        let total = successes + failures;
        if total == 0 {
            return 1.0; // No requests yet, assume healthy
        }
        successes as f64 / total as f64
    }
}

/// Binance spot klines REST client
pub struct BinanceKlinesClient {
    client: Client,
    base_url: String,
    health_tracker: HealthTracker,
}

impl BinanceKlinesClient {
    /// Per-request timeout
    const REQUEST_TIMEOUT_SECS: u64 = 10;

    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| MarketDataError::ApiError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            health_tracker: HealthTracker::new(),
        })
    }

    fn klines_url(&self, symbol: &str, interval: Interval, limit: usize) -> Result<Url> {
        let limit = limit.clamp(1, MAX_LIMIT).to_string();
        Url::parse_with_params(
            &format!("{}/api/v3/klines", self.base_url),
            &[
                ("symbol", symbol.to_uppercase()),
                ("interval", interval.as_str().to_string()),
                ("limit", limit),
            ],
        )
        .map_err(|e| MarketDataError::ApiError(format!("Invalid klines URL: {}", e)))
    }

    /// Fetch raw kline rows. No retry: the caller's next cycle is the retry.
    async fn request_rows(&self, url: Url) -> Result<Vec<Vec<Value>>> {
        let request_start = Instant::now();

        let response = match tokio::time::timeout(
            Duration::from_secs(Self::REQUEST_TIMEOUT_SECS),
            self.client.get(url.clone()).send(),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                self.health_tracker.record_failure();
                return Err(MarketDataError::ApiError(e.to_string()));
            }
            Err(_) => {
                self.health_tracker.record_failure();
                return Err(MarketDataError::ApiError(format!(
                    "Binance request to {} timed out after {}s",
                    url.path(),
                    Self::REQUEST_TIMEOUT_SECS
                )));
            }
        };

        let status = response.status();

        if status.as_u16() == 429 || status.as_u16() == 418 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            self.health_tracker.record_failure();
            return Err(MarketDataError::RateLimit {
                source_name: "binance".to_string(),
                retry_after,
            });
        }

        if !status.is_success() {
            self.health_tracker.record_failure();
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 400 && text.contains("Invalid symbol") {
                return Err(MarketDataError::SymbolNotFound(text));
            }
            return Err(MarketDataError::ApiError(format!(
                "Binance API error ({}): {}",
                status, text
            )));
        }

        let rows = response.json::<Vec<Vec<Value>>>().await.map_err(|e| {
            self.health_tracker.record_failure();
            MarketDataError::InvalidResponse(e.to_string())
        })?;

        let latency_ms = request_start.elapsed().as_millis() as u64;
        self.health_tracker.record_success(latency_ms);

        Ok(rows)
    }

    /// Most recent `limit` klines for `symbol`, oldest first.
    ///
    /// Row layout: `[open_time, open, high, low, close, volume, close_time, ...]`
    /// with prices as strings and times as epoch millis.
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let url = self.klines_url(symbol, interval, limit)?;
        let rows = self.request_rows(url).await?;

        let candles = rows
            .iter()
            .map(|row| parse_row(row))
            .collect::<Result<Vec<Candle>>>()
            .map_err(|e| {
                self.health_tracker.record_failure();
                e
            })?;

        debug!(
            "Fetched {} {} candles for {}",
            candles.len(),
            interval,
            symbol
        );
        Ok(candles)
    }

    pub async fn health(&self) -> SourceHealth {
        let last_success_ms = self.health_tracker.last_success_ms.load(Ordering::Relaxed);
        let last_success = if last_success_ms > 0 {
            DateTime::from_timestamp_millis(last_success_ms as i64)
        } else {
            None
        };

        let is_healthy = self.health_tracker.is_healthy();

        SourceHealth {
            source: "binance".to_string(),
            is_healthy,
            last_success,
            last_error: if is_healthy {
                None
            } else {
                Some("Recent failures detected".to_string())
            },
            success_rate: self.health_tracker.success_rate(),
            last_latency_ms: self.health_tracker.last_latency_ms.load(Ordering::Relaxed),
        }
    }
}

fn parse_millis(value: Option<&Value>, field: &str) -> Result<DateTime<Utc>> {
    value
        .and_then(|v| v.as_i64())
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| MarketDataError::InvalidResponse(format!("Bad {} in kline row", field)))
}

fn parse_row(row: &[Value]) -> Result<Candle> {
    let close = row
        .get(4)
        .and_then(|v| v.as_str())
        .ok_or_else(|| MarketDataError::InvalidResponse("Missing close in kline row".to_string()))
        .and_then(|s| {
            Decimal::from_str(s).map_err(|e| MarketDataError::InvalidResponse(e.to_string()))
        })?;

    Ok(Candle {
        open_time: parse_millis(row.first(), "open_time")?,
        close_time: parse_millis(row.get(6), "close_time")?,
        close,
    })
}

#[async_trait::async_trait]
impl CandleSource for BinanceKlinesClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        BinanceKlinesClient::fetch_candles(self, symbol, interval, limit).await
    }

    async fn health(&self) -> SourceHealth {
        BinanceKlinesClient::health(self).await
    }

    fn name(&self) -> &str {
        "binance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn kline(open_ms: i64, close: &str) -> Value {
        serde_json::json!([
            open_ms, "1.0", "2.0", "0.5", close, "100.0",
            open_ms + 3_599_999, "100.0", 10, "50.0", "50.0", "0"
        ])
    }

    #[tokio::test]
    async fn test_fetch_candles_parses_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .and(query_param("symbol", "BTCUSDT"))
            .and(query_param("interval", "1h"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                kline(1_700_000_000_000, "42000.10"),
                kline(1_700_003_600_000, "42100.55"),
            ])))
            .mount(&server)
            .await;

        let client = BinanceKlinesClient::new(server.uri()).unwrap();
        let candles = client
            .fetch_candles("btcusdt", Interval::Hour1, 2)
            .await
            .unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, Decimal::from_str("42100.55").unwrap());
        assert_eq!(
            candles[1].close_time.timestamp_millis(),
            1_700_003_600_000 + 3_599_999
        );
        assert!(client.health().await.is_healthy);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let client = BinanceKlinesClient::new(server.uri()).unwrap();
        let err = client
            .fetch_candles("ETHUSDT", Interval::Hour2, 100)
            .await
            .unwrap_err();

        match err {
            MarketDataError::RateLimit { retry_after, .. } => assert_eq!(retry_after, Some(30)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!client.health().await.is_healthy);
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = BinanceKlinesClient::new(server.uri()).unwrap();
        let err = client
            .fetch_candles("SOLUSDT", Interval::Hour1, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::ApiError(_)));
    }

    #[tokio::test]
    async fn test_malformed_row_fails_whole_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                kline(1_700_000_000_000, "1.5"),
                [1_700_003_600_000i64, "1.0"],
            ])))
            .mount(&server)
            .await;

        let client = BinanceKlinesClient::new(server.uri()).unwrap();
        let err = client
            .fetch_candles("ADAUSDT", Interval::Hour1, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidResponse(_)));
    }
}
