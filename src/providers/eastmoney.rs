//! Eastmoney provider client
//!
//! Blocking HTTP client for the public Eastmoney quote/kline endpoints,
//! covering A-shares and Hong Kong. Calls are expected to run on the
//! orchestrator's worker pool; the client adds its own minimum-interval
//! throttle and bounded retry on transient upstream failures.

use std::sync::Mutex;
use std::thread::sleep;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::models::{NewsItem, Period, RawFrame};
use crate::services::registry::{MarketDataProvider, ProviderError};

const KLINE_URL: &str = "https://push2his.eastmoney.com/api/qt/stock/kline/get";
const QUOTE_URL: &str = "https://push2.eastmoney.com/api/qt/stock/get";

/// Maximum retries for transient upstream failures
const MAX_RETRIES: u32 = 3;

/// Minimum spacing between consecutive requests from this client
const MIN_REQUEST_INTERVAL_MS: u64 = 200;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Kline columns in upstream field order (f51..f57 plus f59)
const KLINE_COLUMNS: &[&str] = &[
    "date", "open", "close", "high", "low", "volume", "amount", "pct_chg",
];

#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    data: Option<QuoteData>,
}

/// Quote fields: price/prev-close arrive scaled by 100
#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(rename = "f43")]
    price: Option<f64>,
    #[serde(rename = "f60")]
    prev_close: Option<f64>,
    #[serde(rename = "f170")]
    pct_change: Option<f64>,
    #[serde(rename = "f47")]
    volume: Option<f64>,
}

/// Simple minimum-interval throttle shared across calling threads
#[derive(Debug)]
struct MinIntervalThrottle {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl MinIntervalThrottle {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    fn acquire(&self) {
        let mut last = self.last_request.lock().expect("throttle lock poisoned");
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

pub struct EastmoneyProvider {
    client: Client,
    throttle: MinIntervalThrottle,
}

impl EastmoneyProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(25))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("client build: {}", e)))?;

        Ok(Self {
            client,
            throttle: MinIntervalThrottle::new(Duration::from_millis(MIN_REQUEST_INTERVAL_MS)),
        })
    }

    /// Upstream security id: exchange prefix + code.
    /// Shanghai listings (6xxxxx) are market 1, Shenzhen market 0,
    /// Hong Kong market 116.
    fn secid(symbol: &str) -> String {
        let code = symbol.trim().trim_end_matches(".HK").trim_end_matches(".hk");
        if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
            if code.starts_with('6') {
                format!("1.{}", code)
            } else {
                format!("0.{}", code)
            }
        } else {
            format!("116.{:0>5}", code)
        }
    }

    fn klt(period: Period) -> &'static str {
        match period {
            Period::Daily => "101",
            Period::Weekly => "102",
            Period::Monthly => "103",
        }
    }

    /// GET with bounded exponential backoff. 429/5xx/network faults are
    /// retried; other client errors are not.
    fn get_with_retry(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let mut last_error = ProviderError::NoData;

        for attempt in 0..MAX_RETRIES {
            self.throttle.acquire();

            if attempt > 0 {
                let backoff = Duration::from_millis(
                    500u64.saturating_mul(2u64.pow(attempt - 1))
                        + (rand::random::<f64>() * 250.0) as u64,
                );
                debug!(url, attempt, backoff_ms = backoff.as_millis() as u64, "Retrying request");
                sleep(backoff);
            }

            let response = match self
                .client
                .get(url)
                .query(query)
                .header("Referer", "https://quote.eastmoney.com/")
                .send()
            {
                Ok(response) => response,
                Err(e) => {
                    last_error = ProviderError::Network(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 {
                last_error = ProviderError::RateLimited;
                continue;
            }
            if status.is_server_error() {
                last_error = ProviderError::Network(format!("server error ({})", status.as_u16()));
                continue;
            }
            if !status.is_success() {
                // Request problem: other endpoints will not fix it
                return Err(ProviderError::InvalidResponse(format!(
                    "client error ({})",
                    status.as_u16()
                )));
            }

            return response
                .json::<Value>()
                .map_err(|e| ProviderError::InvalidResponse(format!("body: {}", e)));
        }

        warn!(url, retries = MAX_RETRIES, "Request failed after all retries");
        Err(last_error)
    }

    /// Parse one comma-separated kline row into frame cells
    fn parse_kline(line: &str) -> Option<Vec<Value>> {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 7 {
            return None;
        }

        let mut cells: Vec<Value> = vec![json!(parts[0])];
        for part in &parts[1..7] {
            cells.push(json!(part.parse::<f64>().ok()?));
        }
        // pct_chg sits after the amplitude column when present
        match parts.get(8).and_then(|p| p.parse::<f64>().ok()) {
            Some(pct) => cells.push(json!(pct)),
            None => cells.push(Value::Null),
        }
        Some(cells)
    }
}

impl MarketDataProvider for EastmoneyProvider {
    fn id(&self) -> &str {
        "eastmoney"
    }

    fn fetch_historical(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        period: Period,
    ) -> Result<RawFrame, ProviderError> {
        let query = [
            ("secid", Self::secid(symbol)),
            ("fields1", "f1,f2,f3,f4,f5,f6".to_string()),
            (
                "fields2",
                "f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61".to_string(),
            ),
            ("klt", Self::klt(period).to_string()),
            ("fqt", "1".to_string()),
            ("beg", start.format("%Y%m%d").to_string()),
            ("end", end.format("%Y%m%d").to_string()),
        ];

        let body = self.get_with_retry(KLINE_URL, &query)?;
        let parsed: KlineResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("kline shape: {}", e)))?;

        let data = parsed.data.ok_or(ProviderError::NoData)?;
        if data.klines.is_empty() {
            return Err(ProviderError::NoData);
        }

        let mut frame = RawFrame::new(KLINE_COLUMNS.iter().map(|s| s.to_string()).collect());
        for line in &data.klines {
            match Self::parse_kline(line) {
                Some(cells) => frame.push_row(cells),
                None => {
                    warn!(symbol, line = line.as_str(), "Skipping malformed kline row");
                }
            }
        }

        if frame.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "all kline rows malformed".to_string(),
            ));
        }
        Ok(frame)
    }

    fn fetch_quote(&self, symbol: &str) -> Result<RawFrame, ProviderError> {
        let query = [
            ("secid", Self::secid(symbol)),
            ("fields", "f43,f47,f60,f170".to_string()),
        ];

        let body = self.get_with_retry(QUOTE_URL, &query)?;
        let parsed: QuoteResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("quote shape: {}", e)))?;
        let data = parsed.data.ok_or(ProviderError::NoData)?;
        let price = data.price.ok_or(ProviderError::NoData)?;

        let mut frame = RawFrame::new(
            ["price", "prev_close", "pct_chg", "volume"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        frame.push_row(vec![
            json!(price / 100.0),
            data.prev_close.map(|v| json!(v / 100.0)).unwrap_or(Value::Null),
            data.pct_change.map(|v| json!(v / 100.0)).unwrap_or(Value::Null),
            data.volume.map(|v| json!(v)).unwrap_or(Value::Null),
        ]);
        Ok(frame)
    }

    fn fetch_fundamentals(&self, _symbol: &str) -> Result<RawFrame, ProviderError> {
        Err(ProviderError::Unsupported("fundamentals".to_string()))
    }

    fn fetch_news(
        &self,
        _symbol: &str,
        _hours_back: u32,
        _limit: usize,
    ) -> Result<Vec<NewsItem>, ProviderError> {
        Err(ProviderError::Unsupported("news".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secid_mapping() {
        assert_eq!(EastmoneyProvider::secid("600519"), "1.600519");
        assert_eq!(EastmoneyProvider::secid("000001"), "0.000001");
        assert_eq!(EastmoneyProvider::secid("300750"), "0.300750");
        assert_eq!(EastmoneyProvider::secid("0700.HK"), "116.00700");
        assert_eq!(EastmoneyProvider::secid("09988"), "116.09988");
    }

    #[test]
    fn test_klt_mapping() {
        assert_eq!(EastmoneyProvider::klt(Period::Daily), "101");
        assert_eq!(EastmoneyProvider::klt(Period::Weekly), "102");
        assert_eq!(EastmoneyProvider::klt(Period::Monthly), "103");
    }

    #[test]
    fn test_parse_kline_full_row() {
        let line = "2024-01-02,1685.0,1695.0,1702.0,1680.0,25000,42337500.0,1.30,0.59,10.0,0.25";
        let cells = EastmoneyProvider::parse_kline(line).unwrap();
        assert_eq!(cells.len(), KLINE_COLUMNS.len());
        assert_eq!(cells[0], json!("2024-01-02"));
        assert_eq!(cells[1], json!(1685.0)); // open
        assert_eq!(cells[2], json!(1695.0)); // close
        assert_eq!(cells[7], json!(0.59)); // pct_chg
    }

    #[test]
    fn test_parse_kline_short_row_rejected() {
        assert!(EastmoneyProvider::parse_kline("2024-01-02,1685.0").is_none());
    }

    #[test]
    fn test_parse_kline_without_pct_column() {
        let line = "2024-01-02,1685.0,1695.0,1702.0,1680.0,25000,42337500.0";
        let cells = EastmoneyProvider::parse_kline(line).unwrap();
        assert_eq!(cells[7], Value::Null);
    }
}
