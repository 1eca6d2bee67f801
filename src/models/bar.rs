use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Canonical OHLCV row after standardization
///
/// All providers are normalized into this shape regardless of their native
/// column naming. Indicator fields are `None` until the series is long
/// enough for the window to warm up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardBar {
    /// Trading date of the bar
    pub date: NaiveDate,

    /// Symbol the bar belongs to
    pub symbol: String,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,

    /// Trading volume (shares)
    pub volume: f64,

    /// Turnover in quote currency, when the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    /// Close-to-close percentage change; derived when the provider omits it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct_change: Option<f64>,

    // Simple moving averages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma5: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma10: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma20: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma60: Option<f64>,

    // MACD (EMA12/EMA26, 9-period signal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd_dif: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd_dea: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd_hist: Option<f64>,

    // Exponentially-smoothed RSI (com = N-1), CN convention
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi6: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi12: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi24: Option<f64>,

    /// Conventional RSI14 using a simple rolling mean of gains/losses.
    /// Numerically different from the smoothed variant on the same input;
    /// both are produced because they serve different regional conventions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi14: Option<f64>,

    // Bollinger Bands (20-period SMA +/- 2 std devs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boll_upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boll_mid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boll_lower: Option<f64>,
}

impl StandardBar {
    /// Create a bar with only the OHLCV core populated
    pub fn new(
        date: NaiveDate,
        symbol: String,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            date,
            symbol,
            open,
            high,
            low,
            close,
            volume,
            amount: None,
            pct_change: None,
            ma5: None,
            ma10: None,
            ma20: None,
            ma60: None,
            macd_dif: None,
            macd_dea: None,
            macd_hist: None,
            rsi6: None,
            rsi12: None,
            rsi24: None,
            rsi14: None,
            boll_upper: None,
            boll_mid: None,
            boll_lower: None,
        }
    }
}

/// Real-time quote snapshot (standardized)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct_change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    pub as_of: DateTime<Utc>,
}

/// Company fundamentals snapshot; fields are optional because coverage
/// differs wildly across upstreams
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fundamentals {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roe: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_profit: Option<f64>,
}

/// Single news article reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}
