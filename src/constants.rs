//! Resolution Engine Constants
//!
//! Completeness thresholds, default provider orders and scheduling limits.
//!
//! ## Completeness thresholds
//!
//! The completeness heuristic deliberately avoids a holiday calendar. The
//! constants below are exact values carried over from production tuning and
//! must not be reinterpreted as defaults:
//!
//! - ~70% of calendar days in a range are trading days
//! - a dataset with fewer than half the expected rows is rejected
//! - more than 10% of expected rows worth of gaps is rejected
//! - a gap is any jump of more than 3 calendar days between consecutive rows

/// Fraction of calendar days assumed to be trading days (no holiday table).
pub const TRADING_DAY_DENSITY: f64 = 0.7;

/// Minimum ratio of actual rows to expected rows for a dataset to pass.
pub const MIN_ROW_RATIO: f64 = 0.5;

/// Maximum ratio of gap count to expected rows for a dataset to pass.
pub const MAX_GAP_RATIO: f64 = 0.1;

/// Consecutive rows further apart than this many calendar days count as a gap.
pub const MAX_GAP_CALENDAR_DAYS: i64 = 3;

/// Hour (market-local) after which today counts as a completed trading day.
pub const MARKET_CLOSE_HOUR: u32 = 16;

/// Default per-attempt timeout enforced by the orchestrator, independent of
/// any timeout inside the provider's own client.
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 30;

/// Default width of the blocking worker pool shared by all requests.
pub const DEFAULT_BLOCKING_WORKERS: usize = 8;

/// Hardcoded fallback provider orders, used when the configuration store
/// fails or returns no descriptors for a market. Highest priority first.
pub mod default_order {
    /// Mainland-China A-shares
    pub const CN_A: &[&str] = &["tushare", "akshare", "baostock", "tdx"];

    /// Hong Kong
    pub const HK: &[&str] = &["akshare", "yfinance"];

    /// United States
    pub const US: &[&str] = &["yfinance", "alphavantage"];
}
