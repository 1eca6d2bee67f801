use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Market category a symbol trades in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// Mainland-China A-shares (Shanghai/Shenzhen)
    #[serde(rename = "cn_a")]
    CnA,
    /// Hong Kong
    #[serde(rename = "hk")]
    Hk,
    /// United States
    #[serde(rename = "us")]
    Us,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::CnA => "cn_a",
            Market::Hk => "hk",
            Market::Us => "us",
        }
    }

    /// IANA timezone of the market's primary exchange
    pub fn timezone(&self) -> &'static str {
        match self {
            Market::CnA => "Asia/Shanghai",
            Market::Hk => "Asia/Hong_Kong",
            Market::Us => "America/New_York",
        }
    }

    /// Derive the market category from a raw symbol.
    ///
    /// - 6-digit numeric codes are A-shares ("600519", "000001")
    /// - 4-5 digit numeric codes (optionally suffixed ".HK") are Hong Kong
    /// - everything alphabetic is treated as a US ticker ("AAPL", "BRK.B")
    pub fn from_symbol(symbol: &str) -> Market {
        let code = symbol
            .trim()
            .trim_end_matches(".HK")
            .trim_end_matches(".hk");

        if code.chars().all(|c| c.is_ascii_digit()) {
            if code.len() == 6 {
                Market::CnA
            } else {
                Market::Hk
            }
        } else {
            Market::Us
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of dataset being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Historical,
    Quote,
    Fundamentals,
    News,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Historical => "historical",
            DataKind::Quote => "quote",
            DataKind::Fundamentals => "fundamentals",
            DataKind::News => "news",
        }
    }
}

/// Bar aggregation period for historical data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Total calendar days in the range, endpoints included
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// A single data request handled by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRequest {
    pub symbol: String,
    pub market: Market,
    pub kind: DataKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<DateRange>,
    pub period: Period,
}

impl DataRequest {
    /// Historical-bars request for a date range
    pub fn historical(symbol: impl Into<String>, range: DateRange, period: Period) -> Self {
        let symbol = symbol.into();
        let market = Market::from_symbol(&symbol);
        Self {
            symbol,
            market,
            kind: DataKind::Historical,
            range: Some(range),
            period,
        }
    }

    /// Request without a date range (quote, fundamentals, news)
    pub fn of_kind(symbol: impl Into<String>, kind: DataKind) -> Self {
        let symbol = symbol.into();
        let market = Market::from_symbol(&symbol);
        Self {
            symbol,
            market,
            kind,
            range: None,
            period: Period::Daily,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_from_symbol() {
        assert_eq!(Market::from_symbol("600519"), Market::CnA);
        assert_eq!(Market::from_symbol("000001"), Market::CnA);
        assert_eq!(Market::from_symbol("0700"), Market::Hk);
        assert_eq!(Market::from_symbol("0700.HK"), Market::Hk);
        assert_eq!(Market::from_symbol("09988"), Market::Hk);
        assert_eq!(Market::from_symbol("AAPL"), Market::Us);
        assert_eq!(Market::from_symbol("BRK.B"), Market::Us);
    }

    #[test]
    fn test_calendar_days_inclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        assert_eq!(range.calendar_days(), 31);
    }
}
