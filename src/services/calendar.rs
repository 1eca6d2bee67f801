//! Trading-calendar collaborator
//!
//! The completeness check needs "the latest trade date the market should
//! have produced by now". The default implementation is weekday arithmetic
//! in the market's own time zone; exact holiday correctness is a declared
//! non-goal of the engine.

use chrono::{Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use tracing::warn;

use crate::constants::MARKET_CLOSE_HOUR;
use crate::models::Market;

pub trait TradingCalendar: Send + Sync {
    /// Latest date on which `market` should have completed a trading session
    fn latest_trade_date(&self, market: Market) -> NaiveDate;
}

/// Holiday-blind calendar: weekdays in the market's time zone
#[derive(Debug, Default, Clone, Copy)]
pub struct WeekdayCalendar;

impl WeekdayCalendar {
    fn latest_weekday_on_or_before(mut date: NaiveDate) -> NaiveDate {
        while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date -= Duration::days(1);
        }
        date
    }
}

impl TradingCalendar for WeekdayCalendar {
    fn latest_trade_date(&self, market: Market) -> NaiveDate {
        let tz: Tz = match market.timezone().parse() {
            Ok(tz) => tz,
            Err(e) => {
                warn!(market = %market, error = %e, "Failed to parse market timezone, using UTC");
                chrono_tz::UTC
            }
        };

        let now_local = Utc::now().with_timezone(&tz);
        let mut candidate = now_local.date_naive();

        // Before the close, today's session has not produced a full bar yet
        if now_local.hour() < MARKET_CLOSE_HOUR {
            candidate -= Duration::days(1);
        }

        Self::latest_weekday_on_or_before(candidate)
    }
}

/// Calendar pinned to a fixed date, for deterministic tests
#[derive(Debug, Clone, Copy)]
pub struct FixedCalendar {
    pub date: NaiveDate,
}

impl FixedCalendar {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }
}

impl TradingCalendar for FixedCalendar {
    fn latest_trade_date(&self, _market: Market) -> NaiveDate {
        self.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekend_rolls_back_to_friday() {
        // 2024-01-06 is a Saturday, 2024-01-07 a Sunday
        let saturday = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        let friday = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        assert_eq!(WeekdayCalendar::latest_weekday_on_or_before(saturday), friday);
        assert_eq!(WeekdayCalendar::latest_weekday_on_or_before(sunday), friday);
        assert_eq!(WeekdayCalendar::latest_weekday_on_or_before(friday), friday);
    }

    #[test]
    fn test_latest_trade_date_is_a_weekday() {
        let calendar = WeekdayCalendar;
        for market in [Market::CnA, Market::Hk, Market::Us] {
            let date = calendar.latest_trade_date(market);
            assert!(!matches!(date.weekday(), Weekday::Sat | Weekday::Sun));
        }
    }
}
