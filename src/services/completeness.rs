//! Dataset completeness validation
//!
//! Judges whether a fetched dataset is adequate to serve without falling
//! back to the next provider. The expected-row heuristic assumes ~70% of
//! calendar days are trading days and tolerates no more than 10% of the
//! expected rows worth of >3-day gaps; there is deliberately no holiday
//! table behind it.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::constants::{MAX_GAP_CALENDAR_DAYS, MAX_GAP_RATIO, MIN_ROW_RATIO, TRADING_DAY_DENSITY};
use crate::models::{cell_as_str, DateRange, Market, RawFrame};
use crate::services::calendar::TradingCalendar;
use crate::services::standardizer::{parse_date_loose, DATE_ALIASES};

/// Machine-readable reasons a dataset was rejected
pub mod reason {
    pub const EMPTY_PAYLOAD: &str = "empty-payload";
    pub const PROVIDER_ERROR_MARKER: &str = "provider-error-marker";
    pub const NO_DATE_COLUMN: &str = "no-date-column";
    pub const ROW_COUNT: &str = "row-count";
    pub const STALE_LATEST_DATE: &str = "stale-latest-date";
    pub const GAP_COUNT: &str = "gap-count";
}

/// Pass/fail judgment over a fetched dataset
#[derive(Debug, Clone, Serialize)]
pub struct CompletenessVerdict {
    pub is_complete: bool,
    pub row_count: usize,
    /// Calendar days in range x trading-day density
    pub expected_row_count: f64,
    pub latest_date_in_data: Option<NaiveDate>,
    pub latest_known_trade_date: NaiveDate,
    /// Consecutive-row date deltas larger than the gap threshold
    pub gap_count: usize,
    pub reason_codes: Vec<String>,
}

impl CompletenessVerdict {
    fn rejected(reasons: Vec<&str>, latest_known: NaiveDate) -> Self {
        Self {
            is_complete: false,
            row_count: 0,
            expected_row_count: 0.0,
            latest_date_in_data: None,
            latest_known_trade_date: latest_known,
            gap_count: 0,
            reason_codes: reasons.into_iter().map(String::from).collect(),
        }
    }
}

pub struct CompletenessChecker {
    calendar: Arc<dyn TradingCalendar>,
}

impl CompletenessChecker {
    pub fn new(calendar: Arc<dyn TradingCalendar>) -> Self {
        Self { calendar }
    }

    /// Judge a raw historical payload against the requested range.
    ///
    /// Complete means, simultaneously:
    /// - at least half the expected rows are present
    /// - the newest row is no older than the latest known trade date
    /// - gap count stays within 10% of the expected rows
    pub fn check(&self, frame: &RawFrame, range: DateRange, market: Market) -> CompletenessVerdict {
        let latest_known = self.calendar.latest_trade_date(market);

        if let Some(marker) = &frame.error_marker {
            debug!(marker = marker.as_str(), "Payload carries provider error marker");
            return CompletenessVerdict::rejected(
                vec![reason::PROVIDER_ERROR_MARKER],
                latest_known,
            );
        }

        if frame.is_empty() {
            return CompletenessVerdict::rejected(vec![reason::EMPTY_PAYLOAD], latest_known);
        }

        let date_col = match frame.find_column(DATE_ALIASES) {
            Some(index) => index,
            None => {
                return CompletenessVerdict::rejected(vec![reason::NO_DATE_COLUMN], latest_known)
            }
        };

        let mut dates: Vec<NaiveDate> = frame
            .rows
            .iter()
            .filter_map(|row| row.get(date_col))
            .filter_map(|cell| cell_as_str(cell).and_then(parse_date_loose))
            .collect();
        dates.sort_unstable();

        if dates.is_empty() {
            return CompletenessVerdict::rejected(vec![reason::NO_DATE_COLUMN], latest_known);
        }

        let row_count = frame.row_count();
        let expected_row_count = range.calendar_days() as f64 * TRADING_DAY_DENSITY;
        let latest_date_in_data = dates.last().copied();

        let gap_count = dates
            .windows(2)
            .filter(|pair| (pair[1] - pair[0]).num_days() > MAX_GAP_CALENDAR_DAYS)
            .count();

        let has_enough_rows = row_count as f64 >= MIN_ROW_RATIO * expected_row_count;
        let has_latest_trade_date = latest_date_in_data
            .map(|latest| latest >= latest_known)
            .unwrap_or(false);
        let gaps_acceptable = gap_count as f64 <= MAX_GAP_RATIO * expected_row_count;

        let mut reason_codes = Vec::new();
        if !has_enough_rows {
            reason_codes.push(reason::ROW_COUNT.to_string());
        }
        if !has_latest_trade_date {
            reason_codes.push(reason::STALE_LATEST_DATE.to_string());
        }
        if !gaps_acceptable {
            reason_codes.push(reason::GAP_COUNT.to_string());
        }

        let verdict = CompletenessVerdict {
            is_complete: has_enough_rows && has_latest_trade_date && gaps_acceptable,
            row_count,
            expected_row_count,
            latest_date_in_data,
            latest_known_trade_date: latest_known,
            gap_count,
            reason_codes,
        };

        debug!(
            complete = verdict.is_complete,
            rows = verdict.row_count,
            expected = verdict.expected_row_count,
            gaps = verdict.gap_count,
            reasons = ?verdict.reason_codes,
            "Completeness verdict"
        );

        verdict
    }
}
