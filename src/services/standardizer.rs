//! Payload standardization
//!
//! Maps provider-specific column names (localized and English variants)
//! onto the canonical bar schema and augments the series with technical
//! indicators. Every provider's output funnels through here so the rest of
//! the system only ever sees [`StandardBar`] rows.

use chrono::NaiveDate;
use tracing::warn;

use crate::error::{DataError, Result};
use crate::models::indicators::{bollinger, macd, rsi_simple, rsi_smoothed, sma};
use crate::models::{cell_as_f64, cell_as_str, Fundamentals, Quote, RawFrame, StandardBar};

/// Column aliases for the canonical schema. First match wins; ASCII names
/// are matched case-insensitively.
pub const DATE_ALIASES: &[&str] = &["日期", "date", "trade_date", "day", "time"];
pub const OPEN_ALIASES: &[&str] = &["开盘", "open"];
pub const HIGH_ALIASES: &[&str] = &["最高", "high"];
pub const LOW_ALIASES: &[&str] = &["最低", "low"];
pub const CLOSE_ALIASES: &[&str] = &["收盘", "close"];
pub const VOLUME_ALIASES: &[&str] = &["成交量", "volume", "vol"];
pub const AMOUNT_ALIASES: &[&str] = &["成交额", "amount", "turnover"];
pub const PCT_CHANGE_ALIASES: &[&str] = &["涨跌幅", "pct_chg", "change_percent"];

const PRICE_ALIASES: &[&str] = &["最新价", "price", "current", "close", "收盘"];
const PREV_CLOSE_ALIASES: &[&str] = &["昨收", "pre_close", "prev_close"];
const NAME_ALIASES: &[&str] = &["名称", "name", "company_name"];
const PE_ALIASES: &[&str] = &["市盈率", "pe", "pe_ttm"];
const PB_ALIASES: &[&str] = &["市净率", "pb"];
const ROE_ALIASES: &[&str] = &["净资产收益率", "roe"];
const EPS_ALIASES: &[&str] = &["每股收益", "eps"];
const MARKET_CAP_ALIASES: &[&str] = &["总市值", "market_cap", "total_mv"];
const REVENUE_ALIASES: &[&str] = &["营业收入", "revenue", "total_revenue"];
const NET_PROFIT_ALIASES: &[&str] = &["净利润", "net_profit", "net_income"];

/// Parse a provider date cell. Accepts "YYYY-MM-DD", "YYYY/MM/DD",
/// "YYYYMMDD" and datetime strings with a space or 'T' separator.
pub fn parse_date_loose(raw: &str) -> Option<NaiveDate> {
    let date_part = raw
        .trim()
        .split(|c| c == ' ' || c == 'T')
        .next()
        .unwrap_or(raw);

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y/%m/%d"))
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y%m%d"))
        .ok()
}

pub struct Standardizer;

impl Standardizer {
    /// Normalize a raw historical frame into canonical bars, sorted
    /// ascending by date, with indicators computed.
    ///
    /// Rows with unparseable dates or prices are dropped with a warning;
    /// an entirely unusable frame is a parse error.
    pub fn standardize_bars(frame: &RawFrame, symbol: &str) -> Result<Vec<StandardBar>> {
        let date_col = frame
            .find_column(DATE_ALIASES)
            .ok_or_else(|| DataError::Parse(format!("no date column in {:?}", frame.columns)))?;
        let open_col = frame.find_column(OPEN_ALIASES);
        let high_col = frame.find_column(HIGH_ALIASES);
        let low_col = frame.find_column(LOW_ALIASES);
        let close_col = frame
            .find_column(CLOSE_ALIASES)
            .ok_or_else(|| DataError::Parse(format!("no close column in {:?}", frame.columns)))?;
        let volume_col = frame.find_column(VOLUME_ALIASES);
        let amount_col = frame.find_column(AMOUNT_ALIASES);
        let pct_col = frame.find_column(PCT_CHANGE_ALIASES);

        let mut bars = Vec::with_capacity(frame.row_count());
        let mut dropped = 0usize;

        for row in &frame.rows {
            let date = row
                .get(date_col)
                .and_then(|c| cell_as_str(c))
                .and_then(parse_date_loose);
            let close = row.get(close_col).and_then(cell_as_f64);

            let (date, close) = match (date, close) {
                (Some(date), Some(close)) => (date, close),
                _ => {
                    dropped += 1;
                    continue;
                }
            };

            let field = |col: Option<usize>| col.and_then(|c| row.get(c)).and_then(cell_as_f64);

            let mut bar = StandardBar::new(
                date,
                symbol.to_string(),
                field(open_col).unwrap_or(close),
                field(high_col).unwrap_or(close),
                field(low_col).unwrap_or(close),
                close,
                field(volume_col).unwrap_or(0.0),
            );
            bar.amount = field(amount_col);
            bar.pct_change = field(pct_col);
            bars.push(bar);
        }

        if dropped > 0 {
            warn!(symbol, dropped, "Dropped unparseable rows during standardization");
        }
        if bars.is_empty() {
            return Err(DataError::Parse(format!(
                "no usable rows for {} out of {}",
                symbol,
                frame.row_count()
            )));
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);

        Self::derive_pct_change(&mut bars);
        Self::augment_indicators(&mut bars);

        Ok(bars)
    }

    /// Fill in close-to-close percentage change where the provider omitted it
    fn derive_pct_change(bars: &mut [StandardBar]) {
        for i in 1..bars.len() {
            if bars[i].pct_change.is_none() {
                let prev_close = bars[i - 1].close;
                if prev_close != 0.0 {
                    bars[i].pct_change = Some((bars[i].close - prev_close) / prev_close * 100.0);
                }
            }
        }
    }

    /// Compute SMA/MACD/RSI (both variants)/Bollinger over the series.
    /// Positions inside an indicator's warm-up window stay `None`.
    fn augment_indicators(bars: &mut [StandardBar]) {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let ma5 = sma(&closes, 5);
        let ma10 = sma(&closes, 10);
        let ma20 = sma(&closes, 20);
        let ma60 = sma(&closes, 60);
        let (dif, dea, hist) = macd(&closes);
        let rsi6 = rsi_smoothed(&closes, 6);
        let rsi12 = rsi_smoothed(&closes, 12);
        let rsi24 = rsi_smoothed(&closes, 24);
        let rsi14 = rsi_simple(&closes, 14);
        let (boll_upper, boll_mid, boll_lower) = bollinger(&closes, 20, 2.0);

        let windowed = |values: &[f64], i: usize, period: usize| {
            if i + 1 >= period {
                Some(values[i])
            } else {
                None
            }
        };

        for (i, bar) in bars.iter_mut().enumerate() {
            bar.ma5 = windowed(&ma5, i, 5);
            bar.ma10 = windowed(&ma10, i, 10);
            bar.ma20 = windowed(&ma20, i, 20);
            bar.ma60 = windowed(&ma60, i, 60);

            bar.macd_dif = Some(dif[i]);
            bar.macd_dea = Some(dea[i]);
            bar.macd_hist = Some(hist[i]);

            // Exponentially-smoothed RSI is defined from the first change
            bar.rsi6 = windowed(&rsi6, i, 2);
            bar.rsi12 = windowed(&rsi12, i, 2);
            bar.rsi24 = windowed(&rsi24, i, 2);
            // Conventional RSI14 needs a full window of changes
            bar.rsi14 = windowed(&rsi14, i, 15);

            bar.boll_upper = windowed(&boll_upper, i, 20);
            bar.boll_mid = windowed(&boll_mid, i, 20);
            bar.boll_lower = windowed(&boll_lower, i, 20);
        }
    }

    /// Normalize a single-row quote frame
    pub fn standardize_quote(frame: &RawFrame, symbol: &str) -> Result<Quote> {
        let row = frame
            .rows
            .first()
            .ok_or_else(|| DataError::Parse(format!("empty quote payload for {}", symbol)))?;

        let field = |aliases: &[&str]| {
            frame
                .find_column(aliases)
                .and_then(|c| row.get(c))
                .and_then(cell_as_f64)
        };

        let price = field(PRICE_ALIASES)
            .ok_or_else(|| DataError::Parse(format!("quote for {} has no price column", symbol)))?;

        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            prev_close: field(PREV_CLOSE_ALIASES),
            pct_change: field(PCT_CHANGE_ALIASES),
            volume: field(VOLUME_ALIASES),
            as_of: chrono::Utc::now(),
        })
    }

    /// Normalize a single-row fundamentals frame
    pub fn standardize_fundamentals(frame: &RawFrame, symbol: &str) -> Result<Fundamentals> {
        let row = frame.rows.first().ok_or_else(|| {
            DataError::Parse(format!("empty fundamentals payload for {}", symbol))
        })?;

        let field = |aliases: &[&str]| {
            frame
                .find_column(aliases)
                .and_then(|c| row.get(c))
                .and_then(cell_as_f64)
        };
        let name = frame
            .find_column(NAME_ALIASES)
            .and_then(|c| row.get(c))
            .and_then(|v| cell_as_str(v))
            .map(String::from);

        Ok(Fundamentals {
            symbol: symbol.to_string(),
            name,
            pe: field(PE_ALIASES),
            pb: field(PB_ALIASES),
            roe: field(ROE_ALIASES),
            eps: field(EPS_ALIASES),
            market_cap: field(MARKET_CAP_ALIASES),
            revenue: field(REVENUE_ALIASES),
            net_profit: field(NET_PROFIT_ALIASES),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chinese_frame() -> RawFrame {
        let mut frame = RawFrame::new(
            ["日期", "开盘", "最高", "最低", "收盘", "成交量", "成交额"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for (date, open, high, low, close, volume) in [
            ("2024-01-02", 1685.0, 1702.0, 1680.0, 1695.0, 25000.0),
            ("2024-01-03", 1695.0, 1711.0, 1690.0, 1701.0, 31000.0),
            ("2024-01-04", 1701.0, 1705.0, 1688.0, 1692.0, 28000.0),
        ] {
            frame.push_row(vec![
                json!(date),
                json!(open),
                json!(high),
                json!(low),
                json!(close),
                json!(volume),
                json!(volume * close),
            ]);
        }
        frame
    }

    #[test]
    fn test_chinese_columns_mapped() {
        let bars = Standardizer::standardize_bars(&chinese_frame(), "600519").unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].open, 1685.0);
        assert_eq!(bars[2].close, 1692.0);
        assert!(bars[0].amount.is_some());
    }

    #[test]
    fn test_pct_change_derived_when_absent() {
        let bars = Standardizer::standardize_bars(&chinese_frame(), "600519").unwrap();
        assert!(bars[0].pct_change.is_none()); // no previous close
        let expected = (1701.0 - 1695.0) / 1695.0 * 100.0;
        assert!((bars[1].pct_change.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rows_sorted_and_deduped() {
        let mut frame = RawFrame::new(vec!["date".to_string(), "close".to_string()]);
        frame.push_row(vec![json!("2024-01-03"), json!(11.0)]);
        frame.push_row(vec![json!("2024-01-02"), json!(10.0)]);
        frame.push_row(vec![json!("2024-01-03"), json!(11.5)]);

        let bars = Standardizer::standardize_bars(&frame, "600519").unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].date < bars[1].date);
    }

    #[test]
    fn test_both_rsi_variants_present_and_distinct() {
        let mut frame = RawFrame::new(vec!["date".to_string(), "close".to_string()]);
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        for i in 0..80 {
            let date = start + chrono::Duration::days(i);
            let close = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1;
            frame.push_row(vec![json!(date.format("%Y-%m-%d").to_string()), json!(close)]);
        }

        let bars = Standardizer::standardize_bars(&frame, "AAPL").unwrap();
        let last = bars.last().unwrap();
        let rsi12 = last.rsi12.unwrap();
        let rsi14 = last.rsi14.unwrap();
        assert!((rsi12 - rsi14).abs() > 1e-6);
        assert!(last.rsi6.is_some());
        assert!(last.rsi24.is_some());
    }

    #[test]
    fn test_indicator_warmup_is_none() {
        let bars = Standardizer::standardize_bars(&chinese_frame(), "600519").unwrap();
        assert!(bars[0].ma5.is_none());
        assert!(bars[0].boll_mid.is_none());
        assert!(bars[0].rsi14.is_none());
        assert!(bars[0].macd_dif.is_some()); // EMA runs from the first bar
    }

    #[test]
    fn test_quote_standardization() {
        let mut frame = RawFrame::new(vec![
            "最新价".to_string(),
            "昨收".to_string(),
            "涨跌幅".to_string(),
        ]);
        frame.push_row(vec![json!(1695.5), json!(1688.0), json!("0.44%")]);

        let quote = Standardizer::standardize_quote(&frame, "600519").unwrap();
        assert_eq!(quote.price, 1695.5);
        assert_eq!(quote.prev_close, Some(1688.0));
        assert!((quote.pct_change.unwrap() - 0.44).abs() < 1e-9);
    }

    #[test]
    fn test_parse_date_loose_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2);
        assert_eq!(parse_date_loose("2024-01-02"), expected);
        assert_eq!(parse_date_loose("2024/01/02"), expected);
        assert_eq!(parse_date_loose("20240102"), expected);
        assert_eq!(parse_date_loose("2024-01-02 15:00:00"), expected);
        assert_eq!(parse_date_loose("2024-01-02T15:00:00"), expected);
        assert_eq!(parse_date_loose("garbage"), None);
    }
}
