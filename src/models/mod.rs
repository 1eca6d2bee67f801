mod bar;
mod frame;
mod request;
pub mod indicators;

pub use bar::{Fundamentals, NewsItem, Quote, StandardBar};
pub use frame::{cell_as_f64, cell_as_str, RawFrame};
pub use request::{DataKind, DataRequest, DateRange, Market, Period};

/// Standardized historical series for a single symbol
pub type BarSeries = Vec<StandardBar>;
