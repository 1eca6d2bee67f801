//! stockpool - multi-source market data aggregation
//!
//! Fetches historical bars, quotes, fundamentals, and news for CN A-share,
//! Hong Kong, and US equities from a prioritized chain of data providers.
//! A request resolves its candidate providers from live configuration,
//! probes the cache, then walks the chain highest priority first: each
//! response is validated for completeness, standardized into a common
//! schema with derived indicators, and written through to the cache.
//! Incomplete data falls back to the next provider, with the best
//! incomplete result kept as a last-resort degraded answer.

pub mod constants;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;

pub use error::{DataError, ProviderAttempt, Result};
pub use models::{
    BarSeries, DataKind, DataRequest, DateRange, Fundamentals, Market, NewsItem, Period, Quote,
    RawFrame, StandardBar,
};
pub use services::{
    CacheTier, CompletenessChecker, FetchOrchestrator, HistoricalFetch, KindFetch,
    MarketDataProvider, OrchestratorOptions, Origin, PriorityResolver, ProviderConfigStore,
    ProviderDescriptor, ProviderError, ProviderRegistry, SqliteCacheStore, Standardizer,
};
