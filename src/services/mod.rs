pub mod cache;
pub mod calendar;
pub mod completeness;
pub mod config;
pub mod orchestrator;
pub mod priority;
pub mod rate_limit;
pub mod registry;
pub mod standardizer;

pub use cache::{CacheEntry, CacheStore, CacheTier, SqliteCacheStore, LEGACY_PROVIDER_ID};
pub use calendar::{FixedCalendar, TradingCalendar, WeekdayCalendar};
pub use completeness::{CompletenessChecker, CompletenessVerdict};
pub use config::{InMemoryConfigStore, ProviderConfigStore, ProviderDescriptor};
pub use orchestrator::{
    FetchOrchestrator, HistoricalFetch, KindFetch, OrchestratorOptions, Origin,
};
pub use priority::PriorityResolver;
pub use rate_limit::SharedRateLimiter;
pub use registry::{MarketDataProvider, ProviderError, ProviderRegistry};
pub use standardizer::Standardizer;
