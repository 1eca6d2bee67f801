//! Provider capability interface and registry
//!
//! Upstream SDKs are blocking clients behind one polymorphic trait; the
//! registry maps provider ids from configuration onto implementations and
//! owns the per-provider rate limiter shared across requests. The registry
//! is built once at process start and passed into the orchestrator, which
//! keeps test doubles deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::models::{NewsItem, Period, RawFrame};
use crate::services::rate_limit::SharedRateLimiter;

/// Typed failure from a provider client call
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Connect or auth failure; the provider cannot serve anything now
    Unavailable(String),
    /// Network fault or upstream 5xx; likely to pass on a later request
    Network(String),
    /// Upstream throttled the call
    RateLimited,
    /// Response arrived but could not be interpreted
    InvalidResponse(String),
    /// Upstream answered with an empty dataset
    NoData,
    /// Provider cannot serve this capability at all
    Unsupported(String),
}

impl ProviderError {
    /// Transient failures are worth retrying on a future request;
    /// the rest indicate the provider is misconfigured or unsuitable.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::RateLimited)
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Unavailable(s) => write!(f, "unavailable: {}", s),
            ProviderError::Network(s) => write!(f, "network error: {}", s),
            ProviderError::RateLimited => write!(f, "rate limited"),
            ProviderError::InvalidResponse(s) => write!(f, "invalid response: {}", s),
            ProviderError::NoData => write!(f, "no data returned"),
            ProviderError::Unsupported(s) => write!(f, "unsupported capability: {}", s),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Capability interface implemented per upstream data source
///
/// Calls are blocking (third-party SDKs and plain HTTP clients); the
/// orchestrator dispatches them onto its worker pool and applies its own
/// timeout on top of whatever the client does internally.
pub trait MarketDataProvider: Send + Sync {
    /// Stable id matching the configuration descriptor
    fn id(&self) -> &str;

    /// Establish or verify connectivity; default is a no-op for clients
    /// that connect lazily per call
    fn connect(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.connect().is_ok()
    }

    /// Historical OHLCV bars over an inclusive date range
    fn fetch_historical(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        period: Period,
    ) -> Result<RawFrame, ProviderError>;

    /// Latest quote snapshot
    fn fetch_quote(&self, symbol: &str) -> Result<RawFrame, ProviderError>;

    /// Fundamental metrics
    fn fetch_fundamentals(&self, symbol: &str) -> Result<RawFrame, ProviderError>;

    /// Recent news, newest first, at most `limit` items
    fn fetch_news(
        &self,
        symbol: &str,
        hours_back: u32,
        limit: usize,
    ) -> Result<Vec<NewsItem>, ProviderError>;
}

struct RegistryEntry {
    provider: Arc<dyn MarketDataProvider>,
    limiter: Arc<SharedRateLimiter>,
}

/// Id -> implementation map, plus shared per-provider rate-limit state
#[derive(Default)]
pub struct ProviderRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider with its per-minute quota (0 = unlimited).
    /// Re-registering an id replaces the implementation and resets its
    /// rate-limit window.
    pub fn register(&mut self, provider: Arc<dyn MarketDataProvider>, rate_limit_per_minute: u32) {
        let id = provider.id().to_string();
        self.entries.insert(
            id,
            RegistryEntry {
                provider,
                limiter: Arc::new(SharedRateLimiter::new(rate_limit_per_minute)),
            },
        );
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn MarketDataProvider>> {
        self.entries.get(provider_id).map(|e| e.provider.clone())
    }

    pub fn limiter(&self, provider_id: &str) -> Option<Arc<SharedRateLimiter>> {
        self.entries.get(provider_id).map(|e| e.limiter.clone())
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.entries.contains_key(provider_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyProvider {
        id: String,
    }

    impl MarketDataProvider for DummyProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn fetch_historical(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
            _period: Period,
        ) -> Result<RawFrame, ProviderError> {
            Err(ProviderError::NoData)
        }

        fn fetch_quote(&self, _symbol: &str) -> Result<RawFrame, ProviderError> {
            Err(ProviderError::Unsupported("quote".to_string()))
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

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Arc::new(DummyProvider {
                id: "tushare".to_string(),
            }),
            60,
        );

        assert!(registry.contains("tushare"));
        assert!(registry.get("tushare").is_some());
        assert!(registry.limiter("tushare").is_some());
        assert!(registry.get("akshare").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Network("reset".to_string()).is_transient());
        assert!(!ProviderError::Unavailable("auth".to_string()).is_transient());
        assert!(!ProviderError::NoData.is_transient());
    }
}
