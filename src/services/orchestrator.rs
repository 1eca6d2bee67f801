//! Request-handling state machine
//!
//! Composes the priority resolver, cache tier, completeness checker and
//! standardizer into the central data-source manager:
//!
//! ```text
//! INIT -> TRY_CACHE -> TRY_PROVIDER[i] -> VALIDATE -> SUCCESS
//!                                   |         |
//!                                   |         +-> NEXT_PROVIDER (quality reject,
//!                                   |             best candidate retained)
//!                                   +-> NEXT_PROVIDER (error recorded)
//!                      ... -> DEGRADED_SUCCESS | ALL_FAILED
//! ```
//!
//! Providers are tried strictly sequentially in priority order; no
//! speculative fan-out, so quota on rate-limited upstreams is never burned
//! on providers that turn out unnecessary. Each attempt runs on a bounded
//! blocking worker pool under the orchestrator's own timeout, tighter than
//! anything inside the provider's client. Within one request a provider is
//! never retried; the unit of retry is "advance to the next provider".
//!
//! Cancelling the request future abandons in-flight attempts: the cache
//! write happens after validation in the same task, so a cancelled request
//! can never persist partial or unvalidated data.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_BLOCKING_WORKERS};
use crate::error::{DataError, ProviderAttempt, Result};
use crate::models::{
    BarSeries, DataKind, DataRequest, Fundamentals, NewsItem, Quote, RawFrame,
};
use crate::services::cache::{CacheStore, CacheTier};
use crate::services::calendar::TradingCalendar;
use crate::services::completeness::CompletenessChecker;
use crate::services::config::{ProviderConfigStore, ProviderDescriptor};
use crate::services::priority::PriorityResolver;
use crate::services::registry::{MarketDataProvider, ProviderRegistry};
use crate::services::standardizer::Standardizer;

/// Where a returned dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Served from the cache tier, trusted as validated at write time
    Cache,
    /// Fresh fetch that passed the completeness check
    Live,
    /// Best low-quality candidate after exhausting all providers
    Degraded,
}

/// Terminal result of a historical request
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalFetch {
    pub provider_id: String,
    pub origin: Origin,
    pub bars: BarSeries,
    pub fetched_at: DateTime<Utc>,
    /// Failed or quality-rejected attempts that preceded this result
    #[serde(skip_serializing)]
    pub attempts: Vec<ProviderAttempt>,
}

/// Terminal result of a quote/fundamentals/news request
#[derive(Debug, Clone)]
pub struct KindFetch<T> {
    pub provider_id: String,
    pub payload: T,
    pub attempts: Vec<ProviderAttempt>,
}

/// Orchestrator tuning knobs
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Per-attempt deadline enforced on top of the provider client's own
    pub attempt_timeout: Duration,
    /// Width of the shared blocking worker pool
    pub blocking_workers: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            blocking_workers: DEFAULT_BLOCKING_WORKERS,
        }
    }
}

pub struct FetchOrchestrator {
    registry: Arc<ProviderRegistry>,
    resolver: PriorityResolver,
    cache: CacheTier,
    checker: CompletenessChecker,
    blocking_slots: Arc<Semaphore>,
    attempt_timeout: Duration,
}

impl FetchOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        config: Arc<dyn ProviderConfigStore>,
        cache_store: Arc<dyn CacheStore>,
        calendar: Arc<dyn TradingCalendar>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            registry,
            resolver: PriorityResolver::new(config),
            cache: CacheTier::new(cache_store),
            checker: CompletenessChecker::new(calendar),
            blocking_slots: Arc::new(Semaphore::new(options.blocking_workers)),
            attempt_timeout: options.attempt_timeout,
        }
    }

    /// Historical bars for a date-ranged request
    pub async fn fetch_historical(&self, request: &DataRequest) -> Result<HistoricalFetch> {
        if request.kind != DataKind::Historical {
            return Err(DataError::InvalidInput(format!(
                "fetch_historical called with kind {}",
                request.kind.as_str()
            )));
        }
        let range = request.range.ok_or_else(|| {
            DataError::InvalidInput("historical request needs a date range".to_string())
        })?;

        let candidates = self.resolver.resolve(request.market, DataKind::Historical)?;
        let candidate_ids: Vec<String> = candidates.iter().map(|d| d.id.clone()).collect();

        // TRY_CACHE: a hit short-circuits the chain and is not re-validated
        if let Some(entry) = self
            .cache
            .get_first(&request.symbol, request.period, &candidate_ids, range)
            .await?
        {
            info!(
                symbol = request.symbol.as_str(),
                provider = entry.provider_id.as_str(),
                "Serving historical data from cache"
            );
            return Ok(HistoricalFetch {
                provider_id: entry.provider_id,
                origin: Origin::Cache,
                bars: entry.payload,
                fetched_at: entry.stored_at,
                attempts: Vec::new(),
            });
        }

        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        // "Best" rejected candidate means highest priority, not most rows:
        // only the first quality-rejected frame is ever retained
        let mut best_degraded: Option<(String, RawFrame)> = None;

        for descriptor in &candidates {
            let symbol = request.symbol.clone();
            let (start, end, period) = (range.start, range.end, request.period);

            let outcome = self
                .attempt(descriptor, move |provider| {
                    provider.fetch_historical(&symbol, start, end, period)
                })
                .await;

            let frame = match outcome {
                Ok(frame) => frame,
                Err(error) => {
                    warn!(
                        symbol = request.symbol.as_str(),
                        provider = descriptor.id.as_str(),
                        error = %error,
                        "Provider attempt failed, advancing to next provider"
                    );
                    attempts.push(ProviderAttempt::from_error(&descriptor.id, &error));
                    continue;
                }
            };

            // VALIDATE
            let verdict = self.checker.check(&frame, range, request.market);
            if verdict.is_complete {
                let bars = match Standardizer::standardize_bars(&frame, &request.symbol) {
                    Ok(bars) => bars,
                    Err(e) => {
                        attempts.push(ProviderAttempt::from_error(&descriptor.id, &e));
                        continue;
                    }
                };

                // Write-through, tagged with the winning provider
                if let Err(e) = self
                    .cache
                    .write_through(&request.symbol, request.period, &descriptor.id, range, &bars)
                    .await
                {
                    warn!(
                        symbol = request.symbol.as_str(),
                        error = %e,
                        "Cache write-through failed, serving live result anyway"
                    );
                }

                info!(
                    symbol = request.symbol.as_str(),
                    provider = descriptor.id.as_str(),
                    rows = bars.len(),
                    prior_attempts = attempts.len(),
                    "Historical fetch succeeded"
                );
                return Ok(HistoricalFetch {
                    provider_id: descriptor.id.clone(),
                    origin: Origin::Live,
                    bars,
                    fetched_at: Utc::now(),
                    attempts,
                });
            }

            // Quality reject: keep the highest-priority low-quality result
            debug!(
                symbol = request.symbol.as_str(),
                provider = descriptor.id.as_str(),
                reasons = ?verdict.reason_codes,
                "Completeness check rejected payload"
            );
            let quality = DataError::DataQuality {
                provider: descriptor.id.clone(),
                reasons: verdict.reason_codes,
            };
            attempts.push(ProviderAttempt::from_error(&descriptor.id, &quality));
            if best_degraded.is_none() {
                best_degraded = Some((descriptor.id.clone(), frame));
            }
        }

        // DEGRADED_SUCCESS: never written to the cache
        if let Some((provider_id, frame)) = best_degraded {
            if let Ok(bars) = Standardizer::standardize_bars(&frame, &request.symbol) {
                warn!(
                    symbol = request.symbol.as_str(),
                    provider = provider_id.as_str(),
                    "Returning degraded result after exhausting all providers"
                );
                return Ok(HistoricalFetch {
                    provider_id,
                    origin: Origin::Degraded,
                    bars,
                    fetched_at: Utc::now(),
                    attempts,
                });
            }
        }

        Err(DataError::AllProvidersExhausted {
            symbol: request.symbol.clone(),
            attempts,
        })
    }

    /// Latest quote via the same fallback chain (no caching, no range check)
    pub async fn fetch_quote(&self, request: &DataRequest) -> Result<KindFetch<Quote>> {
        let candidates = self.resolver.resolve(request.market, DataKind::Quote)?;
        let mut attempts = Vec::new();

        for descriptor in &candidates {
            let symbol = request.symbol.clone();
            let outcome = self
                .attempt(descriptor, move |provider| provider.fetch_quote(&symbol))
                .await;

            match outcome {
                Ok(frame) => match Self::validate_snapshot(&frame)
                    .and_then(|_| Standardizer::standardize_quote(&frame, &request.symbol))
                {
                    Ok(quote) => {
                        return Ok(KindFetch {
                            provider_id: descriptor.id.clone(),
                            payload: quote,
                            attempts,
                        })
                    }
                    Err(e) => attempts.push(ProviderAttempt::from_error(&descriptor.id, &e)),
                },
                Err(error) => attempts.push(ProviderAttempt::from_error(&descriptor.id, &error)),
            }
        }

        Err(DataError::AllProvidersExhausted {
            symbol: request.symbol.clone(),
            attempts,
        })
    }

    /// Fundamental metrics via the fallback chain
    pub async fn fetch_fundamentals(
        &self,
        request: &DataRequest,
    ) -> Result<KindFetch<Fundamentals>> {
        let candidates = self
            .resolver
            .resolve(request.market, DataKind::Fundamentals)?;
        let mut attempts = Vec::new();

        for descriptor in &candidates {
            let symbol = request.symbol.clone();
            let outcome = self
                .attempt(descriptor, move |provider| {
                    provider.fetch_fundamentals(&symbol)
                })
                .await;

            match outcome {
                Ok(frame) => match Self::validate_snapshot(&frame)
                    .and_then(|_| Standardizer::standardize_fundamentals(&frame, &request.symbol))
                {
                    Ok(fundamentals) => {
                        return Ok(KindFetch {
                            provider_id: descriptor.id.clone(),
                            payload: fundamentals,
                            attempts,
                        })
                    }
                    Err(e) => attempts.push(ProviderAttempt::from_error(&descriptor.id, &e)),
                },
                Err(error) => attempts.push(ProviderAttempt::from_error(&descriptor.id, &error)),
            }
        }

        Err(DataError::AllProvidersExhausted {
            symbol: request.symbol.clone(),
            attempts,
        })
    }

    /// Recent news via the fallback chain, truncated to `limit`
    pub async fn fetch_news(
        &self,
        request: &DataRequest,
        hours_back: u32,
        limit: usize,
    ) -> Result<KindFetch<Vec<NewsItem>>> {
        let candidates = self.resolver.resolve(request.market, DataKind::News)?;
        let mut attempts = Vec::new();

        for descriptor in &candidates {
            let symbol = request.symbol.clone();
            let outcome = self
                .attempt(descriptor, move |provider| {
                    provider.fetch_news(&symbol, hours_back, limit)
                })
                .await;

            match outcome {
                Ok(items) if !items.is_empty() => {
                    let mut items = items;
                    items.truncate(limit);
                    return Ok(KindFetch {
                        provider_id: descriptor.id.clone(),
                        payload: items,
                        attempts,
                    });
                }
                Ok(_) => attempts.push(ProviderAttempt {
                    provider_id: descriptor.id.clone(),
                    error: "no news returned".to_string(),
                    transient: false,
                }),
                Err(error) => attempts.push(ProviderAttempt::from_error(&descriptor.id, &error)),
            }
        }

        Err(DataError::AllProvidersExhausted {
            symbol: request.symbol.clone(),
            attempts,
        })
    }

    /// Snapshot payloads (quote/fundamentals) only need to be non-empty and
    /// free of a provider error marker
    fn validate_snapshot(frame: &RawFrame) -> Result<()> {
        if let Some(marker) = &frame.error_marker {
            return Err(DataError::Parse(format!("provider error marker: {}", marker)));
        }
        if frame.is_empty() {
            return Err(DataError::Parse("empty payload".to_string()));
        }
        Ok(())
    }

    /// Run one blocking provider call on the worker pool with rate limiting
    /// and the orchestrator's own timeout.
    ///
    /// The rate-limit slot is consumed before dispatch; the pool permit
    /// travels into the blocking task so a timed-out call keeps its worker
    /// occupied until the client actually returns. Failures are classified
    /// into the error taxonomy: timeouts and transient client errors become
    /// `ProviderTransient`, everything else `ProviderUnavailable`.
    async fn attempt<T, F>(
        &self,
        descriptor: &ProviderDescriptor,
        call: F,
    ) -> std::result::Result<T, DataError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MarketDataProvider) -> std::result::Result<T, crate::services::registry::ProviderError>
            + Send
            + 'static,
    {
        let provider = match self.registry.get(&descriptor.id) {
            Some(provider) => provider,
            None => {
                return Err(DataError::ProviderUnavailable {
                    provider: descriptor.id.clone(),
                    reason: "not registered".to_string(),
                })
            }
        };

        if let Some(limiter) = self.registry.limiter(&descriptor.id) {
            limiter.acquire().await;
        }

        let permit = self
            .blocking_slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DataError::ProviderUnavailable {
                provider: descriptor.id.clone(),
                reason: "worker pool closed".to_string(),
            })?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            call(provider.as_ref())
        });

        match timeout(self.attempt_timeout, handle).await {
            Err(_) => Err(DataError::ProviderTransient {
                provider: descriptor.id.clone(),
                reason: format!("timed out after {:?}", self.attempt_timeout),
            }),
            Ok(Err(join_error)) => Err(DataError::ProviderUnavailable {
                provider: descriptor.id.clone(),
                reason: format!("worker failed: {}", join_error),
            }),
            Ok(Ok(Err(provider_error))) if provider_error.is_transient() => {
                Err(DataError::ProviderTransient {
                    provider: descriptor.id.clone(),
                    reason: provider_error.to_string(),
                })
            }
            Ok(Ok(Err(provider_error))) => Err(DataError::ProviderUnavailable {
                provider: descriptor.id.clone(),
                reason: provider_error.to_string(),
            }),
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}
