//! Dynamic provider priority resolution
//!
//! Computes the fallback chain for one request from configuration read
//! fresh at call time. Disabled, market-inapplicable and capability-lacking
//! descriptors never appear in the output; ordering is descending priority
//! weight with configuration array order breaking ties.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::constants::default_order;
use crate::error::{DataError, Result};
use crate::models::{DataKind, Market};
use crate::services::config::{ProviderConfigStore, ProviderDescriptor};

pub struct PriorityResolver {
    config: Arc<dyn ProviderConfigStore>,
}

impl PriorityResolver {
    pub fn new(config: Arc<dyn ProviderConfigStore>) -> Self {
        Self { config }
    }

    /// Ordered candidate list for one request.
    ///
    /// A failed or empty configuration lookup degrades to the hardcoded
    /// per-market default order instead of failing the request. A non-empty
    /// configuration in which nothing is enabled/applicable is an explicit
    /// admin decision and fails fast with `Configuration`.
    pub fn resolve(&self, market: Market, kind: DataKind) -> Result<Vec<ProviderDescriptor>> {
        let configured = match self.config.read_provider_config(market) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                warn!(
                    market = %market,
                    error = %e,
                    "Provider config lookup failed, using default order"
                );
                return Ok(Self::default_candidates(market));
            }
        };

        if configured.is_empty() {
            debug!(market = %market, "No providers configured, using default order");
            return Ok(Self::default_candidates(market));
        }

        let mut candidates: Vec<ProviderDescriptor> = configured
            .into_iter()
            .filter(|d| d.enabled && d.covers(market) && d.supports(kind))
            .collect();

        if candidates.is_empty() {
            return Err(DataError::Configuration(format!(
                "no enabled provider supports {} for market {}",
                kind.as_str(),
                market
            )));
        }

        // Stable sort: equal priorities keep configuration array order
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

        debug!(
            market = %market,
            kind = kind.as_str(),
            order = ?candidates.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            "Resolved provider order"
        );

        Ok(candidates)
    }

    /// Hardcoded per-market fallback order (graceful degradation path)
    fn default_candidates(market: Market) -> Vec<ProviderDescriptor> {
        let ids = match market {
            Market::CnA => default_order::CN_A,
            Market::Hk => default_order::HK,
            Market::Us => default_order::US,
        };

        ids.iter()
            .enumerate()
            .map(|(index, id)| {
                ProviderDescriptor::new(*id, vec![market], (ids.len() - index) as i32)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::config::InMemoryConfigStore;

    fn descriptor(id: &str, priority: i32, enabled: bool) -> ProviderDescriptor {
        let mut d = ProviderDescriptor::new(id, vec![Market::CnA], priority);
        d.enabled = enabled;
        d
    }

    #[test]
    fn test_orders_by_descending_priority() {
        let store = Arc::new(InMemoryConfigStore::new(vec![
            descriptor("baostock", 10, true),
            descriptor("tushare", 100, true),
            descriptor("akshare", 50, true),
        ]));
        let resolver = PriorityResolver::new(store);

        let order = resolver.resolve(Market::CnA, DataKind::Historical).unwrap();
        let ids: Vec<&str> = order.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["tushare", "akshare", "baostock"]);
    }

    #[test]
    fn test_ties_keep_config_order() {
        let store = Arc::new(InMemoryConfigStore::new(vec![
            descriptor("akshare", 50, true),
            descriptor("baostock", 50, true),
            descriptor("tdx", 50, true),
        ]));
        let resolver = PriorityResolver::new(store);

        let order = resolver.resolve(Market::CnA, DataKind::Historical).unwrap();
        let ids: Vec<&str> = order.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["akshare", "baostock", "tdx"]);
    }

    #[test]
    fn test_set_priority_reorders_next_resolve() {
        let store = Arc::new(InMemoryConfigStore::new(vec![
            descriptor("tushare", 100, true),
            descriptor("baostock", 10, true),
        ]));
        let resolver = PriorityResolver::new(store.clone() as Arc<dyn ProviderConfigStore>);

        let before = resolver.resolve(Market::CnA, DataKind::Historical).unwrap();
        assert_eq!(before[0].id, "tushare");

        // Live admin change: no resolver rebuild needed
        assert!(store.set_priority("baostock", 200));
        let after = resolver.resolve(Market::CnA, DataKind::Historical).unwrap();
        assert_eq!(after[0].id, "baostock");
        assert_eq!(after[1].id, "tushare");
    }

    #[test]
    fn test_disabled_providers_excluded() {
        let store = Arc::new(InMemoryConfigStore::new(vec![
            descriptor("tushare", 100, false),
            descriptor("akshare", 50, true),
        ]));
        let resolver = PriorityResolver::new(store);

        let order = resolver.resolve(Market::CnA, DataKind::Historical).unwrap();
        let ids: Vec<&str> = order.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["akshare"]);
    }

    #[test]
    fn test_all_disabled_is_configuration_error() {
        let store = Arc::new(InMemoryConfigStore::new(vec![
            descriptor("tushare", 100, false),
            descriptor("akshare", 50, false),
        ]));
        let resolver = PriorityResolver::new(store);

        let err = resolver
            .resolve(Market::CnA, DataKind::Historical)
            .unwrap_err();
        assert!(matches!(err, DataError::Configuration(_)));
    }

    #[test]
    fn test_empty_config_uses_default_order() {
        let store = Arc::new(InMemoryConfigStore::new(Vec::new()));
        let resolver = PriorityResolver::new(store);

        let order = resolver.resolve(Market::CnA, DataKind::Historical).unwrap();
        let ids: Vec<&str> = order.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, default_order::CN_A.to_vec());

        let hk = resolver.resolve(Market::Hk, DataKind::Quote).unwrap();
        assert_eq!(hk[0].id, "akshare");
    }

    #[test]
    fn test_capability_filter() {
        let mut quote_only = descriptor("tushare", 100, true);
        quote_only.capabilities = vec![DataKind::Quote];
        let store = Arc::new(InMemoryConfigStore::new(vec![
            quote_only,
            descriptor("akshare", 50, true),
        ]));
        let resolver = PriorityResolver::new(store);

        let order = resolver.resolve(Market::CnA, DataKind::Historical).unwrap();
        let ids: Vec<&str> = order.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["akshare"]);
    }
}
