//! Provider configuration store
//!
//! Descriptors are read fresh on every request so admin changes (enable,
//! disable, re-prioritize) take effect immediately. Any caching layered on
//! top of a store implementation must declare its staleness bound
//! explicitly; none is applied here.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::models::{DataKind, Market};

/// Configuration entry describing one upstream provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Stable provider id ("tushare", "akshare", ...)
    pub id: String,
    /// Markets this provider covers
    pub markets: Vec<Market>,
    /// Disabled providers are never attempted
    pub enabled: bool,
    /// Higher wins; ties broken by configuration array order
    pub priority: i32,
    /// Data kinds this provider can serve
    pub capabilities: Vec<DataKind>,
    /// Requests per minute allowed against this provider (0 = unlimited)
    #[serde(default)]
    pub rate_limit_per_minute: u32,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<String>, markets: Vec<Market>, priority: i32) -> Self {
        Self {
            id: id.into(),
            markets,
            enabled: true,
            priority,
            capabilities: vec![
                DataKind::Historical,
                DataKind::Quote,
                DataKind::Fundamentals,
                DataKind::News,
            ],
            rate_limit_per_minute: 0,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<DataKind>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    pub fn covers(&self, market: Market) -> bool {
        self.markets.contains(&market)
    }

    pub fn supports(&self, kind: DataKind) -> bool {
        self.capabilities.contains(&kind)
    }
}

/// Source of provider descriptors, read fresh per request
pub trait ProviderConfigStore: Send + Sync {
    /// All descriptors configured for a market, in configuration order.
    /// Filtering and sorting belong to the priority resolver, not the store.
    fn read_provider_config(&self, market: Market) -> Result<Vec<ProviderDescriptor>>;
}

/// In-process configuration store with live mutation support
///
/// Backs the same always-fresh contract a database-backed store would:
/// every read sees the latest admin change.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    descriptors: RwLock<Vec<ProviderDescriptor>>,
}

impl InMemoryConfigStore {
    pub fn new(descriptors: Vec<ProviderDescriptor>) -> Self {
        Self {
            descriptors: RwLock::new(descriptors),
        }
    }

    /// Parse descriptors from a JSON array (admin config file shape)
    pub fn from_json(json: &str) -> Result<Self> {
        let descriptors: Vec<ProviderDescriptor> = serde_json::from_str(json)?;
        Ok(Self::new(descriptors))
    }

    /// Replace the full descriptor list
    pub fn replace(&self, descriptors: Vec<ProviderDescriptor>) {
        *self.descriptors.write().expect("config lock poisoned") = descriptors;
    }

    /// Enable or disable one provider; returns false when the id is unknown
    pub fn set_enabled(&self, provider_id: &str, enabled: bool) -> bool {
        let mut descriptors = self.descriptors.write().expect("config lock poisoned");
        match descriptors.iter_mut().find(|d| d.id == provider_id) {
            Some(descriptor) => {
                descriptor.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Update one provider's priority weight; returns false when unknown
    pub fn set_priority(&self, provider_id: &str, priority: i32) -> bool {
        let mut descriptors = self.descriptors.write().expect("config lock poisoned");
        match descriptors.iter_mut().find(|d| d.id == provider_id) {
            Some(descriptor) => {
                descriptor.priority = priority;
                true
            }
            None => false,
        }
    }
}

impl ProviderConfigStore for InMemoryConfigStore {
    fn read_provider_config(&self, market: Market) -> Result<Vec<ProviderDescriptor>> {
        let descriptors = self
            .descriptors
            .read()
            .map_err(|_| DataError::Configuration("config store lock poisoned".to_string()))?;
        Ok(descriptors
            .iter()
            .filter(|d| d.covers(market))
            .cloned()
            .collect())
    }
}
