use thiserror::Error as ThisError;

/// One failed provider attempt, kept for the terminal error report.
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    /// Provider that was tried
    pub provider_id: String,
    /// Human-readable failure description
    pub error: String,
    /// Whether the failure looked transient (timeout, rate limit)
    pub transient: bool,
}

impl ProviderAttempt {
    /// Record a typed failure against the provider that produced it
    pub fn from_error(provider_id: impl Into<String>, error: &DataError) -> Self {
        Self {
            provider_id: provider_id.into(),
            error: error.to_string(),
            transient: error.is_transient(),
        }
    }
}

impl std::fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.error)
    }
}

#[derive(ThisError, Debug)]
pub enum DataError {
    /// Provider could not be reached or refused the connection/auth.
    /// Non-fatal: the fallback chain advances to the next provider.
    #[error("Provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Timeout or rate limit on a provider call. Non-fatal, flagged so a
    /// future request may retry this provider.
    #[error("Provider '{provider}' transient failure: {reason}")]
    ProviderTransient { provider: String, reason: String },

    /// Completeness check rejected the payload. Non-fatal: the result is
    /// retained as a degraded candidate while the chain continues.
    #[error("Provider '{provider}' returned low-quality data: {reasons:?}")]
    DataQuality {
        provider: String,
        reasons: Vec<String>,
    },

    /// No enabled, applicable providers for the request. Fails fast with no
    /// network calls.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Terminal failure: every candidate provider was attempted.
    #[error("All {} provider(s) exhausted for '{symbol}'", attempts.len())]
    AllProvidersExhausted {
        symbol: String,
        attempts: Vec<ProviderAttempt>,
    },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DataError {
    /// Transient failures (timeouts, rate limits) may pass on a future
    /// request; everything else indicates a provider that will keep failing.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::ProviderTransient { .. })
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        DataError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

// Alias for convenience
pub type Error = DataError;
