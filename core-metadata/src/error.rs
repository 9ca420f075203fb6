use bridge_traits::{BridgeError, Provider};
use core_cache::CacheError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(Provider),

    #[error("Fetch from {provider} failed: {message}")]
    FetchFailed { provider: Provider, message: String },

    #[error("Malformed response from {provider}: {message}")]
    ParseFailed { provider: Provider, message: String },

    #[error("Call to {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: Provider, timeout_ms: u64 },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl MetadataError {
    /// Attributes a collaborator failure to the provider that produced it.
    pub fn from_provider(provider: Provider, error: BridgeError) -> Self {
        match error {
            BridgeError::Parse(message) => Self::ParseFailed { provider, message },
            BridgeError::NotAvailable(_) => Self::ProviderUnavailable(provider),
            other => Self::FetchFailed {
                provider,
                message: other.to_string(),
            },
        }
    }
}

impl From<MetadataError> for BridgeError {
    fn from(error: MetadataError) -> Self {
        match error {
            MetadataError::Bridge(inner) => inner,
            MetadataError::ProviderUnavailable(provider) => {
                BridgeError::NotAvailable(provider.to_string())
            }
            MetadataError::Timeout { .. } => BridgeError::Timeout(error.to_string()),
            MetadataError::ParseFailed { .. } => BridgeError::Parse(error.to_string()),
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
