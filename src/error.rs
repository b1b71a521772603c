// Probe error types
//
// Each fatal variant names the step that failed and carries the provider
// error (and so its code) as the source. Store and key absence are not
// errors here; the lifecycle manager handles them before they surface.

use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("opening key store `{store}` failed (code {:#010x}): {source}", .source.code())]
    StoreUnavailable {
        store: String,
        #[source]
        source: ProviderError,
    },

    #[error("fetching key-exchange key pair from `{store}` failed (code {:#010x}): {source}", .source.code())]
    KeyFetchFailed {
        store: String,
        #[source]
        source: ProviderError,
    },

    #[error("querying key parameter `{parameter}` failed (code {:#010x}): {source}", .source.code())]
    ParameterQueryFailed {
        parameter: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("encryption failed during {stage} (code {:#010x}): {source}", .source.code())]
    EncryptFailed {
        stage: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("decryption failed (code {:#010x}): {source}", .source.code())]
    DecryptFailed {
        #[source]
        source: ProviderError,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ProbeError {
    /// Underlying provider code, if the failure came from the provider
    pub fn code(&self) -> Option<u32> {
        match self {
            ProbeError::StoreUnavailable { source, .. }
            | ProbeError::KeyFetchFailed { source, .. }
            | ProbeError::ParameterQueryFailed { source, .. }
            | ProbeError::EncryptFailed { source, .. }
            | ProbeError::DecryptFailed { source } => Some(source.code()),
            ProbeError::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
