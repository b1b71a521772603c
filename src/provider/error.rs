// Provider error types
//
// Every variant maps to a stable numeric code so failures can be reported
// the way platform key-store providers report them.

use std::path::PathBuf;

use thiserror::Error;

use super::KeySpec;
use crate::rsa::RsaError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("key store `{name}` does not exist")]
    StoreNotFound { name: String },

    #[error("key store `{name}` already exists")]
    StoreExists { name: String },

    #[error("provider `{name}` is not available")]
    ProviderMissing { name: String },

    #[error("invalid key store name `{name}`")]
    InvalidStoreName { name: String },

    #[error("no {spec} key pair in key store")]
    KeyNotFound { spec: KeySpec },

    #[error("unknown or released handle")]
    InvalidHandle,

    #[error("output buffer too small: {required} bytes required")]
    MoreData { required: usize },

    #[error("bad data length: max {max} bytes, got {actual}")]
    BadLength { max: usize, actual: usize },

    #[error("bad data: {0}")]
    BadData(String),

    #[error("unsupported flags: {0}")]
    BadFlags(&'static str),

    #[error("key store I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key store {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("RSA operation failed: {0}")]
    Crypto(#[from] RsaError),

    #[error("provider internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Numeric code identifying the failure class
    pub fn code(&self) -> u32 {
        match self {
            ProviderError::StoreNotFound { .. } => 0x8009_0016,
            ProviderError::StoreExists { .. } => 0x8009_000F,
            ProviderError::ProviderMissing { .. } => 0x8009_0019,
            ProviderError::InvalidStoreName { .. } => 0x8009_001F,
            ProviderError::KeyNotFound { .. } => 0x8009_000D,
            ProviderError::InvalidHandle => 0x8009_0003,
            ProviderError::MoreData { .. } => 0x0000_00EA,
            ProviderError::BadLength { .. } => 0x8009_0004,
            ProviderError::BadData(_) => 0x8009_0005,
            ProviderError::BadFlags(_) => 0x8009_0009,
            ProviderError::Io { .. } | ProviderError::Corrupt { .. } => 0x8009_0020,
            ProviderError::Crypto(_) => 0x8009_0005,
            ProviderError::Internal(_) => 0x8009_0020,
        }
    }

    /// True when the named key store is missing and may be created
    pub fn is_store_absent(&self) -> bool {
        matches!(self, ProviderError::StoreNotFound { .. })
    }

    /// True when the requested key pair is missing and may be generated
    pub fn is_key_absent(&self) -> bool {
        matches!(self, ProviderError::KeyNotFound { .. })
    }
}
