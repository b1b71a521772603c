// Probe configuration
// Defaults, optionally overlaid by a TOML file, then by environment
// variables with the `RSA_PAD_PROBE_` prefix. The CLI applies its flags last.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::provider::SOFTWARE_PROVIDER_NAME;
use crate::rsa::keygen::MIN_KEY_BITS;

/// Logical name of the key store the probe re-uses across runs
pub const DEFAULT_STORE_NAME: &str = "Test CryptDecrypt Key Container 2";

/// 1024-bit key: 128-byte blocks
pub const DEFAULT_KEY_BITS: u32 = 1024;

pub const DEFAULT_PUBLIC_EXPONENT: u64 = 65537;

const ENV_PREFIX: &str = "RSA_PAD_PROBE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {var} has invalid value `{value}`")]
    Env { var: String, value: String },

    #[error("{0}")]
    Invalid(String),
}

/// Probe settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Directory holding the software provider's key store files
    pub store_root: PathBuf,
    /// Key store name
    pub store_name: String,
    /// Provider the key store is opened under
    pub provider_name: String,
    /// Modulus size for newly generated key pairs
    pub key_bits: u32,
    /// Public exponent for newly generated key pairs
    pub public_exponent: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            provider_name: SOFTWARE_PROVIDER_NAME.to_string(),
            key_bits: DEFAULT_KEY_BITS,
            public_exponent: DEFAULT_PUBLIC_EXPONENT,
        }
    }
}

/// `<local data dir>/rsa-pad-probe/stores`, or `./.rsa-pad-probe` when there is none
pub fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("rsa-pad-probe").join("stores"))
        .unwrap_or_else(|| PathBuf::from(".rsa-pad-probe"))
}

impl ProbeConfig {
    /// Parse a TOML file; keys it omits keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `RSA_PAD_PROBE_*` variables from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| env::var(name).ok())
    }

    /// Overlay variables supplied by `lookup` (full variable name in, value out)
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{}{}", ENV_PREFIX, suffix);
            lookup(&name).map(|value| (name, value))
        };

        if let Some((_, root)) = var("STORE_ROOT") {
            self.store_root = PathBuf::from(root);
        }
        if let Some((_, name)) = var("STORE_NAME") {
            self.store_name = name;
        }
        if let Some((_, provider)) = var("PROVIDER_NAME") {
            self.provider_name = provider;
        }
        if let Some((name, bits)) = var("KEY_BITS") {
            self.key_bits = bits
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { var: name, value: bits })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_name.trim().is_empty() {
            return Err(ConfigError::Invalid("store name must not be empty".into()));
        }
        if self.key_bits < MIN_KEY_BITS || self.key_bits % 16 != 0 {
            return Err(ConfigError::Invalid(format!(
                "key size {} must be a multiple of 16 and at least {}",
                self.key_bits, MIN_KEY_BITS
            )));
        }
        if self.public_exponent < 3 || self.public_exponent % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "public exponent {} must be odd and at least 3",
                self.public_exponent
            )));
        }
        Ok(())
    }
}
