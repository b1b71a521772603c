// Key lifecycle
// Opens (or creates) the named key store and fetches (or generates) its
// key-exchange pair. Handles are scoped guards released on every exit path.

use std::fmt;

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::provider::{
    CryptoProvider, KeyGenParams, KeyId, KeySpec, OpenMode, ProviderError, StoreId,
};

/// Outcome of a provider lookup that may legitimately find nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Absent,
}

impl<T> Lookup<T> {
    /// Map `Err(e)` with `is_absent(&e)` to `Absent`; other errors pass through
    pub fn classify(
        result: std::result::Result<T, ProviderError>,
        is_absent: impl FnOnce(&ProviderError) -> bool,
    ) -> std::result::Result<Self, ProviderError> {
        match result {
            Ok(value) => Ok(Lookup::Found(value)),
            Err(e) if is_absent(&e) => Ok(Lookup::Absent),
            Err(e) => Err(e),
        }
    }
}

/// Open connection to a named key store; released on drop
pub struct StoreHandle<'p> {
    provider: &'p dyn CryptoProvider,
    id: StoreId,
    name: String,
}

impl<'p> StoreHandle<'p> {
    fn new(provider: &'p dyn CryptoProvider, id: StoreId, name: &str) -> Self {
        Self {
            provider,
            id,
            name: name.to_string(),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for StoreHandle<'_> {
    fn drop(&mut self) {
        self.provider.release_store(self.id);
        tracing::trace!(store = %self.name, "released key store");
    }
}

impl fmt::Debug for StoreHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Key-exchange key pair together with the store it came from.
/// Dropping it destroys the key handle, then releases the store.
pub struct KeyPairHandle<'p> {
    id: KeyId,
    store: StoreHandle<'p>,
}

impl<'p> KeyPairHandle<'p> {
    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn provider(&self) -> &'p dyn CryptoProvider {
        self.store.provider
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Modulus length in bits, as the provider reports it
    pub fn bit_length(&self) -> Result<u32> {
        self.provider()
            .key_bit_length(self.id)
            .map_err(|source| ProbeError::ParameterQueryFailed {
                parameter: "key length",
                source,
            })
    }
}

impl Drop for KeyPairHandle<'_> {
    fn drop(&mut self) {
        self.store.provider.destroy_key(self.id);
        tracing::trace!(store = %self.store.name, "destroyed key handle");
    }
}

impl fmt::Debug for KeyPairHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairHandle")
            .field("id", &self.id)
            .field("store", &self.store)
            .finish()
    }
}

/// Ensures a usable key-exchange pair exists in a named, persistent store
pub struct KeyLifecycleManager<'p> {
    provider: &'p dyn CryptoProvider,
    provider_name: String,
    key_params: KeyGenParams,
}

impl<'p> KeyLifecycleManager<'p> {
    pub fn new(
        provider: &'p dyn CryptoProvider,
        provider_name: impl Into<String>,
        key_bits: u32,
        public_exponent: u64,
    ) -> Self {
        Self {
            provider,
            provider_name: provider_name.into(),
            key_params: KeyGenParams {
                bits: key_bits,
                public_exponent,
                exportable: true,
                no_salt: true,
            },
        }
    }

    pub fn from_config(provider: &'p dyn CryptoProvider, config: &ProbeConfig) -> Self {
        Self::new(
            provider,
            config.provider_name.clone(),
            config.key_bits,
            config.public_exponent,
        )
    }

    /// Open or create `store_name`, then fetch or generate its key-exchange pair.
    ///
    /// Only a missing store or a missing key triggers creation. Any other
    /// provider failure aborts with `StoreUnavailable` or `KeyFetchFailed`.
    pub fn acquire_exchange_key_pair(&self, store_name: &str) -> Result<KeyPairHandle<'p>> {
        let store = self.open_or_create_store(store_name)?;

        let fetched = Lookup::classify(
            self.provider.user_key(store.id(), KeySpec::KeyExchange),
            ProviderError::is_key_absent,
        )
        .map_err(|source| ProbeError::KeyFetchFailed {
            store: store_name.to_string(),
            source,
        })?;

        let id = match fetched {
            Lookup::Found(id) => {
                tracing::debug!(store = store_name, "using existing key-exchange key pair");
                id
            }
            Lookup::Absent => {
                tracing::info!(
                    store = store_name,
                    bits = self.key_params.bits,
                    "no key-exchange key pair, generating one"
                );
                self.provider
                    .generate_key(store.id(), KeySpec::KeyExchange, self.key_params)
                    .map_err(|source| ProbeError::KeyFetchFailed {
                        store: store_name.to_string(),
                        source,
                    })?
            }
        };

        Ok(KeyPairHandle { id, store })
    }

    fn open_or_create_store(&self, store_name: &str) -> Result<StoreHandle<'p>> {
        let unavailable = |source| ProbeError::StoreUnavailable {
            store: store_name.to_string(),
            source,
        };

        let opened = Lookup::classify(
            self.provider
                .open_store(store_name, &self.provider_name, OpenMode::Existing),
            ProviderError::is_store_absent,
        )
        .map_err(unavailable)?;

        let id = match opened {
            Lookup::Found(id) => {
                tracing::debug!(store = store_name, "opened existing key store");
                id
            }
            Lookup::Absent => {
                tracing::info!(store = store_name, "key store not found, creating it");
                self.provider
                    .open_store(store_name, &self.provider_name, OpenMode::CreateNew)
                    .map_err(unavailable)?
            }
        };

        Ok(StoreHandle::new(self.provider, id, store_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{SoftwareProvider, SOFTWARE_PROVIDER_NAME};

    fn manager(provider: &SoftwareProvider) -> KeyLifecycleManager<'_> {
        KeyLifecycleManager::new(provider, SOFTWARE_PROVIDER_NAME, 512, 65537)
    }

    #[test]
    fn test_classify() {
        let found: Lookup<u8> =
            Lookup::classify(Ok(7), ProviderError::is_key_absent).unwrap();
        assert_eq!(found, Lookup::Found(7));

        let absent: Lookup<u8> = Lookup::classify(
            Err(ProviderError::KeyNotFound {
                spec: KeySpec::KeyExchange,
            }),
            ProviderError::is_key_absent,
        )
        .unwrap();
        assert_eq!(absent, Lookup::Absent);

        let other = Lookup::<u8>::classify(
            Err(ProviderError::InvalidHandle),
            ProviderError::is_key_absent,
        );
        assert!(matches!(other, Err(ProviderError::InvalidHandle)));
    }

    #[test]
    fn test_first_use_creates_store_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());

        let key = manager(&provider).acquire_exchange_key_pair("first").unwrap();
        assert_eq!(key.bit_length().unwrap(), 512);
        assert_eq!(key.store_name(), "first");
        assert!(dir.path().join("first.keystore.json").exists());
    }

    #[test]
    fn test_handles_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());

        {
            let _key = manager(&provider).acquire_exchange_key_pair("scoped").unwrap();
            assert_eq!(provider.open_handles(), (1, 1));
        }
        assert_eq!(provider.open_handles(), (0, 0));
    }

    #[test]
    fn test_store_unavailable_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());
        let manager = KeyLifecycleManager::new(&provider, "Missing Provider", 512, 65537);

        let err = manager.acquire_exchange_key_pair("s").unwrap_err();
        assert!(matches!(err, ProbeError::StoreUnavailable { .. }));
        assert!(!dir.path().join("s.keystore.json").exists());
        assert_eq!(provider.open_handles(), (0, 0));
    }

    #[test]
    fn test_key_fetch_failure_releases_store() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());
        let bad_key = r#"{"spec":"key_exchange","bits":512,"exportable":true,"no_salt":true,
            "n":"zz","e":"010001","d":"01","p":"01","q":"01","d_p":"01","d_q":"01","q_inv":"01"}"#;
        std::fs::write(
            dir.path().join("corrupt.keystore.json"),
            format!(
                r#"{{"name":"corrupt","provider":"{}","keys":[{}]}}"#,
                SOFTWARE_PROVIDER_NAME, bad_key
            ),
        )
        .unwrap();

        let err = manager(&provider)
            .acquire_exchange_key_pair("corrupt")
            .unwrap_err();
        match err {
            ProbeError::KeyFetchFailed { source, .. } => {
                assert!(matches!(source, ProviderError::Corrupt { .. }))
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(provider.open_handles(), (0, 0));
    }
}
