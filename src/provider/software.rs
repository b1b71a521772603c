// Software provider
// In-process RSA provider with key stores persisted as files under one root

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::keystore::{self, KeyRecord, StoreRecord};
use super::{
    CryptoProvider, DecryptFlags, KeyGenParams, KeyId, KeySpec, OpenMode, ProviderError, Result,
    StoreId,
};
use crate::rsa::padding::MIN_PADDING_OVERHEAD;
use crate::rsa::{decrypt_block, encrypt_block, generate_keypair, pad_pkcs1_v15, unpad_pkcs1_v15};
use crate::rsa::RsaKeyPair;

/// Name under which the software provider serves combined RSA + AES requests
pub const SOFTWARE_PROVIDER_NAME: &str = "Software Enhanced RSA and AES Cryptographic Provider";

struct OpenStore {
    name: String,
    path: PathBuf,
}

struct LoadedKey {
    pair: RsaKeyPair,
}

#[derive(Default)]
struct HandleTable {
    next_id: u64,
    stores: HashMap<u64, OpenStore>,
    keys: HashMap<u64, LoadedKey>,
}

impl HandleTable {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct SoftwareProvider {
    root: PathBuf,
    handles: Mutex<HandleTable>,
}

impl SoftwareProvider {
    /// Provider whose key stores live under `root`; the directory is created on first store creation
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handles: Mutex::new(HandleTable::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of store and key handles currently held
    pub fn open_handles(&self) -> (usize, usize) {
        match self.handles.lock() {
            Ok(table) => (table.stores.len(), table.keys.len()),
            Err(poisoned) => {
                let table = poisoned.into_inner();
                (table.stores.len(), table.keys.len())
            }
        }
    }

    fn table(&self) -> Result<MutexGuard<'_, HandleTable>> {
        self.handles
            .lock()
            .map_err(|_| ProviderError::Internal("handle table lock poisoned".to_string()))
    }

    fn store_location(&self, store: StoreId) -> Result<(String, PathBuf)> {
        let table = self.table()?;
        table
            .stores
            .get(&store.raw())
            .map(|s| (s.name.clone(), s.path.clone()))
            .ok_or(ProviderError::InvalidHandle)
    }

    fn register_key(&self, pair: RsaKeyPair) -> Result<KeyId> {
        let mut table = self.table()?;
        let id = table.allocate();
        table.keys.insert(id, LoadedKey { pair });
        Ok(KeyId::new(id))
    }

    fn with_key<T>(&self, key: KeyId, f: impl FnOnce(&RsaKeyPair) -> Result<T>) -> Result<T> {
        let table = self.table()?;
        let loaded = table.keys.get(&key.raw()).ok_or(ProviderError::InvalidHandle)?;
        f(&loaded.pair)
    }
}

impl CryptoProvider for SoftwareProvider {
    fn open_store(&self, store_name: &str, provider_name: &str, mode: OpenMode) -> Result<StoreId> {
        if provider_name != SOFTWARE_PROVIDER_NAME {
            return Err(ProviderError::ProviderMissing {
                name: provider_name.to_string(),
            });
        }

        let path = keystore::store_path(&self.root, store_name)?;
        match mode {
            OpenMode::Existing => match keystore::read_store(&path)? {
                Some(record) if record.provider != provider_name => {
                    return Err(ProviderError::Corrupt {
                        path,
                        reason: format!("store belongs to provider `{}`", record.provider),
                    });
                }
                Some(_) => {}
                None => {
                    return Err(ProviderError::StoreNotFound {
                        name: store_name.to_string(),
                    })
                }
            },
            OpenMode::CreateNew => {
                keystore::create_store(&path, &StoreRecord::new(store_name, provider_name))?;
                tracing::debug!(store = store_name, path = %path.display(), "created key store file");
            }
        }

        let mut table = self.table()?;
        let id = table.allocate();
        table.stores.insert(
            id,
            OpenStore {
                name: store_name.to_string(),
                path,
            },
        );
        Ok(StoreId::new(id))
    }

    fn release_store(&self, store: StoreId) {
        if let Ok(mut table) = self.table() {
            table.stores.remove(&store.raw());
        }
    }

    fn user_key(&self, store: StoreId, spec: KeySpec) -> Result<KeyId> {
        let (name, path) = self.store_location(store)?;
        let record = keystore::read_store(&path)?
            .ok_or(ProviderError::StoreNotFound { name })?;

        let key = record
            .key(spec)
            .ok_or(ProviderError::KeyNotFound { spec })?;
        let pair = key.to_pair(&path)?;
        self.register_key(pair)
    }

    fn generate_key(&self, store: StoreId, spec: KeySpec, params: KeyGenParams) -> Result<KeyId> {
        let (name, path) = self.store_location(store)?;
        let mut record = keystore::read_store(&path)?
            .ok_or(ProviderError::StoreNotFound { name })?;

        let pair = generate_keypair(params.bits, params.public_exponent)?;
        record.put_key(KeyRecord::from_pair(
            spec,
            &pair,
            params.exportable,
            params.no_salt,
        ));
        keystore::write_store(&path, &record)?;

        self.register_key(pair)
    }

    fn destroy_key(&self, key: KeyId) {
        if let Ok(mut table) = self.table() {
            table.keys.remove(&key.raw());
        }
    }

    fn key_bit_length(&self, key: KeyId) -> Result<u32> {
        self.with_key(key, |pair| Ok(pair.bit_length()))
    }

    fn encrypted_len(&self, key: KeyId, data_len: usize) -> Result<usize> {
        self.with_key(key, |pair| {
            let block_size = pair.public_key.block_size();
            let max = block_size.saturating_sub(MIN_PADDING_OVERHEAD);
            if data_len > max {
                return Err(ProviderError::BadLength {
                    max,
                    actual: data_len,
                });
            }
            Ok(block_size)
        })
    }

    fn encrypt(
        &self,
        key: KeyId,
        final_block: bool,
        buf: &mut [u8],
        data_len: usize,
    ) -> Result<usize> {
        if !final_block {
            return Err(ProviderError::BadFlags("RSA encryption requires the final block"));
        }

        self.with_key(key, |pair| {
            let block_size = pair.public_key.block_size();
            if buf.len() < block_size {
                return Err(ProviderError::MoreData {
                    required: block_size,
                });
            }
            if data_len > buf.len() {
                return Err(ProviderError::BadLength {
                    max: buf.len(),
                    actual: data_len,
                });
            }

            let mut block = pad_pkcs1_v15(&buf[..data_len], block_size)?;
            encrypt_block(&mut block, &pair.public_key)?;
            buf[..block_size].copy_from_slice(&block);
            Ok(block_size)
        })
    }

    fn decrypt(
        &self,
        key: KeyId,
        final_block: bool,
        flags: DecryptFlags,
        buf: &mut [u8],
    ) -> Result<usize> {
        if !final_block {
            return Err(ProviderError::BadFlags("RSA decryption requires the final block"));
        }

        self.with_key(key, |pair| {
            let block_size = pair.private_key.block_size();
            if buf.len() != block_size {
                return Err(ProviderError::BadLength {
                    max: block_size,
                    actual: buf.len(),
                });
            }

            decrypt_block(buf, &pair.private_key)?;
            if flags.no_padding_check {
                return Ok(block_size);
            }

            let message_len = unpad_pkcs1_v15(buf)
                .map_err(|e| ProviderError::BadData(e.to_string()))?
                .len();
            buf.copy_within(block_size - message_len.., 0);
            buf[message_len..].fill(0);
            Ok(message_len)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(bits: u32) -> KeyGenParams {
        KeyGenParams {
            bits,
            public_exponent: 65537,
            exportable: true,
            no_salt: true,
        }
    }

    fn provider_with_key() -> (tempfile::TempDir, SoftwareProvider, KeyId) {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());
        let store = provider
            .open_store("unit", SOFTWARE_PROVIDER_NAME, OpenMode::CreateNew)
            .unwrap();
        let key = provider
            .generate_key(store, KeySpec::KeyExchange, params(512))
            .unwrap();
        provider.release_store(store);
        (dir, provider, key)
    }

    #[test]
    fn test_open_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());

        let err = provider
            .open_store("nope", SOFTWARE_PROVIDER_NAME, OpenMode::Existing)
            .unwrap_err();
        assert!(err.is_store_absent());
    }

    #[test]
    fn test_unknown_provider_name() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());

        let err = provider
            .open_store("s", "Some Other Provider", OpenMode::Existing)
            .unwrap_err();
        assert!(matches!(err, ProviderError::ProviderMissing { .. }));
        assert!(!err.is_store_absent());
    }

    #[test]
    fn test_key_missing_then_generated_then_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());
        let store = provider
            .open_store("keys", SOFTWARE_PROVIDER_NAME, OpenMode::CreateNew)
            .unwrap();

        let err = provider.user_key(store, KeySpec::KeyExchange).unwrap_err();
        assert!(err.is_key_absent());

        let generated = provider
            .generate_key(store, KeySpec::KeyExchange, params(512))
            .unwrap();
        let fetched = provider.user_key(store, KeySpec::KeyExchange).unwrap();
        assert_ne!(generated, fetched);
        assert_eq!(provider.key_bit_length(fetched).unwrap(), 512);

        // Signature role is independent
        assert!(provider
            .user_key(store, KeySpec::Signature)
            .unwrap_err()
            .is_key_absent());

        provider.destroy_key(generated);
        provider.destroy_key(fetched);
        provider.release_store(store);
        assert_eq!(provider.open_handles(), (0, 0));
    }

    #[test]
    fn test_released_handles_are_invalid() {
        let (_dir, provider, key) = provider_with_key();
        provider.destroy_key(key);
        // Idempotent
        provider.destroy_key(key);

        let err = provider.key_bit_length(key).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidHandle));
    }

    #[test]
    fn test_encrypt_decrypt_strips_padding() {
        let (_dir, provider, key) = provider_with_key();
        let message = b"strip me";

        let size = provider.encrypted_len(key, message.len()).unwrap();
        assert_eq!(size, 64);
        let mut buf = vec![0u8; size];
        buf[..message.len()].copy_from_slice(message);

        let written = provider.encrypt(key, true, &mut buf, message.len()).unwrap();
        assert_eq!(written, 64);

        let len = provider
            .decrypt(key, true, DecryptFlags::NONE, &mut buf)
            .unwrap();
        assert_eq!(&buf[..len], message);
    }

    #[test]
    fn test_decrypt_without_padding_check_returns_block() {
        let (_dir, provider, key) = provider_with_key();
        let message = b"keep the padding";
        let mut buf = vec![0u8; 64];
        buf[..message.len()].copy_from_slice(message);

        provider.encrypt(key, true, &mut buf, message.len()).unwrap();
        let len = provider
            .decrypt(key, true, DecryptFlags::NO_PADDING_CHECK, &mut buf)
            .unwrap();

        assert_eq!(len, 64);
        assert_eq!(&buf[..2], &[0x00, 0x02]);
        assert_eq!(buf[64 - message.len() - 1], 0x00);
        assert_eq!(&buf[64 - message.len()..], message);
    }

    #[test]
    fn test_encrypt_buffer_too_small() {
        let (_dir, provider, key) = provider_with_key();
        let mut buf = vec![0u8; 32];

        let err = provider.encrypt(key, true, &mut buf, 8).unwrap_err();
        assert!(matches!(err, ProviderError::MoreData { required: 64 }));
    }

    #[test]
    fn test_data_too_long_for_block() {
        let (_dir, provider, key) = provider_with_key();

        let err = provider.encrypted_len(key, 54).unwrap_err();
        assert!(matches!(err, ProviderError::BadLength { max: 53, actual: 54 }));
    }

    #[test]
    fn test_non_final_block_rejected() {
        let (_dir, provider, key) = provider_with_key();
        let mut buf = vec![0u8; 64];

        let err = provider.encrypt(key, false, &mut buf, 4).unwrap_err();
        assert!(matches!(err, ProviderError::BadFlags(_)));
    }

    #[test]
    fn test_decrypt_rejects_garbage_with_padding_check() {
        let (_dir, provider, key) = provider_with_key();

        // Block type 1 where type 2 is expected
        let mut buf = vec![0xFFu8; 64];
        buf[0] = 0x00;
        buf[1] = 0x01;
        buf[40] = 0x00;
        provider
            .with_key(key, |pair| Ok(encrypt_block(&mut buf, &pair.public_key)?))
            .unwrap();

        let err = provider
            .decrypt(key, true, DecryptFlags::NONE, &mut buf)
            .unwrap_err();
        assert!(matches!(err, ProviderError::BadData(_)));
    }

    #[test]
    fn test_key_survives_provider_restart() {
        let (dir, provider, key) = provider_with_key();
        let bits = provider.key_bit_length(key).unwrap();
        drop(provider);

        let reopened = SoftwareProvider::new(dir.path());
        let store = reopened
            .open_store("unit", SOFTWARE_PROVIDER_NAME, OpenMode::Existing)
            .unwrap();
        let key = reopened.user_key(store, KeySpec::KeyExchange).unwrap();
        assert_eq!(reopened.key_bit_length(key).unwrap(), bits);
    }
}
