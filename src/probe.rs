// Padding round trip
// Encrypts a buffer under the key-exchange public key with standard padding,
// then decrypts it in place with padding validation disabled so the whole
// padded block comes back.

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::keys::{KeyLifecycleManager, KeyPairHandle};
use crate::provider::{CryptoProvider, DecryptFlags, ProviderError};
use crate::rsa::keygen::block_size_for_bits;
use crate::verify::{verify_layout, LayoutReport};

/// 48-byte input captured from a TLS pre-master-secret exchange
pub const REFERENCE_INPUT: [u8; 48] = [
    0x03, 0x03, 0x9A, 0x92, 0x1E, 0x1D, 0xBD, 0x74, 0x68, 0xB1, 0x26, 0x1D, 0xE5, 0xD5, 0xBA, 0xB8,
    0xBC, 0x1F, 0xA4, 0x60, 0x00, 0xE4, 0x17, 0xA1, 0x37, 0x38, 0x62, 0xC2, 0xF3, 0xDE, 0x44, 0x2D,
    0x45, 0x81, 0x03, 0x1D, 0x8A, 0xBF, 0x69, 0x7F, 0x55, 0x76, 0x0B, 0x5F, 0xB8, 0x33, 0x09, 0x4C,
];

/// The buffer after a padding-bypassed decrypt: one full block, not the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredBuffer {
    bytes: Vec<u8>,
    block_size: usize,
    plaintext_len: usize,
}

impl RecoveredBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// ceil(key bits / 8)
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Length of the plaintext that went in
    pub fn plaintext_len(&self) -> usize {
        self.plaintext_len
    }

    /// Take the recovered bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }

    /// Check this buffer against the block-type-2 layout for `original`
    pub fn verify(&self, original: &[u8]) -> LayoutReport {
        verify_layout(&self.bytes, self.block_size, original)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PaddingRoundTripProbe;

impl PaddingRoundTripProbe {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt then decrypt `buffer` under `key`, without padding validation.
    ///
    /// Takes ownership of `buffer` and overwrites it twice: resized to the
    /// provider-reported ciphertext size and encrypted in place, then
    /// decrypted in place. The result is the full padded block.
    pub fn round_trip(&self, key: &KeyPairHandle<'_>, buffer: Vec<u8>) -> Result<RecoveredBuffer> {
        let provider = key.provider();
        let id = key.id();

        let bits = key.bit_length()?;
        let block_size = block_size_for_bits(bits);
        let data_len = buffer.len();

        let encrypt_failed = |stage: &'static str| {
            move |source: ProviderError| ProbeError::EncryptFailed { stage, source }
        };

        let reported = provider
            .encrypted_len(id, data_len)
            .map_err(encrypt_failed("size query"))?;
        if reported < data_len {
            return Err(ProbeError::EncryptFailed {
                stage: "size query",
                source: ProviderError::MoreData { required: data_len },
            });
        }
        // One final block never encrypts to more than the modulus size
        if reported > block_size {
            return Err(ProbeError::EncryptFailed {
                stage: "size query",
                source: ProviderError::BadLength {
                    max: block_size,
                    actual: reported,
                },
            });
        }

        let mut buffer = buffer;
        buffer.resize(reported, 0);

        let ciphertext_len = provider
            .encrypt(id, true, &mut buffer, data_len)
            .map_err(encrypt_failed("encrypt"))?;
        if ciphertext_len > buffer.len() {
            return Err(ProbeError::EncryptFailed {
                stage: "encrypt",
                source: ProviderError::Internal(format!(
                    "reported {} ciphertext bytes in a {}-byte buffer",
                    ciphertext_len,
                    buffer.len()
                )),
            });
        }
        tracing::debug!(bits, block_size, data_len, ciphertext_len, "encrypted with padding");

        let recovered_len = provider
            .decrypt(
                id,
                true,
                DecryptFlags::NO_PADDING_CHECK,
                &mut buffer[..ciphertext_len],
            )
            .map_err(|source| ProbeError::DecryptFailed { source })?;
        if recovered_len > ciphertext_len {
            return Err(ProbeError::DecryptFailed {
                source: ProviderError::Internal(format!(
                    "reported {} recovered bytes from {} ciphertext bytes",
                    recovered_len, ciphertext_len
                )),
            });
        }
        buffer.truncate(recovered_len);
        tracing::debug!(recovered_len, "decrypted without padding check");

        Ok(RecoveredBuffer {
            bytes: buffer,
            block_size,
            plaintext_len: data_len,
        })
    }
}

/// Acquire the configured key pair and round trip `plaintext` through it.
/// Store and key handles are released before this returns.
pub fn run_probe(
    provider: &dyn CryptoProvider,
    config: &ProbeConfig,
    plaintext: &[u8],
) -> Result<RecoveredBuffer> {
    config.validate()?;

    let manager = KeyLifecycleManager::from_config(provider, config);
    let key = manager.acquire_exchange_key_pair(&config.store_name)?;
    PaddingRoundTripProbe::new().round_trip(&key, plaintext.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{SoftwareProvider, SOFTWARE_PROVIDER_NAME};

    fn config(root: &std::path::Path, name: &str) -> ProbeConfig {
        ProbeConfig {
            store_root: root.to_path_buf(),
            store_name: name.to_string(),
            provider_name: SOFTWARE_PROVIDER_NAME.to_string(),
            key_bits: 512,
            public_exponent: 65537,
        }
    }

    #[test]
    fn test_reference_input_length() {
        assert_eq!(REFERENCE_INPUT.len(), 48);
        assert_eq!(&REFERENCE_INPUT[..2], &[0x03, 0x03]);
        assert_eq!(REFERENCE_INPUT[47], 0x4C);
    }

    #[test]
    fn test_round_trip_returns_full_block() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());

        let recovered = run_probe(&provider, &config(dir.path(), "rt"), b"hello").unwrap();
        assert_eq!(recovered.len(), 64);
        assert_eq!(recovered.block_size(), 64);
        assert_eq!(recovered.plaintext_len(), 5);
        assert_eq!(&recovered.as_bytes()[59..], b"hello");
        assert!(recovered.verify(b"hello").is_expected());
        assert_eq!(provider.open_handles(), (0, 0));
    }

    #[test]
    fn test_plaintext_too_long_fails_sizing() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());

        let err = run_probe(&provider, &config(dir.path(), "long"), &[0xAB; 54]).unwrap_err();
        assert!(
            matches!(err, ProbeError::EncryptFailed { stage: "size query", .. }),
            "{:?}",
            err
        );
        assert_eq!(provider.open_handles(), (0, 0));
    }

    #[test]
    fn test_invalid_config_rejected_before_provider_use() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SoftwareProvider::new(dir.path());
        let mut config = config(dir.path(), "cfg");
        config.key_bits = 100;

        let err = run_probe(&provider, &config, b"x").unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
