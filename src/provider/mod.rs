// Asymmetric Crypto Provider
//
// The contract the probe depends on: named persistent key stores, key pairs
// bound to a usage role, and block encrypt/decrypt that work in place on a
// caller buffer. `SoftwareProvider` is the bundled implementation.

mod error;
mod keystore;
mod software;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::ProviderError;
pub use software::{SoftwareProvider, SOFTWARE_PROVIDER_NAME};

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Opaque handle to an open key store connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

/// Opaque handle to a loaded key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(u64);

impl StoreId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl KeyId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Usage role a key pair is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySpec {
    /// Encryption / decryption (key exchange)
    KeyExchange,
    /// Signing only
    Signature,
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpec::KeyExchange => write!(f, "key-exchange"),
            KeySpec::Signature => write!(f, "signature"),
        }
    }
}

/// How `open_store` treats the named store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open a store that must already exist
    Existing,
    /// Create the store; fails if it already exists
    CreateNew,
}

/// Parameters for `generate_key`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGenParams {
    pub bits: u32,
    pub public_exponent: u64,
    pub exportable: bool,
    pub no_salt: bool,
}

/// Flags for `decrypt`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecryptFlags {
    /// Return the whole decrypted block without validating or stripping padding
    pub no_padding_check: bool,
}

impl DecryptFlags {
    pub const NONE: DecryptFlags = DecryptFlags {
        no_padding_check: false,
    };
    pub const NO_PADDING_CHECK: DecryptFlags = DecryptFlags {
        no_padding_check: true,
    };
}

/// Asymmetric crypto provider with persistent, named key stores
///
/// Handles returned by `open_store`, `user_key` and `generate_key` must be
/// handed back through `release_store` / `destroy_key`. Releasing never
/// removes persisted state.
pub trait CryptoProvider {
    /// Open (or with `OpenMode::CreateNew`, create) the named store under `provider_name`
    fn open_store(&self, store_name: &str, provider_name: &str, mode: OpenMode) -> Result<StoreId>;

    fn release_store(&self, store: StoreId);

    /// Fetch the persisted key pair for `spec`
    fn user_key(&self, store: StoreId, spec: KeySpec) -> Result<KeyId>;

    /// Generate and persist a key pair for `spec`
    fn generate_key(&self, store: StoreId, spec: KeySpec, params: KeyGenParams) -> Result<KeyId>;

    fn destroy_key(&self, key: KeyId);

    /// Modulus length in bits
    fn key_bit_length(&self, key: KeyId) -> Result<u32>;

    /// Buffer size `encrypt` needs for `data_len` bytes of plaintext
    fn encrypted_len(&self, key: KeyId, data_len: usize) -> Result<usize>;

    /// Pad and encrypt `buf[..data_len]` in place; `buf.len()` is the capacity.
    /// Returns the ciphertext length.
    fn encrypt(&self, key: KeyId, final_block: bool, buf: &mut [u8], data_len: usize)
        -> Result<usize>;

    /// Decrypt `buf` in place. Returns the length of the recovered data,
    /// which is the full block when `flags.no_padding_check` is set.
    fn decrypt(&self, key: KeyId, final_block: bool, flags: DecryptFlags, buf: &mut [u8])
        -> Result<usize>;
}
