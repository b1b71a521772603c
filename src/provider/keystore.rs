// Key store file operations
// Reading, creating and rewriting the JSON records behind a named key store

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use num_traits::One;
use serde::{Deserialize, Serialize};

use super::{KeySpec, ProviderError, Result};
use crate::rsa::bigint::{from_bytes, RsaBigInt};
use crate::rsa::{RsaKeyPair, RsaPrivateKey, RsaPublicKey};

const STORE_FILE_SUFFIX: &str = ".keystore.json";
const MAX_STORE_NAME_LEN: usize = 128;

/// Persisted contents of one named key store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub keys: Vec<KeyRecord>,
}

/// One persisted key pair; integers are big-endian hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub spec: KeySpec,
    pub bits: u32,
    pub exportable: bool,
    pub no_salt: bool,
    pub n: String,
    pub e: String,
    pub d: String,
    pub p: String,
    pub q: String,
    pub d_p: String,
    pub d_q: String,
    pub q_inv: String,
}

impl StoreRecord {
    pub fn new(name: &str, provider: &str) -> Self {
        Self {
            name: name.to_string(),
            provider: provider.to_string(),
            keys: Vec::new(),
        }
    }

    pub fn key(&self, spec: KeySpec) -> Option<&KeyRecord> {
        self.keys.iter().find(|k| k.spec == spec)
    }

    /// Insert or replace the key for `record.spec`
    pub fn put_key(&mut self, record: KeyRecord) {
        self.keys.retain(|k| k.spec != record.spec);
        self.keys.push(record);
    }
}

fn encode(n: &RsaBigInt) -> String {
    hex::encode(n.to_bytes_be())
}

fn decode(path: &Path, field: &str, value: &str) -> Result<RsaBigInt> {
    hex::decode(value)
        .map(|bytes| from_bytes(&bytes))
        .map_err(|e| ProviderError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("field `{}`: {}", field, e),
        })
}

impl KeyRecord {
    pub fn from_pair(spec: KeySpec, pair: &RsaKeyPair, exportable: bool, no_salt: bool) -> Self {
        let private = &pair.private_key;
        Self {
            spec,
            bits: pair.bit_length(),
            exportable,
            no_salt,
            n: encode(&pair.public_key.n),
            e: encode(&pair.public_key.e),
            d: encode(&private.d),
            p: encode(&private.p),
            q: encode(&private.q),
            d_p: encode(&private.d_p),
            d_q: encode(&private.d_q),
            q_inv: encode(&private.q_inv),
        }
    }

    /// Rebuild the key pair; `path` is only used for diagnostics
    pub fn to_pair(&self, path: &Path) -> Result<RsaKeyPair> {
        let n = decode(path, "n", &self.n)?;
        let pair = RsaKeyPair {
            public_key: RsaPublicKey {
                n: n.clone(),
                e: decode(path, "e", &self.e)?,
            },
            private_key: RsaPrivateKey {
                n,
                d: decode(path, "d", &self.d)?,
                p: decode(path, "p", &self.p)?,
                q: decode(path, "q", &self.q)?,
                d_p: decode(path, "d_p", &self.d_p)?,
                d_q: decode(path, "d_q", &self.d_q)?,
                q_inv: decode(path, "q_inv", &self.q_inv)?,
            },
        };

        let private = &pair.private_key;
        let one = RsaBigInt::one();
        if private.p <= one || private.q <= one || &private.p * &private.q != private.n {
            return Err(ProviderError::Corrupt {
                path: path.to_path_buf(),
                reason: "primes do not multiply to the modulus".to_string(),
            });
        }
        if pair.public_key.e <= one {
            return Err(ProviderError::Corrupt {
                path: path.to_path_buf(),
                reason: "public exponent must exceed 1".to_string(),
            });
        }

        if pair.bit_length() != self.bits {
            return Err(ProviderError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "recorded {} bits, modulus has {}",
                    self.bits,
                    pair.bit_length()
                ),
            });
        }
        Ok(pair)
    }
}

/// Store names become file names: no separators, no leading dot
pub fn validate_store_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_STORE_NAME_LEN
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(ProviderError::InvalidStoreName {
            name: name.to_string(),
        })
    }
}

/// Path of the record file for `name` under `root`
pub fn store_path(root: &Path, name: &str) -> Result<PathBuf> {
    validate_store_name(name)?;
    Ok(root.join(format!("{}{}", name, STORE_FILE_SUFFIX)))
}

fn io_error(path: &Path, source: io::Error) -> ProviderError {
    ProviderError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a store record; `Ok(None)` when the file does not exist
pub fn read_store(path: &Path) -> Result<Option<StoreRecord>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };

    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| ProviderError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn to_json(path: &Path, record: &StoreRecord) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(record).map_err(|e| ProviderError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Create a new store file; fails with `StoreExists` rather than overwrite
pub fn create_store(path: &Path, record: &StoreRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let json = to_json(path, record)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => ProviderError::StoreExists {
                name: record.name.clone(),
            },
            _ => io_error(path, e),
        })?;
    file.write_all(&json).map_err(|e| io_error(path, e))?;
    file.sync_all().map_err(|e| io_error(path, e))?;
    Ok(())
}

/// Replace an existing store file via write-then-rename
pub fn write_store(path: &Path, record: &StoreRecord) -> Result<()> {
    let json = to_json(path, record)?;
    let tmp = path.with_extension("json.tmp");

    let mut file = fs::File::create(&tmp).map_err(|e| io_error(&tmp, e))?;
    file.write_all(&json).map_err(|e| io_error(&tmp, e))?;
    file.sync_all().map_err(|e| io_error(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| io_error(path, e))
}
