// RSA error types

use thiserror::Error;

/// Errors raised by the software RSA primitives
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RsaError {
    #[error("unsupported key size: {0} bits (need an even size of at least 512)")]
    UnsupportedKeySize(u32),

    #[error("invalid public exponent: {0}")]
    InvalidExponent(u64),

    #[error("data too large: max {max} bytes, got {actual}")]
    DataTooLarge { max: usize, actual: usize },

    #[error("buffer length {actual} does not match key size {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("input is not smaller than the modulus")]
    OutOfRange,

    #[error("invalid padding: {0}")]
    InvalidPadding(&'static str),

    #[error("key generation failed: {0}")]
    KeyGeneration(&'static str),
}
