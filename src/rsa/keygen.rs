// RSA Key Generation
// Implements RSA key pair generation (public and private keys)

use num_traits::One;

use super::bigint::{from_u64, gcd, mod_inverse, random_prime, RsaBigInt};
use super::error::RsaError;

/// Smallest modulus the software provider will generate
pub const MIN_KEY_BITS: u32 = 512;

/// Prime pairs tried before giving up on a key size / exponent combination
const MAX_PRIME_ATTEMPTS: usize = 64;

/// RSA Public Key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    pub n: RsaBigInt, // Modulus
    pub e: RsaBigInt, // Public exponent
}

/// RSA Private Key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPrivateKey {
    pub n: RsaBigInt, // Modulus (same as public)
    pub d: RsaBigInt, // Private exponent
    pub p: RsaBigInt, // First prime factor
    pub q: RsaBigInt, // Second prime factor
    // Pre-computed values for CRT decryption
    pub d_p: RsaBigInt,   // d mod (p-1)
    pub d_q: RsaBigInt,   // d mod (q-1)
    pub q_inv: RsaBigInt, // q^(-1) mod p
}

/// RSA Key Pair (both public and private keys)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyPair {
    pub public_key: RsaPublicKey,
    pub private_key: RsaPrivateKey,
}

/// Size in bytes of one RSA block for a modulus of `bits` bits
pub fn block_size_for_bits(bits: u32) -> usize {
    ((bits + 7) / 8) as usize
}

impl RsaPublicKey {
    /// Bit length of the modulus
    pub fn bit_length(&self) -> u32 {
        self.n.bits() as u32
    }

    /// Size in bytes of one block under this key
    pub fn block_size(&self) -> usize {
        block_size_for_bits(self.bit_length())
    }
}

impl RsaPrivateKey {
    /// Bit length of the modulus
    pub fn bit_length(&self) -> u32 {
        self.n.bits() as u32
    }

    /// Size in bytes of one block under this key
    pub fn block_size(&self) -> usize {
        block_size_for_bits(self.bit_length())
    }
}

impl RsaKeyPair {
    /// Get the bit length of the key
    pub fn bit_length(&self) -> u32 {
        self.public_key.bit_length()
    }
}

/// Generate an RSA key pair whose modulus has exactly `bit_length` bits
/// bit_length: even, at least 512
/// e: odd public exponent greater than 1 (common values: 3, 17, 65537)
pub fn generate_keypair(bit_length: u32, e: u64) -> Result<RsaKeyPair, RsaError> {
    if bit_length < MIN_KEY_BITS || bit_length % 2 != 0 {
        return Err(RsaError::UnsupportedKeySize(bit_length));
    }
    if e < 3 || e % 2 == 0 {
        return Err(RsaError::InvalidExponent(e));
    }

    let e_big = from_u64(e);
    let half_bits = bit_length / 2;

    for _ in 0..MAX_PRIME_ATTEMPTS {
        let p = random_prime(half_bits);
        let q = random_prime(half_bits);

        if p == q {
            continue;
        }

        // Keep p > q for the q_inv calculation
        let (p, q) = if p < q { (q, p) } else { (p, q) };

        let p_minus_1 = &p - 1u8;
        let q_minus_1 = &q - 1u8;

        // e must be invertible modulo both p-1 and q-1
        if !gcd(&e_big, &p_minus_1).is_one() || !gcd(&e_big, &q_minus_1).is_one() {
            continue;
        }

        let n = &p * &q;
        if n.bits() as u32 != bit_length {
            continue;
        }

        let phi_n = &p_minus_1 * &q_minus_1;
        let d = mod_inverse(&e_big, &phi_n)
            .ok_or(RsaError::KeyGeneration("failed to compute modular inverse"))?;
        let q_inv = mod_inverse(&q, &p)
            .ok_or(RsaError::KeyGeneration("failed to compute q^(-1) mod p"))?;
        let d_p = &d % &p_minus_1;
        let d_q = &d % &q_minus_1;

        return Ok(RsaKeyPair {
            public_key: RsaPublicKey {
                n: n.clone(),
                e: e_big,
            },
            private_key: RsaPrivateKey {
                n,
                d,
                p,
                q,
                d_p,
                d_q,
                q_inv,
            },
        });
    }

    Err(RsaError::KeyGeneration("no suitable prime pair found"))
}
