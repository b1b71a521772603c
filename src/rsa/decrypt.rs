// RSA Decryption Implementation
// Raw private-key transform with Chinese Remainder Theorem (CRT) optimization

use super::bigint::{from_bytes, mod_pow, write_be_padded, RsaBigInt};
use super::error::RsaError;
use super::keygen::RsaPrivateKey;

/// Decrypt one block in place: m = c^d mod n
/// The recovered block keeps its leading zero bytes; no padding is inspected here
pub fn decrypt_block(block: &mut [u8], private_key: &RsaPrivateKey) -> Result<(), RsaError> {
    let key_bytes = private_key.block_size();
    if block.len() != key_bytes {
        return Err(RsaError::LengthMismatch {
            expected: key_bytes,
            actual: block.len(),
        });
    }

    let c = from_bytes(block);
    if c >= private_key.n {
        return Err(RsaError::OutOfRange);
    }

    let m = decrypt_crt(&c, private_key);

    if !write_be_padded(&m, block) {
        return Err(RsaError::OutOfRange);
    }
    Ok(())
}

/// Decrypt using Chinese Remainder Theorem (CRT)
fn decrypt_crt(c: &RsaBigInt, key: &RsaPrivateKey) -> RsaBigInt {
    // m1 = c^d_p mod p
    let m1 = mod_pow(c, &key.d_p, &key.p);

    // m2 = c^d_q mod q
    let m2 = mod_pow(c, &key.d_q, &key.q);

    // h = (m1 - m2) * q_inv mod p
    let m2_mod_p = &m2 % &key.p;
    let diff = if m1 >= m2_mod_p {
        m1 - m2_mod_p
    } else {
        m1 + &key.p - m2_mod_p
    };
    let h = (diff * &key.q_inv) % &key.p;

    // m = m2 + q * h
    m2 + &key.q * h
}
