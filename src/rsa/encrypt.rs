// RSA Encryption Implementation
// Raw public-key transform over one padded block, in place

use super::bigint::{from_bytes, mod_pow, write_be_padded};
use super::error::RsaError;
use super::keygen::RsaPublicKey;

/// Encrypt one block in place: c = m^e mod n
/// `block` must be exactly the key's block size and already padded
pub fn encrypt_block(block: &mut [u8], public_key: &RsaPublicKey) -> Result<(), RsaError> {
    let key_bytes = public_key.block_size();
    if block.len() != key_bytes {
        return Err(RsaError::LengthMismatch {
            expected: key_bytes,
            actual: block.len(),
        });
    }

    let m = from_bytes(block);
    if m >= public_key.n {
        return Err(RsaError::OutOfRange);
    }

    let c = mod_pow(&m, &public_key.e, &public_key.n);

    // Left-pad with zeros to the key size
    if !write_be_padded(&c, block) {
        return Err(RsaError::OutOfRange);
    }
    Ok(())
}
