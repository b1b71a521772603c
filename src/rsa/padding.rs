// PKCS#1 v1.5 Padding
// Implements block-type-2 (encryption) padding and its validation

use rand::Rng;

use super::error::RsaError;

/// 0x00 || 0x02 || at least 8 filler bytes || 0x00
pub const MIN_PADDING_OVERHEAD: usize = 11;

/// Minimum length of the random filler string
const MIN_FILLER_LEN: usize = 8;

/// Build a PKCS#1 v1.5 encryption block of `block_size` bytes
/// Format: 0x00 || 0x02 || PS || 0x00 || data
/// PS = non-zero random bytes filling the block (at least 8 bytes)
pub fn pad_pkcs1_v15(data: &[u8], block_size: usize) -> Result<Vec<u8>, RsaError> {
    let max = block_size.saturating_sub(MIN_PADDING_OVERHEAD);
    if block_size < MIN_PADDING_OVERHEAD || data.len() > max {
        return Err(RsaError::DataTooLarge {
            max,
            actual: data.len(),
        });
    }

    let filler_len = block_size - data.len() - 3;
    let mut rng = rand::thread_rng();

    let mut block = Vec::with_capacity(block_size);
    block.push(0x00);
    block.push(0x02);
    // Sample from 1..=255 directly so no byte value is favored
    block.extend((0..filler_len).map(|_| rng.gen_range(1..=u8::MAX)));
    block.push(0x00);
    block.extend_from_slice(data);

    debug_assert_eq!(block.len(), block_size);
    Ok(block)
}

/// Validate a PKCS#1 v1.5 encryption block and return the message it carries
pub fn unpad_pkcs1_v15(block: &[u8]) -> Result<&[u8], RsaError> {
    if block.len() < MIN_PADDING_OVERHEAD {
        return Err(RsaError::InvalidPadding("block too short"));
    }
    if block[0] != 0x00 {
        return Err(RsaError::InvalidPadding("first byte must be 0x00"));
    }
    if block[1] != 0x02 {
        return Err(RsaError::InvalidPadding("second byte must be 0x02"));
    }

    let separator = block[2..]
        .iter()
        .position(|&b| b == 0x00)
        .map(|pos| pos + 2)
        .ok_or(RsaError::InvalidPadding("no separator byte found"))?;

    if separator - 2 < MIN_FILLER_LEN {
        return Err(RsaError::InvalidPadding("filler too short"));
    }

    Ok(&block[separator + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_structure() {
        let data = b"Hello";
        let block = pad_pkcs1_v15(data, 64).unwrap();
        assert_eq!(block.len(), 64);

        assert_eq!(block[0], 0x00);
        assert_eq!(block[1], 0x02);
        assert_eq!(block[64 - data.len() - 1], 0x00);
        assert_eq!(&block[64 - data.len()..], data);

        // Filler bytes are non-zero
        assert!(block[2..64 - data.len() - 1].iter().all(|&b| b != 0));
    }

    #[test]
    fn test_pad_max_size() {
        // Maximum data size for a 64-byte block: 64 - 11 = 53 bytes
        let block = pad_pkcs1_v15(&[0u8; 53], 64).unwrap();
        assert_eq!(block.len(), 64);
        assert_eq!(block[10], 0x00);
    }

    #[test]
    fn test_pad_too_large() {
        let result = pad_pkcs1_v15(&[0u8; 54], 64);
        assert_eq!(
            result.unwrap_err(),
            RsaError::DataTooLarge {
                max: 53,
                actual: 54
            }
        );
    }

    #[test]
    fn test_pad_empty_message() {
        let block = pad_pkcs1_v15(&[], 64).unwrap();
        assert_eq!(block[63], 0x00);
        assert!(unpad_pkcs1_v15(&block).unwrap().is_empty());
    }

    #[test]
    fn test_unpad_returns_message() {
        let block = pad_pkcs1_v15(b"Test data", 128).unwrap();
        assert_eq!(unpad_pkcs1_v15(&block).unwrap(), b"Test data");
    }

    #[test]
    fn test_invalid_block_type() {
        let mut block = pad_pkcs1_v15(b"abc", 64).unwrap();
        block[1] = 0x01;
        assert!(unpad_pkcs1_v15(&block).is_err());
    }

    #[test]
    fn test_missing_separator() {
        let mut block = vec![0xFFu8; 32];
        block[0] = 0x00;
        block[1] = 0x02;
        assert_eq!(
            unpad_pkcs1_v15(&block).unwrap_err(),
            RsaError::InvalidPadding("no separator byte found")
        );
    }

    #[test]
    fn test_short_filler() {
        let mut block = vec![0xFFu8; 32];
        block[0] = 0x00;
        block[1] = 0x02;
        block[5] = 0x00;
        assert_eq!(
            unpad_pkcs1_v15(&block).unwrap_err(),
            RsaError::InvalidPadding("filler too short")
        );
    }
}
