// Layout verification
// Checks a recovered block against 0x00 || 0x02 || non-zero filler || 0x00 || plaintext

use std::fmt;

/// One way a recovered block departs from the expected layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutViolation {
    /// Block does not equal the key's block size
    Length { expected: usize, actual: usize },
    /// Plaintext leaves no room for the 11-byte minimum padding
    PlaintextTooLong { block_size: usize, plaintext_len: usize },
    /// Byte 0 is not 0x00
    LeadingByte { actual: Option<u8> },
    /// Byte 1 is not the 0x02 block-type marker
    BlockType { actual: Option<u8> },
    /// A filler byte is zero
    ZeroFiller { index: usize },
    /// The separator is not 0x00 at its position
    Separator { index: usize, actual: Option<u8> },
    /// Trailing bytes differ from the plaintext
    PlaintextMismatch { offset: usize },
}

impl fmt::Display for LayoutViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn byte(b: &Option<u8>) -> String {
            b.map(|b| format!("0x{:02x}", b))
                .unwrap_or_else(|| "missing".to_string())
        }

        match self {
            LayoutViolation::Length { expected, actual } => {
                write!(f, "buffer is {} bytes, expected {}", actual, expected)
            }
            LayoutViolation::PlaintextTooLong {
                block_size,
                plaintext_len,
            } => write!(
                f,
                "{}-byte plaintext does not fit a padded {}-byte block",
                plaintext_len, block_size
            ),
            LayoutViolation::LeadingByte { actual } => {
                write!(f, "byte 0 is {}, expected 0x00", byte(actual))
            }
            LayoutViolation::BlockType { actual } => {
                write!(f, "byte 1 is {}, expected 0x02", byte(actual))
            }
            LayoutViolation::ZeroFiller { index } => {
                write!(f, "filler byte {} is 0x00", index)
            }
            LayoutViolation::Separator { index, actual } => {
                write!(f, "separator byte {} is {}, expected 0x00", index, byte(actual))
            }
            LayoutViolation::PlaintextMismatch { offset } => {
                write!(f, "plaintext differs at offset {}", offset)
            }
        }
    }
}

/// Result of checking one recovered block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutReport {
    pub block_size: usize,
    pub plaintext_len: usize,
    violations: Vec<LayoutViolation>,
}

impl LayoutReport {
    pub fn is_expected(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[LayoutViolation] {
        &self.violations
    }

    /// Index of the zero separator for this block, if the plaintext fits
    pub fn separator_index(&self) -> Option<usize> {
        self.block_size.checked_sub(self.plaintext_len + 1)
    }
}

/// Check `recovered` against the block-type-2 layout for `original` in a `block_size` block
pub fn verify_layout(recovered: &[u8], block_size: usize, original: &[u8]) -> LayoutReport {
    let mut violations = Vec::new();

    if original.len() + crate::rsa::MIN_PADDING_OVERHEAD > block_size {
        violations.push(LayoutViolation::PlaintextTooLong {
            block_size,
            plaintext_len: original.len(),
        });
        return LayoutReport {
            block_size,
            plaintext_len: original.len(),
            violations,
        };
    }

    if recovered.len() != block_size {
        violations.push(LayoutViolation::Length {
            expected: block_size,
            actual: recovered.len(),
        });
    }

    let at = |i: usize| recovered.get(i).copied();

    if at(0) != Some(0x00) {
        violations.push(LayoutViolation::LeadingByte { actual: at(0) });
    }
    if at(1) != Some(0x02) {
        violations.push(LayoutViolation::BlockType { actual: at(1) });
    }

    let separator = block_size - original.len() - 1;
    for index in 2..separator {
        if at(index) == Some(0x00) {
            violations.push(LayoutViolation::ZeroFiller { index });
        }
    }

    if at(separator) != Some(0x00) {
        violations.push(LayoutViolation::Separator {
            index: separator,
            actual: at(separator),
        });
    }

    let tail = recovered
        .get(separator + 1..block_size.min(recovered.len()))
        .unwrap_or(&[]);
    if let Some(offset) = original
        .iter()
        .zip(tail.iter())
        .position(|(a, b)| a != b)
        .or_else(|| (tail.len() < original.len()).then_some(tail.len()))
    {
        violations.push(LayoutViolation::PlaintextMismatch { offset });
    }

    LayoutReport {
        block_size,
        plaintext_len: original.len(),
        violations,
    }
}

/// Render bytes as `0x00, 0x02, ...`
pub fn format_hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(", ")
}
