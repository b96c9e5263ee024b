//! Hex quantity encoding used on the JSON-RPC wire.
//!
//! Block heights and transaction indices travel as `0x`-prefixed base-16
//! text (`"0xa"`, `"0x1b4"`). The pipeline only ever works with the decoded
//! `u64` form.

use thiserror::Error;

/// Prefix carried by every hex quantity.
pub const HEX_PREFIX: &str = "0x";

/// Errors produced while decoding a hex quantity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// Value does not start with the `0x` prefix.
    #[error("hex quantity {0:?} is missing the 0x prefix")]
    MissingPrefix(String),

    /// Nothing follows the prefix.
    #[error("hex quantity {0:?} has no digits")]
    Empty(String),

    /// A character after the prefix is not a hex digit.
    #[error("hex quantity {0:?} contains a non-hex digit")]
    InvalidDigit(String),

    /// The value does not fit in 64 bits.
    #[error("hex quantity {0:?} overflows u64")]
    Overflow(String),
}

/// Decode a `0x`-prefixed hex quantity.
pub fn parse_quantity(value: &str) -> Result<u64, QuantityError> {
    let digits = value
        .strip_prefix(HEX_PREFIX)
        .ok_or_else(|| QuantityError::MissingPrefix(value.to_string()))?;

    if digits.is_empty() {
        return Err(QuantityError::Empty(value.to_string()));
    }
    // from_str_radix tolerates a leading sign, the wire format does not
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(QuantityError::InvalidDigit(value.to_string()));
    }

    u64::from_str_radix(digits, 16).map_err(|_| QuantityError::Overflow(value.to_string()))
}

/// Encode a value as a lowercase `0x`-prefixed hex quantity.
pub fn format_quantity(value: u64) -> String {
    format!("{value:#x}")
}
