//! Account addresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::quantity::HEX_PREFIX;

/// Total length of a valid address: prefix plus 40 characters.
pub const ADDRESS_LEN: usize = HEX_PREFIX.len() + 40;

/// Address validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid address {0:?}")]
pub struct AddressError(pub String);

/// An opaque account identifier, compared byte for byte.
///
/// Addresses read from the node are taken as-is; addresses supplied by API
/// callers go through [`Address::parse`].
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap a string without validating it.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Parse a caller-supplied address, rejecting malformed input.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let address = Self::new(value);
        if address.is_valid() {
            Ok(address)
        } else {
            Err(AddressError(value.to_string()))
        }
    }

    /// Whether the address has the expected length and carries the prefix.
    ///
    /// The prefix may appear anywhere in the string, not only at the start.
    pub fn is_valid(&self) -> bool {
        self.0.len() == ADDRESS_LEN && self.0.contains(HEX_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
