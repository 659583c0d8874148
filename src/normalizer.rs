//! Participant identifier normalization
//!
//! The engine only needs `normalize(identifier) -> identifier`. Checksum
//! casing of addresses belongs to the host; the implementations here cover
//! validation plus a canonical lower-case form, and a pass-through.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    Empty,
    InvalidAddress { address: String, reason: String },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::Empty => write!(f, "Empty address"),
            NormalizeError::InvalidAddress { address, reason } => {
                write!(f, "Invalid address {}: {}", address, reason)
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

pub trait AddressNormalizer: Send + Sync {
    fn normalize(&self, address: &str) -> Result<String, NormalizeError>;
}

/// 20-byte hex addresses (`0x` + 40 hex digits), lower-cased
#[derive(Debug, Clone, Copy, Default)]
pub struct HexAddressNormalizer;

const ADDRESS_BYTES: usize = 20;

impl AddressNormalizer for HexAddressNormalizer {
    fn normalize(&self, address: &str) -> Result<String, NormalizeError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(NormalizeError::Empty);
        }

        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(digits).map_err(|e| NormalizeError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        if bytes.len() != ADDRESS_BYTES {
            return Err(NormalizeError::InvalidAddress {
                address: address.to_string(),
                reason: format!("expected {} bytes, got {}", ADDRESS_BYTES, bytes.len()),
            });
        }

        Ok(format!("0x{}", hex::encode(bytes)))
    }
}

/// Leaves identifiers untouched apart from rejecting blanks
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl AddressNormalizer for IdentityNormalizer {
    fn normalize(&self, address: &str) -> Result<String, NormalizeError> {
        if address.trim().is_empty() {
            return Err(NormalizeError::Empty);
        }
        Ok(address.to_string())
    }
}
