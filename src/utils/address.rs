//! Account and contract identifiers.
//!
//! Every participant in the protocol (users, the ledger, the exchange, the
//! flash pool, the orchestrator and the assets themselves) is named by a
//! 20-byte [`Address`]. Addresses serialize as lowercase hex.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::constants::ADDRESS_LENGTH;

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A 20-byte account identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Address {
    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The all-zero address
    pub const fn zero() -> Self {
        Self([0u8; ADDRESS_LENGTH])
    }

    /// Derive a stable address from a human-readable label.
    ///
    /// The first 20 bytes of `SHA256(label)`; used by the simulator and tests
    /// to name participants ("alice", "ledger", ...).
    pub fn from_label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    /// Create from a slice (must be exactly 20 bytes)
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != ADDRESS_LENGTH {
            return Err(Error::InvalidParameter {
                name: "address".into(),
                reason: format!("expected {} bytes, got {}", ADDRESS_LENGTH, slice.len()),
            });
        }
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Parse from hex, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| Error::InvalidParameter {
            name: "address".into(),
            reason: e.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    /// Get the address as bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form for logs
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }

    /// Check for the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{}...)", self.short())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_is_stable() {
        assert_eq!(Address::from_label("alice"), Address::from_label("alice"));
        assert_ne!(Address::from_label("alice"), Address::from_label("bob"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let addr = Address::from_label("ledger");
        assert_eq!(Address::from_hex(&addr.to_hex()).unwrap(), addr);
        assert_eq!(Address::from_hex(&addr.to_string()).unwrap(), addr);
    }

    #[test]
    fn test_from_slice_rejects_bad_length() {
        assert!(Address::from_slice(&[0u8; 19]).is_err());
        assert!(Address::from_hex("zz").is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let addr = Address::from_label("pool");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr.to_hex()));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
