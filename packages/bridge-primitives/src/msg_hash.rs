use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Canonical cross-chain correlation identifier for one logical transfer.
///
/// Both ledgers agree on these 32 bytes: Base emits them as an indexed event
/// topic, Solana derives them from the outgoing-message account. Crosses all
/// external boundaries as a `0x`-prefixed 64-digit hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageHash([u8; 32]);

#[derive(Error, Debug, PartialEq)]
pub enum ParseMessageHashError {
    #[error("message hash must be 32 bytes, got {0}")]
    WrongLength(usize),
    #[error("message hash is not valid hex")]
    InvalidHex,
}

impl MessageHash {
    pub const LEN: usize = 32;

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_fixed_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseMessageHashError> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| ParseMessageHashError::WrongLength(bytes.len()))
    }
}

impl From<[u8; 32]> for MessageHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for MessageHash {
    type Err = ParseMessageHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| ParseMessageHashError::InvalidHex)?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageHash({})", self)
    }
}

impl Serialize for MessageHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
