//! Durable pairing credential

use crate::crypto::SECRET_LENGTH;
use crate::{Error, Result};

/// A pairing credential: slot index plus the derived pairing key.
///
/// Created once by the pairing protocol and owned by the caller, who
/// persists it outside the driver and supplies it back to reopen a secure
/// channel without repeating the ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    /// Pairing slot index on the card
    pub index: u8,
    /// 32-byte pairing key
    pub key: [u8; SECRET_LENGTH],
}

impl Pairing {
    /// Serialize as `index ++ key` for persistence
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + SECRET_LENGTH);
        bytes.push(self.index);
        bytes.extend_from_slice(&self.key);
        bytes
    }

    /// Parse a credential persisted by [`Self::to_bytes`]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != 1 + SECRET_LENGTH {
            return Err(Error::InvalidData("pairing data must be 33 bytes"));
        }

        let mut key = [0u8; SECRET_LENGTH];
        key.copy_from_slice(&data[1..]);
        Ok(Self {
            index: data[0],
            key,
        })
    }
}
