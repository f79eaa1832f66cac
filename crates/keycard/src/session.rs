//! Secure channel session state
//!
//! A session holds the AES encryption and MAC keys derived during channel
//! opening and the chained IV. The IV is recomputed from every exchanged
//! message and never reused, so a session must only ever be driven by one
//! logical caller at a time.

use zeroize::Zeroize;

use crate::crypto::{BLOCK_LENGTH, SECRET_LENGTH, calculate_mac, derive_session_keys};
use crate::{Error, Result};

/// Session key set
#[derive(Debug, Clone, Zeroize)]
#[zeroize(drop)]
pub struct Keys {
    enc: [u8; 32],
    mac: [u8; 32],
}

impl Keys {
    const fn new(enc: [u8; 32], mac: [u8; 32]) -> Self {
        Self { enc, mac }
    }

    /// The AES encryption key
    pub const fn enc(&self) -> &[u8; 32] {
        &self.enc
    }

    /// The MAC key
    pub const fn mac(&self) -> &[u8; 32] {
        &self.mac
    }
}

/// Live session state: keys plus the chained IV
#[derive(Debug, Clone)]
pub struct Session {
    keys: Keys,
    iv: [u8; BLOCK_LENGTH],
}

impl Session {
    /// Derive a session from the OPEN SECURE CHANNEL response payload:
    /// a 32-byte salt followed by the initial 16-byte IV.
    pub fn new(
        secret: &[u8; SECRET_LENGTH],
        pairing_key: &[u8; SECRET_LENGTH],
        payload: &[u8],
    ) -> Result<Self> {
        if payload.len() != SECRET_LENGTH + BLOCK_LENGTH {
            return Err(Error::InvalidData(
                "open secure channel response must be salt(32) + iv(16)",
            ));
        }

        let mut salt = [0u8; SECRET_LENGTH];
        salt.copy_from_slice(&payload[..SECRET_LENGTH]);

        let mut iv = [0u8; BLOCK_LENGTH];
        iv.copy_from_slice(&payload[SECRET_LENGTH..]);

        let (enc, mac) = derive_session_keys(secret, pairing_key, &salt);

        Ok(Self {
            keys: Keys::new(enc, mac),
            iv,
        })
    }

    /// Build a session from raw keys and IV (test harnesses)
    pub const fn from_raw(enc: [u8; 32], mac: [u8; 32], iv: [u8; BLOCK_LENGTH]) -> Self {
        Self {
            keys: Keys::new(enc, mac),
            iv,
        }
    }

    /// The session keys
    pub const fn keys(&self) -> &Keys {
        &self.keys
    }

    /// The current chained IV
    pub const fn iv(&self) -> &[u8; BLOCK_LENGTH] {
        &self.iv
    }

    /// Advance the chain: the MAC over this message becomes the IV for
    /// the next one.
    pub fn update_iv(&mut self, meta: &[u8; BLOCK_LENGTH], data: &[u8]) {
        self.iv = calculate_mac(meta, data, self.keys.mac());
    }
}
