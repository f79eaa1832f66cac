//! SCP02 session state and key derivation
//!
//! A session is created from the INITIALIZE UPDATE response: the card's
//! cryptogram is verified under keys derived from a static key set, and
//! the session keys are retained for wrapping subsequent commands.

use zeroize::Zeroize;

use crate::constants::{INIT_UPDATE_RESPONSE_LENGTH, scp};
use crate::crypto::{
    DERIVATION_PURPOSE_DEK, DERIVATION_PURPOSE_ENC, DERIVATION_PURPOSE_MAC, calculate_cryptogram,
    derive_session_key,
};
use crate::{Error, Result};

/// An SCP02 key set (encryption, MAC, data encryption)
#[derive(Debug, Clone, Zeroize)]
#[zeroize(drop)]
pub struct Keys {
    enc: [u8; 16],
    mac: [u8; 16],
    dek: [u8; 16],
}

impl Keys {
    /// Create a key set from individual keys
    pub const fn new(enc: [u8; 16], mac: [u8; 16], dek: [u8; 16]) -> Self {
        Self { enc, mac, dek }
    }

    /// Create a key set where all three keys are the same
    pub const fn from_single_key(key: [u8; 16]) -> Self {
        Self {
            enc: key,
            mac: key,
            dek: key,
        }
    }

    /// The GlobalPlatform test key set (`40 41 ... 4F`)
    pub const fn default_keys() -> Self {
        Self::from_single_key([
            0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x4D,
            0x4E, 0x4F,
        ])
    }

    /// The key set used by production Keycard security domains
    pub const fn status_keys() -> Self {
        Self::from_single_key([
            0xC2, 0x12, 0xE0, 0x73, 0xFF, 0x8B, 0x4B, 0xBF, 0xAF, 0xF4, 0xDE, 0x8A, 0xB6, 0x55,
            0x22, 0x1F,
        ])
    }

    /// The encryption key
    pub const fn enc(&self) -> &[u8; 16] {
        &self.enc
    }

    /// The MAC key
    pub const fn mac(&self) -> &[u8; 16] {
        &self.mac
    }

    /// The data encryption key
    pub const fn dek(&self) -> &[u8; 16] {
        &self.dek
    }
}

/// State of an authenticated SCP02 session
#[derive(Debug, Clone)]
pub struct Session {
    keys: Keys,
    card_challenge: [u8; 8],
    host_challenge: [u8; 8],
    sequence_counter: [u8; 2],
}

impl Session {
    /// Create a session from the INITIALIZE UPDATE response payload.
    ///
    /// The 28-byte payload carries the sequence counter at offset 12, the
    /// 8-byte card challenge (which embeds the counter) at offsets 12..20
    /// and the 8-byte card cryptogram at offsets 20..28. Session keys are
    /// derived from `static_keys` and the card cryptogram is verified;
    /// a mismatch fails with `AuthenticationFailed` so the caller can try
    /// the next key set.
    pub fn new(static_keys: &Keys, init_data: &[u8], host_challenge: &[u8; 8]) -> Result<Self> {
        if init_data.len() != INIT_UPDATE_RESPONSE_LENGTH {
            return Err(Error::InvalidLength {
                expected: INIT_UPDATE_RESPONSE_LENGTH,
                actual: init_data.len(),
            });
        }

        let scp_major_version = init_data[11];
        if scp_major_version != scp::SCP02 {
            return Err(Error::UnsupportedScpVersion(scp_major_version));
        }

        let mut sequence_counter = [0u8; 2];
        sequence_counter.copy_from_slice(&init_data[12..14]);

        let mut card_challenge = [0u8; 8];
        card_challenge.copy_from_slice(&init_data[12..20]);

        let card_cryptogram = &init_data[20..28];

        let keys = Keys::new(
            derive_session_key(static_keys.enc(), &sequence_counter, &DERIVATION_PURPOSE_ENC),
            derive_session_key(static_keys.mac(), &sequence_counter, &DERIVATION_PURPOSE_MAC),
            derive_session_key(static_keys.dek(), &sequence_counter, &DERIVATION_PURPOSE_DEK),
        );

        let expected = calculate_cryptogram(keys.enc(), host_challenge, &card_challenge);
        if expected != card_cryptogram {
            return Err(Error::AuthenticationFailed("invalid card cryptogram"));
        }

        Ok(Self {
            keys,
            card_challenge,
            host_challenge: *host_challenge,
            sequence_counter,
        })
    }

    /// The derived session keys
    pub const fn keys(&self) -> &Keys {
        &self.keys
    }

    /// The card challenge (sequence counter included)
    pub const fn card_challenge(&self) -> &[u8; 8] {
        &self.card_challenge
    }

    /// The sequence counter
    pub const fn sequence_counter(&self) -> &[u8; 2] {
        &self.sequence_counter
    }

    /// The host cryptogram sent in EXTERNAL AUTHENTICATE
    pub fn host_cryptogram(&self) -> [u8; 8] {
        calculate_cryptogram(self.keys.enc(), &self.card_challenge, &self.host_challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const INIT_DATA: [u8; 28] = hex!("000002650183039536622002000de9c62ba1c4c8e55fcb91b6654ce4");
    const HOST_CHALLENGE: [u8; 8] = hex!("f0467f908e5ca23f");

    #[test]
    fn test_session_new() {
        let keys = Keys::default_keys();
        let session = Session::new(&keys, &INIT_DATA, &HOST_CHALLENGE).unwrap();

        assert_eq!(session.sequence_counter(), &hex!("000d"));
        assert_eq!(session.card_challenge(), &hex!("000de9c62ba1c4c8"));
    }

    #[test]
    fn test_session_wrong_length() {
        let keys = Keys::default_keys();
        assert!(matches!(
            Session::new(&keys, &hex!("69826982"), &HOST_CHALLENGE),
            Err(Error::InvalidLength { expected: 28, .. })
        ));
    }

    #[test]
    fn test_session_wrong_scp_version() {
        let keys = Keys::default_keys();
        let mut data = INIT_DATA;
        data[11] = 0x01;
        assert!(matches!(
            Session::new(&keys, &data, &HOST_CHALLENGE),
            Err(Error::UnsupportedScpVersion(0x01))
        ));
    }

    #[test]
    fn test_session_bad_cryptogram() {
        let keys = Keys::default_keys();
        let mut data = INIT_DATA;
        data[27] ^= 0xFF;
        assert!(matches!(
            Session::new(&keys, &data, &HOST_CHALLENGE),
            Err(Error::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_wrong_key_set_rejected() {
        // The response was produced under the default keys, so the Status
        // production keys must fail verification
        let keys = Keys::status_keys();
        assert!(Session::new(&keys, &INIT_DATA, &HOST_CHALLENGE).is_err());
    }
}
