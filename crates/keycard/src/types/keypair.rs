//! BIP32 keypairs: TLV parsing/serialization and seed derivation

use alloy_primitives::keccak256;
use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::Sha512;

use crate::constants::tags;
use crate::tlv::{TlvError, TlvReader, TlvWriter};
use crate::{Error, Result};

/// A BIP32 keypair: public key plus optional private key and chain code.
///
/// Key material coming from the card is parsed from the keypair template;
/// key material going to the card (LOAD KEY) is serialized back into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bip32KeyPair {
    /// Private key, absent for public-only exports
    pub private_key: Option<Vec<u8>>,
    /// Chain code, present for extended keys
    pub chain_code: Option<Vec<u8>>,
    /// Uncompressed public key (65 bytes)
    pub public_key: Vec<u8>,
}

impl Bip32KeyPair {
    /// Assemble a keypair. The public key is derived from the private key
    /// when not supplied; a chain code without a private key is invalid.
    pub fn new(
        private_key: Option<&[u8]>,
        chain_code: Option<&[u8]>,
        public_key: Option<&[u8]>,
    ) -> Result<Self> {
        if private_key.is_none() && (chain_code.is_some() || public_key.is_none()) {
            return Err(Error::InvalidData(
                "a keypair needs a private key or a bare public key",
            ));
        }

        let private_key = private_key.map(drop_zero_prefix);

        let public_key = match public_key {
            Some(key) => key.to_vec(),
            None => public_from_private(private_key.as_deref().unwrap())?,
        };

        Ok(Self {
            private_key,
            chain_code: chain_code.map(<[u8]>::to_vec),
            public_key,
        })
    }

    /// Master keypair from a BIP39 binary seed (HMAC-SHA512 under
    /// "Bitcoin seed")
    pub fn from_seed(seed: &[u8; 64]) -> Result<Self> {
        let mut mac = Hmac::<Sha512>::new_from_slice(b"Bitcoin seed")
            .expect("HMAC accepts any key length");
        mac.update(seed);
        let digest = mac.finalize().into_bytes();

        Self::new(Some(&digest[..32]), Some(&digest[32..]), None)
    }

    /// Parse the keypair template returned by EXPORT KEY
    pub fn from_tlv(data: &[u8]) -> Result<Self> {
        let mut tlv = TlvReader::new(data);
        tlv.enter_constructed(tags::TEMPLATE_KEYPAIR)?;

        let mut public_key = None;
        let mut private_key = None;
        let mut chain_code = None;

        let mut tag = tlv.read_tag()?;
        if tag == tags::ECC_PUBLIC_KEY {
            tlv.unread_tag();
            public_key = Some(tlv.read_primitive(tags::ECC_PUBLIC_KEY)?);
            tag = match tlv.read_tag() {
                Ok(tag) => tag,
                Err(TlvError::EndOfData) => tags::ECC_PUBLIC_KEY,
                Err(e) => return Err(e.into()),
            };
        }

        if tag == tags::ECC_PRIVATE_KEY {
            tlv.unread_tag();
            private_key = Some(tlv.read_primitive(tags::ECC_PRIVATE_KEY)?);
            chain_code = match tlv.read_primitive(tags::CHAIN_CODE) {
                Ok(code) => Some(code),
                Err(TlvError::EndOfData) => None,
                Err(e) => return Err(e.into()),
            };
        }

        Self::new(private_key, chain_code, public_key)
    }

    /// Serialize into the keypair template for LOAD KEY
    pub fn to_tlv(&self, include_public: bool) -> Vec<u8> {
        let mut writer = TlvWriter::new();

        if include_public {
            writer.write_primitive(tags::ECC_PUBLIC_KEY, &self.public_key);
        }
        if let Some(private_key) = &self.private_key {
            writer.write_primitive(tags::ECC_PRIVATE_KEY, private_key);
        }
        if let Some(chain_code) = &self.chain_code {
            writer.write_primitive(tags::CHAIN_CODE, chain_code);
        }

        writer.into_template(tags::TEMPLATE_KEYPAIR).to_vec()
    }

    /// Whether only the public half is present
    pub const fn is_public_only(&self) -> bool {
        self.private_key.is_none()
    }

    /// Whether a chain code is present
    pub const fn is_extended(&self) -> bool {
        self.chain_code.is_some()
    }

    /// Ethereum address: low 20 bytes of keccak256 over the public key
    /// without its SEC1 prefix byte
    pub fn ethereum_address(&self) -> [u8; 20] {
        let digest = keccak256(&self.public_key[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[12..]);
        address
    }
}

/// Strip leading zero bytes from a big-endian private scalar
fn drop_zero_prefix(data: &[u8]) -> Vec<u8> {
    let start = data.iter().position(|&b| b != 0).unwrap_or(data.len());
    data[start..].to_vec()
}

fn public_from_private(private_key: &[u8]) -> Result<Vec<u8>> {
    let secret = k256::SecretKey::from_slice(private_key)
        .map_err(|_| Error::InvalidData("invalid private key"))?;
    Ok(secret
        .public_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_tlv_round_trip_extended() {
        let secret = k256::SecretKey::random(&mut rand_v8::thread_rng());
        let private = secret.to_bytes().to_vec();
        let chain = [0x77u8; 32];

        let pair = Bip32KeyPair::new(Some(&private), Some(&chain), None).unwrap();
        assert!(pair.is_extended());

        let tlv = pair.to_tlv(true);
        let parsed = Bip32KeyPair::from_tlv(&tlv).unwrap();
        assert_eq!(parsed, pair);
    }

    #[test]
    fn test_tlv_public_only() {
        let secret = k256::SecretKey::random(&mut rand_v8::thread_rng());
        let public = secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();

        let pair = Bip32KeyPair::new(None, None, Some(&public)).unwrap();
        assert!(pair.is_public_only());

        let parsed = Bip32KeyPair::from_tlv(&pair.to_tlv(true)).unwrap();
        assert_eq!(parsed.public_key, public);
        assert!(parsed.is_public_only());
    }

    #[test]
    fn test_chain_code_without_private_rejected() {
        let chain = [0x77u8; 32];
        assert!(Bip32KeyPair::new(None, Some(&chain), Some(&[0x04; 65])).is_err());
    }

    #[test]
    fn test_from_seed_known_vector() {
        // BIP32 test vector 1: master key from seed 000102030405060708090a0b0c0d0e0f
        // extended to 64 bytes the way the card receives BIP39 output is not
        // applicable here; use the canonical short-seed HMAC directly
        let mut mac = Hmac::<Sha512>::new_from_slice(b"Bitcoin seed").unwrap();
        mac.update(&hex!("000102030405060708090a0b0c0d0e0f"));
        let digest = mac.finalize().into_bytes();

        let pair = Bip32KeyPair::new(Some(&digest[..32]), Some(&digest[32..]), None).unwrap();
        assert_eq!(
            pair.private_key.as_deref().unwrap(),
            hex!("e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35")
        );
        assert_eq!(
            pair.chain_code.as_deref().unwrap(),
            hex!("873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508")
        );
    }

    #[test]
    fn test_zero_prefix_dropped() {
        let private = hex!("00e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b");
        let pair = Bip32KeyPair::new(Some(&private), None, Some(&[0x04; 65])).unwrap();
        assert_eq!(pair.private_key.as_deref().unwrap().len(), 31);
    }
}
