//! ECDSA signatures with public key recovery

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::constants::tags;
use crate::tlv::TlvReader;
use crate::{Error, Result};

/// A signature parsed from the SIGN response, with the recovery id
/// matched against the signing public key the card returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// Uncompressed public key of the signing key
    pub public_key: Vec<u8>,
    /// Recovery id (0-3)
    pub rec_id: u8,
    /// Signature r component, 32 bytes
    pub r: [u8; 32],
    /// Signature s component, 32 bytes
    pub s: [u8; 32],
}

impl RecoverableSignature {
    /// Parse the signature template and recover the recovery id by trial
    /// recovery against the embedded public key. When no id reproduces
    /// the key the signature is unusable.
    pub fn parse(hash: &[u8; 32], data: &[u8]) -> Result<Self> {
        let mut tlv = TlvReader::new(data);
        tlv.enter_constructed(tags::TEMPLATE_SIGNATURE)?;
        let public_key = tlv.read_primitive(tags::ECC_PUBLIC_KEY)?.to_vec();

        tlv.enter_constructed(tags::ECDSA_TEMPLATE)?;
        let r = scalar_bytes(tlv.read_primitive(tags::INT)?)?;
        let s = scalar_bytes(tlv.read_primitive(tags::INT)?)?;

        let signature = Signature::from_scalars(r, s)
            .map_err(|_| Error::InvalidData("invalid signature scalars"))?;

        for rec_id in 0..=3u8 {
            let id = RecoveryId::from_byte(rec_id).unwrap();
            let Ok(recovered) = VerifyingKey::recover_from_prehash(hash, &signature, id) else {
                continue;
            };
            if recovered.to_encoded_point(false).as_bytes() == public_key.as_slice() {
                return Ok(Self {
                    public_key,
                    rec_id,
                    r,
                    s,
                });
            }
        }

        Err(Error::UnrecoverableSignature)
    }
}

/// Normalize a DER integer to a 32-byte scalar: strip any leading zero,
/// left-pad short values.
fn scalar_bytes(value: &[u8]) -> Result<[u8; 32]> {
    let start = value.iter().position(|&b| b != 0).unwrap_or(value.len());
    let trimmed = &value[start..];
    if trimmed.len() > 32 {
        return Err(Error::InvalidData("signature scalar longer than 32 bytes"));
    }

    let mut out = [0u8; 32];
    out[32 - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::TlvWriter;
    use k256::ecdsa::SigningKey;
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use sha2::{Digest, Sha256};

    fn signature_template(public_key: &[u8], r: &[u8], s: &[u8]) -> Vec<u8> {
        let mut inner = TlvWriter::new();
        inner.write_primitive(tags::INT, r);
        inner.write_primitive(tags::INT, s);
        let ecdsa = inner.into_template(tags::ECDSA_TEMPLATE);

        let mut outer = TlvWriter::new();
        outer.write_primitive(tags::ECC_PUBLIC_KEY, public_key);
        let mut data = outer.into_bytes().to_vec();
        data.extend_from_slice(&ecdsa);

        let mut template = vec![tags::TEMPLATE_SIGNATURE];
        if data.len() > 0x7F {
            template.push(0x81);
        }
        template.push(data.len() as u8);
        template.extend_from_slice(&data);
        template
    }

    #[test]
    fn test_parse_and_recover() {
        let signing_key = SigningKey::random(&mut rand_v8::thread_rng());
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();

        let hash: [u8; 32] = Sha256::digest(b"data to sign").into();
        let signature: Signature = signing_key.sign_prehash(&hash).unwrap();

        let (r, s) = signature.split_bytes();
        let template = signature_template(&public_key, r.as_slice(), s.as_slice());

        let recovered = RecoverableSignature::parse(&hash, &template).unwrap();
        assert_eq!(recovered.public_key, public_key);
        assert!(recovered.rec_id <= 3);

        // The recovered id really does reproduce the signing key
        let id = RecoveryId::from_byte(recovered.rec_id).unwrap();
        let key = VerifyingKey::recover_from_prehash(&hash, &signature, id).unwrap();
        assert_eq!(key.to_encoded_point(false).as_bytes(), public_key.as_slice());
    }

    #[test]
    fn test_mismatched_public_key_is_unrecoverable() {
        let signing_key = SigningKey::random(&mut rand_v8::thread_rng());
        let other_key = SigningKey::random(&mut rand_v8::thread_rng());
        let wrong_public = other_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();

        let hash: [u8; 32] = Sha256::digest(b"data to sign").into();
        let signature: Signature = signing_key.sign_prehash(&hash).unwrap();

        let (r, s) = signature.split_bytes();
        let template = signature_template(&wrong_public, r.as_slice(), s.as_slice());

        assert!(matches!(
            RecoverableSignature::parse(&hash, &template),
            Err(Error::UnrecoverableSignature)
        ));
    }
}
