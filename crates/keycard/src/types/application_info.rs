//! Applet identity and capabilities, parsed from the SELECT response

use std::fmt;

use crate::constants::tags;
use crate::tlv::{TlvError, TlvReader};
use crate::types::{Capabilities, Capability, Version};
use crate::{Error, Result};

/// Card applet identity, parsed from every SELECT
///
/// A factory card that has not been initialized answers with a bare
/// public key instead of the full template; only the key and a reduced
/// capability set are present in that state.
#[derive(Debug, Clone)]
pub struct ApplicationInfo {
    /// Instance UID (16 bytes; empty before initialization)
    pub instance_uid: Vec<u8>,
    /// Secure channel public key, when the card carries one
    pub public_key: Option<k256::PublicKey>,
    /// Applet version
    pub version: Version,
    /// Remaining free pairing slots
    pub free_pairing_slots: u8,
    /// Key UID (SHA-256 of the master public key; empty without a key)
    pub key_uid: Vec<u8>,
    /// Advertised capabilities
    pub capabilities: Capabilities,
    /// Whether the card has been initialized
    pub initialized: bool,
}

impl ApplicationInfo {
    /// Parse the SELECT response payload
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut tlv = TlvReader::new(data);

        let top_tag = tlv.read_tag()?;
        tlv.unread_tag();

        if top_tag == tags::ECC_PUBLIC_KEY {
            return Self::parse_uninitialized(&mut tlv);
        }

        tlv.enter_constructed(tags::TEMPLATE_APPLICATION_INFO)?;
        let instance_uid = tlv.read_primitive(tags::INSTANCE_UID)?.to_vec();
        let public_key = parse_public_key(tlv.read_primitive(tags::ECC_PUBLIC_KEY)?)?;
        let version = Version::from(tlv.read_int()? as u16);
        let free_pairing_slots = tlv.read_int()? as u8;
        let key_uid = tlv.read_primitive(tags::KEY_UID)?.to_vec();

        // Older applets omit the capability byte and support everything
        let capabilities = match tlv.read_primitive(tags::CAPABILITIES) {
            Ok(value) if !value.is_empty() => Capabilities::from(value[0]),
            Ok(_) => return Err(Error::InvalidData("empty capabilities")),
            Err(TlvError::EndOfData) => Capabilities::ALL,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            instance_uid,
            public_key,
            version,
            free_pairing_slots,
            key_uid,
            capabilities,
            initialized: true,
        })
    }

    fn parse_uninitialized(tlv: &mut TlvReader<'_>) -> Result<Self> {
        let key_data = tlv.read_primitive(tags::ECC_PUBLIC_KEY)?;
        let public_key = parse_public_key(key_data)?;

        let capabilities = if public_key.is_some() {
            Capabilities::new(&[Capability::SecureChannel, Capability::CredentialsManagement])
        } else {
            Capabilities::new(&[Capability::CredentialsManagement])
        };

        Ok(Self {
            instance_uid: Vec::new(),
            public_key,
            version: Version::default(),
            free_pairing_slots: 0,
            key_uid: Vec::new(),
            capabilities,
            initialized: false,
        })
    }

    /// Whether the card holds a master key
    pub fn has_master_key(&self) -> bool {
        !self.key_uid.is_empty()
    }

    /// Whether the applet advertises a capability
    pub const fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }
}

fn parse_public_key(data: &[u8]) -> Result<Option<k256::PublicKey>> {
    if data.is_empty() {
        return Ok(None);
    }
    k256::PublicKey::from_sec1_bytes(data)
        .map(Some)
        .map_err(|_| Error::InvalidData("invalid secure channel public key"))
}

impl fmt::Display for ApplicationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.initialized {
            return write!(f, "uninitialized card ({})", self.capabilities);
        }
        write!(
            f,
            "instance {} v{}, {} free pairing slot(s), {}",
            hex::encode(&self.instance_uid),
            self.version,
            self.free_pairing_slots,
            self.capabilities
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::TlvWriter;
    use k256::elliptic_curve::sec1::ToEncodedPoint;

    fn sample_public_key() -> (k256::PublicKey, Vec<u8>) {
        let secret = k256::SecretKey::random(&mut rand_v8::thread_rng());
        let public = secret.public_key();
        let encoded = public.to_encoded_point(false).as_bytes().to_vec();
        (public, encoded)
    }

    #[test]
    fn test_parse_initialized_template() {
        let (public, encoded) = sample_public_key();

        let mut writer = TlvWriter::new();
        writer.write_primitive(tags::INSTANCE_UID, &[0x42; 16]);
        writer.write_primitive(tags::ECC_PUBLIC_KEY, &encoded);
        writer.write_primitive(tags::INT, &[0x03, 0x01]);
        writer.write_primitive(tags::INT, &[0x04]);
        writer.write_primitive(tags::KEY_UID, &[0x24; 32]);
        writer.write_primitive(tags::CAPABILITIES, &[0x0F]);
        let data = writer.into_template(tags::TEMPLATE_APPLICATION_INFO);

        let info = ApplicationInfo::parse(&data).unwrap();
        assert!(info.initialized);
        assert_eq!(info.instance_uid, vec![0x42; 16]);
        assert_eq!(info.public_key, Some(public));
        assert_eq!(info.version.to_string(), "3.1");
        assert_eq!(info.free_pairing_slots, 4);
        assert!(info.has_master_key());
        assert!(info.has_capability(Capability::SecureChannel));
    }

    #[test]
    fn test_parse_template_without_capabilities_defaults_to_all() {
        let (_, encoded) = sample_public_key();

        let mut writer = TlvWriter::new();
        writer.write_primitive(tags::INSTANCE_UID, &[0x42; 16]);
        writer.write_primitive(tags::ECC_PUBLIC_KEY, &encoded);
        writer.write_primitive(tags::INT, &[0x02, 0x02]);
        writer.write_primitive(tags::INT, &[0x05]);
        writer.write_primitive(tags::KEY_UID, &[]);
        let data = writer.into_template(tags::TEMPLATE_APPLICATION_INFO);

        let info = ApplicationInfo::parse(&data).unwrap();
        assert_eq!(info.capabilities, Capabilities::ALL);
        assert!(!info.has_master_key());
    }

    #[test]
    fn test_parse_uninitialized_with_key() {
        let (public, encoded) = sample_public_key();

        // The pre-initialized response is the bare public key primitive
        let mut writer = TlvWriter::new();
        writer.write_primitive(tags::ECC_PUBLIC_KEY, &encoded);
        let raw = writer.into_bytes();

        let info = ApplicationInfo::parse(&raw).unwrap();
        assert!(!info.initialized);
        assert_eq!(info.public_key, Some(public));
        assert_eq!(info.free_pairing_slots, 0);
        assert!(info.has_capability(Capability::SecureChannel));
        assert!(info.has_capability(Capability::CredentialsManagement));
    }

    #[test]
    fn test_parse_uninitialized_without_key() {
        // Empty public key: no secure channel capability
        let raw = [tags::ECC_PUBLIC_KEY, 0x00];
        let info = ApplicationInfo::parse(&raw).unwrap();

        assert!(!info.initialized);
        assert!(info.public_key.is_none());
        assert_eq!(info.free_pairing_slots, 0);
        assert!(!info.has_capability(Capability::SecureChannel));
        assert!(info.has_capability(Capability::CredentialsManagement));
    }
}
