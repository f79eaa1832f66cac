//! Applet capability flags

use std::fmt;

/// A single applet capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Capability {
    /// ECDH pairing and the encrypted channel
    SecureChannel = 0x01,
    /// Key load/derive/sign/export
    KeyManagement = 0x02,
    /// PIN/PUK/pairing password management
    CredentialsManagement = 0x04,
    /// NDEF record storage
    Ndef = 0x08,
}

/// Capability bitmask advertised by the applet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities(u8);

impl Capabilities {
    /// All capabilities set
    pub const ALL: Self = Self(0x0F);

    /// Build a mask from individual capabilities
    pub fn new(capabilities: &[Capability]) -> Self {
        Self(capabilities.iter().fold(0, |mask, &cap| mask | cap as u8))
    }

    /// Whether the applet advertises the capability
    pub const fn has(self, capability: Capability) -> bool {
        self.0 & capability as u8 != 0
    }
}

impl From<u8> for Capabilities {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.has(Capability::SecureChannel) {
            names.push("secure channel");
        }
        if self.has(Capability::KeyManagement) {
            names.push("key management");
        }
        if self.has(Capability::CredentialsManagement) {
            names.push("credentials management");
        }
        if self.has(Capability::Ndef) {
            names.push("NDEF");
        }
        write!(f, "{}", names.join(", "))
    }
}
