//! Wire constants for the Keycard applet: AIDs, instruction codes,
//! parameter values and TLV tags.

/// JavaCard package AID
pub const PACKAGE_AID: &[u8] = b"\xA0\x00\x00\x08\x04\x00\x01";
/// Keycard applet AID
pub const KEYCARD_AID: &[u8] = b"\xA0\x00\x00\x08\x04\x00\x01\x01";
/// NDEF applet AID
pub const NDEF_AID: &[u8] = b"\xA0\x00\x00\x08\x04\x00\x01\x02";
/// NDEF applet instance AID
pub const NDEF_INSTANCE_AID: &[u8] = b"\xD2\x76\x00\x00\x85\x01\x01";
/// Keycard Cash applet AID
pub const CASH_AID: &[u8] = b"\xA0\x00\x00\x08\x04\x00\x01\x03";
/// Keycard Cash applet instance AID
pub const CASH_INSTANCE_AID: &[u8] = b"\xA0\x00\x00\x08\x04\x00\x01\x03\x01";

/// Number of pairing slots offered by the applet
pub const MAX_PAIRING_SLOTS: u8 = 5;

/// ISO7816 command class
pub const CLA_ISO7816: u8 = 0x00;
/// Proprietary command class used by the applet
pub const CLA_PROPRIETARY: u8 = 0x80;

/// Keycard instance AID for the given instance index (1-based)
pub fn keycard_instance_aid(index: u8) -> Vec<u8> {
    assert!(index >= 1, "instance index must be between 1 and 255");
    let mut aid = KEYCARD_AID.to_vec();
    aid.push(index);
    aid
}

/// Instruction codes
pub mod ins {
    /// SELECT (ISO7816)
    pub const SELECT: u8 = 0xA4;
    /// OPEN SECURE CHANNEL
    pub const OPEN_SECURE_CHANNEL: u8 = 0x10;
    /// MUTUALLY AUTHENTICATE
    pub const MUTUALLY_AUTHENTICATE: u8 = 0x11;
    /// PAIR
    pub const PAIR: u8 = 0x12;
    /// UNPAIR
    pub const UNPAIR: u8 = 0x13;
    /// INIT (one-shot encrypted initialization)
    pub const INIT: u8 = 0xFE;
    /// FACTORY RESET
    pub const FACTORY_RESET: u8 = 0xFD;
    /// GET STATUS
    pub const GET_STATUS: u8 = 0xF2;
    /// SET NDEF
    pub const SET_NDEF: u8 = 0xF3;
    /// VERIFY PIN
    pub const VERIFY_PIN: u8 = 0x20;
    /// CHANGE PIN
    pub const CHANGE_PIN: u8 = 0x21;
    /// UNBLOCK PIN
    pub const UNBLOCK_PIN: u8 = 0x22;
    /// LOAD KEY
    pub const LOAD_KEY: u8 = 0xD0;
    /// DERIVE KEY
    pub const DERIVE_KEY: u8 = 0xD1;
    /// GENERATE MNEMONIC
    pub const GENERATE_MNEMONIC: u8 = 0xD2;
    /// REMOVE KEY
    pub const REMOVE_KEY: u8 = 0xD3;
    /// GENERATE KEY
    pub const GENERATE_KEY: u8 = 0xD4;
    /// DUPLICATE KEY
    pub const DUPLICATE_KEY: u8 = 0xD5;
    /// SIGN
    pub const SIGN: u8 = 0xC0;
    /// SET PINLESS PATH
    pub const SET_PINLESS_PATH: u8 = 0xC1;
    /// EXPORT KEY
    pub const EXPORT_KEY: u8 = 0xC2;
    /// GET DATA
    pub const GET_DATA: u8 = 0xCA;
    /// STORE DATA
    pub const STORE_DATA: u8 = 0xE2;
}

/// TLV tags used by structured payloads
pub mod tags {
    /// Boolean primitive (0xFF = true)
    pub const BOOL: u8 = 0x01;
    /// Integer primitive, 1-4 bytes big-endian
    pub const INT: u8 = 0x02;
    /// Signature template (public key + ECDSA template)
    pub const TEMPLATE_SIGNATURE: u8 = 0xA0;
    /// Keypair template (private key, optional chain code / public key)
    pub const TEMPLATE_KEYPAIR: u8 = 0xA1;
    /// Application status template
    pub const TEMPLATE_APPLICATION_STATUS: u8 = 0xA3;
    /// Application info template
    pub const TEMPLATE_APPLICATION_INFO: u8 = 0xA4;
    /// ECDSA signature template (r and s as INT primitives)
    pub const ECDSA_TEMPLATE: u8 = 0x30;
    /// ECC public key (uncompressed, 65 bytes, or empty)
    pub const ECC_PUBLIC_KEY: u8 = 0x80;
    /// ECC private key (32 bytes)
    pub const ECC_PRIVATE_KEY: u8 = 0x81;
    /// BIP32 chain code (32 bytes)
    pub const CHAIN_CODE: u8 = 0x82;
    /// Instance UID (16 bytes)
    pub const INSTANCE_UID: u8 = 0x8F;
    /// Key UID (32 bytes, SHA-256 of the master public key)
    pub const KEY_UID: u8 = 0x8E;
    /// Capability bitmask (1 byte)
    pub const CAPABILITIES: u8 = 0x8D;
}

/// P1 values for GET STATUS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GetStatusP1 {
    /// Application status (PIN/PUK retries, master key presence)
    Application = 0x00,
    /// Current key derivation path
    KeyPath = 0x01,
}

/// P1 values for CHANGE PIN, selecting the credential to replace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CredentialType {
    /// User PIN
    Pin = 0x00,
    /// Unblocking PUK
    Puk = 0x01,
    /// Pairing secret
    PairingSecret = 0x02,
}

/// P1 values for LOAD KEY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadKeyP1 {
    /// Plain EC keypair
    Ec = 0x01,
    /// Extended EC keypair with chain code
    ExtEc = 0x02,
    /// BIP39 binary seed
    Seed = 0x03,
}

/// Derivation options for SIGN (low nibble of P1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignP1 {
    /// Sign with the current key
    CurrentKey = 0x00,
    /// Derive the key for this signature only
    DeriveKey = 0x01,
    /// Derive the key and make it current
    DeriveAndMakeCurrent = 0x02,
    /// Sign with the pinless path key
    Pinless = 0x03,
}

/// Derivation options for EXPORT KEY (low nibble of P1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExportKeyP1 {
    /// Export the current key
    CurrentKey = 0x00,
    /// Derive the key for this export only
    DeriveKey = 0x01,
    /// Derive the key and make it current
    DeriveAndMakeCurrent = 0x02,
}

/// P2 values for EXPORT KEY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExportKeyP2 {
    /// Private and public key
    PrivateAndPublic = 0x00,
    /// Public key only
    PublicOnly = 0x01,
}

/// P1 values for DUPLICATE KEY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DuplicateKeyP1 {
    /// Begin a duplication ceremony with the first entropy share
    Start = 0x00,
    /// Contribute an entropy share
    AddEntropy = 0x01,
    /// Export the duplicated key
    ExportKey = 0x02,
    /// Import a duplicated key
    ImportKey = 0x03,
}

/// P1 values for STORE DATA / GET DATA record selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PersistentRecord {
    /// General public data
    Public = 0x00,
    /// NDEF record
    Ndef = 0x01,
    /// Cash applet record
    Cash = 0x02,
}
