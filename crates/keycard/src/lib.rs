//! Host-side driver for the Keycard applet
//!
//! Establishes an authenticated, encrypted channel over plain APDU
//! exchange and exposes the applet's PIN-gated command set: pairing and
//! secure channel, key load/derive/sign/export, mnemonic generation,
//! persistent data records and the multi-party key duplication ceremony.
//!
//! The entry point is [`Keycard`], a session-scoped façade over one
//! [`chiave_apdu_core::CardTransport`]. A typical session:
//!
//! 1. `select()` — parse the card identity, derive the ECDH secret
//! 2. `pair(password)` once, persisting the returned [`Pairing`]
//! 3. `set_pairing(...)` + `auto_open_secure_channel()` per session
//! 4. `verify_pin(...)`, then the protected commands

#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod admin;
mod application;
pub mod constants;
pub mod crypto;
mod duplicator;
mod error;
pub mod keypath;
mod metadata;
mod secrets;
mod secure_channel;
mod session;
pub mod tlv;
mod types;

pub use application::Keycard;
pub use duplicator::{CardDuplicator, DuplicatorDelegate};
pub use error::{Error, ResponseExt, Result};
pub use keypath::{DeriveSource, KeyPath, KeyPathError};
pub use metadata::Metadata;
pub use secrets::Secrets;
pub use secure_channel::SecureChannel;
pub use session::Session;
pub use types::{
    ApplicationInfo, ApplicationStatus, Bip32KeyPair, Capabilities, Capability, Mnemonic, Pairing,
    RecoverableSignature, Version,
};

// Re-exports for downstream convenience
pub use chiave_apdu_core::{Bytes, CardTransport, Command, Response, StatusWord, TransportError};
