//! Structured payloads exchanged with the applet

mod application_info;
mod application_status;
mod capabilities;
mod keypair;
mod mnemonic;
mod pairing;
mod signature;
mod version;

pub use application_info::ApplicationInfo;
pub use application_status::ApplicationStatus;
pub use capabilities::{Capabilities, Capability};
pub use keypair::Bip32KeyPair;
pub use mnemonic::Mnemonic;
pub use pairing::Pairing;
pub use signature::RecoverableSignature;
pub use version::Version;
