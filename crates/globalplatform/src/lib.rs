//! GlobalPlatform SCP02 administrative channel
//!
//! This crate implements the legacy mutual-authentication channel used for
//! card lifecycle administration: installing and deleting applets on the
//! issuer security domain. It is structurally parallel to the Keycard
//! secure channel — mutual authentication followed by a chained MAC over
//! every command — but uses static pre-shared keys, DES/3DES primitives
//! and no confidentiality layer (data travels in clear except the MAC).
//!
//! The main entry point is [`GlobalPlatform`], which sequences SELECT,
//! INITIALIZE UPDATE and EXTERNAL AUTHENTICATE into an authenticated
//! session and then wraps every subsequent command.

#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod application;
pub mod commands;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod load;
pub mod secure_channel;
pub mod session;

pub use application::GlobalPlatform;
pub use error::{Error, Result};
pub use load::LoadCommandStream;
pub use secure_channel::Scp02Wrapper;
pub use session::{Keys, Session};
