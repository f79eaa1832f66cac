//! Core types for APDU (Application Protocol Data Unit) exchange
//!
//! This crate provides the command and response framing defined by
//! ISO/IEC 7816-4, the status word type terminating every card response,
//! and the `CardTransport` trait through which higher protocol layers
//! talk to a physical (or simulated) card.
//!
//! The exchange model is strictly half-duplex: one command is sent and
//! exactly one response is received before the next command may be issued.

#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod error;
pub mod response;
pub mod status;
pub mod transport;

pub use command::Command;
pub use error::Error;
pub use response::Response;
pub use status::StatusWord;
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::command::Command;
    pub use crate::error::Error;
    pub use crate::response::Response;
    pub use crate::status::{StatusWord, common as status};
    pub use crate::transport::{CardTransport, TransportError};
    pub use crate::{Bytes, BytesMut};
}
