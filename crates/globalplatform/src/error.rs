//! Error types for GlobalPlatform operations

use chiave_apdu_core::{StatusWord, TransportError};
use thiserror::Error;

/// Result type for GlobalPlatform operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for GlobalPlatform operations
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure, surfaced without interpretation
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// APDU framing errors
    #[error(transparent)]
    Apdu(#[from] chiave_apdu_core::Error),

    /// Card returned an error status word
    #[error("card returned error status: {0}")]
    CardStatus(StatusWord),

    /// Wrong data length
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Unsupported SCP version advertised by the card
    #[error("unsupported SCP version: {0:#04x}")]
    UnsupportedScpVersion(u8),

    /// Card cryptogram did not verify against any known key set
    #[error("card authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// Secure channel not established
    #[error("secure channel not established")]
    NoSecureChannel,

    /// CAP file error
    #[error("CAP file error: {0}")]
    CapFile(&'static str),

    /// I/O error while reading a CAP file
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map an unexpected-status APDU error into `CardStatus`, leaving
    /// other APDU errors untouched.
    pub(crate) fn from_apdu(error: chiave_apdu_core::Error) -> Self {
        match error {
            chiave_apdu_core::Error::Status(sw) => Self::CardStatus(sw),
            other => Self::Apdu(other),
        }
    }
}
