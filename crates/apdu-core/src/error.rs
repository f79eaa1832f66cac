//! Error types for APDU framing and transport

use thiserror::Error;

use crate::StatusWord;
use crate::transport::TransportError;

/// Error type for APDU operations
#[derive(Debug, Error)]
pub enum Error {
    /// Response frame shorter than the mandatory status word
    #[error("response too short: {0} bytes, need at least 2")]
    ResponseTooShort(usize),

    /// Command frame with an inconsistent length layout
    #[error("invalid command length: {0} bytes")]
    InvalidCommandLength(usize),

    /// Card returned a status word outside the expected set
    #[error("unexpected status word: {0}")]
    Status(StatusWord),

    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}
