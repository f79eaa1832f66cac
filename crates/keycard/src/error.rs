//! Error taxonomy for Keycard operations
//!
//! Three families: card-reported status words mapped to a closed set of
//! outcomes (recoverable by the caller), protocol-integrity failures that
//! invalidate the current secure channel, and local precondition or codec
//! failures. Transport failures pass through without interpretation.

use thiserror::Error;

use chiave_apdu_core::{Response, StatusWord, TransportError, status::common as status};

use crate::keypath::KeyPathError;
use crate::tlv::TlvError;

/// Result type for Keycard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Keycard operations
#[derive(Debug, Error)]
pub enum Error {
    // Card-reported status outcomes
    /// Security condition not satisfied; also signals channel closure
    #[error("security condition not satisfied")]
    SecurityConditionNotSatisfied,

    /// Authentication method blocked
    #[error("authentication method blocked")]
    AuthenticationMethodBlocked,

    /// Card locked
    #[error("card locked")]
    CardLocked,

    /// Referenced data not found
    #[error("referenced data not found")]
    ReferencedDataNotFound,

    /// Conditions of use not satisfied
    #[error("conditions of use not satisfied")]
    ConditionsOfUseNotSatisfied,

    /// Wrong PIN with the card-reported number of remaining attempts
    #[error("wrong PIN, {0} attempts remaining")]
    WrongPin(u8),

    /// Invalid pairing index
    #[error("invalid pairing index")]
    PairingIndexInvalid,

    /// Invalid data
    #[error("invalid data")]
    DataInvalid,

    /// All pairing slots taken
    #[error("all pairing slots are taken")]
    AllPairingSlotsTaken,

    /// Applet already initialized
    #[error("applet already initialized")]
    AlreadyInitialized,

    /// Status word outside the known set
    #[error("unknown status word: {0:#06x}")]
    UnknownStatus(u16),

    // Protocol-level failures
    /// No pairing credential available for the card
    #[error("card is not paired")]
    NotPaired,

    /// PIN retries exhausted
    #[error("PIN is blocked")]
    PinBlocked,

    /// Handshake verification failed; the channel must be rebuilt
    #[error("authentication data verification failed")]
    InvalidAuthData,

    /// Response integrity check failed; the channel must be rebuilt
    #[error("response MAC verification failed")]
    InvalidMac,

    /// Duplicate or out-of-order protocol step
    #[error("invalid protocol state")]
    InvalidState,

    /// No recovery id matched the returned public key
    #[error("signature public key recovery failed")]
    UnrecoverableSignature,

    // Local precondition and codec failures
    /// TLV parsing failure
    #[error(transparent)]
    Tlv(#[from] TlvError),

    /// Malformed key derivation path
    #[error(transparent)]
    KeyPath(#[from] KeyPathError),

    /// Malformed or unexpected payload content
    #[error("invalid data: {0}")]
    InvalidData(&'static str),

    // Transport and framing
    /// Transport-level failure, surfaced without interpretation
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// APDU framing failure
    #[error(transparent)]
    Apdu(chiave_apdu_core::Error),
}

impl Error {
    /// Map a card status word into the taxonomy
    pub fn from_status(sw: StatusWord) -> Self {
        if sw.is_wrong_pin() {
            return Self::WrongPin(sw.pin_retries());
        }

        match sw {
            status::SECURITY_CONDITION_NOT_SATISFIED => Self::SecurityConditionNotSatisfied,
            status::AUTHENTICATION_METHOD_BLOCKED => Self::AuthenticationMethodBlocked,
            status::CARD_LOCKED => Self::CardLocked,
            status::REFERENCED_DATA_NOT_FOUND => Self::ReferencedDataNotFound,
            status::CONDITIONS_OF_USE_NOT_SATISFIED => Self::ConditionsOfUseNotSatisfied,
            status::PAIRING_INDEX_INVALID => Self::PairingIndexInvalid,
            status::DATA_INVALID => Self::DataInvalid,
            status::ALL_PAIRING_SLOTS_TAKEN => Self::AllPairingSlotsTaken,
            status::ALREADY_INITIALIZED => Self::AlreadyInitialized,
            other => Self::UnknownStatus(other.to_u16()),
        }
    }
}

impl From<chiave_apdu_core::Error> for Error {
    fn from(error: chiave_apdu_core::Error) -> Self {
        match error {
            chiave_apdu_core::Error::Status(sw) => Self::from_status(sw),
            chiave_apdu_core::Error::Transport(e) => Self::Transport(e),
            other => Self::Apdu(other),
        }
    }
}

/// Status word checks mapping into the Keycard taxonomy
pub trait ResponseExt {
    /// Require the success status word
    fn check_ok(&self) -> Result<&Response>;

    /// Require one of the expected status words
    fn check_sw(&self, expected: &[StatusWord]) -> Result<&Response>;

    /// Like `check_ok`, but recognises the masked wrong-PIN family and
    /// extracts the remaining-retries nibble
    fn check_auth_ok(&self) -> Result<&Response>;
}

impl ResponseExt for Response {
    fn check_ok(&self) -> Result<&Response> {
        self.check_sw(&[status::OK])
    }

    fn check_sw(&self, expected: &[StatusWord]) -> Result<&Response> {
        if expected.contains(&self.status()) {
            Ok(self)
        } else {
            Err(Error::from_status(self.status()))
        }
    }

    fn check_auth_ok(&self) -> Result<&Response> {
        if self.status().is_wrong_pin() {
            return Err(Error::WrongPin(self.status().pin_retries()));
        }
        ResponseExt::check_ok(self)
    }
}
