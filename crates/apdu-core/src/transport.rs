//! Card transport abstraction
//!
//! The physical reader (PC/SC, NFC, a test double) is modeled as a single
//! synchronous capability: send one command, receive one response. Protocol
//! layers never retry a failed transmission themselves — re-sending a
//! protected command would desynchronize the secure channel IV chain — so
//! transport failures surface directly to the caller.

use bytes::Bytes;
use thiserror::Error;

/// Error type for transport operations, surfaced without interpretation
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to transmit the command or receive a response
    #[error("failed to transmit APDU")]
    Transmission,

    /// No card is present or the connection was lost (e.g. tag removed)
    #[error("card is not connected")]
    NotConnected,

    /// Reader or device level failure
    #[error("transport device error: {0}")]
    Device(String),
}

/// Capability interface for exchanging APDUs with a card
pub trait CardTransport {
    /// Transmit a serialized command APDU and return the raw response
    /// bytes, which always include the trailing status word.
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Whether a card is currently reachable
    fn is_connected(&self) -> bool;

    /// Reset transport-level state after a dropped or abandoned session
    fn reset(&mut self) -> Result<(), TransportError>;

    /// PBKDF2 iteration count for deriving the pairing token from a
    /// pairing password. Production transports use the calibrated default;
    /// test doubles may lower it to keep tests fast.
    fn pairing_password_iterations(&self) -> u32 {
        50_000
    }
}

impl<T: CardTransport + ?Sized> CardTransport for &mut T {
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }

    fn pairing_password_iterations(&self) -> u32 {
        (**self).pairing_password_iterations()
    }
}
