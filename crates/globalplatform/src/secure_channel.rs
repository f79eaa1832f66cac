//! SCP02 command wrapping
//!
//! Once the channel is authenticated, every command is wrapped: the class
//! byte gets the secure-messaging bit, a full 3DES MAC over the modified
//! header and data is appended, and that MAC becomes the chaining vector
//! for the next command. The card rejects any command whose MAC does not
//! continue the chain, which rules out replay and reordering.

use bytes::{BufMut, BytesMut};
use tracing::trace;

use chiave_apdu_core::Command;

use crate::constants::cla;
use crate::crypto::{ZERO_IV, encrypt_icv, mac_full_3des};

/// Wraps commands with the SCP02 MAC chain
#[derive(Clone)]
pub struct Scp02Wrapper {
    mac_key: [u8; 16],
    icv: [u8; 8],
}

impl std::fmt::Debug for Scp02Wrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scp02Wrapper").finish_non_exhaustive()
    }
}

impl Scp02Wrapper {
    /// Create a new wrapper from the session MAC key
    pub const fn new(mac_key: [u8; 16]) -> Self {
        Self {
            mac_key,
            icv: ZERO_IV,
        }
    }

    /// Wrap a command: set the secure-messaging class bit, append the MAC
    /// and advance the ICV chain.
    pub fn wrap_command(&mut self, command: &Command) -> Command {
        let payload = command.payload();
        let wrapped_cla = command.cla | cla::MAC;

        let mut mac_data = BytesMut::with_capacity(5 + payload.len());
        mac_data.put_u8(wrapped_cla);
        mac_data.put_u8(command.ins);
        mac_data.put_u8(command.p1);
        mac_data.put_u8(command.p2);
        mac_data.put_u8((payload.len() + 8) as u8);
        mac_data.put_slice(payload);

        // The first command chains from the zero vector; afterwards the
        // previous MAC is single-DES encrypted before use
        let icv = if self.icv == ZERO_IV {
            self.icv
        } else {
            encrypt_icv(&self.mac_key, &self.icv)
        };

        let mac = mac_full_3des(&self.mac_key, &icv, &mac_data);
        self.icv = mac;

        trace!(mac = %hex::encode(mac), "wrapped SCP02 command");

        let mut wrapped_data = BytesMut::with_capacity(payload.len() + 8);
        wrapped_data.put_slice(payload);
        wrapped_data.put_slice(&mac);

        let mut wrapped = Command::new(wrapped_cla, command.ins, command.p1, command.p2)
            .with_data(wrapped_data.freeze());
        if let Some(le) = command.le {
            wrapped = wrapped.with_le(le);
        }
        wrapped
    }

    /// The current chaining vector
    pub const fn icv(&self) -> &[u8; 8] {
        &self.icv
    }
}
