//! Pairing and the Keycard secure channel
//!
//! The channel wraps one transport. After SELECT the host derives an ECDH
//! shared secret against the card's published public key; with an existing
//! pairing the channel can then be opened: session keys are derived from
//! the secret, the pairing key and a card salt, and mutual authentication
//! proves both sides hold them. From then on every command is encrypted
//! and MAC'd, with the MAC of message N serving as the IV of message N+1 —
//! any drop, replay or reorder breaks the chain and is detected.

use rand::RngCore;
use tracing::{debug, trace, warn};

use chiave_apdu_core::{Bytes, CardTransport, Command, Response, status::common as status};

use crate::constants::{CLA_PROPRIETARY, MAX_PAIRING_SLOTS, ins};
use crate::crypto::{
    BLOCK_LENGTH, SECRET_LENGTH, calculate_cryptogram, generate_ecdh_secret, one_shot_encrypt,
};
use crate::error::ResponseExt;
use crate::session::Session;
use crate::types::Pairing;
use crate::{Error, Result};

/// Secure channel state as a tagged transition:
/// keys exist only while a handshake is under way or complete.
#[derive(Debug)]
enum ChannelState {
    /// No session keys; commands pass through in clear
    Closed,
    /// Keys derived, mutual authentication in flight
    Authenticating(Session),
    /// Mutually authenticated; all commands are protected
    Open(Session),
}

/// The Keycard secure channel, owning the transport for one session
pub struct SecureChannel<T: CardTransport> {
    transport: T,
    /// Host ephemeral public key, regenerated at every SELECT
    public_key: Option<k256::PublicKey>,
    /// ECDH shared secret against the card's secure channel key
    secret: Option<[u8; SECRET_LENGTH]>,
    pairing: Option<Pairing>,
    state: ChannelState,
}

impl<T: CardTransport> std::fmt::Debug for SecureChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("open", &self.is_open())
            .field("paired", &self.pairing.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: CardTransport> SecureChannel<T> {
    /// Create a closed channel over a transport
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            public_key: None,
            secret: None,
            pairing: None,
            state: ChannelState::Closed,
        }
    }

    /// The underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether mutual authentication has completed
    pub const fn is_open(&self) -> bool {
        matches!(self.state, ChannelState::Open(_))
    }

    /// The pairing credential in use, if any
    pub const fn pairing(&self) -> Option<&Pairing> {
        self.pairing.as_ref()
    }

    /// Install or clear the pairing credential
    pub fn set_pairing(&mut self, pairing: Option<Pairing>) {
        self.pairing = pairing;
    }

    /// Generate a fresh ephemeral keypair and the ECDH shared secret for
    /// this session. Any previous session state is discarded: every
    /// session starts from "not yet authenticated".
    pub fn generate_secret(&mut self, card_public_key: &k256::PublicKey) {
        let private = k256::SecretKey::random(&mut rand_v8::thread_rng());
        self.secret = Some(generate_ecdh_secret(&private, card_public_key));
        self.public_key = Some(private.public_key());
        self.state = ChannelState::Closed;
    }

    /// Drop the session state, keeping secret and pairing
    pub fn reset(&mut self) {
        self.state = ChannelState::Closed;
    }

    /// Open the channel with the stored pairing: derive session keys from
    /// the card's salt, then mutually authenticate.
    pub fn open(&mut self) -> Result<()> {
        let pairing = self.pairing.clone().ok_or(Error::NotPaired)?;
        let secret = self.secret.ok_or(Error::InvalidState)?;
        let public_key = self.public_key.ok_or(Error::InvalidState)?;

        self.state = ChannelState::Closed;

        let key_data = sec1_bytes(&public_key);
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::OPEN_SECURE_CHANNEL,
            pairing.index,
            0x00,
            key_data,
        );
        let response = self.send(&cmd)?;
        response.check_ok()?;

        let session = Session::new(&secret, &pairing.key, response.payload())?;
        self.state = ChannelState::Authenticating(session);
        debug!("session keys derived, starting mutual authentication");

        self.mutually_authenticate()
    }

    /// First protected command: exchange random 32-byte values. A reply of
    /// any other length means the card does not hold the same session keys.
    fn mutually_authenticate(&mut self) -> Result<()> {
        let mut challenge = [0u8; SECRET_LENGTH];
        rand::rng().fill_bytes(&mut challenge);

        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::MUTUALLY_AUTHENTICATE,
            0x00,
            0x00,
            challenge.to_vec(),
        );
        let response = self.send(&cmd)?;

        if !response.is_success() || response.payload().len() != SECRET_LENGTH {
            warn!(status = %response.status(), "mutual authentication failed");
            self.state = ChannelState::Closed;
            return Err(Error::InvalidAuthData);
        }

        self.state = match std::mem::replace(&mut self.state, ChannelState::Closed) {
            ChannelState::Authenticating(session) => ChannelState::Open(session),
            _ => return Err(Error::InvalidState),
        };
        debug!("secure channel open");
        Ok(())
    }

    /// Run the two round-trip pairing protocol, establishing a durable
    /// pairing credential from the shared pairing token.
    pub fn pair(&mut self, token: &[u8; SECRET_LENGTH]) -> Result<Pairing> {
        debug!("starting pairing");

        let mut challenge = [0u8; SECRET_LENGTH];
        rand::rng().fill_bytes(&mut challenge);

        let cmd = Command::new_with_data(CLA_PROPRIETARY, ins::PAIR, 0x00, 0x00, challenge.to_vec());
        let response = self.send(&cmd)?;
        response.check_ok()?;

        let payload = response.payload();
        if payload.len() != 2 * SECRET_LENGTH {
            return Err(Error::InvalidData("PAIR first step payload must be 64 bytes"));
        }

        let mut card_cryptogram = [0u8; SECRET_LENGTH];
        card_cryptogram.copy_from_slice(&payload[..SECRET_LENGTH]);
        let mut card_challenge = [0u8; SECRET_LENGTH];
        card_challenge.copy_from_slice(&payload[SECRET_LENGTH..]);

        if card_cryptogram != calculate_cryptogram(token, &challenge) {
            return Err(Error::InvalidAuthData);
        }

        let client_cryptogram = calculate_cryptogram(token, &card_challenge);
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::PAIR,
            0x01,
            0x00,
            client_cryptogram.to_vec(),
        );
        let response = self.send(&cmd)?;
        response.check_ok()?;

        let payload = response.payload();
        if payload.len() != 1 + SECRET_LENGTH {
            return Err(Error::InvalidData("PAIR final step payload must be 33 bytes"));
        }

        let index = payload[0];
        let mut salt = [0u8; SECRET_LENGTH];
        salt.copy_from_slice(&payload[1..]);

        let pairing = Pairing {
            index,
            key: calculate_cryptogram(token, &salt),
        };
        debug!(index = pairing.index, "pairing established");
        Ok(pairing)
    }

    /// Remove one pairing slot (protected command). Removing the slot in
    /// use also clears the stored credential.
    pub fn unpair(&mut self, index: u8) -> Result<()> {
        let cmd = Command::new(CLA_PROPRIETARY, ins::UNPAIR, index, 0x00);
        let response = self.send(&cmd)?;
        response.check_ok()?;

        if self.pairing.as_ref().is_some_and(|p| p.index == index) {
            self.pairing = None;
        }
        Ok(())
    }

    /// Reclaim slots on a card with a full pairing table: remove every
    /// slot except our own.
    pub fn unpair_others(&mut self) -> Result<()> {
        let own = self.pairing.as_ref().map(|p| p.index).ok_or(Error::NotPaired)?;
        for index in 0..MAX_PAIRING_SLOTS {
            if index != own {
                self.unpair(index)?;
            }
        }
        Ok(())
    }

    /// Encrypt data for the unpaired INIT command under the raw ECDH
    /// secret, prefixed with the host public key and a fresh IV.
    pub fn one_shot_encrypt(&self, data: &[u8]) -> Result<Bytes> {
        let secret = self.secret.as_ref().ok_or(Error::InvalidState)?;
        let public_key = self.public_key.as_ref().ok_or(Error::InvalidState)?;
        Ok(one_shot_encrypt(public_key, secret, data))
    }

    /// Send a command: protected while a session exists, in clear
    /// otherwise. A security status word from the card closes the channel
    /// without masking the response.
    pub fn send(&mut self, command: &Command) -> Result<Response> {
        match &mut self.state {
            ChannelState::Closed => {
                trace!(ins = %format!("{:02X}", command.ins), "transmit in clear");
                let raw = self.transport.transmit_raw(&command.to_bytes())?;
                Ok(Response::from_bytes(&raw)?)
            }
            ChannelState::Authenticating(session) | ChannelState::Open(session) => {
                let protected = protect_command(session, command);
                trace!(ins = %format!("{:02X}", command.ins), "transmit protected");

                let raw = self.transport.transmit_raw(&protected.to_bytes())?;
                let response = Response::from_bytes(&raw)?;

                if response.status() == status::SECURITY_CONDITION_NOT_SATISFIED {
                    warn!("card reported security failure, closing channel");
                    self.state = ChannelState::Closed;
                    return Ok(response);
                }
                if !response.is_success() {
                    return Ok(response);
                }

                process_response(session, &response)
            }
        }
    }
}

/// Wrap a command for the open channel: encrypt the payload under the
/// current IV, compute the MAC (which becomes the new IV) and emit
/// `mac ++ ciphertext` as the frame payload.
fn protect_command(session: &mut Session, command: &Command) -> Command {
    let ciphertext =
        crate::crypto::encrypt_data(command.payload(), session.keys().enc(), session.iv());

    let mut meta = [0u8; BLOCK_LENGTH];
    meta[0] = command.cla;
    meta[1] = command.ins;
    meta[2] = command.p1;
    meta[3] = command.p2;
    meta[4] = (ciphertext.len() + BLOCK_LENGTH) as u8;
    session.update_iv(&meta, &ciphertext);

    let mut payload = Vec::with_capacity(BLOCK_LENGTH + ciphertext.len());
    payload.extend_from_slice(session.iv());
    payload.extend_from_slice(&ciphertext);

    Command::new(command.cla, command.ins, command.p1, command.p2).with_data(payload)
}

/// Unwrap a successful response: split off the leading MAC, verify it
/// over the ciphertext, then decrypt under the pre-update IV and parse
/// the plaintext as the inner response.
fn process_response(session: &mut Session, response: &Response) -> Result<Response> {
    let payload = response.payload();
    if payload.len() < BLOCK_LENGTH {
        return Err(Error::InvalidData("protected response shorter than its MAC"));
    }

    let (rmac, ciphertext) = payload.split_at(BLOCK_LENGTH);

    let mut meta = [0u8; BLOCK_LENGTH];
    meta[0] = payload.len() as u8;

    let decrypt_iv = *session.iv();
    session.update_iv(&meta, ciphertext);

    if rmac != session.iv() {
        warn!("response MAC verification failed");
        return Err(Error::InvalidMac);
    }

    let plaintext = crate::crypto::decrypt_data(ciphertext, session.keys().enc(), &decrypt_iv)
        .map_err(|_| Error::InvalidData("invalid padding in protected response"))?;

    Ok(Response::from_bytes(&plaintext)?)
}

/// Uncompressed SEC1 encoding of a public key
pub(crate) fn sec1_bytes(public_key: &k256::PublicKey) -> Vec<u8> {
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    public_key.to_encoded_point(false).as_bytes().to_vec()
}
