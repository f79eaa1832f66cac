//! Keycard command façade
//!
//! A session-scoped object wrapping one transport behind the secure
//! channel, sequencing selection, pairing, channel opening and the
//! applet's command set. Each command is a thin protected APDU built from
//! an instruction code and a parameter encoding; non-OK status words
//! surface as taxonomy errors so callers can react (retry a PIN, re-pair,
//! abort a ceremony) without parsing status bytes themselves.

use tracing::debug;

use chiave_apdu_core::{CardTransport, Command};

use crate::constants::{
    CLA_ISO7816, CLA_PROPRIETARY, CredentialType, DuplicateKeyP1, ExportKeyP1, ExportKeyP2,
    GetStatusP1, LoadKeyP1, PersistentRecord, SignP1, ins, keycard_instance_aid,
};
use crate::crypto::generate_pairing_token;
use crate::error::ResponseExt;
use crate::keypath::KeyPath;
use crate::metadata::Metadata;
use crate::secrets::Secrets;
use crate::secure_channel::SecureChannel;
use crate::types::{
    ApplicationInfo, ApplicationStatus, Bip32KeyPair, Capability, Mnemonic, Pairing,
    RecoverableSignature,
};
use crate::{Error, Result};

/// Valid word counts for GENERATE MNEMONIC
const MNEMONIC_WORD_COUNTS: [u8; 5] = [12, 15, 18, 21, 24];

/// The Keycard command set over one transport
pub struct Keycard<T: CardTransport> {
    channel: SecureChannel<T>,
    info: Option<ApplicationInfo>,
}

impl<T: CardTransport> std::fmt::Debug for Keycard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keycard")
            .field("selected", &self.info.is_some())
            .field("channel", &self.channel)
            .finish()
    }
}

impl<T: CardTransport> Keycard<T> {
    /// Create a façade over a transport
    pub const fn new(transport: T) -> Self {
        Self {
            channel: SecureChannel::new(transport),
            info: None,
        }
    }

    /// The application info from the last SELECT
    pub const fn application_info(&self) -> Option<&ApplicationInfo> {
        self.info.as_ref()
    }

    /// The underlying transport
    pub const fn transport(&self) -> &T {
        self.channel.transport()
    }

    /// Mutable access to the underlying transport
    pub const fn transport_mut(&mut self) -> &mut T {
        self.channel.transport_mut()
    }

    /// The pairing credential in use
    pub const fn pairing(&self) -> Option<&Pairing> {
        self.channel.pairing()
    }

    /// Install a pairing credential obtained earlier
    pub fn set_pairing(&mut self, pairing: Option<Pairing>) {
        self.channel.set_pairing(pairing);
    }

    /// Whether the secure channel is open
    pub const fn is_secure_channel_open(&self) -> bool {
        self.channel.is_open()
    }

    /// SELECT the default applet instance
    pub fn select(&mut self) -> Result<ApplicationInfo> {
        self.select_instance(1)
    }

    /// SELECT a specific applet instance. On success the ECDH shared
    /// secret is derived and the channel reset, so every session starts
    /// from a known unauthenticated state.
    pub fn select_instance(&mut self, index: u8) -> Result<ApplicationInfo> {
        self.channel.reset();

        let cmd = Command::new_with_data(
            CLA_ISO7816,
            ins::SELECT,
            0x04,
            0x00,
            keycard_instance_aid(index),
        )
        .with_le(0);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;

        let info = ApplicationInfo::parse(response.payload())?;
        debug!(%info, "selected applet");

        if info.has_capability(Capability::SecureChannel) {
            if let Some(card_key) = &info.public_key {
                self.channel.generate_secret(card_key);
            }
        }

        self.info = Some(info.clone());
        Ok(info)
    }

    /// Initialize a factory card with its credentials, delivered under
    /// one-shot encryption (the card is not paired yet).
    pub fn init(&mut self, secrets: &Secrets) -> Result<()> {
        let iterations = self.channel.transport().pairing_password_iterations();
        let token = generate_pairing_token(secrets.pairing_password(), iterations);

        let mut data = Vec::with_capacity(6 + 12 + token.len());
        data.extend_from_slice(secrets.pin().as_bytes());
        data.extend_from_slice(secrets.puk().as_bytes());
        data.extend_from_slice(&token);

        let payload = self.channel.one_shot_encrypt(&data)?;
        let cmd = Command::new_with_data(CLA_PROPRIETARY, ins::INIT, 0x00, 0x00, payload);
        self.channel.send(&cmd)?.check_ok()?;
        Ok(())
    }

    /// Factory reset, erasing all card data. Requires no authentication.
    pub fn factory_reset(&mut self) -> Result<()> {
        let cmd = Command::new(CLA_PROPRIETARY, ins::FACTORY_RESET, 0xAA, 0x55);
        self.channel.send(&cmd)?.check_ok()?;
        self.channel.set_pairing(None);
        Ok(())
    }

    /// Run the pairing protocol with a pairing password. The derived
    /// credential is installed on the channel and returned for the
    /// caller to persist.
    pub fn pair(&mut self, pairing_password: &str) -> Result<Pairing> {
        let iterations = self.channel.transport().pairing_password_iterations();
        let token = generate_pairing_token(pairing_password, iterations);
        let pairing = self.channel.pair(&token)?;
        self.channel.set_pairing(Some(pairing.clone()));
        Ok(pairing)
    }

    /// Open the secure channel with the stored pairing and mutually
    /// authenticate
    pub fn auto_open_secure_channel(&mut self) -> Result<()> {
        self.channel.open()
    }

    /// Remove one pairing slot
    pub fn unpair(&mut self, index: u8) -> Result<()> {
        self.channel.unpair(index)
    }

    /// Remove every pairing slot except our own
    pub fn unpair_others(&mut self) -> Result<()> {
        self.channel.unpair_others()
    }

    /// GET STATUS: PIN/PUK retry counters and master key presence
    pub fn get_status(&mut self) -> Result<ApplicationStatus> {
        let cmd = Command::new(
            CLA_PROPRIETARY,
            ins::GET_STATUS,
            GetStatusP1::Application as u8,
            0x00,
        )
        .with_le(0);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        ApplicationStatus::parse(response.payload())
    }

    /// GET STATUS: the current derivation path
    pub fn get_key_path(&mut self) -> Result<KeyPath> {
        let cmd = Command::new(
            CLA_PROPRIETARY,
            ins::GET_STATUS,
            GetStatusP1::KeyPath as u8,
            0x00,
        )
        .with_le(0);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;

        let payload = response.payload();
        if payload.len() % 4 != 0 {
            return Err(Error::InvalidData("key path must be 4-byte components"));
        }
        let components = payload
            .chunks_exact(4)
            .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(KeyPath::new(Default::default(), components)?)
    }

    /// Verify the user PIN. A wrong PIN surfaces as `WrongPin` with the
    /// card-reported remaining attempts.
    pub fn verify_pin(&mut self, pin: &str) -> Result<()> {
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::VERIFY_PIN,
            0x00,
            0x00,
            pin.as_bytes().to_vec(),
        );
        self.channel.send(&cmd)?.check_auth_ok()?;
        Ok(())
    }

    /// Change the user PIN
    pub fn change_pin(&mut self, new_pin: &str) -> Result<()> {
        self.change_credential(CredentialType::Pin, new_pin.as_bytes())
    }

    /// Change the PUK
    pub fn change_puk(&mut self, new_puk: &str) -> Result<()> {
        self.change_credential(CredentialType::Puk, new_puk.as_bytes())
    }

    /// Change the pairing secret. Existing pairings of other clients
    /// remain valid; new pairings need the new password.
    pub fn change_pairing_password(&mut self, new_password: &str) -> Result<()> {
        let iterations = self.channel.transport().pairing_password_iterations();
        let token = generate_pairing_token(new_password, iterations);
        self.change_credential(CredentialType::PairingSecret, &token)
    }

    fn change_credential(&mut self, credential: CredentialType, value: &[u8]) -> Result<()> {
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::CHANGE_PIN,
            credential as u8,
            0x00,
            value.to_vec(),
        );
        self.channel.send(&cmd)?.check_ok()?;
        Ok(())
    }

    /// Unblock a blocked PIN with the PUK, setting a new PIN
    pub fn unblock_pin(&mut self, puk: &str, new_pin: &str) -> Result<()> {
        let mut data = Vec::with_capacity(puk.len() + new_pin.len());
        data.extend_from_slice(puk.as_bytes());
        data.extend_from_slice(new_pin.as_bytes());

        let cmd = Command::new_with_data(CLA_PROPRIETARY, ins::UNBLOCK_PIN, 0x00, 0x00, data);
        self.channel.send(&cmd)?.check_auth_ok()?;
        Ok(())
    }

    /// Load a keypair onto the card, returning the key UID
    pub fn load_key(&mut self, keypair: &Bip32KeyPair) -> Result<Vec<u8>> {
        let p1 = if keypair.is_extended() {
            LoadKeyP1::ExtEc
        } else {
            LoadKeyP1::Ec
        };
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::LOAD_KEY,
            p1 as u8,
            0x00,
            keypair.to_tlv(true),
        );
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        Ok(response.payload().to_vec())
    }

    /// Load a BIP39 binary seed onto the card, returning the key UID
    pub fn load_seed(&mut self, seed: &[u8; 64]) -> Result<Vec<u8>> {
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::LOAD_KEY,
            LoadKeyP1::Seed as u8,
            0x00,
            seed.to_vec(),
        );
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        Ok(response.payload().to_vec())
    }

    /// Generate a new master key on the card, returning the key UID
    pub fn generate_key(&mut self) -> Result<Vec<u8>> {
        let cmd = Command::new(CLA_PROPRIETARY, ins::GENERATE_KEY, 0x00, 0x00);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        Ok(response.payload().to_vec())
    }

    /// Generate a mnemonic of the given word count (12, 15, 18, 21, 24)
    pub fn generate_mnemonic(&mut self, words: u8) -> Result<Mnemonic> {
        if !MNEMONIC_WORD_COUNTS.contains(&words) {
            return Err(Error::InvalidData(
                "mnemonic length must be 12, 15, 18, 21 or 24 words",
            ));
        }

        let cmd =
            Command::new(CLA_PROPRIETARY, ins::GENERATE_MNEMONIC, words / 3, 0x00).with_le(0);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        Mnemonic::from_raw(response.payload())
    }

    /// Remove the master key from the card
    pub fn remove_key(&mut self) -> Result<()> {
        let cmd = Command::new(CLA_PROPRIETARY, ins::REMOVE_KEY, 0x00, 0x00);
        self.channel.send(&cmd)?.check_ok()?;
        Ok(())
    }

    /// Derive the active key along a path
    pub fn derive_key(&mut self, path: &KeyPath) -> Result<()> {
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::DERIVE_KEY,
            path.source() as u8,
            0x00,
            path.to_bytes(),
        );
        self.channel.send(&cmd)?.check_ok()?;
        Ok(())
    }

    /// Sign a 32-byte hash, optionally deriving the signing key first.
    /// The path's source marker is OR'd into P1 alongside the derivation
    /// option.
    pub fn sign(
        &mut self,
        hash: &[u8; 32],
        path: Option<&KeyPath>,
        make_current: bool,
    ) -> Result<RecoverableSignature> {
        let (p1, path_bytes) = match path {
            None => (SignP1::CurrentKey as u8, Vec::new()),
            Some(path) => {
                let derive = if make_current {
                    SignP1::DeriveAndMakeCurrent
                } else {
                    SignP1::DeriveKey
                };
                (derive as u8 | path.source() as u8, path.to_bytes())
            }
        };

        let mut data = hash.to_vec();
        data.extend_from_slice(&path_bytes);

        let cmd = Command::new_with_data(CLA_PROPRIETARY, ins::SIGN, p1, 0x00, data).with_le(0);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        RecoverableSignature::parse(hash, response.payload())
    }

    /// Sign a 32-byte hash with the pinless path key
    pub fn sign_pinless(&mut self, hash: &[u8; 32]) -> Result<RecoverableSignature> {
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::SIGN,
            SignP1::Pinless as u8,
            0x00,
            hash.to_vec(),
        )
        .with_le(0);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        RecoverableSignature::parse(hash, response.payload())
    }

    /// Set (or clear, with `None`) the path usable for signing without
    /// PIN authentication
    pub fn set_pinless_path(&mut self, path: Option<&KeyPath>) -> Result<()> {
        let data = path.map(KeyPath::to_bytes).unwrap_or_default();
        let cmd = Command::new_with_data(CLA_PROPRIETARY, ins::SET_PINLESS_PATH, 0x00, 0x00, data);
        self.channel.send(&cmd)?.check_ok()?;
        Ok(())
    }

    /// Export a key, optionally deriving it first
    pub fn export_key(
        &mut self,
        format: ExportKeyP2,
        path: Option<&KeyPath>,
        make_current: bool,
    ) -> Result<Bip32KeyPair> {
        let (p1, data) = match path {
            None => (ExportKeyP1::CurrentKey as u8, Vec::new()),
            Some(path) => {
                let derive = if make_current {
                    ExportKeyP1::DeriveAndMakeCurrent
                } else {
                    ExportKeyP1::DeriveKey
                };
                (derive as u8 | path.source() as u8, path.to_bytes())
            }
        };

        let cmd = Command::new_with_data(CLA_PROPRIETARY, ins::EXPORT_KEY, p1, format as u8, data)
            .with_le(0);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        Bip32KeyPair::from_tlv(response.payload())
    }

    /// Read a persistent data record
    pub fn get_data(&mut self, record: PersistentRecord) -> Result<Vec<u8>> {
        let cmd = Command::new(CLA_PROPRIETARY, ins::GET_DATA, record as u8, 0x00).with_le(0);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        Ok(response.payload().to_vec())
    }

    /// Write a persistent data record
    pub fn store_data(&mut self, record: PersistentRecord, data: &[u8]) -> Result<()> {
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::STORE_DATA,
            record as u8,
            0x00,
            data.to_vec(),
        );
        self.channel.send(&cmd)?.check_ok()?;
        Ok(())
    }

    /// Replace the NDEF record served before applet selection
    pub fn set_ndef(&mut self, ndef: &[u8]) -> Result<()> {
        let cmd =
            Command::new_with_data(CLA_PROPRIETARY, ins::SET_NDEF, 0x00, 0x00, ndef.to_vec());
        self.channel.send(&cmd)?.check_ok()?;
        Ok(())
    }

    /// Read and parse the card metadata blob from the public record
    pub fn get_metadata(&mut self) -> Result<Metadata> {
        let data = self.get_data(PersistentRecord::Public)?;
        Metadata::parse(&data)
    }

    /// Store the card metadata blob in the public record
    pub fn set_metadata(&mut self, metadata: &Metadata) -> Result<()> {
        self.store_data(PersistentRecord::Public, &metadata.serialize())
    }

    /// Begin a key duplication ceremony with the first entropy share and
    /// the expected number of participating clients
    pub fn duplicate_key_start(&mut self, client_count: u8, entropy: &[u8; 32]) -> Result<()> {
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::DUPLICATE_KEY,
            DuplicateKeyP1::Start as u8,
            client_count,
            entropy.to_vec(),
        );
        self.channel.send(&cmd)?.check_ok()?;
        Ok(())
    }

    /// Contribute an entropy share to a running ceremony
    pub fn duplicate_key_add_entropy(&mut self, entropy: &[u8; 32]) -> Result<()> {
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::DUPLICATE_KEY,
            DuplicateKeyP1::AddEntropy as u8,
            0x00,
            entropy.to_vec(),
        );
        self.channel.send(&cmd)?.check_ok()?;
        Ok(())
    }

    /// Export the duplicated key as opaque transport bytes
    pub fn duplicate_key_export(&mut self) -> Result<Vec<u8>> {
        let cmd = Command::new(
            CLA_PROPRIETARY,
            ins::DUPLICATE_KEY,
            DuplicateKeyP1::ExportKey as u8,
            0x00,
        )
        .with_le(0);
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        Ok(response.payload().to_vec())
    }

    /// Deliver duplicated key bytes to a destination card, returning the
    /// resulting key UID
    pub fn duplicate_key_import(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let cmd = Command::new_with_data(
            CLA_PROPRIETARY,
            ins::DUPLICATE_KEY,
            DuplicateKeyP1::ImportKey as u8,
            0x00,
            key.to_vec(),
        );
        let response = self.channel.send(&cmd)?;
        response.check_ok()?;
        Ok(response.payload().to_vec())
    }
}
