//! A simulated card implementing the card side of the pairing and secure
//! channel protocols, driven through the `CardTransport` trait.

use std::collections::HashMap;

use chiave_keycard::constants::{CLA_ISO7816, CLA_PROPRIETARY, ins, tags};
use chiave_keycard::crypto::{
    calculate_cryptogram, calculate_mac, decrypt_data, derive_session_keys, encrypt_data,
    generate_ecdh_secret, generate_pairing_token,
};
use chiave_keycard::tlv::TlvWriter;
use chiave_keycard::{Bytes, CardTransport, Command, TransportError};

use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;

pub const PAIRING_PASSWORD: &str = "open sesame";
pub const PIN: &str = "123456";
pub const TEST_PBKDF2_ITERATIONS: u32 = 10;
pub const MAX_PIN_RETRIES: u8 = 3;

struct CardSession {
    enc: [u8; 32],
    mac: [u8; 32],
    iv: [u8; 16],
}

/// Card-side state machine for tests
pub struct SimulatedCard {
    secret_key: k256::SecretKey,
    pairing_token: [u8; 32],
    instance_uid: [u8; 16],
    pin_retries: u8,
    pairings: HashMap<u8, [u8; 32]>,
    pending_challenge: Option<[u8; 32]>,
    session: Option<CardSession>,
    records: HashMap<u8, Vec<u8>>,
    /// Flip one ciphertext byte of the next wrapped command before the
    /// card checks it (simulated transport corruption)
    pub corrupt_next_command: bool,
    /// Flip one MAC byte of the next protected response
    pub corrupt_next_response_mac: bool,
}

impl SimulatedCard {
    pub fn new(instance_uid: [u8; 16]) -> Self {
        Self {
            secret_key: k256::SecretKey::random(&mut rand_v8::thread_rng()),
            pairing_token: generate_pairing_token(PAIRING_PASSWORD, TEST_PBKDF2_ITERATIONS),
            instance_uid,
            pin_retries: MAX_PIN_RETRIES,
            pairings: HashMap::new(),
            pending_challenge: None,
            session: None,
            records: HashMap::new(),
            corrupt_next_command: false,
            corrupt_next_response_mac: false,
        }
    }

    fn application_info(&self) -> Vec<u8> {
        let public_key = self.secret_key.public_key().to_encoded_point(false);

        let mut writer = TlvWriter::new();
        writer.write_primitive(tags::INSTANCE_UID, &self.instance_uid);
        writer.write_primitive(tags::ECC_PUBLIC_KEY, public_key.as_bytes());
        writer.write_primitive(tags::INT, &[0x03, 0x01]);
        writer.write_primitive(tags::INT, &[5 - self.pairings.len() as u8]);
        writer.write_primitive(tags::KEY_UID, &[0x17; 32]);
        writer.write_primitive(tags::CAPABILITIES, &[0x0F]);
        writer.into_template(tags::TEMPLATE_APPLICATION_INFO).to_vec()
    }

    fn handle_select(&mut self) -> Vec<u8> {
        self.session = None;
        let mut response = self.application_info();
        response.extend_from_slice(&[0x90, 0x00]);
        response
    }

    fn handle_pair(&mut self, command: &Command) -> Vec<u8> {
        let data = command.payload();
        match command.p1 {
            0x00 => {
                let mut host_challenge = [0u8; 32];
                host_challenge.copy_from_slice(data);

                let mut card_challenge = [0u8; 32];
                rand::rng().fill_bytes(&mut card_challenge);
                self.pending_challenge = Some(card_challenge);

                let cryptogram = calculate_cryptogram(&self.pairing_token, &host_challenge);
                let mut response = cryptogram.to_vec();
                response.extend_from_slice(&card_challenge);
                response.extend_from_slice(&[0x90, 0x00]);
                response
            }
            0x01 => {
                let Some(card_challenge) = self.pending_challenge.take() else {
                    return vec![0x6A, 0x86];
                };
                let expected = calculate_cryptogram(&self.pairing_token, &card_challenge);
                if data != expected {
                    return vec![0x69, 0x82];
                }

                let index = (0..5u8)
                    .find(|i| !self.pairings.contains_key(i))
                    .expect("free pairing slot");
                let mut salt = [0u8; 32];
                rand::rng().fill_bytes(&mut salt);
                self.pairings
                    .insert(index, calculate_cryptogram(&self.pairing_token, &salt));

                let mut response = vec![index];
                response.extend_from_slice(&salt);
                response.extend_from_slice(&[0x90, 0x00]);
                response
            }
            _ => vec![0x6A, 0x86],
        }
    }

    fn handle_open_secure_channel(&mut self, command: &Command) -> Vec<u8> {
        let Some(pairing_key) = self.pairings.get(&command.p1).copied() else {
            return vec![0x6A, 0x86];
        };
        let Ok(host_key) = k256::PublicKey::from_sec1_bytes(command.payload()) else {
            return vec![0x6A, 0x80];
        };

        let secret = generate_ecdh_secret(&self.secret_key, &host_key);

        let mut salt = [0u8; 32];
        rand::rng().fill_bytes(&mut salt);
        let mut iv = [0u8; 16];
        rand::rng().fill_bytes(&mut iv);

        let (enc, mac) = derive_session_keys(&secret, &pairing_key, &salt);
        self.session = Some(CardSession { enc, mac, iv });

        let mut response = salt.to_vec();
        response.extend_from_slice(&iv);
        response.extend_from_slice(&[0x90, 0x00]);
        response
    }

    /// Unwrap a protected command, dispatch it, and wrap the reply
    fn handle_protected(&mut self, command: &Command) -> Vec<u8> {
        let payload = command.payload().to_vec();
        if payload.len() < 16 {
            self.session = None;
            return vec![0x69, 0x82];
        }

        let (received_mac, ciphertext) = payload.split_at(16);
        let mut ciphertext = ciphertext.to_vec();
        if self.corrupt_next_command {
            self.corrupt_next_command = false;
            ciphertext[0] ^= 0x01;
        }

        let mut meta = [0u8; 16];
        meta[0] = command.cla;
        meta[1] = command.ins;
        meta[2] = command.p1;
        meta[3] = command.p2;
        meta[4] = payload.len() as u8;

        let session = self.session.as_mut().expect("session");
        let expected_mac = calculate_mac(&meta, &ciphertext, &session.mac);
        if received_mac != expected_mac {
            self.session = None;
            return vec![0x69, 0x82];
        }

        let Ok(plaintext) = decrypt_data(&ciphertext, &session.enc, &session.iv) else {
            self.session = None;
            return vec![0x69, 0x82];
        };
        session.iv = expected_mac;

        let inner = self.dispatch_inner(command, &plaintext);

        let session = self.session.as_mut().expect("session");
        let reply_ciphertext = encrypt_data(&inner, &session.enc, &session.iv);

        let mut reply_meta = [0u8; 16];
        reply_meta[0] = (reply_ciphertext.len() + 16) as u8;
        let mut reply_mac = calculate_mac(&reply_meta, &reply_ciphertext, &session.mac);
        session.iv = reply_mac;

        if self.corrupt_next_response_mac {
            self.corrupt_next_response_mac = false;
            reply_mac[0] ^= 0x01;
        }

        let mut response = reply_mac.to_vec();
        response.extend_from_slice(&reply_ciphertext);
        response.extend_from_slice(&[0x90, 0x00]);
        response
    }

    /// Commands under the channel: plaintext in, `data ++ sw` out
    fn dispatch_inner(&mut self, command: &Command, data: &[u8]) -> Vec<u8> {
        match command.ins {
            ins::MUTUALLY_AUTHENTICATE => {
                if data.len() != 32 {
                    return vec![0x6A, 0x80];
                }
                let mut reply = vec![0u8; 32];
                rand::rng().fill_bytes(&mut reply);
                reply.extend_from_slice(&[0x90, 0x00]);
                reply
            }
            ins::VERIFY_PIN => {
                if data == PIN.as_bytes() {
                    self.pin_retries = MAX_PIN_RETRIES;
                    vec![0x90, 0x00]
                } else {
                    self.pin_retries = self.pin_retries.saturating_sub(1);
                    vec![0x63, 0xC0 | self.pin_retries]
                }
            }
            ins::GET_STATUS => {
                let mut writer = TlvWriter::new();
                writer.write_primitive(tags::INT, &[self.pin_retries]);
                writer.write_primitive(tags::INT, &[5]);
                writer.write_primitive(tags::BOOL, &[0xFF]);
                let mut reply = writer
                    .into_template(tags::TEMPLATE_APPLICATION_STATUS)
                    .to_vec();
                reply.extend_from_slice(&[0x90, 0x00]);
                reply
            }
            ins::UNPAIR => {
                self.pairings.remove(&command.p1);
                vec![0x90, 0x00]
            }
            ins::GET_DATA => {
                let mut reply = self.records.get(&command.p1).cloned().unwrap_or_default();
                reply.extend_from_slice(&[0x90, 0x00]);
                reply
            }
            ins::STORE_DATA => {
                self.records.insert(command.p1, data.to_vec());
                vec![0x90, 0x00]
            }
            ins::DUPLICATE_KEY => self.handle_duplicate_key(command, data),
            _ => vec![0x6D, 0x00],
        }
    }

    fn handle_duplicate_key(&mut self, command: &Command, data: &[u8]) -> Vec<u8> {
        match command.p1 {
            // Start and add-entropy accept one 32-byte share
            0x00 | 0x01 => {
                if data.len() != 32 {
                    return vec![0x6A, 0x80];
                }
                vec![0x90, 0x00]
            }
            // Export: opaque key transport bytes
            0x02 => {
                let mut reply = vec![0x5Au8; 32];
                reply.extend_from_slice(&[0x90, 0x00]);
                reply
            }
            // Import: reply with a key UID
            0x03 => {
                let mut reply = vec![0xC3u8; 32];
                reply.extend_from_slice(&[0x90, 0x00]);
                reply
            }
            _ => vec![0x6A, 0x86],
        }
    }
}

impl CardTransport for SimulatedCard {
    fn transmit_raw(&mut self, raw: &[u8]) -> Result<Bytes, TransportError> {
        let command = Command::from_bytes(raw).map_err(|_| TransportError::Transmission)?;

        let response = match (command.cla, command.ins) {
            (CLA_ISO7816, ins::SELECT) => self.handle_select(),
            _ if self.session.is_some() => self.handle_protected(&command),
            (CLA_PROPRIETARY, ins::PAIR) => self.handle_pair(&command),
            (CLA_PROPRIETARY, ins::OPEN_SECURE_CHANNEL) => self.handle_open_secure_channel(&command),
            (CLA_PROPRIETARY, ins::DUPLICATE_KEY) => {
                let data = command.payload().to_vec();
                self.dispatch_inner(&command, &data)
            }
            _ => vec![0x6D, 0x00],
        };

        Ok(Bytes::from(response))
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.session = None;
        Ok(())
    }

    fn pairing_password_iterations(&self) -> u32 {
        TEST_PBKDF2_ITERATIONS
    }
}
