//! Cryptographic operations for the Keycard secure channel
//!
//! The channel encrypts with AES-256-CBC under ISO 7816-4 padding and
//! authenticates with an AES CBC-MAC whose output doubles as the chaining
//! IV of the next message. Pairing and session keys are derived with
//! SHA-256/SHA-512 over the ECDH shared secret, the pairing key and the
//! card-provided salts.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Iso7816};
use cipher::generic_array::GenericArray;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{PublicKey, SecretKey};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use unicode_normalization::UnicodeNormalization;

use bytes::{BufMut, Bytes, BytesMut};

/// Fixed salt for deriving the pairing token from a pairing password
pub const PAIRING_TOKEN_SALT: &str = "Keycard Pairing Password Salt";

/// Length of secrets, challenges and cryptograms
pub const SECRET_LENGTH: usize = 32;
/// AES block length
pub const BLOCK_LENGTH: usize = 16;

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

/// Derive the pairing token from a human pairing password via
/// PBKDF2-HMAC-SHA256. Password and salt are NFKD-normalized; the
/// iteration count comes from the transport so test doubles can lower it.
pub fn generate_pairing_token(password: &str, iterations: u32) -> [u8; SECRET_LENGTH] {
    let password = password.nfkd().collect::<String>();
    let salt = PAIRING_TOKEN_SALT.nfkd().collect::<String>();

    let mut token = [0u8; SECRET_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut token);
    token
}

/// ECDH shared secret between the host ephemeral key and the card's
/// secure channel public key
pub fn generate_ecdh_secret(private: &SecretKey, public: &PublicKey) -> [u8; SECRET_LENGTH] {
    let shared =
        k256::elliptic_curve::ecdh::diffie_hellman(private.to_nonzero_scalar(), public.as_affine());

    let mut secret = [0u8; SECRET_LENGTH];
    secret.copy_from_slice(shared.raw_secret_bytes().as_slice());
    secret
}

/// Pairing cryptogram: `SHA256(secret ++ challenge)`
pub fn calculate_cryptogram(
    secret: &[u8; SECRET_LENGTH],
    challenge: &[u8; SECRET_LENGTH],
) -> [u8; SECRET_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(challenge);
    hasher.finalize().into()
}

/// Derive the session keys: `SHA512(secret ++ pairing_key ++ salt)`,
/// first half AES encryption key, second half MAC key.
pub fn derive_session_keys(
    secret: &[u8; SECRET_LENGTH],
    pairing_key: &[u8; SECRET_LENGTH],
    session_salt: &[u8; SECRET_LENGTH],
) -> ([u8; 32], [u8; 32]) {
    let mut hasher = Sha512::new();
    hasher.update(secret);
    hasher.update(pairing_key);
    hasher.update(session_salt);
    let digest = hasher.finalize();

    let mut enc_key = [0u8; 32];
    let mut mac_key = [0u8; 32];
    enc_key.copy_from_slice(&digest[..32]);
    mac_key.copy_from_slice(&digest[32..]);
    (enc_key, mac_key)
}

/// AES-256-CBC encrypt with ISO 7816-4 padding
pub fn encrypt_data(data: &[u8], enc_key: &[u8; 32], iv: &[u8; BLOCK_LENGTH]) -> Vec<u8> {
    let msg_len = data.len();
    let mut buf = data.to_vec();
    buf.resize(msg_len + BLOCK_LENGTH - msg_len % BLOCK_LENGTH, 0);

    let encryptor = Encryptor::new(GenericArray::from_slice(enc_key), GenericArray::from_slice(iv));
    // The buffer was padded to a block multiple above
    let ciphertext = encryptor
        .encrypt_padded_mut::<Iso7816>(&mut buf, msg_len)
        .unwrap();
    ciphertext.to_vec()
}

/// AES-256-CBC decrypt and strip ISO 7816-4 padding. Fails when the
/// padding marker is missing, which on this channel means the ciphertext
/// was not produced under the session keys.
pub fn decrypt_data(
    data: &[u8],
    enc_key: &[u8; 32],
    iv: &[u8; BLOCK_LENGTH],
) -> Result<Vec<u8>, cipher::block_padding::UnpadError> {
    let mut buf = data.to_vec();
    let decryptor = Decryptor::new(GenericArray::from_slice(enc_key), GenericArray::from_slice(iv));
    let plaintext = decryptor.decrypt_padded_mut::<Iso7816>(&mut buf)?;
    Ok(plaintext.to_vec())
}

/// CBC-MAC over the 16-byte metadata block and the (block-aligned)
/// ciphertext: AES-256-CBC with a zero IV, keeping the last cipher block.
/// The result becomes both the message authenticator and the chaining IV
/// of the next message.
pub fn calculate_mac(
    meta: &[u8; BLOCK_LENGTH],
    data: &[u8],
    mac_key: &[u8; 32],
) -> [u8; BLOCK_LENGTH] {
    debug_assert_eq!(data.len() % BLOCK_LENGTH, 0);

    let zero_iv = [0u8; BLOCK_LENGTH];
    let mut encryptor =
        Encryptor::new(GenericArray::from_slice(mac_key), GenericArray::from_slice(&zero_iv));

    let mut mac = GenericArray::clone_from_slice(meta);
    encryptor.encrypt_block_mut(&mut mac);
    for chunk in data.chunks(BLOCK_LENGTH) {
        mac = GenericArray::clone_from_slice(chunk);
        encryptor.encrypt_block_mut(&mut mac);
    }

    mac.into()
}

/// One-shot encryption for the INIT command, sent before any pairing
/// exists: a fresh random IV, AES under the raw ECDH secret, prefixed
/// with the host public key and the IV so the card can recompute the
/// secret and decrypt.
pub fn one_shot_encrypt(
    host_public_key: &PublicKey,
    secret: &[u8; SECRET_LENGTH],
    data: &[u8],
) -> Bytes {
    let mut iv = [0u8; BLOCK_LENGTH];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = encrypt_data(data, secret, &iv);

    let pub_key_point = host_public_key.to_encoded_point(false);
    let pub_key_bytes = pub_key_point.as_bytes();

    let mut buf = BytesMut::with_capacity(1 + pub_key_bytes.len() + iv.len() + ciphertext.len());
    buf.put_u8(pub_key_bytes.len() as u8);
    buf.put_slice(pub_key_bytes);
    buf.put_slice(&iv);
    buf.put_slice(&ciphertext);
    buf.freeze()
}
