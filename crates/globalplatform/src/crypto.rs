//! Cryptographic operations for the SCP02 protocol
//!
//! Session key derivation, cryptogram calculation and the full 3DES MAC
//! used to wrap administrative commands. SCP02 derives double-length 3DES
//! keys from 16-byte static keys and chains the command MAC as the ICV of
//! the next command.

use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};
use des::{Des, TdesEde3};

/// Derivation purpose for the session encryption key
pub const DERIVATION_PURPOSE_ENC: [u8; 2] = [0x01, 0x82];
/// Derivation purpose for the session MAC key
pub const DERIVATION_PURPOSE_MAC: [u8; 2] = [0x01, 0x01];
/// Derivation purpose for the session data encryption key
pub const DERIVATION_PURPOSE_DEK: [u8; 2] = [0x01, 0x81];

/// Zero initial chaining vector
pub const ZERO_IV: [u8; 8] = [0u8; 8];

/// Pad data in ISO 7816-4 format: append 0x80, then zero-fill to a
/// multiple of the block size.
pub fn pad_iso7816(data: &[u8], block_size: usize) -> Vec<u8> {
    let mut padded = data.to_vec();
    padded.push(0x80);
    while padded.len() % block_size != 0 {
        padded.push(0x00);
    }
    padded
}

/// Resize a 16-byte SCP02 key to a 24-byte 3DES key by repeating the
/// first 8 bytes.
pub fn resize_key(key: &[u8; 16]) -> [u8; 24] {
    let mut result = [0u8; 24];
    result[..16].copy_from_slice(key);
    result[16..].copy_from_slice(&key[..8]);
    result
}

/// 3DES-CBC encrypt block-aligned data
fn des3_cbc_encrypt(key: &[u8; 24], iv: &[u8; 8], data: &[u8]) -> Vec<u8> {
    debug_assert_eq!(data.len() % 8, 0);

    let cipher = TdesEde3::new(GenericArray::from_slice(key));
    let mut chain = *iv;
    let mut out = Vec::with_capacity(data.len());

    for chunk in data.chunks(8) {
        let mut block = GenericArray::default();
        for (i, b) in block.iter_mut().enumerate() {
            *b = chunk[i] ^ chain[i];
        }
        cipher.encrypt_block(&mut block);
        chain.copy_from_slice(block.as_slice());
        out.extend_from_slice(block.as_slice());
    }

    out
}

/// Single-DES encrypt one block under the first 8 bytes of an SCP02 key
fn des_encrypt_block(key: &[u8; 16], block: &[u8; 8]) -> [u8; 8] {
    let cipher = Des::new(GenericArray::from_slice(&key[..8]));
    let mut out = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut out);
    out.into()
}

/// Derive a session key from a static card key: 3DES-CBC encryption of
/// `[purpose(2) ++ sequence(2) ++ 0 x 12]` under the resized static key.
pub fn derive_session_key(card_key: &[u8; 16], seq: &[u8; 2], purpose: &[u8; 2]) -> [u8; 16] {
    let mut derivation_data = [0u8; 16];
    derivation_data[..2].copy_from_slice(purpose);
    derivation_data[2..4].copy_from_slice(seq);

    let encrypted = des3_cbc_encrypt(&resize_key(card_key), &ZERO_IV, &derivation_data);

    let mut key = [0u8; 16];
    key.copy_from_slice(&encrypted);
    key
}

/// Calculate an SCP02 cryptogram: 3DES-MAC (CBC, zero IV, last block) over
/// the ISO 7816-4 padded concatenation of the two challenges.
///
/// The card cryptogram uses `(host_challenge, card_challenge)`, the host
/// cryptogram the reverse order.
pub fn calculate_cryptogram(
    enc_key: &[u8; 16],
    challenge1: &[u8; 8],
    challenge2: &[u8; 8],
) -> [u8; 8] {
    let mut data = Vec::with_capacity(24);
    data.extend_from_slice(challenge1);
    data.extend_from_slice(challenge2);
    let padded = pad_iso7816(&data, 8);

    let encrypted = des3_cbc_encrypt(&resize_key(enc_key), &ZERO_IV, &padded);

    let mut mac = [0u8; 8];
    mac.copy_from_slice(&encrypted[encrypted.len() - 8..]);
    mac
}

/// Calculate the SCP02 full 3DES MAC
///
/// Single DES in CBC mode over all blocks except the last, then 3DES on
/// the final block. The data is ISO 7816-4 padded before processing.
pub fn mac_full_3des(key: &[u8; 16], icv: &[u8; 8], data: &[u8]) -> [u8; 8] {
    let padded = pad_iso7816(data, 8);

    let des_cipher = Des::new(GenericArray::from_slice(&key[..8]));
    let des3_cipher = TdesEde3::new(GenericArray::from_slice(&resize_key(key)));

    let mut chain = *icv;
    let last_block_start = padded.len() - 8;

    for chunk in padded[..last_block_start].chunks(8) {
        let mut block = GenericArray::default();
        for (i, b) in block.iter_mut().enumerate() {
            *b = chunk[i] ^ chain[i];
        }
        des_cipher.encrypt_block(&mut block);
        chain.copy_from_slice(block.as_slice());
    }

    let mut last = GenericArray::default();
    for (i, b) in last.iter_mut().enumerate() {
        *b = padded[last_block_start + i] ^ chain[i];
    }
    des3_cipher.encrypt_block(&mut last);

    last.into()
}

/// Encrypt the ICV for the next command: single DES over the previous MAC
/// under the first half of the MAC key.
pub fn encrypt_icv(mac_key: &[u8; 16], icv: &[u8; 8]) -> [u8; 8] {
    des_encrypt_block(mac_key, icv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_derive_session_key() {
        let card_key = hex!("404142434445464748494a4b4c4d4e4f");
        let seq = hex!("0065");

        let enc_key = derive_session_key(&card_key, &seq, &DERIVATION_PURPOSE_ENC);
        assert_eq!(enc_key, hex!("85e72aaf47874218a202bf5ef891dd21"));
    }

    #[test]
    fn test_resize_key() {
        let key = hex!("404142434445464748494a4b4c4d4e4f");
        assert_eq!(
            resize_key(&key),
            hex!("404142434445464748494a4b4c4d4e4f4041424344454647")
        );
    }

    #[test]
    fn test_verify_card_cryptogram() {
        let enc_key = hex!("16b5867ff50be7239c2bf1245b83a362");
        let host_challenge = hex!("32da078d7aac1cff");
        // Sequence counter and card challenge as returned by the card
        let card_challenge = hex!("007284f64a7d6465");

        let cryptogram = calculate_cryptogram(&enc_key, &host_challenge, &card_challenge);
        assert_eq!(cryptogram, hex!("05c4bb8a86014e22"));
    }

    #[test]
    fn test_mac_full_3des() {
        let key = hex!("5b02e75ad63190aece0622936f11abab");
        let data = hex!("8482010010810b098a8fbb88da");

        let mac = mac_full_3des(&key, &ZERO_IV, &data);
        assert_eq!(mac, hex!("5271d7174a5a166a"));
    }

    #[test]
    fn test_pad_iso7816() {
        assert_eq!(pad_iso7816(&[0xAA], 8), hex!("AA80000000000000"));
        // Block-aligned input gains a whole padding block
        let padded = pad_iso7816(&hex!("0102030405060708"), 8);
        assert_eq!(padded, hex!("01020304050607088000000000000000"));
    }
}
