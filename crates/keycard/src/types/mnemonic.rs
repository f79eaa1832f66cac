//! BIP39 mnemonic handling for GENERATE MNEMONIC

use coins_bip39::{English, Wordlist};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;

use crate::types::Bip32KeyPair;
use crate::{Error, Result};

/// PBKDF2 iteration count fixed by BIP39
const BIP39_ITERATIONS: u32 = 2048;

/// A mnemonic as returned by the card: a sequence of wordlist indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mnemonic {
    indexes: Vec<u16>,
}

impl Mnemonic {
    /// Parse the GENERATE MNEMONIC payload: big-endian u16 indexes
    pub fn from_raw(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data.len() % 2 != 0 {
            return Err(Error::InvalidData("mnemonic payload must be u16 indexes"));
        }

        let indexes = data
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        Ok(Self { indexes })
    }

    /// The raw wordlist indexes
    pub fn indexes(&self) -> &[u16] {
        &self.indexes
    }

    /// Resolve the indexes against the English wordlist
    pub fn words(&self) -> Result<Vec<&'static str>> {
        self.indexes
            .iter()
            .map(|&index| {
                English::get(index as usize)
                    .map_err(|_| Error::InvalidData("mnemonic index outside the wordlist"))
            })
            .collect()
    }

    /// The space-joined mnemonic phrase
    pub fn to_phrase(&self) -> Result<String> {
        Ok(self.words()?.join(" "))
    }

    /// BIP39 binary seed: PBKDF2-HMAC-SHA512 over the phrase with the
    /// "mnemonic" + password salt
    pub fn to_seed(&self, password: &str) -> Result<[u8; 64]> {
        let phrase = self.to_phrase()?;
        let salt = format!("mnemonic{password}");

        let mut seed = [0u8; 64];
        pbkdf2_hmac::<Sha512>(
            phrase.as_bytes(),
            salt.as_bytes(),
            BIP39_ITERATIONS,
            &mut seed,
        );
        Ok(seed)
    }

    /// Master BIP32 keypair derived from the seed
    pub fn to_keypair(&self, password: &str) -> Result<Bip32KeyPair> {
        Bip32KeyPair::from_seed(&self.to_seed(password)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_from_raw_and_phrase() {
        // Indexes 0, 1, 2 map to the first three English words
        let mnemonic = Mnemonic::from_raw(&[0, 0, 0, 1, 0, 2]).unwrap();
        assert_eq!(mnemonic.indexes(), &[0, 1, 2]);
        assert_eq!(mnemonic.to_phrase().unwrap(), "abandon ability able");
    }

    #[test]
    fn test_rejects_odd_length() {
        assert!(Mnemonic::from_raw(&[0, 1, 2]).is_err());
        assert!(Mnemonic::from_raw(&[]).is_err());
    }

    #[test]
    fn test_seed_known_vector() {
        // BIP39 English test vector: all-"abandon" 12-word phrase ending
        // in "about", empty password; index 3 is "about"
        let mut raw = vec![0u8; 22];
        raw.extend_from_slice(&[0, 3]);
        let mnemonic = Mnemonic::from_raw(&raw).unwrap();
        assert_eq!(
            mnemonic.to_phrase().unwrap(),
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
        );

        let seed = mnemonic.to_seed("TREZOR").unwrap();
        assert_eq!(
            seed,
            hex!(
                "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
            )
        );
    }
}
