//! Credentials for initializing a card

use rand::Rng;

/// PIN length required by the applet
const PIN_LENGTH: usize = 6;
/// PUK length required by the applet
const PUK_LENGTH: usize = 12;
/// Length of generated pairing passwords
const PAIRING_PASS_LENGTH: usize = 12;

const PAIRING_PASS_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The secret credentials delivered to the card by INIT: PIN, PUK and
/// the pairing password. Length violations are caller bugs.
#[derive(Debug, Clone)]
pub struct Secrets {
    pin: String,
    puk: String,
    pairing_password: String,
}

impl Secrets {
    /// Create from explicit credentials. The PIN must be 6 digits and
    /// the PUK 12 digits.
    pub fn new(pin: &str, puk: &str, pairing_password: &str) -> Self {
        assert!(
            pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()),
            "PIN must be exactly {PIN_LENGTH} digits"
        );
        assert!(
            puk.len() == PUK_LENGTH && puk.bytes().all(|b| b.is_ascii_digit()),
            "PUK must be exactly {PUK_LENGTH} digits"
        );

        Self {
            pin: pin.to_string(),
            puk: puk.to_string(),
            pairing_password: pairing_password.to_string(),
        }
    }

    /// Generate random credentials
    pub fn generate() -> Self {
        let mut rng = rand::rng();

        let pin = format!("{:06}", rng.random_range(0..1_000_000u32));
        let puk = format!("{:012}", rng.random_range(0..1_000_000_000_000u64));
        let pairing_password: String = (0..PAIRING_PASS_LENGTH)
            .map(|_| PAIRING_PASS_CHARSET[rng.random_range(0..PAIRING_PASS_CHARSET.len())] as char)
            .collect();

        Self {
            pin,
            puk,
            pairing_password,
        }
    }

    /// The PIN
    pub fn pin(&self) -> &str {
        &self.pin
    }

    /// The PUK
    pub fn puk(&self) -> &str {
        &self.puk
    }

    /// The pairing password
    pub fn pairing_password(&self) -> &str {
        &self.pairing_password
    }
}
