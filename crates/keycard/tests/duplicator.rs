//! Duplication ceremony tests against the simulated card

mod common;

use common::{PAIRING_PASSWORD, PIN, SimulatedCard};

use chiave_keycard::{
    ApplicationInfo, CardDuplicator, DuplicatorDelegate, Error, Keycard, Pairing,
};

/// Delegate returning fixed credentials, optionally lying about the PIN
struct TestDelegate {
    pairing: Option<Pairing>,
    pin: String,
}

impl DuplicatorDelegate for TestDelegate {
    fn pairing_for(&self, _info: &ApplicationInfo) -> Option<Pairing> {
        self.pairing.clone()
    }

    fn pin_for(&self, _info: &ApplicationInfo, _remaining_attempts: u8) -> String {
        self.pin.clone()
    }
}

fn paired_keycard(uid: [u8; 16]) -> (Keycard<SimulatedCard>, Pairing) {
    let mut keycard = Keycard::new(SimulatedCard::new(uid));
    keycard.select().unwrap();
    let pairing = keycard.pair(PAIRING_PASSWORD).unwrap();
    (keycard, pairing)
}

#[test]
fn test_start_duplication_and_export() {
    let (keycard, pairing) = paired_keycard([0x0A; 16]);
    let delegate = TestDelegate {
        pairing: Some(pairing),
        pin: PIN.to_string(),
    };

    let mut duplicator = CardDuplicator::new(keycard, delegate);
    duplicator.start_duplication(2).unwrap();

    // Export runs in a separate phase, so the same card is allowed again
    let key = duplicator.export_key().unwrap();
    assert_eq!(key.len(), 32);
}

#[test]
fn test_phase_exclusivity() {
    let (keycard, pairing) = paired_keycard([0x0B; 16]);
    let delegate = TestDelegate {
        pairing: Some(pairing),
        pin: PIN.to_string(),
    };

    let mut duplicator = CardDuplicator::new(keycard, delegate);
    duplicator.start_duplication(2).unwrap();

    // Presenting the same card twice within one phase is a protocol
    // violation
    assert!(matches!(
        duplicator.start_duplication(2),
        Err(Error::InvalidState)
    ));
}

#[test]
fn test_add_entropy_requires_no_credentials() {
    let keycard = Keycard::new(SimulatedCard::new([0x0C; 16]));
    let delegate = TestDelegate {
        pairing: None,
        pin: String::new(),
    };

    let mut duplicator = CardDuplicator::new(keycard, delegate);
    duplicator.add_entropy().unwrap();

    assert!(matches!(duplicator.add_entropy(), Err(Error::InvalidState)));
}

#[test]
fn test_unpaired_card_rejected() {
    let keycard = Keycard::new(SimulatedCard::new([0x0D; 16]));
    let delegate = TestDelegate {
        pairing: None,
        pin: PIN.to_string(),
    };

    let mut duplicator = CardDuplicator::new(keycard, delegate);
    assert!(matches!(
        duplicator.start_duplication(2),
        Err(Error::NotPaired)
    ));
}

#[test]
fn test_wrong_pin_exhaustion_blocks() {
    let (keycard, pairing) = paired_keycard([0x0E; 16]);
    let delegate = TestDelegate {
        pairing: Some(pairing),
        pin: "999999".to_string(),
    };

    // Three failing attempts count down 2, 1, 0; the preamble then gives
    // up with PinBlocked instead of looping forever
    let mut duplicator = CardDuplicator::new(keycard, delegate);
    assert!(matches!(
        duplicator.start_duplication(2),
        Err(Error::PinBlocked)
    ));
}
