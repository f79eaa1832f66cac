//! End-to-end secure channel tests against the simulated card

mod common;

use common::{PAIRING_PASSWORD, PIN, SimulatedCard};

use chiave_keycard::constants::PersistentRecord;
use chiave_keycard::{Error, Keycard};

fn paired_keycard() -> Keycard<SimulatedCard> {
    let mut keycard = Keycard::new(SimulatedCard::new([0x01; 16]));
    keycard.select().unwrap();
    keycard.pair(PAIRING_PASSWORD).unwrap();
    keycard
}

#[test]
fn test_select_parses_application_info() {
    let mut keycard = Keycard::new(SimulatedCard::new([0x01; 16]));
    let info = keycard.select().unwrap();

    assert!(info.initialized);
    assert_eq!(info.instance_uid, vec![0x01; 16]);
    assert!(info.public_key.is_some());
    assert_eq!(info.free_pairing_slots, 5);
    assert!(info.has_master_key());
}

#[test]
fn test_pair_then_open_secure_channel() {
    let mut keycard = paired_keycard();
    assert_eq!(keycard.pairing().unwrap().index, 0);

    assert!(!keycard.is_secure_channel_open());
    keycard.auto_open_secure_channel().unwrap();
    assert!(keycard.is_secure_channel_open());
}

#[test]
fn test_pairing_with_wrong_password_fails_verification() {
    let mut keycard = Keycard::new(SimulatedCard::new([0x01; 16]));
    keycard.select().unwrap();

    assert!(matches!(
        keycard.pair("wrong password"),
        Err(Error::InvalidAuthData)
    ));
}

#[test]
fn test_protected_command_round_trips_payload() {
    let mut keycard = paired_keycard();
    keycard.auto_open_secure_channel().unwrap();

    let payload = b"stored under encryption".to_vec();
    keycard
        .store_data(PersistentRecord::Public, &payload)
        .unwrap();
    assert_eq!(keycard.get_data(PersistentRecord::Public).unwrap(), payload);
}

#[test]
fn test_verify_pin_and_wrong_pin_accounting() {
    let mut keycard = paired_keycard();
    keycard.auto_open_secure_channel().unwrap();

    assert!(matches!(
        keycard.verify_pin("000000"),
        Err(Error::WrongPin(2))
    ));
    assert!(matches!(
        keycard.verify_pin("000000"),
        Err(Error::WrongPin(1))
    ));

    // The correct PIN resets the counter
    keycard.verify_pin(PIN).unwrap();
    let status = keycard.get_status().unwrap();
    assert_eq!(status.pin_retry_count, 3);
}

#[test]
fn test_corrupted_command_closes_channel() {
    let mut keycard = paired_keycard();
    keycard.auto_open_secure_channel().unwrap();

    // One flipped ciphertext byte in flight: the card's MAC check fails,
    // it reports a security failure and the channel closes on both ends
    keycard.transport_mut().corrupt_next_command = true;

    assert!(matches!(
        keycard.verify_pin(PIN),
        Err(Error::SecurityConditionNotSatisfied)
    ));
    assert!(!keycard.is_secure_channel_open());

    // The channel can be rebuilt after a fresh SELECT
    keycard.select().unwrap();
    keycard.auto_open_secure_channel().unwrap();
    keycard.verify_pin(PIN).unwrap();
}

#[test]
fn test_tampered_response_mac_raises_invalid_mac() {
    let mut keycard = paired_keycard();
    keycard.auto_open_secure_channel().unwrap();

    keycard.transport_mut().corrupt_next_response_mac = true;

    assert!(matches!(keycard.verify_pin(PIN), Err(Error::InvalidMac)));
}

#[test]
fn test_unpair_clears_own_credential() {
    let mut keycard = paired_keycard();
    keycard.auto_open_secure_channel().unwrap();
    keycard.verify_pin(PIN).unwrap();

    let index = keycard.pairing().unwrap().index;
    keycard.unpair(index).unwrap();
    assert!(keycard.pairing().is_none());
}
