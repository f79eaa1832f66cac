//! Applet lifecycle helpers over the SCP02 administrative channel
//!
//! Convenience wrappers binding the Keycard AIDs to the generic
//! GlobalPlatform install/delete operations. The caller is expected to
//! have selected the ISD and opened the SCP02 channel first.

use chiave_apdu_core::CardTransport;
use chiave_globalplatform::{GlobalPlatform, Result};

use crate::constants::{
    CASH_AID, CASH_INSTANCE_AID, KEYCARD_AID, NDEF_AID, NDEF_INSTANCE_AID, PACKAGE_AID,
    keycard_instance_aid,
};

/// Install a Keycard applet instance
pub fn install_keycard_instance<T: CardTransport>(
    gp: &mut GlobalPlatform<T>,
    instance_idx: u8,
) -> Result<()> {
    gp.install_for_install(
        PACKAGE_AID,
        KEYCARD_AID,
        &keycard_instance_aid(instance_idx),
        &[],
    )
}

/// Install the NDEF applet instance with the initial NDEF record
pub fn install_ndef_instance<T: CardTransport>(
    gp: &mut GlobalPlatform<T>,
    ndef_record: &[u8],
) -> Result<()> {
    gp.install_for_install(PACKAGE_AID, NDEF_AID, NDEF_INSTANCE_AID, ndef_record)
}

/// Install the cash applet instance with its initialization data
pub fn install_cash_instance<T: CardTransport>(
    gp: &mut GlobalPlatform<T>,
    cash_data: &[u8],
) -> Result<()> {
    gp.install_for_install(PACKAGE_AID, CASH_AID, CASH_INSTANCE_AID, cash_data)
}

/// Delete a Keycard applet instance
pub fn delete_keycard_instance<T: CardTransport>(
    gp: &mut GlobalPlatform<T>,
    instance_idx: u8,
) -> Result<()> {
    gp.delete_object(&keycard_instance_aid(instance_idx))
}

/// Delete the NDEF applet instance
pub fn delete_ndef_instance<T: CardTransport>(gp: &mut GlobalPlatform<T>) -> Result<()> {
    gp.delete_object(NDEF_INSTANCE_AID)
}

/// Delete the cash applet instance
pub fn delete_cash_instance<T: CardTransport>(gp: &mut GlobalPlatform<T>) -> Result<()> {
    gp.delete_object(CASH_INSTANCE_AID)
}

/// Delete the Keycard package and all applet instances belonging to it
pub fn delete_package<T: CardTransport>(gp: &mut GlobalPlatform<T>) -> Result<()> {
    gp.delete_object(PACKAGE_AID)
}
