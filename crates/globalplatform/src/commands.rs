//! Builders for the GlobalPlatform command set
//!
//! Thin constructors translating operation parameters into APDU frames.
//! The wire constants live in [`crate::constants`].

use bytes::{BufMut, BytesMut};

use chiave_apdu_core::Command;

use crate::constants::{cla, ins, install_p1, load_p1};

/// SELECT by DF name
pub fn select(aid: &[u8]) -> Command {
    Command::new_with_data(cla::ISO7816, ins::SELECT, 0x04, 0x00, aid.to_vec()).with_le(0)
}

/// INITIALIZE UPDATE with an 8-byte host challenge
pub fn initialize_update(host_challenge: &[u8; 8]) -> Command {
    Command::new_with_data(
        cla::GP,
        ins::INITIALIZE_UPDATE,
        0x00,
        0x00,
        host_challenge.to_vec(),
    )
    .with_le(0)
}

/// EXTERNAL AUTHENTICATE with the host cryptogram (C-MAC security level)
pub fn external_authenticate(host_cryptogram: &[u8; 8]) -> Command {
    Command::new_with_data(
        cla::GP,
        ins::EXTERNAL_AUTHENTICATE,
        0x01,
        0x00,
        host_cryptogram.to_vec(),
    )
}

/// DELETE an object by AID
pub fn delete(aid: &[u8]) -> Command {
    let mut data = BytesMut::with_capacity(2 + aid.len());
    data.put_u8(0x4F);
    data.put_u8(aid.len() as u8);
    data.put_slice(aid);
    Command::new_with_data(cla::GP, ins::DELETE, 0x00, 0x00, data.freeze())
}

/// INSTALL [for load] announcing a package upload
pub fn install_for_load(package_aid: &[u8], security_domain_aid: &[u8]) -> Command {
    let mut data = BytesMut::with_capacity(5 + package_aid.len() + security_domain_aid.len());
    data.put_u8(package_aid.len() as u8);
    data.put_slice(package_aid);
    data.put_u8(security_domain_aid.len() as u8);
    data.put_slice(security_domain_aid);
    // Empty load file data block hash, parameters and token
    data.put_slice(&[0x00, 0x00, 0x00]);
    Command::new_with_data(cla::GP, ins::INSTALL, install_p1::FOR_LOAD, 0x00, data.freeze())
}

/// INSTALL [for install and make selectable] creating an applet instance
pub fn install_for_install(
    package_aid: &[u8],
    applet_aid: &[u8],
    instance_aid: &[u8],
    params: &[u8],
) -> Command {
    let mut data =
        BytesMut::with_capacity(9 + package_aid.len() + applet_aid.len() + instance_aid.len() + params.len());
    data.put_u8(package_aid.len() as u8);
    data.put_slice(package_aid);
    data.put_u8(applet_aid.len() as u8);
    data.put_slice(applet_aid);
    data.put_u8(instance_aid.len() as u8);
    data.put_slice(instance_aid);
    // Privileges: one empty byte
    data.put_u8(0x01);
    data.put_u8(0x00);
    // Install parameters wrapped in a C9 TLV
    data.put_u8((params.len() + 2) as u8);
    data.put_u8(0xC9);
    data.put_u8(params.len() as u8);
    data.put_slice(params);
    // Empty install token
    data.put_u8(0x00);
    Command::new_with_data(
        cla::GP,
        ins::INSTALL,
        install_p1::FOR_INSTALL_AND_MAKE_SELECTABLE,
        0x00,
        data.freeze(),
    )
}

/// LOAD one block of a CAP file
pub fn load_block(block_index: u8, is_last: bool, block: &[u8]) -> Command {
    let p1 = if is_last {
        load_p1::LAST_BLOCK
    } else {
        load_p1::MORE_BLOCKS
    };
    Command::new_with_data(cla::GP, ins::LOAD, p1, block_index, block.to_vec())
}
