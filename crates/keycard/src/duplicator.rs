//! Multi-party key duplication
//!
//! Duplicates one card's key material onto other cards through a shared,
//! never-persisted secret: the coordinating host holds one 32-byte share
//! and each participating client contributes its own, so no single
//! session ever sees the full key in the clear. Each card may take part
//! in a given phase at most once per ceremony.

use std::collections::HashSet;

use rand::RngCore;
use tracing::debug;

use chiave_apdu_core::CardTransport;

use crate::types::{ApplicationInfo, Pairing};
use crate::{Error, Keycard, Result};

/// User-facing callbacks for the duplication ceremony: look up the
/// pairing credential for a card identity and prompt for the PIN given
/// the remaining attempt count.
pub trait DuplicatorDelegate {
    /// The stored pairing for this card, or `None` when the card was
    /// never paired
    fn pairing_for(&self, info: &ApplicationInfo) -> Option<Pairing>;

    /// The PIN for this card; `remaining_attempts` is the card-reported
    /// retry counter
    fn pin_for(&self, info: &ApplicationInfo, remaining_attempts: u8) -> String;
}

/// Coordinates a duplication ceremony across cards presented one at a
/// time on the same transport
pub struct CardDuplicator<T: CardTransport, D: DuplicatorDelegate> {
    cmd_set: Keycard<T>,
    delegate: D,
    secret: [u8; 32],
    started: HashSet<Vec<u8>>,
    entropy_added: HashSet<Vec<u8>>,
    finished: HashSet<Vec<u8>>,
}

impl<T: CardTransport, D: DuplicatorDelegate> std::fmt::Debug for CardDuplicator<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDuplicator")
            .field("started", &self.started.len())
            .field("entropy_added", &self.entropy_added.len())
            .field("finished", &self.finished.len())
            .finish_non_exhaustive()
    }
}

impl<T: CardTransport, D: DuplicatorDelegate> CardDuplicator<T, D> {
    /// Create a duplicator with a fresh random secret share
    pub fn new(cmd_set: Keycard<T>, delegate: D) -> Self {
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);

        Self {
            cmd_set,
            delegate,
            secret,
            started: HashSet::new(),
            entropy_added: HashSet::new(),
            finished: HashSet::new(),
        }
    }

    /// Begin duplication on the source card, contributing our secret
    /// share and announcing the expected number of clients
    pub fn start_duplication(&mut self, client_count: u8) -> Result<()> {
        self.preamble(Phase::Started)?;
        let secret = self.secret;
        self.cmd_set.duplicate_key_start(client_count, &secret)
    }

    /// Contribute our entropy share on a client card. Entropy
    /// contribution needs no pairing or PIN, only applet selection.
    pub fn add_entropy(&mut self) -> Result<()> {
        self.select_and_check(Phase::EntropyAdded)?;
        let secret = self.secret;
        self.cmd_set.duplicate_key_add_entropy(&secret)
    }

    /// Export the duplicated key from the source card as opaque
    /// transport bytes
    pub fn export_key(&mut self) -> Result<Vec<u8>> {
        self.preamble(Phase::Finished)?;
        self.cmd_set.duplicate_key_export()
    }

    /// Deliver duplicated key bytes to a destination card
    pub fn import_key(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        self.preamble(Phase::Finished)?;
        self.cmd_set.duplicate_key_import(key)
    }

    /// Select the card and enforce per-phase exclusivity on its instance
    /// UID
    fn select_and_check(&mut self, phase: Phase) -> Result<ApplicationInfo> {
        let info = self.cmd_set.select()?;

        let processed = match phase {
            Phase::Started => &mut self.started,
            Phase::EntropyAdded => &mut self.entropy_added,
            Phase::Finished => &mut self.finished,
        };
        if !processed.insert(info.instance_uid.clone()) {
            return Err(Error::InvalidState);
        }

        Ok(info)
    }

    /// Select, open the secure channel with the delegate's pairing, and
    /// verify the PIN, retrying with the card-reported attempt count
    /// until it succeeds or the card blocks.
    fn preamble(&mut self, phase: Phase) -> Result<()> {
        let info = self.select_and_check(phase)?;

        let pairing = self.delegate.pairing_for(&info).ok_or(Error::NotPaired)?;
        self.cmd_set.set_pairing(Some(pairing));
        self.cmd_set.auto_open_secure_channel()?;

        let status = self.cmd_set.get_status()?;
        let mut remaining = status.pin_retry_count;

        loop {
            if remaining == 0 {
                return Err(Error::PinBlocked);
            }

            let pin = self.delegate.pin_for(&info, remaining);
            match self.cmd_set.verify_pin(&pin) {
                Ok(()) => break,
                Err(Error::WrongPin(retries)) => {
                    debug!(retries, "wrong PIN during duplication preamble");
                    remaining = retries;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Started,
    EntropyAdded,
    Finished,
}
