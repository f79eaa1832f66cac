//! Card metadata: free-text name plus the set of active wallet indices
//!
//! Stored as a blob in the public data record. The first byte packs the
//! format version (high three bits, currently 1) and the name length
//! (low five bits, so at most 31 ASCII characters). The wallet set is
//! serialized as sorted contiguous ranges, each a `(start, count)` pair
//! of compact integers.

use std::collections::BTreeSet;

use crate::tlv::{read_num, write_num};
use crate::{Error, Result};

/// Metadata format version
const VERSION: u8 = 1;

/// Maximum card name length
pub const MAX_NAME_LENGTH: usize = 31;

/// Card name and wallet-index set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    name: String,
    wallets: BTreeSet<u32>,
}

impl Metadata {
    /// Create metadata. The name must be ASCII and at most 31 characters.
    pub fn new(name: &str, wallets: BTreeSet<u32>) -> Result<Self> {
        if !name.is_ascii() {
            return Err(Error::InvalidData("card name must be ASCII"));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(Error::InvalidData("card name longer than 31 characters"));
        }

        Ok(Self {
            name: name.to_string(),
            wallets,
        })
    }

    /// The card name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wallet indices
    pub const fn wallets(&self) -> &BTreeSet<u32> {
        &self.wallets
    }

    /// Parse a metadata blob
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = *data.first().ok_or(Error::InvalidData("empty metadata"))?;

        if (header & 0xE0) >> 5 != VERSION {
            return Err(Error::InvalidData("unsupported metadata version"));
        }

        let name_len = (header & 0x1F) as usize;
        if data.len() < 1 + name_len {
            return Err(Error::InvalidData("metadata name truncated"));
        }

        let name = std::str::from_utf8(&data[1..1 + name_len])
            .map_err(|_| Error::InvalidData("card name must be ASCII"))?
            .to_string();

        let mut wallets = BTreeSet::new();
        let mut off = 1 + name_len;
        while off < data.len() {
            let (start, next) = read_num(data, off)?;
            let (count, next) = read_num(data, next)?;
            off = next;

            for index in start..=start.saturating_add(count) {
                wallets.insert(index);
            }
        }

        Ok(Self { name, wallets })
    }

    /// Serialize to the on-card blob format
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.name.len());
        out.push((VERSION << 5) | self.name.len() as u8);
        out.extend_from_slice(self.name.as_bytes());

        let mut iter = self.wallets.iter().copied();
        let Some(mut start) = iter.next() else {
            return out;
        };

        // Emit maximal contiguous runs as (start, extra-count) pairs
        let mut len = 0u32;
        for index in iter {
            if index == start + len + 1 {
                len += 1;
            } else {
                out.extend_from_slice(&write_num(start));
                out.extend_from_slice(&write_num(len));
                start = index;
                len = 0;
            }
        }
        out.extend_from_slice(&write_num(start));
        out.extend_from_slice(&write_num(len));

        out
    }
}
