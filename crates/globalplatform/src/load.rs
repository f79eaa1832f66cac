//! CAP file loading
//!
//! A CAP file is a ZIP archive of JavaCard components. For loading, the
//! components are concatenated in a fixed order, framed under the load
//! file data block tag with a BER length, and split into blocks sized to
//! leave room for the SCP02 MAC.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use bytes::{BufMut, BytesMut};
use zip::ZipArchive;

use crate::{Error, Result};

/// Maximum LOAD block size (255 minus 8 bytes for the MAC)
pub const BLOCK_SIZE: usize = 247;

/// Load file data block tag
const FILE_TAG: u8 = 0xC4;

/// CAP components in load order
const INTERNAL_FILES: &[&str] = &[
    "Header",
    "Directory",
    "Import",
    "Applet",
    "Class",
    "Method",
    "StaticField",
    "Export",
    "ConstantPool",
    "RefLocation",
];

/// A stream of LOAD command blocks for a CAP file
#[derive(Debug)]
pub struct LoadCommandStream {
    data: Vec<u8>,
    position: usize,
    blocks_count: usize,
    current_block: usize,
}

impl LoadCommandStream {
    /// Frame raw load file data (the concatenated CAP components) for
    /// streaming.
    pub fn new(load_file_data: Vec<u8>) -> Result<Self> {
        if load_file_data.is_empty() {
            return Err(Error::CapFile("CAP file has no components"));
        }

        let length_bytes = encode_length(load_file_data.len())?;

        let mut data = BytesMut::with_capacity(1 + length_bytes.len() + load_file_data.len());
        data.put_u8(FILE_TAG);
        data.put_slice(&length_bytes);
        data.put_slice(&load_file_data);
        let data = data.to_vec();

        let blocks_count = data.len().div_ceil(BLOCK_SIZE);

        Ok(Self {
            data,
            position: 0,
            blocks_count,
            current_block: 0,
        })
    }

    /// Open a CAP file and prepare its components for streaming
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut zip = ZipArchive::new(file).map_err(|_| Error::CapFile("invalid ZIP archive"))?;

        let names: Vec<String> = zip.file_names().map(str::to_string).collect();
        let find_file = |component: &str| -> Option<String> {
            let with_ext = format!("{component}.cap");
            names
                .iter()
                .find(|name| {
                    name.ends_with(&format!("/{with_ext}")) || name.as_str() == with_ext
                })
                .cloned()
        };

        let mut buf = Vec::new();
        for component in INTERNAL_FILES {
            if let Some(name) = find_file(component) {
                let mut file = zip
                    .by_name(&name)
                    .map_err(|_| Error::CapFile("unreadable CAP component"))?;
                file.read_to_end(&mut buf)?;
            }
        }

        Self::new(buf)
    }

    /// Total number of blocks
    pub const fn blocks_count(&self) -> usize {
        self.blocks_count
    }

    /// Whether more blocks remain
    pub fn has_next(&self) -> bool {
        self.position < self.data.len()
    }

    /// The next block as `(is_last, block_index, data)`
    pub fn next_block(&mut self) -> Option<(bool, u8, &[u8])> {
        if !self.has_next() {
            return None;
        }

        let remaining = self.data.len() - self.position;
        let block_size = remaining.min(BLOCK_SIZE);
        let is_last = remaining <= BLOCK_SIZE;

        let block_index = self.current_block as u8;
        let block = &self.data[self.position..self.position + block_size];

        self.position += block_size;
        self.current_block += 1;

        Some((is_last, block_index, block))
    }
}

/// Encode a BER length field in 1-4 bytes. Lengths beyond 0xFFFFFF cannot
/// be framed and fail fast.
fn encode_length(length: usize) -> Result<Vec<u8>> {
    if length < 0x80 {
        Ok(vec![length as u8])
    } else if length <= 0xFF {
        Ok(vec![0x81, length as u8])
    } else if length <= 0xFFFF {
        Ok(vec![0x82, (length >> 8) as u8, length as u8])
    } else if length <= 0xFF_FFFF {
        Ok(vec![0x83, (length >> 16) as u8, (length >> 8) as u8, length as u8])
    } else {
        Err(Error::CapFile("CAP file too large"))
    }
}
