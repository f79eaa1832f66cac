//! APDU command framing according to ISO/IEC 7816-4

use bytes::{BufMut, Bytes, BytesMut};

use crate::Error;

/// An APDU command frame
///
/// Commands are constructed per call, immutable once built and serialized
/// exactly once. The payload must fit a short APDU (at most 255 bytes);
/// violating this is a caller bug and panics rather than being coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected response length (optional)
    pub le: Option<u8>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        let data = data.into();
        assert!(data.len() <= 255, "APDU payload exceeds 255 bytes");
        self.data = Some(data);
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Command payload, empty when absent
    pub fn payload(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Serialize to raw wire bytes:
    /// `[CLA, INS, P1, P2]` + `Lc, data` when data is present + `Le` when
    /// a response length is requested.
    pub fn to_bytes(&self) -> Bytes {
        let data_len = self.data.as_ref().map_or(0, |d| d.len());
        let mut buffer = BytesMut::with_capacity(4 + 1 + data_len + 1);

        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = &self.data {
            buffer.put_u8(data.len() as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        buffer.freeze()
    }

    /// Parse a command from raw wire bytes
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < 4 {
            return Err(Error::InvalidCommandLength(raw.len()));
        }

        let mut command = Self::new(raw[0], raw[1], raw[2], raw[3]);

        if raw.len() == 4 {
            return Ok(command);
        }

        if raw.len() == 5 {
            // Only Le present, no data
            command.le = Some(raw[4]);
            return Ok(command);
        }

        let lc = raw[4] as usize;
        match raw.len() {
            n if n == 5 + lc => {
                command.data = Some(Bytes::copy_from_slice(&raw[5..5 + lc]));
            }
            n if n == 5 + lc + 1 => {
                command.data = Some(Bytes::copy_from_slice(&raw[5..5 + lc]));
                command.le = Some(raw[5 + lc]);
            }
            n => return Err(Error::InvalidCommandLength(n)),
        }

        Ok(command)
    }
}
