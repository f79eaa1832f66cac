//! APDU response framing according to ISO/IEC 7816-4

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, StatusWord};

/// An APDU response frame: payload bytes followed by a two-byte status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Bytes,
    status: StatusWord,
}

impl Response {
    /// Create a response from payload and status word
    pub const fn new(payload: Bytes, status: StatusWord) -> Self {
        Self { payload, status }
    }

    /// Parse a response from raw wire bytes. The status word is always
    /// present, so the frame must be at least two bytes long.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < 2 {
            return Err(Error::ResponseTooShort(raw.len()));
        }

        let (payload, sw) = raw.split_at(raw.len() - 2);
        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status: StatusWord::new(sw[0], sw[1]),
        })
    }

    /// Response payload, possibly empty
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Whether the status word is 0x9000
    pub const fn is_success(&self) -> bool {
        self.status.is_ok()
    }

    /// Serialize back to raw wire bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 2);
        buf.put_slice(&self.payload);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        buf.freeze()
    }

    /// Require the success status word
    pub fn check_ok(&self) -> Result<&Self, Error> {
        self.check_status(&[crate::status::common::OK])
    }

    /// Require the status word to be one of `expected`, failing with
    /// `Error::Status` otherwise so callers can map the code into their
    /// own taxonomy.
    pub fn check_status(&self, expected: &[StatusWord]) -> Result<&Self, Error> {
        if expected.contains(&self.status) {
            Ok(self)
        } else {
            Err(Error::Status(self.status))
        }
    }
}
