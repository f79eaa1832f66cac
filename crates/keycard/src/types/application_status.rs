//! PIN/PUK/key state, parsed from GET STATUS

use crate::constants::tags;
use crate::tlv::TlvReader;
use crate::Result;

/// Applet status: retry counters and master key presence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationStatus {
    /// Remaining PIN retries
    pub pin_retry_count: u8,
    /// Remaining PUK retries
    pub puk_retry_count: u8,
    /// Whether a master key is loaded
    pub has_master_key: bool,
}

impl ApplicationStatus {
    /// Parse the GET STATUS application template
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut tlv = TlvReader::new(data);
        tlv.enter_constructed(tags::TEMPLATE_APPLICATION_STATUS)?;

        Ok(Self {
            pin_retry_count: tlv.read_int()? as u8,
            puk_retry_count: tlv.read_int()? as u8,
            has_master_key: tlv.read_boolean()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::TlvWriter;

    #[test]
    fn test_parse() {
        let mut writer = TlvWriter::new();
        writer.write_primitive(tags::INT, &[3]);
        writer.write_primitive(tags::INT, &[5]);
        writer.write_primitive(tags::BOOL, &[0xFF]);
        let data = writer.into_template(tags::TEMPLATE_APPLICATION_STATUS);

        let status = ApplicationStatus::parse(&data).unwrap();
        assert_eq!(status.pin_retry_count, 3);
        assert_eq!(status.puk_retry_count, 5);
        assert!(status.has_master_key);
    }

    #[test]
    fn test_parse_rejects_wrong_template() {
        let mut writer = TlvWriter::new();
        writer.write_primitive(tags::INT, &[3]);
        let data = writer.into_template(tags::TEMPLATE_APPLICATION_INFO);

        assert!(ApplicationStatus::parse(&data).is_err());
    }
}
