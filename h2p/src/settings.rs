//! HTTP/2 SETTINGS parameters (RFC 7540 Section 6.5).

use crate::error::H2Error;

/// Size in bytes of one encoded `(identifier, value)` pair.
pub const SETTING_ENTRY_LEN: usize = 6;

/// Largest legal flow-control window (2^31 - 1).
pub const MAX_WINDOW_SIZE: u32 = 0x7fff_ffff;

/// Registered SETTINGS identifiers (RFC 7540 Section 6.5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SettingId {
    HeaderTableSize = 0x1,
    EnablePush = 0x2,
    MaxConcurrentStreams = 0x3,
    InitialWindowSize = 0x4,
    MaxFrameSize = 0x5,
    MaxHeaderListSize = 0x6,
}

impl SettingId {
    /// `None` for identifiers this implementation does not know, which
    /// receivers must ignore.
    pub fn from_u16(id: u16) -> Option<Self> {
        Some(match id {
            0x1 => Self::HeaderTableSize,
            0x2 => Self::EnablePush,
            0x3 => Self::MaxConcurrentStreams,
            0x4 => Self::InitialWindowSize,
            0x5 => Self::MaxFrameSize,
            0x6 => Self::MaxHeaderListSize,
            _ => return None,
        })
    }
}

/// The values one endpoint has advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Default 4096.
    pub header_table_size: u32,
    /// Default enabled.
    pub enable_push: bool,
    /// Default unlimited.
    pub max_concurrent_streams: Option<u32>,
    /// Default 65535.
    pub initial_window_size: u32,
    /// Default 16384.
    pub max_frame_size: u32,
    /// Default unlimited.
    pub max_header_list_size: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: None,
            initial_window_size: 65535,
            max_frame_size: 16384,
            max_header_list_size: None,
        }
    }
}

impl Settings {
    /// Protocol defaults overridden by `entries`, in order.
    pub fn from_entries(entries: &[(SettingId, u32)]) -> Result<Self, H2Error> {
        let mut settings = Self::default();
        for &(id, value) in entries {
            settings.apply(id, value)?;
        }
        Ok(settings)
    }

    /// Apply one parameter, validating its range.
    pub fn apply(&mut self, id: SettingId, value: u32) -> Result<(), H2Error> {
        match id {
            SettingId::HeaderTableSize => self.header_table_size = value,
            SettingId::EnablePush => {
                if value > 1 {
                    return Err(H2Error::ProtocolError("ENABLE_PUSH must be 0 or 1".into()));
                }
                self.enable_push = value == 1;
            }
            SettingId::MaxConcurrentStreams => self.max_concurrent_streams = Some(value),
            SettingId::InitialWindowSize => {
                if value > MAX_WINDOW_SIZE {
                    return Err(H2Error::FlowControlError);
                }
                self.initial_window_size = value;
            }
            SettingId::MaxFrameSize => {
                if !(16_384..=16_777_215).contains(&value) {
                    return Err(H2Error::ProtocolError("MAX_FRAME_SIZE out of range".into()));
                }
                self.max_frame_size = value;
            }
            SettingId::MaxHeaderListSize => self.max_header_list_size = Some(value),
        }
        Ok(())
    }

    /// Encode every parameter as a SETTINGS payload.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        encode_setting(buf, SettingId::HeaderTableSize, self.header_table_size);
        encode_setting(buf, SettingId::EnablePush, u32::from(self.enable_push));
        if let Some(v) = self.max_concurrent_streams {
            encode_setting(buf, SettingId::MaxConcurrentStreams, v);
        }
        encode_setting(buf, SettingId::InitialWindowSize, self.initial_window_size);
        encode_setting(buf, SettingId::MaxFrameSize, self.max_frame_size);
        if let Some(v) = self.max_header_list_size {
            encode_setting(buf, SettingId::MaxHeaderListSize, v);
        }
    }

    /// Decode a SETTINGS payload on top of the protocol defaults.
    pub fn decode(payload: &[u8]) -> Result<Self, H2Error> {
        if !payload.len().is_multiple_of(SETTING_ENTRY_LEN) {
            return Err(H2Error::FrameSizeError);
        }
        let mut settings = Self::default();
        for entry in payload.chunks_exact(SETTING_ENTRY_LEN) {
            let id = u16::from_be_bytes([entry[0], entry[1]]);
            let value = u32::from_be_bytes([entry[2], entry[3], entry[4], entry[5]]);
            // Unknown identifiers are ignored (RFC 7540 Section 6.5.2).
            if let Some(id) = SettingId::from_u16(id) {
                settings.apply(id, value)?;
            }
        }
        Ok(settings)
    }
}

/// Append one `(identifier, value)` pair.
pub fn encode_setting(buf: &mut Vec<u8>, id: SettingId, value: u32) {
    buf.extend_from_slice(&(id as u16).to_be_bytes());
    buf.extend_from_slice(&value.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_entry(id: u16, value: u32) -> Vec<u8> {
        let mut buf = id.to_be_bytes().to_vec();
        buf.extend_from_slice(&value.to_be_bytes());
        buf
    }

    #[test]
    fn entry_layout() {
        let mut buf = Vec::new();
        encode_setting(&mut buf, SettingId::MaxConcurrentStreams, 100);
        assert_eq!(buf, [0x00, 0x03, 0x00, 0x00, 0x00, 0x64]);
    }

    #[test]
    fn decode_overrides_defaults() {
        let mut payload = raw_entry(0x3, 100);
        payload.extend(raw_entry(0x2, 0));
        payload.extend(raw_entry(0x5, 32_768));
        let decoded = Settings::decode(&payload).unwrap();
        assert_eq!(decoded.max_concurrent_streams, Some(100));
        assert!(!decoded.enable_push);
        assert_eq!(decoded.max_frame_size, 32_768);
        assert_eq!(decoded.header_table_size, 4096);
    }

    #[test]
    fn from_entries_matches_advertised_values() {
        let settings = Settings::from_entries(&[
            (SettingId::MaxConcurrentStreams, 100),
            (SettingId::EnablePush, 0),
        ])
        .unwrap();
        assert_eq!(settings.max_concurrent_streams, Some(100));
        assert!(!settings.enable_push);
        assert_eq!(settings.initial_window_size, 65535);
    }

    #[test]
    fn encoded_settings_decode_to_same_values() {
        let settings = Settings {
            header_table_size: 8192,
            enable_push: false,
            max_concurrent_streams: Some(10),
            initial_window_size: 1 << 20,
            max_frame_size: 32_768,
            max_header_list_size: Some(65_536),
        };
        let mut buf = Vec::new();
        settings.encode(&mut buf);
        assert_eq!(Settings::decode(&buf).unwrap(), settings);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(Settings::decode(&raw_entry(0x2, 2)).is_err());
        assert_eq!(
            Settings::decode(&raw_entry(0x4, 0x8000_0000)),
            Err(H2Error::FlowControlError)
        );
        assert!(Settings::decode(&raw_entry(0x5, 100)).is_err());
    }

    #[test]
    fn truncated_payload_rejected() {
        assert_eq!(
            Settings::decode(&[0, 3, 0, 0, 0]),
            Err(H2Error::FrameSizeError)
        );
    }

    #[test]
    fn unknown_identifier_ignored() {
        let decoded = Settings::decode(&raw_entry(0xff, 42)).unwrap();
        assert_eq!(decoded, Settings::default());
    }
}
