//! Serializes the client's SETTINGS and request HEADERS frames.
//!
//! Header blocks are encoded without compression state: fields found in the
//! HPACK static table are indexed, everything else is sent as a literal
//! without indexing with raw (non-Huffman) strings.

use h2p::frame::{self, FLAG_END_HEADERS, FLAG_END_STREAM, FRAME_HEADERS, FRAME_SETTINGS};
use h2p::hpack::{encode_prefix_int, static_index, static_name_index};
use h2p::settings::{SETTING_ENTRY_LEN, SettingId, encode_setting};

/// A SETTINGS frame on stream 0 carrying `entries` in order.
pub fn encode_settings(entries: &[(SettingId, u32)]) -> Vec<u8> {
    let len = entries.len() * SETTING_ENTRY_LEN;
    let mut buf = Vec::with_capacity(frame::FRAME_HEADER_LEN + len);
    frame::encode_frame_header(&mut buf, len as u32, FRAME_SETTINGS, 0, 0);
    for &(id, value) in entries {
        encode_setting(&mut buf, id, value);
    }
    buf
}

/// A HEADERS frame with END_STREAM and END_HEADERS set.
pub fn encode_headers(stream_id: u32, fields: &[(&[u8], &[u8])]) -> Vec<u8> {
    let block = encode_header_block(fields);
    let mut buf = Vec::with_capacity(frame::FRAME_HEADER_LEN + block.len());
    frame::encode_frame_header(
        &mut buf,
        block.len() as u32,
        FRAME_HEADERS,
        FLAG_END_STREAM | FLAG_END_HEADERS,
        stream_id,
    );
    buf.extend_from_slice(&block);
    buf
}

fn encode_header_block(fields: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut block = Vec::new();
    for &(name, value) in fields {
        if let Some(index) = static_index(name, value) {
            // Indexed header field (RFC 7541 Section 6.1).
            encode_prefix_int(&mut block, index as u64, 7, 0x80);
            continue;
        }
        // Literal without indexing (RFC 7541 Section 6.2.2).
        match static_name_index(name) {
            Some(index) => encode_prefix_int(&mut block, index as u64, 4, 0x00),
            None => {
                block.push(0x00);
                encode_string(&mut block, name);
            }
        }
        encode_string(&mut block, value);
    }
    block
}

fn encode_string(buf: &mut Vec<u8>, s: &[u8]) {
    encode_prefix_int(buf, s.len() as u64, 7, 0x00);
    buf.extend_from_slice(s);
}

/// The request fields sent on the single stream.
pub fn request_fields<'a>(
    path: &'a [u8],
    authority: &'a [u8],
    user_agent: &'a [u8],
) -> [(&'static [u8], &'a [u8]); 6] {
    [
        (b":method", b"GET"),
        (b":path", path),
        (b":scheme", b"http"),
        (b":authority", authority),
        (b"accept", b"*/*"),
        (b"user-agent", user_agent),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use h2p::hpack::{Decoder, HeaderField};
    use h2p::{Frame, Settings};

    #[test]
    fn settings_frame_layout() {
        let buf = encode_settings(&[(SettingId::MaxConcurrentStreams, 100)]);
        assert_eq!(
            buf,
            [
                0x00, 0x00, 0x06, // length
                0x04, // SETTINGS
                0x00, // flags
                0x00, 0x00, 0x00, 0x00, // stream 0
                0x00, 0x03, 0x00, 0x00, 0x00, 0x64,
            ]
        );
    }

    #[test]
    fn settings_frame_decodes() {
        let buf = encode_settings(&[
            (SettingId::MaxConcurrentStreams, 100),
            (SettingId::EnablePush, 0),
        ]);
        let (frame, used) = frame::decode_frame(&buf, 16_384).unwrap().unwrap();
        assert_eq!(used, buf.len());
        let expected = Settings::from_entries(&[
            (SettingId::MaxConcurrentStreams, 100),
            (SettingId::EnablePush, 0),
        ])
        .unwrap();
        assert_eq!(
            frame,
            Frame::Settings {
                ack: false,
                settings: expected
            }
        );
    }

    #[test]
    fn empty_settings_frame() {
        assert_eq!(encode_settings(&[]), [0, 0, 0, 4, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn headers_frame_flags_and_stream() {
        let buf = encode_headers(1, &[(b":method", b"GET")]);
        let header = frame::decode_frame_header(&buf).unwrap();
        assert_eq!(header.frame_type, FRAME_HEADERS);
        assert_eq!(header.flags, FLAG_END_STREAM | FLAG_END_HEADERS);
        assert_eq!(header.stream_id, 1);
        assert_eq!(header.length as usize, buf.len() - frame::FRAME_HEADER_LEN);
        // :method GET is static entry 2.
        assert_eq!(&buf[frame::FRAME_HEADER_LEN..], [0x82]);
    }

    #[test]
    fn block_representations() {
        let block = encode_header_block(&[
            (b":scheme", b"http"),
            (b":path", b"/abc"),
            (b"x-id", b"7"),
        ]);
        assert_eq!(
            block,
            [
                0x86, // indexed :scheme http
                0x04, 0x04, b'/', b'a', b'b', b'c', // :path by name index 4
                0x00, 0x04, b'x', b'-', b'i', b'd', 0x01, b'7', // literal name
            ]
        );
    }

    #[test]
    fn long_values_use_multi_byte_lengths() {
        let path = vec![b'p'; 300];
        let block = encode_header_block(&[(b":path", &path)]);
        // 300 = 127 + 173 -> 0x7f, 0xad, 0x01.
        assert_eq!(&block[..4], [0x04, 0x7f, 0xad, 0x01]);
        assert_eq!(block.len(), 4 + 300);
    }

    #[test]
    fn request_block_decodes_to_request_fields() {
        let fields = request_fields(b"/index?q=1", b"[::1]:8080", b"h2p-client/test");
        let buf = encode_headers(1, &fields);
        let decoded = Decoder::new(4096)
            .decode(&buf[frame::FRAME_HEADER_LEN..])
            .unwrap();
        let expected: Vec<HeaderField> = fields
            .iter()
            .map(|(n, v)| HeaderField::new(*n, *v))
            .collect();
        assert_eq!(decoded, expected);
    }
}
