//! Frame codec (RFC 7540 Sections 4 and 6).
//!
//! A frame is a 9-byte header (24-bit length, type, flags, 31-bit stream id)
//! followed by the payload. Decoding validates lengths and stream ids per
//! frame type and removes padding; header blocks stay HPACK-encoded.

use crate::error::{ErrorCode, H2Error};
use crate::settings::Settings;

/// Frame header size in bytes.
pub const FRAME_HEADER_LEN: usize = 9;

pub const FRAME_DATA: u8 = 0x0;
pub const FRAME_HEADERS: u8 = 0x1;
pub const FRAME_PRIORITY: u8 = 0x2;
pub const FRAME_RST_STREAM: u8 = 0x3;
pub const FRAME_SETTINGS: u8 = 0x4;
pub const FRAME_PUSH_PROMISE: u8 = 0x5;
pub const FRAME_PING: u8 = 0x6;
pub const FRAME_GOAWAY: u8 = 0x7;
pub const FRAME_WINDOW_UPDATE: u8 = 0x8;
pub const FRAME_CONTINUATION: u8 = 0x9;

pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_ACK: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;
pub const FLAG_PRIORITY: u8 = 0x20;

const STREAM_ID_MASK: u32 = 0x7fff_ffff;

/// A decoded HTTP/2 frame. Header blocks are kept HPACK-encoded; the session
/// decodes them once a block is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data {
        stream_id: u32,
        payload: Vec<u8>,
        end_stream: bool,
    },
    Headers {
        stream_id: u32,
        block: Vec<u8>,
        end_stream: bool,
        end_headers: bool,
        priority: Option<Priority>,
    },
    Priority {
        stream_id: u32,
        priority: Priority,
    },
    RstStream {
        stream_id: u32,
        error_code: ErrorCode,
    },
    Settings {
        ack: bool,
        settings: Settings,
    },
    PushPromise {
        stream_id: u32,
        promised_stream_id: u32,
        block: Vec<u8>,
        end_headers: bool,
    },
    Ping {
        ack: bool,
        opaque_data: [u8; 8],
    },
    GoAway {
        last_stream_id: u32,
        error_code: ErrorCode,
        debug_data: Vec<u8>,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
    Continuation {
        stream_id: u32,
        block: Vec<u8>,
        end_headers: bool,
    },
    /// Extension frame types are passed through and otherwise ignored.
    Unknown {
        frame_type: u8,
        flags: u8,
        stream_id: u32,
        payload: Vec<u8>,
    },
}

/// Stream dependency carried by HEADERS and PRIORITY frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub exclusive: bool,
    pub dependency: u32,
    pub weight: u8,
}

impl Priority {
    fn encode(&self, buf: &mut Vec<u8>) {
        let dep = if self.exclusive {
            self.dependency | 0x8000_0000
        } else {
            self.dependency & STREAM_ID_MASK
        };
        put_u32(buf, dep);
        buf.push(self.weight);
    }

    fn decode(raw: &[u8]) -> Self {
        let dep = read_u32(raw);
        Self {
            exclusive: dep & 0x8000_0000 != 0,
            dependency: dep & STREAM_ID_MASK,
            weight: raw[4],
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Big-endian u32 from the first four bytes of `raw`.
fn read_u32(raw: &[u8]) -> u32 {
    u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])
}

/// Append a 9-byte frame header. The reserved stream-id bit is always cleared.
pub fn encode_frame_header(
    buf: &mut Vec<u8>,
    payload_len: u32,
    frame_type: u8,
    flags: u8,
    stream_id: u32,
) {
    buf.extend_from_slice(&payload_len.to_be_bytes()[1..]);
    buf.push(frame_type);
    buf.push(flags);
    put_u32(buf, stream_id & STREAM_ID_MASK);
}

/// Read a frame header from the start of `buf`, or `None` if fewer than
/// nine bytes are available.
pub fn decode_frame_header(buf: &[u8]) -> Option<FrameHeader> {
    let raw = buf.get(..FRAME_HEADER_LEN)?;
    Some(FrameHeader {
        length: u32::from_be_bytes([0, raw[0], raw[1], raw[2]]),
        frame_type: raw[3],
        flags: raw[4],
        stream_id: read_u32(&raw[5..]) & STREAM_ID_MASK,
    })
}

impl Frame {
    /// Wire type of this frame.
    pub fn frame_type(&self) -> u8 {
        match self {
            Frame::Data { .. } => FRAME_DATA,
            Frame::Headers { .. } => FRAME_HEADERS,
            Frame::Priority { .. } => FRAME_PRIORITY,
            Frame::RstStream { .. } => FRAME_RST_STREAM,
            Frame::Settings { .. } => FRAME_SETTINGS,
            Frame::PushPromise { .. } => FRAME_PUSH_PROMISE,
            Frame::Ping { .. } => FRAME_PING,
            Frame::GoAway { .. } => FRAME_GOAWAY,
            Frame::WindowUpdate { .. } => FRAME_WINDOW_UPDATE,
            Frame::Continuation { .. } => FRAME_CONTINUATION,
            Frame::Unknown { frame_type, .. } => *frame_type,
        }
    }

    /// Stream the frame belongs to; 0 for connection-level frames.
    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Data { stream_id, .. }
            | Frame::Headers { stream_id, .. }
            | Frame::Priority { stream_id, .. }
            | Frame::RstStream { stream_id, .. }
            | Frame::PushPromise { stream_id, .. }
            | Frame::WindowUpdate { stream_id, .. }
            | Frame::Continuation { stream_id, .. }
            | Frame::Unknown { stream_id, .. } => *stream_id,
            Frame::Settings { .. } | Frame::Ping { .. } | Frame::GoAway { .. } => 0,
        }
    }

    /// Registered name of the frame type, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Data { .. } => "DATA",
            Frame::Headers { .. } => "HEADERS",
            Frame::Priority { .. } => "PRIORITY",
            Frame::RstStream { .. } => "RST_STREAM",
            Frame::Settings { .. } => "SETTINGS",
            Frame::PushPromise { .. } => "PUSH_PROMISE",
            Frame::Ping { .. } => "PING",
            Frame::GoAway { .. } => "GOAWAY",
            Frame::WindowUpdate { .. } => "WINDOW_UPDATE",
            Frame::Continuation { .. } => "CONTINUATION",
            Frame::Unknown { .. } => "UNKNOWN",
        }
    }

    /// Append the encoded frame (header and payload) to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let stream_id = self.stream_id();
        match self {
            Frame::Data {
                payload,
                end_stream,
                ..
            } => {
                let flags = if *end_stream { FLAG_END_STREAM } else { 0 };
                encode_frame_header(buf, payload.len() as u32, FRAME_DATA, flags, stream_id);
                buf.extend_from_slice(payload);
            }
            Frame::Headers {
                block,
                end_stream,
                end_headers,
                priority,
                ..
            } => {
                let mut flags = 0;
                if *end_stream {
                    flags |= FLAG_END_STREAM;
                }
                if *end_headers {
                    flags |= FLAG_END_HEADERS;
                }
                let mut len = block.len() as u32;
                if priority.is_some() {
                    flags |= FLAG_PRIORITY;
                    len += 5;
                }
                encode_frame_header(buf, len, FRAME_HEADERS, flags, stream_id);
                if let Some(priority) = priority {
                    priority.encode(buf);
                }
                buf.extend_from_slice(block);
            }
            Frame::Priority { priority, .. } => {
                encode_frame_header(buf, 5, FRAME_PRIORITY, 0, stream_id);
                priority.encode(buf);
            }
            Frame::RstStream { error_code, .. } => {
                encode_frame_header(buf, 4, FRAME_RST_STREAM, 0, stream_id);
                put_u32(buf, error_code.as_u32());
            }
            Frame::Settings { ack: true, .. } => {
                encode_frame_header(buf, 0, FRAME_SETTINGS, FLAG_ACK, 0);
            }
            Frame::Settings {
                ack: false,
                settings,
            } => {
                let mut payload = Vec::new();
                settings.encode(&mut payload);
                encode_frame_header(buf, payload.len() as u32, FRAME_SETTINGS, 0, 0);
                buf.extend_from_slice(&payload);
            }
            Frame::PushPromise {
                promised_stream_id,
                block,
                end_headers,
                ..
            } => {
                let flags = if *end_headers { FLAG_END_HEADERS } else { 0 };
                let len = 4 + block.len() as u32;
                encode_frame_header(buf, len, FRAME_PUSH_PROMISE, flags, stream_id);
                put_u32(buf, promised_stream_id & STREAM_ID_MASK);
                buf.extend_from_slice(block);
            }
            Frame::Ping { ack, opaque_data } => {
                let flags = if *ack { FLAG_ACK } else { 0 };
                encode_frame_header(buf, 8, FRAME_PING, flags, 0);
                buf.extend_from_slice(opaque_data);
            }
            Frame::GoAway {
                last_stream_id,
                error_code,
                debug_data,
            } => {
                let len = 8 + debug_data.len() as u32;
                encode_frame_header(buf, len, FRAME_GOAWAY, 0, 0);
                put_u32(buf, last_stream_id & STREAM_ID_MASK);
                put_u32(buf, error_code.as_u32());
                buf.extend_from_slice(debug_data);
            }
            Frame::WindowUpdate { increment, .. } => {
                encode_frame_header(buf, 4, FRAME_WINDOW_UPDATE, 0, stream_id);
                put_u32(buf, increment & STREAM_ID_MASK);
            }
            Frame::Continuation {
                block, end_headers, ..
            } => {
                let flags = if *end_headers { FLAG_END_HEADERS } else { 0 };
                encode_frame_header(buf, block.len() as u32, FRAME_CONTINUATION, flags, stream_id);
                buf.extend_from_slice(block);
            }
            Frame::Unknown {
                frame_type,
                flags,
                payload,
                ..
            } => {
                encode_frame_header(buf, payload.len() as u32, *frame_type, *flags, stream_id);
                buf.extend_from_slice(payload);
            }
        }
    }
}

fn require_stream(stream_id: u32, kind: &str) -> Result<(), H2Error> {
    if stream_id == 0 {
        return Err(H2Error::ProtocolError(format!("{kind} on stream 0")));
    }
    Ok(())
}

fn require_connection(stream_id: u32, kind: &str) -> Result<(), H2Error> {
    if stream_id != 0 {
        return Err(H2Error::ProtocolError(format!("{kind} on stream {stream_id}")));
    }
    Ok(())
}

fn require_len(payload: &[u8], len: usize) -> Result<(), H2Error> {
    if payload.len() != len {
        return Err(H2Error::FrameSizeError);
    }
    Ok(())
}

/// Strip padding when FLAG_PADDED is set (RFC 7540 Section 6.1).
fn strip_padding(payload: &[u8], flags: u8) -> Result<&[u8], H2Error> {
    if flags & FLAG_PADDED == 0 {
        return Ok(payload);
    }
    let (&pad_len, rest) = payload.split_first().ok_or(H2Error::FrameSizeError)?;
    let pad_len = usize::from(pad_len);
    if pad_len > rest.len() {
        return Err(H2Error::ProtocolError("padding exceeds payload".into()));
    }
    Ok(&rest[..rest.len() - pad_len])
}

/// Decode one frame from the start of `buf`.
///
/// Returns `Ok(None)` until a whole frame is buffered, otherwise the frame
/// and the number of bytes it occupied.
pub fn decode_frame(buf: &[u8], max_frame_size: u32) -> Result<Option<(Frame, usize)>, H2Error> {
    let Some(header) = decode_frame_header(buf) else {
        return Ok(None);
    };
    if header.length > max_frame_size {
        return Err(H2Error::FrameSizeError);
    }
    let total = FRAME_HEADER_LEN + header.length as usize;
    let Some(payload) = buf.get(FRAME_HEADER_LEN..total) else {
        return Ok(None);
    };

    let FrameHeader {
        frame_type,
        flags,
        stream_id,
        ..
    } = header;

    let frame = match frame_type {
        FRAME_DATA => {
            require_stream(stream_id, "DATA")?;
            Frame::Data {
                stream_id,
                payload: strip_padding(payload, flags)?.to_vec(),
                end_stream: flags & FLAG_END_STREAM != 0,
            }
        }
        FRAME_HEADERS => {
            require_stream(stream_id, "HEADERS")?;
            let mut data = strip_padding(payload, flags)?;
            let priority = if flags & FLAG_PRIORITY != 0 {
                if data.len() < 5 {
                    return Err(H2Error::FrameSizeError);
                }
                let priority = Priority::decode(data);
                data = &data[5..];
                Some(priority)
            } else {
                None
            };
            Frame::Headers {
                stream_id,
                block: data.to_vec(),
                end_stream: flags & FLAG_END_STREAM != 0,
                end_headers: flags & FLAG_END_HEADERS != 0,
                priority,
            }
        }
        FRAME_PRIORITY => {
            require_stream(stream_id, "PRIORITY")?;
            require_len(payload, 5)?;
            Frame::Priority {
                stream_id,
                priority: Priority::decode(payload),
            }
        }
        FRAME_RST_STREAM => {
            require_stream(stream_id, "RST_STREAM")?;
            require_len(payload, 4)?;
            Frame::RstStream {
                stream_id,
                error_code: ErrorCode::from_u32(read_u32(payload)),
            }
        }
        FRAME_SETTINGS => {
            require_connection(stream_id, "SETTINGS")?;
            if flags & FLAG_ACK != 0 {
                require_len(payload, 0)?;
                Frame::Settings {
                    ack: true,
                    settings: Settings::default(),
                }
            } else {
                Frame::Settings {
                    ack: false,
                    settings: Settings::decode(payload)?,
                }
            }
        }
        FRAME_PUSH_PROMISE => {
            require_stream(stream_id, "PUSH_PROMISE")?;
            let data = strip_padding(payload, flags)?;
            if data.len() < 4 {
                return Err(H2Error::FrameSizeError);
            }
            Frame::PushPromise {
                stream_id,
                promised_stream_id: read_u32(data) & STREAM_ID_MASK,
                block: data[4..].to_vec(),
                end_headers: flags & FLAG_END_HEADERS != 0,
            }
        }
        FRAME_PING => {
            require_connection(stream_id, "PING")?;
            require_len(payload, 8)?;
            let mut opaque_data = [0u8; 8];
            opaque_data.copy_from_slice(payload);
            Frame::Ping {
                ack: flags & FLAG_ACK != 0,
                opaque_data,
            }
        }
        FRAME_GOAWAY => {
            require_connection(stream_id, "GOAWAY")?;
            if payload.len() < 8 {
                return Err(H2Error::FrameSizeError);
            }
            Frame::GoAway {
                last_stream_id: read_u32(payload) & STREAM_ID_MASK,
                error_code: ErrorCode::from_u32(read_u32(&payload[4..])),
                debug_data: payload[8..].to_vec(),
            }
        }
        FRAME_WINDOW_UPDATE => {
            require_len(payload, 4)?;
            let increment = read_u32(payload) & STREAM_ID_MASK;
            if increment == 0 {
                return Err(H2Error::ProtocolError("WINDOW_UPDATE with 0 increment".into()));
            }
            Frame::WindowUpdate {
                stream_id,
                increment,
            }
        }
        FRAME_CONTINUATION => {
            require_stream(stream_id, "CONTINUATION")?;
            Frame::Continuation {
                stream_id,
                block: payload.to_vec(),
                end_headers: flags & FLAG_END_HEADERS != 0,
            }
        }
        _ => Frame::Unknown {
            frame_type,
            flags,
            stream_id,
            payload: payload.to_vec(),
        },
    };

    Ok(Some((frame, total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(buf: &[u8]) -> Frame {
        let (frame, consumed) = decode_frame(buf, 16_384).unwrap().unwrap();
        assert_eq!(consumed, buf.len());
        frame
    }

    #[test]
    fn header_layout() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 0x01_0203, FRAME_HEADERS, 0x05, 0x8000_0007);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x01, 0x05, 0x00, 0x00, 0x00, 0x07]);
        let header = decode_frame_header(&buf).unwrap();
        assert_eq!(header.length, 0x01_0203);
        assert_eq!(header.stream_id, 7);
    }

    #[test]
    fn short_header_is_incomplete() {
        assert!(decode_frame_header(&[0; 8]).is_none());
        assert!(decode_frame(&[0; 8], 16_384).unwrap().is_none());
    }

    #[test]
    fn partial_payload_is_incomplete() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 5, FRAME_DATA, 0, 1);
        buf.extend_from_slice(b"he");
        assert!(decode_frame(&buf, 16_384).unwrap().is_none());
    }

    #[test]
    fn decodes_only_the_first_frame() {
        let mut buf = Vec::new();
        Frame::Ping {
            ack: false,
            opaque_data: [7; 8],
        }
        .encode(&mut buf);
        let first = buf.len();
        Frame::Settings {
            ack: true,
            settings: Settings::default(),
        }
        .encode(&mut buf);
        let (_, consumed) = decode_frame(&buf, 16_384).unwrap().unwrap();
        assert_eq!(consumed, first);
    }

    #[test]
    fn headers_with_priority() {
        let frame = Frame::Headers {
            stream_id: 1,
            block: vec![0x88],
            end_stream: true,
            end_headers: true,
            priority: Some(Priority {
                exclusive: true,
                dependency: 3,
                weight: 255,
            }),
        };
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        assert_eq!(buf[4], FLAG_END_STREAM | FLAG_END_HEADERS | FLAG_PRIORITY);
        assert_eq!(decode_one(&buf), frame);
    }

    #[test]
    fn padded_data_is_stripped() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 8, FRAME_DATA, FLAG_PADDED | FLAG_END_STREAM, 3);
        buf.push(2);
        buf.extend_from_slice(b"hello");
        buf.extend_from_slice(&[0, 0]);
        assert_eq!(
            decode_one(&buf),
            Frame::Data {
                stream_id: 3,
                payload: b"hello".to_vec(),
                end_stream: true,
            }
        );
    }

    #[test]
    fn oversized_padding_rejected() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 2, FRAME_DATA, FLAG_PADDED, 1);
        buf.extend_from_slice(&[5, b'x']);
        assert!(matches!(
            decode_frame(&buf, 16_384),
            Err(H2Error::ProtocolError(_))
        ));
    }

    #[test]
    fn goaway_carries_debug_data() {
        let frame = Frame::GoAway {
            last_stream_id: 5,
            error_code: ErrorCode::EnhanceYourCalm,
            debug_data: b"slow down".to_vec(),
        };
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        assert_eq!(decode_one(&buf), frame);
    }

    #[test]
    fn settings_ack_with_payload_rejected() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 6, FRAME_SETTINGS, FLAG_ACK, 0);
        buf.extend_from_slice(&[0, 3, 0, 0, 0, 1]);
        assert_eq!(decode_frame(&buf, 16_384), Err(H2Error::FrameSizeError));
    }

    #[test]
    fn connection_frames_on_stream_rejected() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 8, FRAME_PING, 0, 1);
        buf.extend_from_slice(&[0; 8]);
        assert!(matches!(
            decode_frame(&buf, 16_384),
            Err(H2Error::ProtocolError(_))
        ));
    }

    #[test]
    fn data_on_stream_zero_rejected() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 0, FRAME_DATA, 0, 0);
        assert!(matches!(
            decode_frame(&buf, 16_384),
            Err(H2Error::ProtocolError(_))
        ));
    }

    #[test]
    fn frame_larger_than_limit_rejected() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 16_385, FRAME_DATA, 0, 1);
        assert_eq!(decode_frame(&buf, 16_384), Err(H2Error::FrameSizeError));
    }

    #[test]
    fn zero_window_increment_rejected() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 4, FRAME_WINDOW_UPDATE, 0, 1);
        buf.extend_from_slice(&[0; 4]);
        assert!(matches!(
            decode_frame(&buf, 16_384),
            Err(H2Error::ProtocolError(_))
        ));
    }

    #[test]
    fn unknown_type_passes_through() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 3, 0xfe, 0x42, 7);
        buf.extend_from_slice(b"abc");
        let frame = decode_one(&buf);
        assert_eq!(frame.frame_type(), 0xfe);
        assert_eq!(frame.stream_id(), 7);
        assert_eq!(frame.name(), "UNKNOWN");
    }
}
