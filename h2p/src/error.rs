/// HTTP/2 error codes (RFC 7540 Section 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl ErrorCode {
    /// Map a wire value to a code. Unknown codes are treated as
    /// `InternalError` (RFC 7540 Section 7).
    pub fn from_u32(v: u32) -> Self {
        match v {
            0x0 => Self::NoError,
            0x1 => Self::ProtocolError,
            0x3 => Self::FlowControlError,
            0x4 => Self::SettingsTimeout,
            0x5 => Self::StreamClosed,
            0x6 => Self::FrameSizeError,
            0x7 => Self::RefusedStream,
            0x8 => Self::Cancel,
            0x9 => Self::CompressionError,
            0xa => Self::ConnectError,
            0xb => Self::EnhanceYourCalm,
            0xc => Self::InadequateSecurity,
            0xd => Self::Http11Required,
            _ => Self::InternalError,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Errors produced while decoding a peer's byte stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum H2Error {
    /// The peer violated the protocol.
    #[error("protocol error: {0}")]
    ProtocolError(String),
    /// HPACK header block could not be decoded.
    #[error("HPACK decompression error")]
    CompressionError,
    /// The peer overran a receive window.
    #[error("flow control error")]
    FlowControlError,
    /// A frame was larger than allowed or had an impossible length.
    #[error("frame size error")]
    FrameSizeError,
    /// A single stream failed; the connection can continue.
    #[error("stream {0} error: {1:?}")]
    StreamError(u32, ErrorCode),
    /// The session already failed and no longer decodes input.
    #[error("session failed: {0:?}")]
    SessionFailed(ErrorCode),
}

impl H2Error {
    /// Error code to report to the peer for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ProtocolError(_) => ErrorCode::ProtocolError,
            Self::CompressionError => ErrorCode::CompressionError,
            Self::FlowControlError => ErrorCode::FlowControlError,
            Self::FrameSizeError => ErrorCode::FrameSizeError,
            Self::StreamError(_, code) | Self::SessionFailed(code) => *code,
        }
    }

    /// Whether the error only affects a single stream.
    pub fn is_stream_error(&self) -> bool {
        matches!(self, Self::StreamError(..))
    }
}
