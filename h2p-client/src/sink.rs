//! Decoder event sink that reports every event as a log line.

use h2p::{Callbacks, ErrorCode, Frame, H2Error, HeaderField};
use tracing::{debug, info, warn};

/// Logs decoder events and keeps a small summary of the response.
#[derive(Debug, Default)]
pub struct LogSink {
    frames: usize,
    body_len: usize,
    status: Option<String>,
    errors: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames decoded so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Response body bytes received across all streams.
    pub fn body_len(&self) -> usize {
        self.body_len
    }

    /// `:status` of the first response seen.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn errors(&self) -> usize {
        self.errors
    }
}

impl Callbacks for LogSink {
    fn on_frame(&mut self, frame: &Frame) {
        self.frames += 1;
        info!(
            stream_id = frame.stream_id(),
            "frame {} ({:#x})",
            frame.name(),
            frame.frame_type()
        );
    }

    fn on_headers(&mut self, stream_id: u32, headers: &[HeaderField], end_stream: bool) {
        info!(stream_id, count = headers.len(), end_stream, "headers");
        for field in headers {
            if self.status.is_none() && field.name == b":status" {
                self.status = Some(String::from_utf8_lossy(&field.value).into_owned());
            }
            debug!(
                stream_id,
                "  {}: {}",
                String::from_utf8_lossy(&field.name),
                String::from_utf8_lossy(&field.value)
            );
        }
    }

    fn on_data_start(&mut self, stream_id: u32) {
        info!(stream_id, "data start");
    }

    fn on_data(&mut self, stream_id: u32, data: &[u8]) {
        self.body_len += data.len();
        info!(stream_id, len = data.len(), "data");
    }

    fn on_data_end(&mut self, stream_id: u32, code: ErrorCode) {
        info!(stream_id, ?code, "data end");
    }

    fn on_error(&mut self, error: &H2Error) {
        self.errors += 1;
        warn!(%error, "decoder error");
    }
}
