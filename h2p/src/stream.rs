//! Per-stream receive state (RFC 7540 Section 5.1).

use crate::flowcontrol::RecvWindow;

/// Receive-side state of a stream. Only the peer's half matters to a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The peer may still send HEADERS or DATA.
    Open,
    /// END_STREAM or RST_STREAM seen; further frames are errors.
    Closed,
}

#[derive(Debug)]
pub(crate) struct Stream {
    pub state: StreamState,
    pub recv_window: RecvWindow,
    /// Set once the first DATA frame has been reported.
    pub data_started: bool,
}

impl Stream {
    pub fn new(initial_window: u32) -> Self {
        Self {
            state: StreamState::Open,
            recv_window: RecvWindow::new(initial_window),
            data_started: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }
}
