//! HTTP/2 decoding session.
//!
//! `Session` is sans-IO: the caller feeds received bytes in with
//! [`Session::feed`] and flushes the control frames it queues (SETTINGS ACK,
//! PING ACK, WINDOW_UPDATE, RST_STREAM, GOAWAY) with
//! [`Session::take_pending_send`]. Decoded events are delivered synchronously,
//! from inside `feed`, to the [`Callbacks`] value the session was built with.

use std::collections::HashMap;

use crate::error::{ErrorCode, H2Error};
use crate::flowcontrol::RecvWindow;
use crate::frame::{self, Frame};
use crate::hpack::{Decoder, HeaderField};
use crate::settings::Settings;
use crate::stream::{Stream, StreamState};

/// HTTP/2 connection preface sent by clients (RFC 7540 Section 3.5).
pub const CLIENT_PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Largest header block buffered across HEADERS and CONTINUATION frames
/// when no SETTINGS_MAX_HEADER_LIST_SIZE was advertised.
pub const DEFAULT_MAX_HEADER_BLOCK: usize = 64 * 1024;

/// Which end of the connection this session decodes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Decodes what a server sends; streams are opened by the local side.
    Client,
    /// Decodes what a client sends, starting with the connection preface.
    Server,
}

/// Receiver for decoded events. Every method has an empty default so a sink
/// only implements what it cares about.
pub trait Callbacks {
    /// Any complete frame, before the session acts on it.
    fn on_frame(&mut self, _frame: &Frame) {}

    /// A complete, decoded header block.
    fn on_headers(&mut self, _stream_id: u32, _headers: &[HeaderField], _end_stream: bool) {}

    /// First DATA frame on a stream. Fires once per stream.
    fn on_data_start(&mut self, _stream_id: u32) {}

    /// Payload of a DATA frame, padding removed. Not called for empty frames.
    fn on_data(&mut self, _stream_id: u32, _data: &[u8]) {}

    /// The peer finished the stream (`NoError`) or it was reset.
    fn on_data_end(&mut self, _stream_id: u32, _code: ErrorCode) {}

    /// A stream or connection error was detected.
    fn on_error(&mut self, _error: &H2Error) {}
}

impl<C: Callbacks + ?Sized> Callbacks for &mut C {
    fn on_frame(&mut self, frame: &Frame) {
        (**self).on_frame(frame);
    }

    fn on_headers(&mut self, stream_id: u32, headers: &[HeaderField], end_stream: bool) {
        (**self).on_headers(stream_id, headers, end_stream);
    }

    fn on_data_start(&mut self, stream_id: u32) {
        (**self).on_data_start(stream_id);
    }

    fn on_data(&mut self, stream_id: u32, data: &[u8]) {
        (**self).on_data(stream_id, data);
    }

    fn on_data_end(&mut self, stream_id: u32, code: ErrorCode) {
        (**self).on_data_end(stream_id, code);
    }

    fn on_error(&mut self, error: &H2Error) {
        (**self).on_error(error);
    }
}

/// Ignores every event.
impl Callbacks for () {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Server role, client preface not fully received yet.
    AwaitingPreface,
    Open,
    /// Peer sent GOAWAY; frames for surviving streams are still decoded.
    GoingAway,
    /// A connection error was detected; input is no longer decoded.
    Failed(ErrorCode),
}

/// A header block spread over HEADERS/PUSH_PROMISE and CONTINUATION frames.
struct HeaderBlock {
    stream_id: u32,
    buf: Vec<u8>,
    end_stream: bool,
    promised: Option<u32>,
}

pub struct Session<C> {
    role: Role,
    state: State,
    callbacks: C,
    local_settings: Settings,
    remote_settings: Settings,
    streams: HashMap<u32, Stream>,
    conn_window: RecvWindow,
    decoder: Decoder,
    /// Set between a HEADERS without END_HEADERS and its last CONTINUATION.
    pending_block: Option<HeaderBlock>,
    recv_buf: Vec<u8>,
    send_buf: Vec<u8>,
    /// Highest stream id the peer opened; reported in our GOAWAY.
    last_peer_stream: u32,
}

impl<C: Callbacks> Session<C> {
    /// Session using the protocol default settings.
    pub fn new(role: Role, callbacks: C) -> Self {
        Self::with_settings(role, Settings::default(), callbacks)
    }

    /// Session whose limits are the settings this endpoint advertised.
    pub fn with_settings(role: Role, local_settings: Settings, callbacks: C) -> Self {
        let state = match role {
            Role::Client => State::Open,
            Role::Server => State::AwaitingPreface,
        };
        Self {
            role,
            state,
            callbacks,
            decoder: Decoder::new(local_settings.header_table_size as usize),
            local_settings,
            remote_settings: Settings::default(),
            streams: HashMap::new(),
            conn_window: RecvWindow::default(),
            pending_block: None,
            recv_buf: Vec::new(),
            send_buf: Vec::new(),
            last_peer_stream: 0,
        }
    }

    /// Decode `data`, firing callbacks for every complete frame.
    ///
    /// A non-zero `stream_id` names a locally opened stream the caller expects
    /// frames on; it is registered the first time it is seen. Incomplete frames
    /// are buffered until the next call. Returns the number of bytes accepted.
    ///
    /// Stream errors reset the affected stream and decoding continues. A
    /// connection error fails the session: the error is returned, a GOAWAY is
    /// queued, and every later call returns [`H2Error::SessionFailed`].
    pub fn feed(&mut self, stream_id: u32, data: &[u8]) -> Result<usize, H2Error> {
        if let State::Failed(code) = self.state {
            return Err(H2Error::SessionFailed(code));
        }
        if stream_id != 0 {
            let initial = self.local_settings.initial_window_size;
            self.streams
                .entry(stream_id)
                .or_insert_with(|| Stream::new(initial));
        }

        self.recv_buf.extend_from_slice(data);
        match self.process() {
            Ok(()) => Ok(data.len()),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Take all bytes queued for the peer.
    pub fn take_pending_send(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.send_buf)
    }

    pub fn has_pending_send(&self) -> bool {
        !self.send_buf.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, State::Failed(_))
    }

    /// Whether the peer sent GOAWAY.
    pub fn is_going_away(&self) -> bool {
        self.state == State::GoingAway
    }

    /// Whether `stream_id` is known and has ended. Unknown streams are not
    /// closed.
    pub fn is_stream_closed(&self, stream_id: u32) -> bool {
        self.streams.get(&stream_id).is_some_and(Stream::is_closed)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Values from the peer's most recent SETTINGS frame, over protocol
    /// defaults.
    pub fn remote_settings(&self) -> &Settings {
        &self.remote_settings
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn into_callbacks(self) -> C {
        self.callbacks
    }

    // -- Internal processing --

    fn process(&mut self) -> Result<(), H2Error> {
        if self.state == State::AwaitingPreface {
            let n = self.recv_buf.len().min(CLIENT_PREFACE.len());
            if self.recv_buf[..n] != CLIENT_PREFACE[..n] {
                return Err(H2Error::ProtocolError("invalid connection preface".into()));
            }
            if n < CLIENT_PREFACE.len() {
                return Ok(());
            }
            self.recv_buf.drain(..n);
            self.state = State::Open;
        }

        loop {
            let max_frame = self.local_settings.max_frame_size;
            let Some((frame, consumed)) = frame::decode_frame(&self.recv_buf, max_frame)? else {
                return Ok(());
            };
            self.recv_buf.drain(..consumed);
            self.callbacks.on_frame(&frame);

            let payload_len = (consumed - frame::FRAME_HEADER_LEN) as u32;
            match self.handle_frame(frame, payload_len) {
                Ok(()) => {}
                Err(err @ H2Error::StreamError(stream_id, code)) => {
                    self.callbacks.on_error(&err);
                    self.reset_stream(stream_id, code);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fail(&mut self, err: &H2Error) {
        let code = err.code();
        self.callbacks.on_error(err);
        Frame::GoAway {
            last_stream_id: self.last_peer_stream,
            error_code: code,
            debug_data: err.to_string().into_bytes(),
        }
        .encode(&mut self.send_buf);
        self.state = State::Failed(code);
        self.recv_buf.clear();
        self.pending_block = None;
    }

    /// `payload_len` is the frame's length on the wire, padding included.
    fn handle_frame(&mut self, frame: Frame, payload_len: u32) -> Result<(), H2Error> {
        // Nothing may interleave with a header block (RFC 7540 Section 6.10).
        if let Some(block) = &self.pending_block {
            let expected = block.stream_id;
            if !matches!(&frame, Frame::Continuation { stream_id, .. } if *stream_id == expected) {
                return Err(H2Error::ProtocolError(format!(
                    "expected CONTINUATION on stream {expected}, got {}",
                    frame.name()
                )));
            }
        }

        match frame {
            Frame::Settings { ack: true, .. } => {}
            Frame::Settings {
                ack: false,
                settings,
            } => {
                self.remote_settings = settings;
                Frame::Settings {
                    ack: true,
                    settings: Settings::default(),
                }
                .encode(&mut self.send_buf);
            }
            Frame::Headers {
                stream_id,
                block,
                end_stream,
                end_headers,
                ..
            } => {
                self.check_header_block(block.len())?;
                self.pending_block = Some(HeaderBlock {
                    stream_id,
                    buf: block,
                    end_stream,
                    promised: None,
                });
                if end_headers {
                    self.finish_header_block()?;
                }
            }
            Frame::PushPromise {
                stream_id,
                promised_stream_id,
                block,
                end_headers,
            } => {
                if self.role == Role::Server || !self.local_settings.enable_push {
                    return Err(H2Error::ProtocolError("PUSH_PROMISE not permitted".into()));
                }
                self.check_header_block(block.len())?;
                self.pending_block = Some(HeaderBlock {
                    stream_id,
                    buf: block,
                    end_stream: false,
                    promised: Some(promised_stream_id),
                });
                if end_headers {
                    self.finish_header_block()?;
                }
            }
            Frame::Continuation {
                block, end_headers, ..
            } => {
                let buffered = match &self.pending_block {
                    Some(pending) => pending.buf.len(),
                    None => {
                        return Err(H2Error::ProtocolError("CONTINUATION without HEADERS".into()));
                    }
                };
                self.check_header_block(buffered + block.len())?;
                if let Some(pending) = self.pending_block.as_mut() {
                    pending.buf.extend_from_slice(&block);
                }
                if end_headers {
                    self.finish_header_block()?;
                }
            }
            Frame::Data {
                stream_id,
                payload,
                end_stream,
            } => self.handle_data(stream_id, &payload, payload_len, end_stream)?,
            Frame::RstStream {
                stream_id,
                error_code,
            } => self.close_stream(stream_id, error_code),
            Frame::Ping {
                ack: false,
                opaque_data,
            } => Frame::Ping {
                ack: true,
                opaque_data,
            }
            .encode(&mut self.send_buf),
            Frame::GoAway { last_stream_id, .. } => self.handle_goaway(last_stream_id),
            // Nothing is sent, so send windows and priorities are irrelevant.
            Frame::Ping { ack: true, .. }
            | Frame::WindowUpdate { .. }
            | Frame::Priority { .. }
            | Frame::Unknown { .. } => {}
        }
        Ok(())
    }

    /// Reject a header block that would grow past the advertised header list
    /// size, or [`DEFAULT_MAX_HEADER_BLOCK`] when none was advertised.
    fn check_header_block(&self, len: usize) -> Result<(), H2Error> {
        let limit = self
            .local_settings
            .max_header_list_size
            .map_or(DEFAULT_MAX_HEADER_BLOCK, |v| v as usize);
        if len > limit {
            return Err(H2Error::ProtocolError(format!(
                "header block of {len} bytes exceeds {limit}"
            )));
        }
        Ok(())
    }

    fn finish_header_block(&mut self) -> Result<(), H2Error> {
        let Some(block) = self.pending_block.take() else {
            return Ok(());
        };
        // Decoded even when the stream is refused; HPACK state is shared.
        let headers = self.decoder.decode(&block.buf)?;

        if let Some(promised) = block.promised {
            Frame::RstStream {
                stream_id: promised,
                error_code: ErrorCode::RefusedStream,
            }
            .encode(&mut self.send_buf);
            return Ok(());
        }

        let stream_id = block.stream_id;
        self.accept_headers(stream_id)?;
        self.callbacks
            .on_headers(stream_id, &headers, block.end_stream);
        if block.end_stream {
            self.close_stream(stream_id, ErrorCode::NoError);
        }
        Ok(())
    }

    /// Check that HEADERS may arrive on `stream_id`, opening peer-initiated
    /// streams in server role.
    fn accept_headers(&mut self, stream_id: u32) -> Result<(), H2Error> {
        if let Some(stream) = self.streams.get(&stream_id) {
            if stream.is_closed() {
                return Err(H2Error::StreamError(stream_id, ErrorCode::StreamClosed));
            }
            return Ok(());
        }
        if self.role == Role::Server
            && !stream_id.is_multiple_of(2)
            && stream_id > self.last_peer_stream
        {
            self.last_peer_stream = stream_id;
            self.streams
                .insert(stream_id, Stream::new(self.local_settings.initial_window_size));
            return Ok(());
        }
        Err(H2Error::ProtocolError(format!(
            "HEADERS on idle stream {stream_id}"
        )))
    }

    /// Both windows are charged `flow_len`, the whole frame payload including
    /// padding (RFC 7540 Section 6.9.1).
    fn handle_data(
        &mut self,
        stream_id: u32,
        payload: &[u8],
        flow_len: u32,
        end_stream: bool,
    ) -> Result<(), H2Error> {
        self.conn_window.consume(flow_len)?;
        if let Some(increment) = self.conn_window.replenish() {
            Frame::WindowUpdate {
                stream_id: 0,
                increment,
            }
            .encode(&mut self.send_buf);
        }

        let stream = match self.streams.get_mut(&stream_id) {
            Some(stream) if stream.is_closed() => {
                return Err(H2Error::StreamError(stream_id, ErrorCode::StreamClosed));
            }
            Some(stream) => stream,
            None => {
                return Err(H2Error::ProtocolError(format!(
                    "DATA on idle stream {stream_id}"
                )));
            }
        };
        stream
            .recv_window
            .consume(flow_len)
            .map_err(|_| H2Error::StreamError(stream_id, ErrorCode::FlowControlError))?;
        let first = !stream.data_started;
        stream.data_started = true;
        let stream_increment = if end_stream {
            None
        } else {
            stream.recv_window.replenish()
        };

        if first {
            self.callbacks.on_data_start(stream_id);
        }
        if !payload.is_empty() {
            self.callbacks.on_data(stream_id, payload);
        }
        if end_stream {
            self.close_stream(stream_id, ErrorCode::NoError);
        }
        if let Some(increment) = stream_increment {
            Frame::WindowUpdate {
                stream_id,
                increment,
            }
            .encode(&mut self.send_buf);
        }
        Ok(())
    }

    fn handle_goaway(&mut self, last_stream_id: u32) {
        self.state = State::GoingAway;
        // Local streams above the peer's last id were never processed.
        let mut refused: Vec<u32> = self
            .streams
            .iter()
            .filter(|(id, stream)| {
                **id > last_stream_id && !stream.is_closed() && self.is_local(**id)
            })
            .map(|(id, _)| *id)
            .collect();
        refused.sort_unstable();
        for stream_id in refused {
            self.close_stream(stream_id, ErrorCode::RefusedStream);
        }
    }

    fn is_local(&self, stream_id: u32) -> bool {
        match self.role {
            Role::Client => !stream_id.is_multiple_of(2),
            Role::Server => stream_id.is_multiple_of(2),
        }
    }

    fn reset_stream(&mut self, stream_id: u32, code: ErrorCode) {
        Frame::RstStream {
            stream_id,
            error_code: code,
        }
        .encode(&mut self.send_buf);
        self.close_stream(stream_id, code);
    }

    /// Mark a stream closed and report data-end, once.
    fn close_stream(&mut self, stream_id: u32, code: ErrorCode) {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return;
        };
        if stream.is_closed() {
            return;
        }
        stream.state = StreamState::Closed;
        self.callbacks.on_data_end(stream_id, code);
    }
}
