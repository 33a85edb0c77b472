//! Connection bootstrap and receive loop.
//!
//! A run moves strictly forward through [`State`]: parse the locator,
//! connect, send the preface, SETTINGS and the request HEADERS, then read
//! until the peer closes the connection. Everything up to `HeadersSent` is
//! all-or-nothing; once receiving, decoder errors are reported and reading
//! continues.

use std::io::{self, Read, Write};

use h2p::{CLIENT_PREFACE, Callbacks, Role, Session, Settings};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connector::{self, Connection};
use crate::encoder;
use crate::error::ClientError;
use crate::locator;
use crate::sink::LogSink;

/// Steps of a client run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Start,
    Parsed,
    Connected,
    PrefaceSent,
    SettingsSent,
    HeadersSent,
    Receiving,
    Closed,
}

/// Why the receive loop stopped.
#[derive(Debug)]
pub enum CloseReason {
    /// A read returned zero bytes.
    PeerClosed,
    /// The request stream ended and `stop_on_stream_end` was set.
    StreamEnded,
    /// A read failed with something other than an interruption.
    ReadFailed(io::Error),
}

/// Result of a run that reached the receive loop.
#[derive(Debug)]
pub struct Outcome {
    pub close_reason: CloseReason,
    /// Bytes read from the peer and handed to the decoder.
    pub bytes_received: u64,
}

impl Outcome {
    /// Whether the run ended the way a successful run does.
    pub fn is_clean(&self) -> bool {
        !matches!(self.close_reason, CloseReason::ReadFailed(_))
    }
}

/// Run the client against `locator`, logging decoder events.
pub fn run(locator: &str, config: &ClientConfig) -> Result<Outcome, ClientError> {
    run_with(locator.as_bytes(), config, LogSink::new())
}

/// Run the client, delivering decoder events to `callbacks`. Pass `&mut sink`
/// to inspect the sink afterwards.
pub fn run_with<C: Callbacks>(
    locator: &[u8],
    config: &ClientConfig,
    callbacks: C,
) -> Result<Outcome, ClientError> {
    let mut state = State::Start;

    let target = locator::parse(locator)?;
    let host = target.host_str()?;
    advance(&mut state, State::Parsed);
    info!(%target, host, port = target.port(), "parsed locator");

    let settings = Settings::from_entries(&config.settings)?;
    let mut session = Session::with_settings(Role::Client, settings, callbacks);

    let mut conn = connector::connect(host, target.port())?;
    advance(&mut state, State::Connected);

    send_all(&mut conn, CLIENT_PREFACE, "preface")?;
    advance(&mut state, State::PrefaceSent);

    send_all(&mut conn, &encoder::encode_settings(&config.settings), "settings")?;
    advance(&mut state, State::SettingsSent);

    let fields = encoder::request_fields(
        target.path(),
        target.host_port(),
        config.user_agent.as_bytes(),
    );
    send_all(
        &mut conn,
        &encoder::encode_headers(config.stream_id, &fields),
        "headers",
    )?;
    advance(&mut state, State::HeadersSent);

    advance(&mut state, State::Receiving);
    let outcome = receive(&mut conn, &mut session, config);
    info!(
        reason = ?outcome.close_reason,
        bytes = outcome.bytes_received,
        "receive loop ended"
    );

    if let Err(e) = conn.shutdown_write() {
        debug!(error = %e, "shutdown failed");
    }
    drop(conn);
    advance(&mut state, State::Closed);

    Ok(outcome)
}

fn advance(state: &mut State, next: State) {
    debug_assert!(next > *state);
    info!(from = ?*state, to = ?next, "state");
    *state = next;
}

/// Write `bytes` with one write call. Anything less than the full buffer is
/// a failure.
fn send_all<W: Write>(conn: &mut W, bytes: &[u8], what: &'static str) -> Result<(), ClientError> {
    let written = loop {
        match conn.write(bytes) {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(ClientError::Write { what, source }),
        }
    };
    if written != bytes.len() {
        return Err(ClientError::ShortWrite {
            what,
            written,
            expected: bytes.len(),
        });
    }
    debug!(what, len = written, "sent");
    Ok(())
}

fn receive<C: Callbacks>(
    conn: &mut Connection,
    session: &mut Session<C>,
    config: &ClientConfig,
) -> Outcome {
    let mut buf = vec![0u8; config.read_chunk_size.max(1)];
    let mut bytes_received = 0u64;

    let close_reason = loop {
        let n = match conn.read(&mut buf) {
            Ok(0) => break CloseReason::PeerClosed,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break CloseReason::ReadFailed(e),
        };
        bytes_received += n as u64;
        debug!(len = n, "received");

        match session.feed(config.stream_id, &buf[..n]) {
            Ok(consumed) => debug!(consumed, "decoded"),
            Err(e) => debug!(error = %e, "decoder rejected input"),
        }
        flush_control(conn, session);

        if config.stop_on_stream_end && session.is_stream_closed(config.stream_id) {
            break CloseReason::StreamEnded;
        }
    };

    Outcome {
        close_reason,
        bytes_received,
    }
}

/// Send the control frames the decoder queued (SETTINGS ACK, PING ACK,
/// WINDOW_UPDATE, RST_STREAM, GOAWAY).
fn flush_control<C: Callbacks>(conn: &mut Connection, session: &mut Session<C>) {
    let pending = session.take_pending_send();
    if pending.is_empty() {
        return;
    }
    match conn.write_all(&pending) {
        Ok(()) => debug!(len = pending.len(), "sent control frames"),
        Err(e) => warn!(error = %e, "failed to send control frames"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `limit` bytes per write, after `interrupts` EINTRs.
    struct Limited {
        limit: usize,
        interrupts: usize,
        written: Vec<u8>,
    }

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.interrupts > 0 {
                self.interrupts -= 1;
                return Err(io::ErrorKind::Interrupted.into());
            }
            let n = buf.len().min(self.limit);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn send_all_retries_interrupted_writes() {
        let mut w = Limited {
            limit: usize::MAX,
            interrupts: 2,
            written: Vec::new(),
        };
        send_all(&mut w, CLIENT_PREFACE, "preface").unwrap();
        assert_eq!(w.written, CLIENT_PREFACE);
    }

    #[test]
    fn short_write_is_fatal() {
        let mut w = Limited {
            limit: 10,
            interrupts: 0,
            written: Vec::new(),
        };
        let err = send_all(&mut w, CLIENT_PREFACE, "preface").unwrap_err();
        assert!(matches!(
            err,
            ClientError::ShortWrite {
                what: "preface",
                written: 10,
                expected: 24
            }
        ));
    }

    #[test]
    fn write_error_carries_source() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let err = send_all(&mut Broken, b"x", "headers").unwrap_err();
        match err {
            ClientError::Write { what, source } => {
                assert_eq!(what, "headers");
                assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
            }
            other => panic!("expected Write, got {other:?}"),
        }
    }

    #[test]
    fn states_are_ordered() {
        assert!(State::Start < State::Parsed);
        assert!(State::HeadersSent < State::Receiving);
        assert!(State::Receiving < State::Closed);
    }

    #[test]
    fn parse_failure_happens_before_network() {
        let err = run("https://127.0.0.1/", &ClientConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Parse(crate::error::ParseError::NotHttpScheme)
        ));
    }

    #[test]
    fn invalid_settings_rejected_before_connect() {
        let config = ClientConfig {
            settings: vec![(h2p::SettingId::EnablePush, 2)],
            ..ClientConfig::default()
        };
        let err = run("http://127.0.0.1:1/", &config).unwrap_err();
        assert!(matches!(err, ClientError::InvalidSettings(_)));
    }
}
