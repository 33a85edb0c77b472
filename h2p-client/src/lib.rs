//! Minimal HTTP/2 client using prior knowledge over cleartext TCP.
//!
//! A run parses an `http://host[:port][/path]` locator, connects, sends the
//! connection preface, one SETTINGS frame and one GET request on stream 1,
//! then feeds everything the server sends into an [`h2p::Session`] until the
//! server closes the connection.
//!
//! ```text
//!   locator ──> locator::parse ──> connector::connect ──> preface
//!                                                         SETTINGS   (encoder)
//!                                                         HEADERS    (encoder)
//!                                                            │
//!                       sink::LogSink <── h2p::Session <── read loop
//! ```

pub mod config;
pub mod connector;
pub mod encoder;
pub mod error;
pub mod handshake;
pub mod locator;
pub mod sink;

pub use config::ClientConfig;
pub use connector::Connection;
pub use error::{ClientError, ConnectError, ParseError};
pub use handshake::{CloseReason, Outcome, State, run, run_with};
pub use locator::LocatorDescriptor;
pub use sink::LogSink;
