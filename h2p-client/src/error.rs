use std::io;

use h2p::H2Error;

/// Reasons a locator is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The locator does not start with `http://`.
    #[error("locator must start with http://")]
    NotHttpScheme,

    #[error("locator has an empty host")]
    EmptyHost,

    /// `[` without a closing `]`.
    #[error("unterminated IPv6 literal in host")]
    UnterminatedIpv6,

    /// The host is not valid UTF-8 and cannot be resolved.
    #[error("host is not valid text")]
    InvalidHost,

    /// The port is empty, zero, or contains a non-digit.
    #[error("invalid port")]
    InvalidPort,

    #[error("port out of range")]
    PortOutOfRange,
}

/// Failures establishing the transport connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The resolver failed or returned no addresses.
    #[error("could not resolve host: {0}")]
    ResolutionFailed(String),

    /// Every resolved address refused or failed the connect.
    #[error("could not connect to any of {attempts} address(es): {last_error}")]
    AllCandidatesFailed {
        attempts: usize,
        #[source]
        last_error: io::Error,
    },
}

/// Errors that abort a client run.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid locator: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The socket accepted fewer bytes than one write handed it.
    #[error("short write sending {what}: {written} of {expected} bytes")]
    ShortWrite {
        what: &'static str,
        written: usize,
        expected: usize,
    },

    #[error("failed to send {what}: {source}")]
    Write {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// The configured SETTINGS entries are not valid HTTP/2 values.
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] H2Error),
}
