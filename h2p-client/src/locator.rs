//! Locator parsing for `http://host[:port][/path][#fragment]`.
//!
//! The parser is a single forward scan over the input. Every span in the
//! resulting [`LocatorDescriptor`] borrows the input, so nothing is allocated.

use std::fmt;

use crate::error::ParseError;

const SCHEME: &[u8] = b"http://";

/// Port used when the locator names none.
pub const DEFAULT_PORT: u16 = 80;

const ROOT_PATH: &[u8] = b"/";

/// Connection parameters extracted from a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorDescriptor<'a> {
    host: &'a [u8],
    host_port: &'a [u8],
    port: u16,
    path: &'a [u8],
}

impl<'a> LocatorDescriptor<'a> {
    /// Host to resolve. Brackets of an IPv6 literal are not included.
    pub fn host(&self) -> &'a [u8] {
        self.host
    }

    /// `host[:port]` as written, brackets included; the `:authority` value.
    pub fn host_port(&self) -> &'a [u8] {
        self.host_port
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Request path with any query; `/` when the locator has none. Never
    /// empty.
    pub fn path(&self) -> &'a [u8] {
        self.path
    }

    /// The host as text, for the resolver.
    pub fn host_str(&self) -> Result<&'a str, ParseError> {
        std::str::from_utf8(self.host).map_err(|_| ParseError::InvalidHost)
    }
}

impl fmt::Display for LocatorDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "http://{}{}",
            String::from_utf8_lossy(self.host_port),
            String::from_utf8_lossy(self.path)
        )
    }
}

/// Parse a locator.
pub fn parse(input: &[u8]) -> Result<LocatorDescriptor<'_>, ParseError> {
    let rest = input
        .strip_prefix(SCHEME)
        .ok_or(ParseError::NotHttpScheme)?;
    let start = SCHEME.len();

    // Host.
    let (host, mut pos) = if rest.first() == Some(&b'[') {
        let close = rest
            .iter()
            .position(|&b| b == b']')
            .ok_or(ParseError::UnterminatedIpv6)?;
        let after = start + close + 1;
        if !matches!(input.get(after), None | Some(b':' | b'/' | b'?' | b'#')) {
            return Err(ParseError::InvalidHost);
        }
        (&rest[1..close], after)
    } else {
        let len = rest
            .iter()
            .position(|&b| matches!(b, b':' | b'/' | b'?' | b'#'))
            .unwrap_or(rest.len());
        (&rest[..len], start + len)
    };
    if host.is_empty() {
        return Err(ParseError::EmptyHost);
    }

    // Port.
    let port = if input.get(pos) == Some(&b':') {
        let digits_len = input[pos + 1..]
            .iter()
            .position(|&b| matches!(b, b'/' | b'?' | b'#'))
            .unwrap_or(input.len() - pos - 1);
        let port = parse_port(&input[pos + 1..pos + 1 + digits_len])?;
        pos += 1 + digits_len;
        port
    } else {
        DEFAULT_PORT
    };
    let host_port = &input[start..pos];

    // Path, up to the fragment.
    let tail = &input[pos..];
    let path_len = tail.iter().position(|&b| b == b'#').unwrap_or(tail.len());
    let path = match &tail[..path_len] {
        [] => ROOT_PATH,
        path => path,
    };

    Ok(LocatorDescriptor {
        host,
        host_port,
        port,
        path,
    })
}

/// Parse a locator given as text.
pub fn parse_str(input: &str) -> Result<LocatorDescriptor<'_>, ParseError> {
    parse(input.as_bytes())
}

/// Decimal port in 1..=65535. Overflow is caught while accumulating.
fn parse_port(digits: &[u8]) -> Result<u16, ParseError> {
    if digits.is_empty() {
        return Err(ParseError::InvalidPort);
    }
    let mut port: u32 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ParseError::InvalidPort);
        }
        port = port * 10 + u32::from(b - b'0');
        if port > u32::from(u16::MAX) {
            return Err(ParseError::PortOutOfRange);
        }
    }
    match port {
        0 => Err(ParseError::InvalidPort),
        p => Ok(p as u16),
    }
}
