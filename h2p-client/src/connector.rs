//! Blocking TCP connection setup.
//!
//! Addresses come from the platform resolver in the order it returns them.
//! Each candidate gets a fresh socket; a socket whose connect fails is closed
//! before the next candidate is tried.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, info};

use crate::error::ConnectError;

/// A connected TCP stream and the address it reached.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Half-close: the peer sees end of stream, reads keep working.
    pub fn shutdown_write(&self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Write)
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Resolve `host` to candidate addresses, any address family.
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, ConnectError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| ConnectError::ResolutionFailed(e.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(ConnectError::ResolutionFailed(format!(
            "no addresses for {host}"
        )));
    }
    Ok(addrs)
}

/// Resolve `host` and connect to the first candidate that accepts.
pub fn connect(host: &str, port: u16) -> Result<Connection, ConnectError> {
    let addrs = resolve(host, port)?;
    debug!(host, port, candidates = addrs.len(), "resolved");
    connect_candidates(addrs)
}

/// Try `addrs` in order and return the first successful connection.
pub fn connect_candidates<I>(addrs: I) -> Result<Connection, ConnectError>
where
    I: IntoIterator<Item = SocketAddr>,
{
    let mut attempts = 0;
    let mut last_error = None;

    for addr in addrs {
        attempts += 1;
        match connect_one(addr) {
            Ok(stream) => {
                info!(%addr, "connected");
                return Ok(Connection { stream, peer: addr });
            }
            Err(e) => {
                debug!(%addr, error = %e, "connect failed");
                last_error = Some(e);
            }
        }
    }

    Err(ConnectError::AllCandidatesFailed {
        attempts,
        last_error: last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no candidate addresses")),
    })
}

/// Blocking connect to one address, retried while interrupted by a signal.
/// The socket is dropped, and so closed, on failure.
fn connect_one(addr: SocketAddr) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    let target = SockAddr::from(addr);
    loop {
        match socket.connect(&target) {
            Ok(()) => return Ok(socket.into()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// A loopback address with nothing listening on it.
    fn closed_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn connects_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let conn = connect_candidates([addr]).unwrap();
        assert_eq!(conn.peer_addr(), addr);
    }

    #[test]
    fn falls_through_to_last_candidate() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let good = listener.local_addr().unwrap();
        let conn = connect_candidates([closed_addr(), closed_addr(), good]).unwrap();
        assert_eq!(conn.peer_addr(), good);
    }

    #[test]
    fn all_refused_reports_attempts() {
        let err = connect_candidates([closed_addr(), closed_addr()]).unwrap_err();
        match err {
            ConnectError::AllCandidatesFailed {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_error.kind(), io::ErrorKind::ConnectionRefused);
            }
            other => panic!("expected AllCandidatesFailed, got {other:?}"),
        }
    }

    #[test]
    fn no_candidates_is_an_error() {
        let err = connect_candidates(Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            ConnectError::AllCandidatesFailed { attempts: 0, .. }
        ));
    }

    #[test]
    fn resolves_numeric_hosts() {
        assert_eq!(
            resolve("127.0.0.1", 8080).unwrap(),
            vec!["127.0.0.1:8080".parse::<SocketAddr>().unwrap()]
        );
        assert_eq!(
            resolve("::1", 80).unwrap(),
            vec!["[::1]:80".parse::<SocketAddr>().unwrap()]
        );
    }

    #[test]
    fn unresolvable_host_reports_resolver_text() {
        let err = resolve("name.invalid", 80).unwrap_err();
        match err {
            ConnectError::ResolutionFailed(msg) => assert!(!msg.is_empty()),
            other => panic!("expected ResolutionFailed, got {other:?}"),
        }
    }
}
