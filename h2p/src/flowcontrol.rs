//! Receive-side flow control accounting (RFC 7540 Section 6.9).

use crate::error::H2Error;
use crate::settings::MAX_WINDOW_SIZE;

/// Initial window of every connection and, unless SETTINGS say otherwise,
/// every stream.
pub const DEFAULT_WINDOW_SIZE: u32 = 65535;

/// A receive window: shrinks as the peer sends DATA, grows when we send
/// WINDOW_UPDATE.
#[derive(Debug, Clone)]
pub struct RecvWindow {
    initial: u32,
    available: i64,
}

impl RecvWindow {
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            available: i64::from(initial),
        }
    }

    pub fn available(&self) -> i64 {
        self.available
    }

    /// Account for `len` received bytes. Fails if the peer overran the window.
    pub fn consume(&mut self, len: u32) -> Result<(), H2Error> {
        let left = self.available - i64::from(len);
        if left < 0 {
            return Err(H2Error::FlowControlError);
        }
        self.available = left;
        Ok(())
    }

    /// Once less than half the initial window is left, restore it and return
    /// the WINDOW_UPDATE increment to send.
    pub fn replenish(&mut self) -> Option<u32> {
        let initial = i64::from(self.initial);
        if self.available >= initial / 2 {
            return None;
        }
        let increment = initial - self.available;
        if increment <= 0 || increment > i64::from(MAX_WINDOW_SIZE) {
            return None;
        }
        self.available = initial;
        Some(increment as u32)
    }
}

impl Default for RecvWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_reduces_window() {
        let mut window = RecvWindow::default();
        window.consume(1000).unwrap();
        assert_eq!(window.available(), 64535);
    }

    #[test]
    fn overrun_rejected_and_window_unchanged() {
        let mut window = RecvWindow::new(100);
        assert_eq!(window.consume(101), Err(H2Error::FlowControlError));
        assert_eq!(window.available(), 100);
    }

    #[test]
    fn no_update_above_half() {
        let mut window = RecvWindow::default();
        window.consume(30_000).unwrap();
        assert_eq!(window.replenish(), None);
    }

    #[test]
    fn update_restores_initial_window() {
        let mut window = RecvWindow::default();
        window.consume(40_000).unwrap();
        assert_eq!(window.replenish(), Some(40_000));
        assert_eq!(window.available(), 65535);
        assert_eq!(window.replenish(), None);
    }

    #[test]
    fn zero_window_never_updates() {
        let mut window = RecvWindow::new(0);
        assert_eq!(window.replenish(), None);
    }
}
