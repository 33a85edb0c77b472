//! Sans-IO HTTP/2 decoder.
//!
//! The caller owns the socket. Received bytes go in through
//! [`Session::feed`]; decoded frames, header blocks and body chunks come back
//! synchronously through a [`Callbacks`] implementation, and any control
//! frames the protocol requires in reply are drained with
//! [`Session::take_pending_send`].
//!
//! ```text
//!   TCP bytes
//!       |
//!   +---v-----------+
//!   | h2p::Session  |  frames, HPACK, stream state
//!   +---+-----------+
//!       |  on_frame / on_headers / on_data_start / on_data / on_data_end / on_error
//!   +---v-----------+
//!   |  Callbacks    |
//!   +---------------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use h2p::{Callbacks, HeaderField, Role, Session};
//!
//! struct Print;
//!
//! impl Callbacks for Print {
//!     fn on_headers(&mut self, stream_id: u32, headers: &[HeaderField], _end: bool) {
//!         println!("stream {stream_id}: {} headers", headers.len());
//!     }
//! }
//!
//! let mut session = Session::new(Role::Client, Print);
//! session.feed(1, &received)?;
//! transport_send(&session.take_pending_send());
//! ```

pub mod error;
pub mod flowcontrol;
pub mod frame;
pub mod hpack;
mod huffman;
pub mod session;
pub mod settings;
mod stream;

pub use error::{ErrorCode, H2Error};
pub use frame::Frame;
pub use hpack::HeaderField;
pub use session::{CLIENT_PREFACE, Callbacks, Role, Session};
pub use settings::{SettingId, Settings};
