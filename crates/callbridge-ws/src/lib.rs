//! Blocking WebSocket client engine for callbridge.
//!
//! Implements the client side of RFC 6455 over plain TCP, TLS, or an HTTP
//! `CONNECT` tunnel, selected by the URL scheme (`ws`, `wss`, `wsp`,
//! `wssp`; the trailing `p` means proxied).
//!
//! # Layers
//!
//! - [`frame`]: the wire codec (header bits, tri-modal lengths, masking).
//! - [`message`]: fragmentation and reassembly of frame chains.
//! - [`handshake`]: the HTTP upgrade request and its verification.
//! - [`connection`]: a live connection; dial with a [`Connector`], then
//!   exchange messages with read/send calls.
//!
//! # Example
//!
//! ```rust,no_run
//! use callbridge_ws::Connector;
//!
//! # fn main() -> callbridge_ws::WsResult<()> {
//! let mut connection = Connector::new("ws://127.0.0.1:10150")?
//!     .header("ClientID", "171")
//!     .connect()?;
//! connection.send_text("hello")?;
//! let (_kind, payload) = connection.read_message()?;
//! # let _ = payload;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;

pub use connection::{
    Connection, Connector, DEFAULT_READ_TIMEOUT, Endpoint, ProxyAddr, Scheme, Transport,
};
pub use error::{WsError, WsResult};
pub use frame::{Frame, FrameDecoder, OPTIMAL_FRAGMENT_LEN, OpCode, apply_mask};
pub use handshake::{HttpResponseHead, accept_for_key, build_request, generate_key};
pub use message::{IncomingMessage, MessageKind, OutgoingMessage};
