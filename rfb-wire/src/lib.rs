//! Client-side RFB (VNC) wire protocol.
//!
//! This crate covers exactly the protocol surface a single-frame capture
//! client needs:
//!
//! - [`stream`] - buffered reading/writing of network-byte-order primitives
//!   over any tokio [`AsyncRead`](tokio::io::AsyncRead)/[`AsyncWrite`](tokio::io::AsyncWrite)
//! - [`handshake`] - the three-phase RFB handshake (protocol version,
//!   security type None, ClientInit/ServerInit exchange)
//! - [`messages`] - the client messages needed to request one framebuffer
//!   update, and the closed set of server message variants with rectangle
//!   payloads already framed off the wire
//!
//! All multi-byte integers use big-endian (network byte order) per the RFB
//! specification. Errors are `std::io::Error`: a malformed or truncated
//! exchange fails fast with a descriptive message, never a silent fallback.

pub mod handshake;
pub mod messages;
pub mod stream;

pub use handshake::{handshake, ProtocolVersion};
pub use messages::{
    FramebufferUpdate, FramebufferUpdateRequest, PixelFormat, Rectangle, RectanglePayload,
    ServerInit, ServerMessage, SetEncodings, SetPixelFormat, ENCODING_RAW,
};
pub use stream::{WireReader, WireWriter};
