//! # banter-protocol
//!
//! Wire protocol frames for the realtime connection between a Banter client
//! and the hosted broker.
//!
//! Frames are JSON objects carried in WebSocket text messages; the
//! WebSocket layer already delimits them, so no length prefix is needed.
//!
//! ## Frame Types
//!
//! - `Connect` / `Connected` - Connection handshake with a signed token
//! - `Attach` / `Attached` - Channel subscription
//! - `Publish` / `Delivery` - Outbound messages and broker fan-out
//! - `TokenExpiring` / `TokenRefresh` - Transparent credential renewal
//! - `Error`, `Ping` / `Pong` - Errors and keepalive
//!
//! ## Example
//!
//! ```rust
//! use banter_protocol::{codec, Frame};
//!
//! let frame = Frame::publish("chat:lobby", "guest-00042", "hello");
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, ProtocolError};
pub use frames::{version_compatible, Frame, PROTOCOL_VERSION};
