//! # banter-client
//!
//! Client-side connection lifecycle for Banter room chat.
//!
//! The centerpiece is [`ChannelSession`], a state machine that owns one
//! realtime connection and one channel subscription. It acquires a
//! short-lived credential from the issuance service, opens a transport with
//! a renewal callback, attaches the room channel, and projects inbound
//! deliveries into an append-only [`banter_core::MessageLog`].
//!
//! Collaborators are modeled as capability traits:
//!
//! - [`CredentialProvider`] - fetches a fresh credential on demand; handed
//!   to the transport so token renewal never touches the session
//! - [`RealtimeTransport`] / [`ConnectionHandle`] - the broker connection
//!   primitives (open/attach/publish/events/close)
//!
//! A WebSocket implementation of the transport is provided behind the
//! default `websocket` feature.
//!
//! ```rust,ignore
//! use banter_client::{ChannelSession, HttpCredentialProvider, WebSocketTransport};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(HttpCredentialProvider::new("https://example.com/api/token"));
//! let transport = Arc::new(WebSocketTransport::new("wss://broker.example.com/realtime"));
//! let mut session = ChannelSession::new("chat:lobby", provider, transport);
//!
//! session.start().await?;
//! session.publish("hello").await?;
//! ```

pub mod provider;
pub mod session;
pub mod transport;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use provider::{CredentialProvider, HttpCredentialProvider, ProviderError};
pub use session::{ChannelSession, SessionError};
pub use transport::{ConnectionHandle, RealtimeTransport, TransportError, TransportEvent};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
