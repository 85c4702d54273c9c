//! Transport abstraction for the broker connection.
//!
//! These traits define the interface a realtime transport must provide,
//! keeping the session state machine independent of any concrete protocol.
//! The transport owns reconnection and backoff; the session only sees the
//! resulting lifecycle events.

use async_trait::async_trait;
use banter_core::{Credential, Message};
use std::sync::Arc;
use thiserror::Error;

use crate::provider::{CredentialProvider, ProviderError};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Opening the connection failed.
    #[error("Open failed: {0}")]
    OpenFailed(String),

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Credential fetch failed.
    #[error("Credential fetch failed: {0}")]
    Credential(#[from] ProviderError),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] banter_protocol::ProtocolError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Lifecycle and delivery events surfaced by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Connection dropped recoverably; the transport is reconnecting.
    Dropped,

    /// Connection re-established after a drop.
    Resumed {
        /// Whether the broker resumed the prior subscription state. When
        /// `false` the session must attach the channel again.
        subscription_resumed: bool,
    },

    /// A message delivered on the attached channel, in broker order.
    Delivery(Message),

    /// Credential renewal failed while the connection stayed alive.
    TokenError(String),

    /// The connection is gone for good.
    Closed,
}

/// A transport that can open broker connections.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open a connection using `credential` for the handshake.
    ///
    /// `provider` is retained by the connection as the renewal callback:
    /// when the broker signals token expiry the connection re-invokes it
    /// transparently.
    async fn open(
        &self,
        credential: Credential,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Box<dyn ConnectionHandle>, TransportError>;

    /// Get the transport name (e.g., "websocket").
    fn name(&self) -> &'static str;
}

/// An open broker connection.
#[async_trait]
pub trait ConnectionHandle: Send {
    /// Attach (subscribe) to a channel.
    async fn attach(&mut self, channel: &str) -> Result<(), TransportError>;

    /// Publish a message to a channel on behalf of `sender`.
    async fn publish(
        &mut self,
        channel: &str,
        sender: &str,
        body: &str,
    ) -> Result<(), TransportError>;

    /// Receive the next event from the connection.
    ///
    /// Returns `None` once the connection is closed and drained.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Close the connection. Idempotent; never fails from the caller's
    /// point of view.
    async fn close(&mut self);
}
