//! Frame types for the broker connection.
//!
//! Frames are the fundamental unit of communication with the broker. Each
//! frame is a JSON object with a `type` tag.

use serde::{Deserialize, Serialize};

/// Wire protocol version carried in the `Connect`/`Connected` handshake.
pub const PROTOCOL_VERSION: u8 = 1;

/// Whether a broker answering with `version` speaks this protocol.
///
/// The version is a single number bumped on breaking changes, so only an
/// exact match is compatible.
#[must_use]
pub fn version_compatible(version: u8) -> bool {
    version == PROTOCOL_VERSION
}

/// A protocol frame.
///
/// Frames flow in both directions; `Connect`, `Attach`, `Publish`,
/// `TokenRefresh`, and `Ping` are client-to-broker, the rest are
/// broker-to-client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Connection handshake carrying the signed token.
    Connect {
        /// Protocol version.
        version: u8,
        /// Signed broker token from the issuance service.
        token: String,
    },

    /// Connection established response.
    Connected {
        /// Broker-assigned connection identifier.
        connection_id: String,
        /// Negotiated protocol version.
        version: u8,
    },

    /// Subscribe to a channel.
    Attach {
        /// Channel name to attach to.
        channel: String,
    },

    /// Channel subscription confirmed.
    Attached {
        /// Channel name.
        channel: String,
        /// Whether the broker resumed prior subscription state after a
        /// reconnect. When `false` the client must re-attach intent itself.
        resumed: bool,
    },

    /// Publish a message to a channel.
    Publish {
        /// Target channel.
        channel: String,
        /// Display handle of the sender.
        sender: String,
        /// Message text.
        body: String,
    },

    /// A message delivered by the broker. Sent to every subscriber on the
    /// channel, including the publisher.
    Delivery {
        /// Broker-assigned unique message identifier.
        id: String,
        /// Channel the message was published on.
        channel: String,
        /// Display handle of the sender.
        sender: String,
        /// Message text.
        body: String,
        /// Broker receive timestamp in unix milliseconds.
        sent_at: u64,
    },

    /// Broker notice that the presented token is close to expiry.
    TokenExpiring,

    /// Fresh token in response to `TokenExpiring`.
    TokenRefresh {
        /// Newly signed broker token.
        token: String,
    },

    /// Error response.
    Error {
        /// Broker error code.
        code: u16,
        /// Human-readable error message.
        message: String,
    },

    /// Keepalive ping.
    Ping,

    /// Keepalive pong.
    Pong,
}

impl Frame {
    /// Create a `Connect` frame for the current protocol version.
    #[must_use]
    pub fn connect(token: impl Into<String>) -> Self {
        Frame::Connect {
            version: PROTOCOL_VERSION,
            token: token.into(),
        }
    }

    /// Create an `Attach` frame.
    #[must_use]
    pub fn attach(channel: impl Into<String>) -> Self {
        Frame::Attach {
            channel: channel.into(),
        }
    }

    /// Create a `Publish` frame.
    #[must_use]
    pub fn publish(
        channel: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Frame::Publish {
            channel: channel.into(),
            sender: sender.into(),
            body: body.into(),
        }
    }

    /// Create a `TokenRefresh` frame.
    #[must_use]
    pub fn token_refresh(token: impl Into<String>) -> Self {
        Frame::TokenRefresh {
            token: token.into(),
        }
    }

    /// Create an `Error` frame.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Frame::Error {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_helper() {
        let frame = Frame::publish("chat:lobby", "guest-00042", "hello");
        assert_eq!(
            frame,
            Frame::Publish {
                channel: "chat:lobby".to_string(),
                sender: "guest-00042".to_string(),
                body: "hello".to_string(),
            }
        );
    }

    #[test]
    fn test_connect_uses_current_version() {
        let Frame::Connect { version, token } = Frame::connect("tok") else {
            panic!("expected connect frame");
        };
        assert_eq!(version, PROTOCOL_VERSION);
        assert_eq!(token, "tok");
    }

    #[test]
    fn test_version_gate_rejects_other_versions() {
        assert!(version_compatible(PROTOCOL_VERSION));
        assert!(!version_compatible(PROTOCOL_VERSION + 1));
        assert!(!version_compatible(0));
    }

    #[test]
    fn test_frame_tagging() {
        let json = serde_json::to_string(&Frame::Ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);

        let json = serde_json::to_string(&Frame::attach("chat:lobby")).unwrap();
        assert!(json.contains(r#""type":"attach""#));
    }
}
