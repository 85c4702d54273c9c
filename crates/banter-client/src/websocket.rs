//! Client-side WebSocket transport.
//!
//! Dials the broker with tokio-tungstenite, performs the token handshake,
//! and runs a socket task that translates wire frames into
//! [`TransportEvent`]s. The task owns reconnection with exponential backoff
//! and answers `TokenExpiring` by re-invoking the credential provider, so
//! renewal never surfaces to the session unless it fails.

use async_trait::async_trait;
use banter_core::{current_timestamp_ms, Credential, Message};
use banter_protocol::{codec, version_compatible, Frame, PROTOCOL_VERSION};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::provider::CredentialProvider;
use crate::transport::{ConnectionHandle, RealtimeTransport, TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Broker WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Timeout for dialing and the token handshake.
    pub handshake_timeout: Duration,
    /// Initial reconnect backoff delay.
    pub initial_backoff: Duration,
    /// Backoff cap.
    pub max_backoff: Duration,
}

impl WebSocketConfig {
    /// Create a config for the given URL with default timings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            handshake_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// WebSocket transport dialing a broker URL.
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Create a transport for the given broker URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            config: WebSocketConfig::new(url),
        }
    }

    /// Create a transport with explicit configuration.
    #[must_use]
    pub fn with_config(config: WebSocketConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RealtimeTransport for WebSocketTransport {
    async fn open(
        &self,
        credential: Credential,
        provider: Arc<dyn CredentialProvider>,
    ) -> Result<Box<dyn ConnectionHandle>, TransportError> {
        // Never present an expired credential to the broker.
        credential
            .validate(current_timestamp_ms())
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let stream = dial(&self.config, &credential.token).await?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let config = self.config.clone();
        let task = tokio::spawn(socket_task(stream, config, provider, command_rx, event_tx));

        Ok(Box::new(WebSocketHandle {
            commands: command_tx,
            events: event_rx,
            task: Some(task),
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Dial the broker and complete the token handshake.
async fn dial(config: &WebSocketConfig, token: &str) -> Result<WsStream, TransportError> {
    let connect = tokio::time::timeout(config.handshake_timeout, connect_async(config.url.as_str()));
    let (mut stream, _) = connect
        .await
        .map_err(|_| TransportError::OpenFailed("handshake timed out".to_string()))?
        .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

    let hello = codec::encode(&Frame::connect(token))?;
    stream
        .send(WsMessage::Text(hello))
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;

    // Wait for the broker's Connected (or Error) response.
    loop {
        let message = tokio::time::timeout(config.handshake_timeout, stream.next())
            .await
            .map_err(|_| TransportError::OpenFailed("handshake timed out".to_string()))?;

        match message {
            Some(Ok(WsMessage::Text(text))) => match codec::decode(&text)? {
                Frame::Connected {
                    connection_id,
                    version,
                } => {
                    if !version_compatible(version) {
                        return Err(TransportError::OpenFailed(format!(
                            "incompatible protocol version {version}"
                        )));
                    }
                    debug!(connection = %connection_id, "Broker connection established");
                    return Ok(stream);
                }
                Frame::Error { code, message } => {
                    return Err(TransportError::OpenFailed(format!(
                        "broker rejected connection ({code}): {message}"
                    )));
                }
                Frame::Ping => {
                    let pong = codec::encode(&Frame::Pong)?;
                    let _ = stream.send(WsMessage::Text(pong)).await;
                }
                other => {
                    debug!(frame = ?other, "Ignoring frame during handshake");
                }
            },
            Some(Ok(WsMessage::Ping(data))) => {
                let _ = stream.send(WsMessage::Pong(data)).await;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(TransportError::OpenFailed(e.to_string())),
            None => {
                return Err(TransportError::OpenFailed(
                    "connection closed during handshake".to_string(),
                ))
            }
        }
    }
}

enum Command {
    Send(Frame),
    Close,
}

enum PumpExit {
    /// Explicit close; do not reconnect.
    Closed,
    /// The socket dropped; attempt to reconnect.
    Dropped,
}

/// Socket task: pumps one socket until it drops, then reconnects with
/// backoff until closed.
async fn socket_task(
    mut stream: WsStream,
    config: WebSocketConfig,
    provider: Arc<dyn CredentialProvider>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    loop {
        match pump(&mut stream, &provider, &mut commands, &events).await {
            PumpExit::Closed => {
                let _ = stream.close(None).await;
                let _ = events.send(TransportEvent::Closed);
                return;
            }
            PumpExit::Dropped => {
                let _ = events.send(TransportEvent::Dropped);
                match reconnect(&config, &provider, &mut commands, &events).await {
                    Some(new_stream) => {
                        stream = new_stream;
                        // tungstenite reconnects are fresh connections; the
                        // broker never resumes subscription state across them.
                        let _ = events.send(TransportEvent::Resumed {
                            subscription_resumed: false,
                        });
                    }
                    None => {
                        let _ = events.send(TransportEvent::Closed);
                        return;
                    }
                }
            }
        }
    }
}

/// Pump one open socket until it drops or the handle closes.
async fn pump(
    stream: &mut WsStream,
    provider: &Arc<dyn CredentialProvider>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> PumpExit {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(frame)) => {
                    let text = match codec::encode(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Dropping unencodable frame");
                            continue;
                        }
                    };
                    if stream.send(WsMessage::Text(text)).await.is_err() {
                        return PumpExit::Dropped;
                    }
                }
                Some(Command::Close) | None => return PumpExit::Closed,
            },

            message = stream.next() => match message {
                Some(Ok(WsMessage::Text(text))) => {
                    match codec::decode(&text) {
                        Ok(frame) => {
                            if handle_frame(frame, stream, provider, events).await.is_err() {
                                return PumpExit::Dropped;
                            }
                        }
                        Err(e) => warn!(error = %e, "Ignoring undecodable frame"),
                    }
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    if stream.send(WsMessage::Pong(data)).await.is_err() {
                        return PumpExit::Dropped;
                    }
                }
                Some(Ok(WsMessage::Close(_))) => {
                    debug!("Broker sent close frame");
                    return PumpExit::Dropped;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return PumpExit::Dropped;
                }
                None => {
                    debug!("WebSocket stream ended");
                    return PumpExit::Dropped;
                }
            }
        }
    }
}

/// Handle one inbound broker frame in steady state.
async fn handle_frame(
    frame: Frame,
    stream: &mut WsStream,
    provider: &Arc<dyn CredentialProvider>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Result<(), TransportError> {
    match frame {
        Frame::Delivery {
            id,
            channel,
            sender,
            body,
            sent_at,
        } => {
            debug!(channel = %channel, sender = %sender, "Delivery");
            let message = Message::new(id, sender, body).with_sent_at(sent_at);
            let _ = events.send(TransportEvent::Delivery(message));
        }
        Frame::TokenExpiring => {
            // Transparent renewal: re-invoke the provider and hand the broker
            // a fresh token. Failure is reported without dropping the socket.
            match provider.credential().await {
                Ok(credential) => {
                    debug!(expires_at = credential.expires_at, "Refreshing token");
                    let refresh = codec::encode(&Frame::token_refresh(credential.token))?;
                    stream
                        .send(WsMessage::Text(refresh))
                        .await
                        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
                }
                Err(e) => {
                    warn!(error = %e, "Token renewal failed");
                    let _ = events.send(TransportEvent::TokenError(e.to_string()));
                }
            }
        }
        Frame::Ping => {
            let pong = codec::encode(&Frame::Pong)?;
            stream
                .send(WsMessage::Text(pong))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Frame::Error { code, message } => {
            warn!(code, message = %message, "Broker error");
        }
        Frame::Attached { channel, resumed } => {
            debug!(channel = %channel, resumed, "Channel attached");
        }
        other => {
            debug!(frame = ?other, "Ignoring frame");
        }
    }
    Ok(())
}

/// Reconnect with exponential backoff. Returns `None` if the handle closed
/// while reconnecting.
async fn reconnect(
    config: &WebSocketConfig,
    provider: &Arc<dyn CredentialProvider>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Option<WsStream> {
    let mut backoff = config.initial_backoff;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Close) | None => return None,
                Some(Command::Send(_)) => {
                    // Nothing to send it on; the session sees Dropped and
                    // holds publishes until Resumed.
                    continue;
                }
            },
            () = tokio::time::sleep(backoff) => {}
        }

        // A reconnect handshake needs a live token; the old one may have
        // expired while we were down.
        let token = match provider.credential().await {
            Ok(credential) => match credential.validate(current_timestamp_ms()) {
                Ok(()) => credential.token,
                Err(e) => {
                    let _ = events.send(TransportEvent::TokenError(e.to_string()));
                    backoff = (backoff * 2).min(config.max_backoff);
                    continue;
                }
            },
            Err(e) => {
                let _ = events.send(TransportEvent::TokenError(e.to_string()));
                backoff = (backoff * 2).min(config.max_backoff);
                continue;
            }
        };

        match dial(config, &token).await {
            Ok(stream) => {
                debug!("Reconnected to broker");
                return Some(stream);
            }
            Err(e) => {
                debug!(error = %e, backoff_ms = backoff.as_millis() as u64, "Reconnect failed");
                backoff = (backoff * 2).min(config.max_backoff);
            }
        }
    }
}

/// Handle for one open WebSocket connection.
pub struct WebSocketHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl WebSocketHandle {
    fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.commands
            .send(Command::Send(frame))
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[async_trait]
impl ConnectionHandle for WebSocketHandle {
    async fn attach(&mut self, channel: &str) -> Result<(), TransportError> {
        self.send(Frame::attach(channel))
    }

    async fn publish(
        &mut self,
        channel: &str,
        sender: &str,
        body: &str,
    ) -> Result<(), TransportError> {
        self.send(Frame::publish(channel, sender, body))
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.commands.send(Command::Close);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use banter_core::Capability;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    struct StaticProvider {
        credential: Credential,
    }

    #[async_trait]
    impl CredentialProvider for StaticProvider {
        async fn credential(&self) -> Result<Credential, ProviderError> {
            Ok(self.credential.clone())
        }
    }

    fn fresh_credential() -> Credential {
        let now = current_timestamp_ms();
        Credential {
            identity: "guest-00042".to_string(),
            capability: Capability::subscribe_publish("chat:lobby"),
            issued_at: now,
            expires_at: now + 60_000,
            token: "signed-token".to_string(),
        }
    }

    /// A fake broker that acks the handshake, acks attaches, and echoes
    /// publishes back as deliveries.
    async fn fake_broker() -> (SocketAddr, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();

            while let Some(Ok(message)) = ws.next().await {
                let WsMessage::Text(text) = message else {
                    continue;
                };
                let reply = match codec::decode(&text).unwrap() {
                    Frame::Connect { .. } => Frame::Connected {
                        connection_id: "bc-1".to_string(),
                        version: PROTOCOL_VERSION,
                    },
                    Frame::Attach { channel } => Frame::Attached {
                        channel,
                        resumed: false,
                    },
                    Frame::Publish {
                        channel,
                        sender,
                        body,
                    } => Frame::Delivery {
                        id: "m-1".to_string(),
                        channel,
                        sender,
                        body,
                        sent_at: 1_700_000_000_000,
                    },
                    _ => continue,
                };
                let encoded = codec::encode(&reply).unwrap();
                if ws.send(WsMessage::Text(encoded)).await.is_err() {
                    break;
                }
            }
        });

        (addr, task)
    }

    #[tokio::test]
    async fn test_open_publish_delivery_roundtrip() {
        let (addr, _broker) = fake_broker().await;
        let transport = WebSocketTransport::new(format!("ws://{addr}"));
        let provider = Arc::new(StaticProvider {
            credential: fresh_credential(),
        });

        let mut handle = transport
            .open(fresh_credential(), provider)
            .await
            .unwrap();
        handle.attach("chat:lobby").await.unwrap();
        handle
            .publish("chat:lobby", "guest-00042", "hello")
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
            .await
            .unwrap()
            .unwrap();
        match event {
            TransportEvent::Delivery(message) => {
                assert_eq!(message.sender, "guest-00042");
                assert_eq!(message.body, "hello");
            }
            other => panic!("Expected delivery, got {other:?}"),
        }

        handle.close().await;
        handle.close().await; // idempotent
    }

    #[tokio::test]
    async fn test_open_rejects_expired_credential_without_dialing() {
        // Unroutable URL: if validation did not short-circuit, open would
        // hang on the dial instead of failing fast.
        let transport = WebSocketTransport::new("ws://127.0.0.1:1");
        let provider = Arc::new(StaticProvider {
            credential: fresh_credential(),
        });

        let mut credential = fresh_credential();
        credential.expires_at = 1;

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            transport.open(credential, provider),
        )
        .await
        .unwrap();
        assert!(matches!(result, Err(TransportError::OpenFailed(_))));
    }

    #[test]
    fn test_config_defaults() {
        let config = WebSocketConfig::new("ws://example.com/realtime");
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.initial_backoff, Duration::from_millis(250));
        assert_eq!(config.max_backoff, Duration::from_secs(30));
    }
}
