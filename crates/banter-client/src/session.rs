//! The channel session state machine.
//!
//! A [`ChannelSession`] owns exactly one realtime connection and one
//! channel subscription. All transitions and message handling happen on the
//! single task that owns the session; there is no internal locking and no
//! shared mutable state. Multiple rooms mean multiple independent sessions.

use banter_core::{current_timestamp_ms, ConnectionState, MessageLog};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::provider::CredentialProvider;
use crate::transport::{ConnectionHandle, RealtimeTransport, TransportEvent};

/// Errors surfaced by session operations.
///
/// Every failure is also observable through [`ChannelSession::state`] or
/// [`ChannelSession::last_error`]; nothing fails silently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// `start` was called outside the `Idle` state.
    #[error("Session already started (state {0})")]
    AlreadyStarted(ConnectionState),

    /// `publish` was called outside the `Connected` state.
    #[error("Cannot publish while {0}")]
    NotConnected(ConnectionState),

    /// Fetching a credential from the issuance service failed.
    #[error("Credential issuance failed: {0}")]
    Issuance(String),

    /// The issuance service returned an already-expired credential.
    #[error("Issued credential is expired: {0}")]
    ExpiredCredential(String),

    /// The transport failed to open, attach, or publish.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Client-side state machine owning one connection and one channel.
///
/// The room name is an explicit constructor parameter; there is no implicit
/// global channel. Inbound messages - including the session's own publishes
/// echoed back by the broker - arrive exclusively through
/// [`process_event`](Self::process_event), which is the single source of
/// truth for message ordering. The session never appends a local echo.
pub struct ChannelSession {
    room: String,
    provider: Arc<dyn CredentialProvider>,
    transport: Arc<dyn RealtimeTransport>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    connection: Option<Box<dyn ConnectionHandle>>,
    identity: Option<String>,
    log: MessageLog,
    last_error: Option<SessionError>,
}

impl ChannelSession {
    /// Create a session for `room`, not yet started.
    #[must_use]
    pub fn new(
        room: impl Into<String>,
        provider: Arc<dyn CredentialProvider>,
        transport: Arc<dyn RealtimeTransport>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            room: room.into(),
            provider,
            transport,
            state: ConnectionState::Idle,
            state_tx,
            connection: None,
            identity: None,
            log: MessageLog::new(),
            last_error: None,
        }
    }

    /// The room channel this session is bound to.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Watch connection state changes (for the presentation layer to
    /// enable/disable input controls).
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The message log view model, oldest first.
    #[must_use]
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// The local display handle, available once started.
    #[must_use]
    pub fn handle(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// The most recent error observed by the session, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(room = %self.room, from = %self.state, to = %next, "State transition");
        self.state = next;
        // Ignore send errors: no watcher is a valid configuration.
        let _ = self.state_tx.send(next);
    }

    fn fail(&mut self, error: SessionError) {
        warn!(room = %self.room, error = %error, "Session failed");
        self.last_error = Some(error);
        self.transition(ConnectionState::Failed);
    }

    /// Start the session: fetch a credential, open the transport with the
    /// provider bound as renewal callback, and attach the room channel.
    ///
    /// On success the session is `Connected`. Any failure before that lands
    /// in `Failed` and is returned; a credential fetch failure makes no
    /// transport call at all.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyStarted`] outside `Idle`, or the
    /// failure that moved the session to `Failed`.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.state != ConnectionState::Idle {
            return Err(SessionError::AlreadyStarted(self.state));
        }
        self.transition(ConnectionState::Connecting);

        let credential = match self.provider.credential().await {
            Ok(credential) => credential,
            Err(e) => {
                let error = SessionError::Issuance(e.to_string());
                self.fail(error.clone());
                return Err(error);
            }
        };

        // An expired credential must never reach the transport.
        if let Err(e) = credential.validate(current_timestamp_ms()) {
            let error = SessionError::ExpiredCredential(e.to_string());
            self.fail(error.clone());
            return Err(error);
        }

        let identity = credential.identity.clone();

        let mut connection = match self
            .transport
            .open(credential, Arc::clone(&self.provider))
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                let error = SessionError::Transport(e.to_string());
                self.fail(error.clone());
                return Err(error);
            }
        };

        if let Err(e) = connection.attach(&self.room).await {
            connection.close().await;
            let error = SessionError::Transport(e.to_string());
            self.fail(error.clone());
            return Err(error);
        }

        self.identity = Some(identity);
        self.connection = Some(connection);
        self.transition(ConnectionState::Connected);

        debug!(room = %self.room, handle = ?self.identity, "Session connected");
        Ok(())
    }

    /// Publish a message to the room.
    ///
    /// An empty-after-trim body is silently ignored. The sender's own
    /// message is not appended locally; it arrives through the inbound
    /// path like everyone else's.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] outside `Connected` (without
    /// touching the transport), or a transport error if the send fails.
    pub async fn publish(&mut self, body: &str) -> Result<(), SessionError> {
        if body.trim().is_empty() {
            return Ok(());
        }
        if self.state != ConnectionState::Connected {
            return Err(SessionError::NotConnected(self.state));
        }

        // Connected implies an open connection and a known identity; treat
        // anything else as not connected rather than panic.
        let sender = match self.identity.clone() {
            Some(sender) => sender,
            None => return Err(SessionError::NotConnected(self.state)),
        };
        let room = self.room.clone();
        let Some(connection) = self.connection.as_mut() else {
            return Err(SessionError::NotConnected(self.state));
        };

        match connection.publish(&room, &sender, body).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let error = SessionError::Transport(e.to_string());
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Handle one transport event. This is the single inbound funnel: all
    /// deliveries, drops, and resumes pass through here in arrival order.
    pub async fn process_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Dropped => {
                if self.state == ConnectionState::Connected {
                    debug!(room = %self.room, "Transport dropped, suspending");
                    self.transition(ConnectionState::Suspended);
                }
            }
            TransportEvent::Resumed {
                subscription_resumed,
            } => {
                if self.state != ConnectionState::Suspended {
                    return;
                }
                if !subscription_resumed {
                    // The broker did not carry the subscription across the
                    // reconnect; attach again before resuming.
                    let room = self.room.clone();
                    if let Some(connection) = self.connection.as_mut() {
                        if let Err(e) = connection.attach(&room).await {
                            warn!(room = %room, error = %e, "Re-attach after resume failed");
                            self.last_error = Some(SessionError::Transport(e.to_string()));
                            return;
                        }
                    }
                }
                self.transition(ConnectionState::Connected);
            }
            TransportEvent::Delivery(message) => {
                self.log.append(message);
            }
            TransportEvent::TokenError(detail) => {
                // Renewal failure is reported but does not lower the state
                // of a live connection.
                warn!(room = %self.room, error = %detail, "Credential renewal failed");
                self.last_error = Some(SessionError::Issuance(detail));
            }
            TransportEvent::Closed => {
                // Unlike `Dropped`, the handle is gone for good and will not
                // reconnect; the session ends here.
                debug!(room = %self.room, "Transport closed");
                self.connection = None;
                self.identity = None;
                if self.state != ConnectionState::Closed {
                    self.transition(ConnectionState::Closed);
                }
            }
        }
    }

    /// Drive the session until the connection closes: a single-consumer
    /// pump that feeds [`process_event`](Self::process_event).
    pub async fn run(&mut self) {
        loop {
            let event = match self.connection.as_mut() {
                Some(connection) => connection.next_event().await,
                None => break,
            };
            match event {
                Some(event) => self.process_event(event).await,
                None => break,
            }
        }
    }

    /// Stop the session: close the transport, release the channel, drop the
    /// credential. Idempotent and safe from any state; never errors.
    pub async fn stop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
        self.identity = None;
        if self.state != ConnectionState::Closed {
            self.transition(ConnectionState::Closed);
        }
    }
}
