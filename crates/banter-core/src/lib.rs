//! # banter-core
//!
//! Core domain types for the Banter room chat toolkit.
//!
//! This crate provides the fundamental building blocks shared by the client
//! session and the token issuance service:
//!
//! - **Credential** - Short-lived, capability-scoped broker access token
//! - **ConnectionState** - Lifecycle of one realtime connection
//! - **Message / MessageLog** - Immutable chat messages and the append-only view model
//! - **Identity** - Anonymous display handle generation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  issues   ┌─────────────┐  opens   ┌─────────────┐
//! │ TokenIssuer │──────────▶│  Credential │─────────▶│   Broker    │
//! └─────────────┘           └─────────────┘          └─────────────┘
//!                                  │                        │
//!                                  ▼                        ▼
//!                           ┌──────────────┐  appends ┌─────────────┐
//!                           │ChannelSession│─────────▶│ MessageLog  │
//!                           └──────────────┘          └─────────────┘
//! ```
//!
//! No I/O happens here; the client and issuer crates wire these types to
//! the network.

pub mod credential;
pub mod identity;
pub mod message;
pub mod state;

pub use credential::{Capability, Credential, CredentialError, Operation};
pub use identity::{generate_handle, DEFAULT_HANDLE_PREFIX};
pub use message::{current_timestamp_ms, Message, MessageLog};
pub use state::ConnectionState;
