//! Random-Pairing Chat Hub Library
//!
//! The real-time core of a social chat service, built with tokio-tungstenite
//! using the Actor pattern for state management.
//!
//! # Features
//! - WebSocket sessions identified by an upstream-authenticated user id
//! - One live session per user (a reconnect supersedes the old one)
//! - Anonymous random pairing with a FIFO queue that never pairs friends
//!   or blocked users
//! - Anonymized random-chat messages
//! - Persisted direct messages with best-effort live delivery
//! - In-chat friend requests with mutual-request detection
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Hub` is the central actor owning registry, queue, pairings and
//!   pending friend requests
//! - Each connection has a read pump (frames → hub events) and a write pump
//!   (bounded outbound queue → socket)
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_hub::{serve, Hub, InMemoryFriendships, InMemoryMessages};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (event_tx, event_rx) = mpsc::channel(256);
//!
//!     let hub = Hub::new(
//!         event_rx,
//!         Arc::new(InMemoryFriendships::new()),
//!         Arc::new(InMemoryMessages::new()),
//!     );
//!     tokio::spawn(hub.run());
//!
//!     serve(listener, event_tx, 20).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod matchmaker;
pub mod memory;
pub mod message;
pub mod queue;
pub mod router;
pub mod service;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, PairingState};
pub use config::Config;
pub use error::{AppError, SendError, ServiceError};
pub use handler::{handle_connection, serve};
pub use hub::{Hub, HubEvent, HubSnapshot, Route};
pub use memory::{InMemoryFriendships, InMemoryMessages};
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use queue::WaitingQueue;
pub use service::{FriendshipService, MessageStore};
pub use types::{ConnectionId, UserId};
