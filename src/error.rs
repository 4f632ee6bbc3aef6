//! Error types for the hub
//!
//! Defines application-level errors, outbound queue errors and
//! collaborator (friendship / message storage) errors.
//! Uses thiserror for ergonomic error definitions.

use std::time::Duration;

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error message to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Upgrade request did not carry a usable user identity
    #[error("Missing or invalid user identity")]
    Unauthorized,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Join requested while already waiting in the queue
    #[error("Already in queue")]
    AlreadyInQueue,

    /// Join requested while already paired
    #[error("Already connected to a random user")]
    ConnectedToRandom,

    /// Random-chat action without an active pairing
    #[error("Not connected to a random user")]
    ConnectionNotExist,

    /// Message could not be persisted or delivered
    #[error("Send message failed")]
    SendMessageFailed,

    /// Frame type not recognized, or frame malformed
    #[error("Invalid message type")]
    InvalidMessageType,

    /// Matchmaking aborted because the relationship check failed
    #[error("Join random failed")]
    JoinRandomFailed,
}

/// Message send errors
///
/// Occurs when enqueueing to a client's outbound queue does not succeed.
/// Delivery is best-effort, so callers log these and move on.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The bounded outbound queue is full
    #[error("Outbound queue full")]
    QueueFull,
}

/// Errors returned by external collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The call did not complete within its deadline
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The collaborator refused the operation
    #[error("rejected: {0}")]
    Rejected(String),

    /// The collaborator could not be reached or failed internally
    #[error("unavailable: {0}")]
    Unavailable(String),
}
