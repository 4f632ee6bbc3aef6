//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::UserId;

/// Notification content sent when the random partner goes away
pub const PARTNER_LEFT: &str = "partner_left";

/// Client → Hub message
///
/// All messages from client to hub. Uses tagged enum with snake_case naming.
/// The sender is never read from the payload; the read pump attaches the
/// authenticated identity when it turns a frame into a hub event.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter the random-pairing queue
    JoinRandom,
    /// Leave the queue or the current random pairing
    LeaveRandom,
    /// Chat message to the current random partner
    MessageRandom { content: String },
    /// Chat message to a specific user
    DirectMessage { to: UserId, content: String },
    /// Friend request to the current random partner
    FriendRequest,
    /// Any `type` this hub does not know
    #[serde(other)]
    Unknown,
}

/// Decode a text frame into a `ClientMessage`
///
/// A `type` this hub does not know decodes to `ClientMessage::Unknown`;
/// malformed payloads are errors.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, AppError> {
    Ok(serde_json::from_str(text)?)
}

/// Hub → Client message
///
/// All messages from hub to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Paired with a random partner; `to` is the recipient itself
    RandomJoined { to: UserId },
    /// Informational notice, e.g. `partner_left`
    Notification { content: String },
    /// Error occurred
    Error { code: ErrorCode, content: String },
    /// Direct message delivered to its recipient
    DirectMessage {
        from: UserId,
        to: UserId,
        content: String,
        timestamp: DateTime<Utc>,
    },
    /// Anonymized random-chat message
    MessageRandom { from: UserId, content: String },
    /// The random partner asked to become friends
    FriendRequest,
    /// Mutual friend request recorded
    FriendRequestSuccess,
    /// Mutual friend request could not be recorded
    FriendRequestFailed,
}

impl ServerMessage {
    /// Notification that the random partner left
    pub fn partner_left() -> Self {
        ServerMessage::Notification {
            content: PARTNER_LEFT.to_string(),
        }
    }
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Join while already queued
    AlreadyInQueue,
    /// Join while already paired
    ConnectedToRandom,
    /// Random-chat action without a pairing
    ConnectionNotExist,
    /// Message could not be stored or delivered
    SendMessageFailed,
    /// Unknown or malformed frame
    InvalidMessageType,
    /// Relationship check failed during matchmaking
    JoinRandomFailed,
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let (code, content) = match &err {
            AppError::AlreadyInQueue => (
                ErrorCode::AlreadyInQueue,
                "The user is already queueing for random chat".to_string(),
            ),
            AppError::ConnectedToRandom => (
                ErrorCode::ConnectedToRandom,
                "The user is already connected in a random chat".to_string(),
            ),
            AppError::ConnectionNotExist => (
                ErrorCode::ConnectionNotExist,
                "You are not connected to a random user".to_string(),
            ),
            AppError::SendMessageFailed => (
                ErrorCode::SendMessageFailed,
                "The message could not be sent".to_string(),
            ),
            AppError::InvalidMessageType => (
                ErrorCode::InvalidMessageType,
                "The server does not recognize the message type".to_string(),
            ),
            AppError::Json(e) => (
                ErrorCode::InvalidMessageType,
                format!("Invalid message format: {}", e),
            ),
            AppError::JoinRandomFailed => (
                ErrorCode::JoinRandomFailed,
                "Could not join random chat, try again".to_string(),
            ),
            // Fatal errors are not typically converted (connection closes)
            _ => (ErrorCode::SendMessageFailed, "Internal error".to_string()),
        };
        ServerMessage::Error { code, content }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_deserialize() {
        let json = r#"{"type": "direct_message", "to": 5, "content": "x"}"#;
        let msg = decode_client_message(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::DirectMessage {
                to: UserId(5),
                content: "x".to_string()
            }
        );

        let msg = decode_client_message(r#"{"type": "join_random"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinRandom);
    }

    #[test]
    fn test_client_message_ignores_extra_fields() {
        let json = r#"{"type": "message_random", "from": 99, "to": 3, "content": "hi"}"#;
        let msg = decode_client_message(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::MessageRandom {
                content: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_type_decodes_to_unknown() {
        let msg = decode_client_message(r#"{"type": "dance", "content": "x"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn test_malformed_frame_rejected() {
        assert!(matches!(
            decode_client_message("not json"),
            Err(AppError::Json(_))
        ));
        // known type, missing required field
        assert!(matches!(
            decode_client_message(r#"{"type": "direct_message", "content": "x"}"#),
            Err(AppError::Json(_))
        ));
    }

    #[test]
    fn test_server_message_serialize() {
        let msg = ServerMessage::MessageRandom {
            from: UserId::ANONYMOUS,
            content: "hi".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "message_random", "from": 0, "content": "hi"})
        );

        let value = serde_json::to_value(ServerMessage::partner_left()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "notification", "content": "partner_left"})
        );

        let value = serde_json::to_value(ServerMessage::FriendRequestSuccess).unwrap();
        assert_eq!(value, serde_json::json!({"type": "friend_request_success"}));
    }

    #[test]
    fn test_error_code_serialize() {
        let msg: ServerMessage = AppError::SendMessageFailed.into();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"code\":\"SEND_MESSAGE_FAILED\""));
    }
}
