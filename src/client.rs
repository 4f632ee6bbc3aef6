//! Client struct definition
//!
//! Represents a registered connection with its pairing state and
//! outbound message queue.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ConnectionId, UserId};

/// Random-chat status of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingState {
    /// Not queued and not paired
    #[default]
    Idle,
    /// Waiting in the matchmaking queue
    Queued,
    /// Chatting with the given partner
    Paired(UserId),
}

/// Registered client information
///
/// Owned by the hub. Dropping it drops the hub's end of the outbound
/// queue, which tells the connection's write pump to close the session.
#[derive(Debug)]
pub struct Client {
    /// Authenticated user identity
    pub user_id: UserId,
    /// Transport session this record belongs to
    pub connection_id: ConnectionId,
    /// Hub → Client message queue
    sender: mpsc::Sender<ServerMessage>,
    /// Random-chat status, only mutated by the hub
    pub pairing: PairingState,
}

impl Client {
    /// Create a new idle client with the given identity and outbound queue
    pub fn new(
        user_id: UserId,
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            user_id,
            connection_id,
            sender,
            pairing: PairingState::Idle,
        }
    }

    /// Enqueue a message for this client without waiting
    ///
    /// A full queue drops the message rather than stalling the hub.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Current random partner, if paired
    pub fn partner(&self) -> Option<UserId> {
        match self.pairing {
            PairingState::Paired(partner) => Some(partner),
            _ => None,
        }
    }

    /// Check if this client is waiting in the queue
    pub fn is_queued(&self) -> bool {
        self.pairing == PairingState::Queued
    }
}
