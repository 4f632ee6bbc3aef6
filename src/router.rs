//! Message routing
//!
//! Resolves destinations for direct messages, random-chat messages and
//! in-chat friend requests, and performs persistence side effects.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::client::PairingState;
use crate::error::AppError;
use crate::hub::{Hub, Route};
use crate::message::ServerMessage;
use crate::service::with_deadline;
use crate::types::UserId;

impl Hub {
    /// Dispatch a routed message from an authenticated sender
    pub(crate) async fn route(&mut self, from: UserId, route: Route) {
        match route {
            Route::Direct { to, content } => self.route_direct(from, to, content).await,
            Route::Random { content } => self.route_random(from, content),
            Route::FriendRequest => self.route_friend_request(from).await,
        }
    }

    /// Persist, then deliver if the recipient is online
    async fn route_direct(&mut self, from: UserId, to: UserId, content: String) {
        let timestamp = Utc::now();
        let stored = with_deadline(
            self.call_timeout,
            self.messages.store_message(from, to, &content, timestamp),
        )
        .await;

        if let Err(e) = stored {
            warn!(%from, %to, "Failed to store direct message: {}", e);
            self.notify(from, AppError::SendMessageFailed.into());
            return;
        }

        if self.clients.contains_key(&to) {
            self.notify(
                to,
                ServerMessage::DirectMessage {
                    from,
                    to,
                    content,
                    timestamp,
                },
            );
        } else {
            debug!(%from, %to, "Recipient offline, message stored only");
        }
    }

    /// Forward to the current random partner with the sender hidden
    fn route_random(&mut self, from: UserId, content: String) {
        let Some(partner_id) = self.clients.get(&from).and_then(|c| c.partner()) else {
            self.notify(from, AppError::ConnectionNotExist.into());
            return;
        };

        if !self.clients.contains_key(&partner_id) {
            warn!(%from, partner = %partner_id, "Random partner gone, unpairing");
            self.unpair_orphan(from);
            self.notify(from, AppError::SendMessageFailed.into());
            return;
        }

        self.notify(
            partner_id,
            ServerMessage::MessageRandom {
                from: UserId::ANONYMOUS,
                content,
            },
        );
    }

    /// Record a friend request toward the random partner, or complete a mutual one
    async fn route_friend_request(&mut self, from: UserId) {
        let Some(to) = self.clients.get(&from).and_then(|c| c.partner()) else {
            self.notify(from, AppError::ConnectionNotExist.into());
            return;
        };

        if !self.clients.contains_key(&to) {
            debug!(%from, %to, "Friend request between offline users dropped");
            self.clear_friend_requests(from);
            self.clear_friend_requests(to);
            return;
        }

        if self.friend_requests.get(&to) != Some(&from) {
            debug!(%from, %to, "Friend request pending");
            self.friend_requests.insert(from, to);
            self.notify(to, ServerMessage::FriendRequest);
            return;
        }

        let added = with_deadline(self.call_timeout, self.friendships.add_friend(from, to)).await;

        self.friend_requests.remove(&from);
        self.friend_requests.remove(&to);

        let reply = match added {
            Ok(()) => {
                info!(%from, %to, "Friendship created from random chat");
                ServerMessage::FriendRequestSuccess
            }
            Err(e) => {
                warn!(%from, %to, "Failed to add friend: {}", e);
                ServerMessage::FriendRequestFailed
            }
        };
        self.notify(from, reply.clone());
        self.notify(to, reply);
    }

    /// Clear a pairing whose other side is no longer registered
    fn unpair_orphan(&mut self, user_id: UserId) {
        if let Some(client) = self.clients.get_mut(&user_id) {
            client.pairing = PairingState::Idle;
        }
        self.clear_friend_requests(user_id);
    }
}
