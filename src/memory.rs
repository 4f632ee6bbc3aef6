//! In-memory collaborators
//!
//! Process-local implementations of the friendship service and message
//! store. The binary runs on them; tests use them as fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::ServiceError;
use crate::service::{FriendshipService, MessageStore};
use crate::types::UserId;

/// Status of a relationship between two users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipStatus {
    Accepted,
    Blocked,
}

/// Symmetric relationship table
#[derive(Debug, Default)]
pub struct InMemoryFriendships {
    relations: RwLock<HashMap<(UserId, UserId), FriendshipStatus>>,
}

/// Order-independent key for a pair of users
fn pair_key(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl InMemoryFriendships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relationship status between two users, if any
    pub async fn status(&self, a: UserId, b: UserId) -> Option<FriendshipStatus> {
        self.relations.read().await.get(&pair_key(a, b)).copied()
    }

    /// Mark the pair as blocked, replacing any friendship
    pub async fn block(&self, a: UserId, b: UserId) {
        self.relations
            .write()
            .await
            .insert(pair_key(a, b), FriendshipStatus::Blocked);
    }

    /// Remove a friendship; blocked pairs are left alone
    pub async fn remove_friend(&self, a: UserId, b: UserId) -> Result<(), ServiceError> {
        let mut relations = self.relations.write().await;
        match relations.get(&pair_key(a, b)) {
            Some(FriendshipStatus::Accepted) => {
                relations.remove(&pair_key(a, b));
                Ok(())
            }
            _ => Err(ServiceError::Rejected(format!(
                "no friendship between {} and {}",
                a, b
            ))),
        }
    }

    /// Accepted friends of a user, sorted by id
    pub async fn friends_of(&self, user_id: UserId) -> Vec<UserId> {
        let relations = self.relations.read().await;
        let mut friends: Vec<UserId> = relations
            .iter()
            .filter(|(_, status)| **status == FriendshipStatus::Accepted)
            .filter_map(|((a, b), _)| {
                if *a == user_id {
                    Some(*b)
                } else if *b == user_id {
                    Some(*a)
                } else {
                    None
                }
            })
            .collect();
        friends.sort();
        friends
    }
}

#[async_trait]
impl FriendshipService for InMemoryFriendships {
    async fn has_relationship(&self, a: UserId, b: UserId) -> Result<bool, ServiceError> {
        Ok(self.relations.read().await.contains_key(&pair_key(a, b)))
    }

    async fn add_friend(&self, a: UserId, b: UserId) -> Result<(), ServiceError> {
        if a == b {
            return Err(ServiceError::Rejected("cannot befriend yourself".to_string()));
        }

        let mut relations = self.relations.write().await;
        let key = pair_key(a, b);
        if relations.contains_key(&key) {
            return Err(ServiceError::Rejected(format!(
                "relationship between {} and {} already exists",
                a, b
            )));
        }
        relations.insert(key, FriendshipStatus::Accepted);
        Ok(())
    }
}

/// A persisted direct message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub from: UserId,
    pub to: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only direct-message log
#[derive(Debug, Default)]
pub struct InMemoryMessages {
    messages: RwLock<Vec<StoredMessage>>,
}

impl InMemoryMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages exchanged between two users, oldest first
    pub async fn conversation(&self, a: UserId, b: UserId) -> Vec<StoredMessage> {
        let messages = self.messages.read().await;
        let mut found: Vec<StoredMessage> = messages
            .iter()
            .filter(|m| (m.from == a && m.to == b) || (m.from == b && m.to == a))
            .cloned()
            .collect();
        found.sort_by_key(|m| m.timestamp);
        found
    }

    /// Total number of stored messages
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessages {
    async fn store_message(
        &self,
        from: UserId,
        to: UserId,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.messages.write().await.push(StoredMessage {
            from,
            to,
            content: content.to_string(),
            timestamp,
        });
        Ok(())
    }
}
