//! External collaborator interfaces
//!
//! The hub consults a friendship service (relationship checks, adding
//! friends) and a message store (direct-message persistence). Both are
//! called from inside the hub loop, always under a deadline.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ServiceError;
use crate::types::UserId;

/// Friendship collaborator
#[async_trait]
pub trait FriendshipService: Send + Sync {
    /// True if the two users are friends or one has blocked the other
    async fn has_relationship(&self, a: UserId, b: UserId) -> Result<bool, ServiceError>;

    /// Record a friendship between the two users
    async fn add_friend(&self, a: UserId, b: UserId) -> Result<(), ServiceError>;
}

/// Direct-message persistence collaborator
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one direct message
    async fn store_message(
        &self,
        from: UserId,
        to: UserId,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), ServiceError>;
}

/// Await a collaborator call, failing with `ServiceError::Timeout` past the deadline
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout(deadline)),
    }
}
