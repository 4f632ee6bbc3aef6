//! Matchmaking queue
//!
//! FIFO of user ids waiting for a random partner. Each id appears at most once.

use std::collections::VecDeque;

use crate::types::UserId;

/// Waiting queue for random pairing
#[derive(Debug, Default)]
pub struct WaitingQueue {
    entries: VecDeque<UserId>,
}

impl WaitingQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user to the back of the queue
    ///
    /// Returns false if the user was already queued.
    pub fn push_back(&mut self, user_id: UserId) -> bool {
        if self.contains(user_id) {
            false
        } else {
            self.entries.push_back(user_id);
            true
        }
    }

    /// Remove a user from the queue (first match only)
    ///
    /// Returns true if the user was present.
    pub fn remove(&mut self, user_id: UserId) -> bool {
        match self.entries.iter().position(|id| *id == user_id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Check if a user is queued
    pub fn contains(&self, user_id: UserId) -> bool {
        self.entries.contains(&user_id)
    }

    /// Snapshot of the queued ids, front first
    pub fn to_vec(&self) -> Vec<UserId> {
        self.entries.iter().copied().collect()
    }

    /// Remove every listed user
    pub fn remove_all(&mut self, user_ids: &[UserId]) {
        self.entries.retain(|id| !user_ids.contains(id));
    }

    /// Move the listed users to the back, keeping their relative order
    pub fn move_to_back(&mut self, user_ids: &[UserId]) {
        self.remove_all(user_ids);
        for id in user_ids {
            self.push_back(*id);
        }
    }

    /// Number of waiting users
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nobody is waiting
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
