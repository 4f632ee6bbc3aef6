//! Random-pairing matchmaker
//!
//! Pairs a joining client with the first eligible user in the waiting
//! queue. Users that are friends with, or blocked by, the joiner are moved
//! to the back instead of being paired; users that went offline are dropped.

use tracing::{debug, info, warn};

use crate::client::PairingState;
use crate::error::{AppError, ServiceError};
use crate::hub::Hub;
use crate::service::with_deadline;
use crate::types::UserId;

/// Outcome of one pass over the waiting queue
#[derive(Debug, Default)]
struct Scan {
    /// Queued ids that are no longer registered
    stale: Vec<UserId>,
    /// Candidates that share a relationship with the joiner
    related: Vec<UserId>,
    /// First eligible candidate
    partner: Option<UserId>,
}

impl Hub {
    /// Handle a join request for random chat
    pub(crate) async fn join_random(&mut self, user_id: UserId) {
        let Some(client) = self.clients.get(&user_id) else {
            debug!(%user_id, "Join from offline user dropped");
            return;
        };

        match client.pairing {
            PairingState::Queued => {
                info!(%user_id, "Join rejected: already in queue");
                self.notify(user_id, AppError::AlreadyInQueue.into());
                return;
            }
            PairingState::Paired(_) => {
                info!(%user_id, "Join rejected: already connected");
                self.notify(user_id, AppError::ConnectedToRandom.into());
                return;
            }
            PairingState::Idle => {}
        }

        let scan = match self.scan_queue(user_id).await {
            Ok(scan) => scan,
            Err(e) => {
                warn!(%user_id, "Relationship check failed, queue left as is: {}", e);
                self.notify(user_id, AppError::JoinRandomFailed.into());
                return;
            }
        };

        if !scan.stale.is_empty() {
            debug!("Dropping stale queue entries: {:?}", scan.stale);
        }
        self.queue.remove_all(&scan.stale);
        self.queue.move_to_back(&scan.related);

        match scan.partner {
            Some(partner_id) => {
                self.queue.remove(partner_id);
                self.pair(user_id, partner_id);
            }
            None => {
                self.queue.push_back(user_id);
                if let Some(client) = self.clients.get_mut(&user_id) {
                    client.pairing = PairingState::Queued;
                }
                debug!(%user_id, "Queued for random chat ({} waiting)", self.queue.len());
            }
        }
    }

    /// Walk the queue front to back looking for a partner
    ///
    /// Read-only: nothing is changed until the whole scan has succeeded.
    async fn scan_queue(&self, user_id: UserId) -> Result<Scan, ServiceError> {
        let mut scan = Scan::default();

        for candidate in self.queue.to_vec() {
            let online = self
                .clients
                .get(&candidate)
                .is_some_and(|c| c.is_queued());
            if !online || candidate == user_id {
                scan.stale.push(candidate);
                continue;
            }

            let related = with_deadline(
                self.call_timeout,
                self.friendships.has_relationship(user_id, candidate),
            )
            .await?;

            if related {
                debug!(%user_id, %candidate, "Skipping related candidate");
                scan.related.push(candidate);
            } else {
                scan.partner = Some(candidate);
                break;
            }
        }

        Ok(scan)
    }
}
