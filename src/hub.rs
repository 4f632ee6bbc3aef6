//! Hub actor implementation
//!
//! The central actor that owns all shared state: the connection registry,
//! the matchmaking queue, pairing links and pending friend requests.
//! Uses the Actor pattern with an mpsc channel; events are handled one at
//! a time, so no locks are needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::client::{Client, PairingState};
use crate::message::ServerMessage;
use crate::queue::WaitingQueue;
use crate::service::{FriendshipService, MessageStore};
use crate::types::{ConnectionId, UserId};

/// Default deadline for collaborator calls made from the hub loop
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Events sent from connection pumps to the Hub actor
///
/// Every client event names the connection it came from. Events from a
/// connection that is no longer the registered one for its user are ignored.
#[derive(Debug)]
pub enum HubEvent {
    /// New client connected
    Connected {
        user_id: UserId,
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Client connection ended
    Disconnected {
        user_id: UserId,
        connection_id: ConnectionId,
    },
    /// Enter the random-pairing queue
    JoinRandom {
        user_id: UserId,
        connection_id: ConnectionId,
    },
    /// Leave the queue or the current pairing
    LeaveRandom {
        user_id: UserId,
        connection_id: ConnectionId,
    },
    /// Route a chat message or friend request
    RouteMessage {
        user_id: UserId,
        connection_id: ConnectionId,
        route: Route,
    },
    /// Report the current state without changing it
    Snapshot { reply: oneshot::Sender<HubSnapshot> },
}

/// What a client asked the hub to route
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Direct { to: UserId, content: String },
    Random { content: String },
    FriendRequest,
}

/// Point-in-time view of hub state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubSnapshot {
    /// Registered users, sorted
    pub online: Vec<UserId>,
    /// Waiting queue, front first
    pub queued: Vec<UserId>,
    /// Pairing links, each listed once with the smaller id first, sorted
    pub pairs: Vec<(UserId, UserId)>,
    /// Pending friend requests as (requester, target), sorted
    pub friend_requests: Vec<(UserId, UserId)>,
}

/// The Hub actor
///
/// Sole owner and mutator of registry, queue, pairing links and the
/// pending friend-request table.
pub struct Hub {
    /// Registered clients: UserId -> Client
    pub(crate) clients: HashMap<UserId, Client>,
    /// Users waiting for a random partner
    pub(crate) queue: WaitingQueue,
    /// Pending friend requests: requester -> target
    pub(crate) friend_requests: HashMap<UserId, UserId>,
    pub(crate) friendships: Arc<dyn FriendshipService>,
    pub(crate) messages: Arc<dyn MessageStore>,
    /// Deadline for each collaborator call
    pub(crate) call_timeout: Duration,
    /// Event receiver channel
    receiver: mpsc::Receiver<HubEvent>,
}

impl Hub {
    /// Create a new Hub with the given event receiver and collaborators
    pub fn new(
        receiver: mpsc::Receiver<HubEvent>,
        friendships: Arc<dyn FriendshipService>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            clients: HashMap::new(),
            queue: WaitingQueue::new(),
            friend_requests: HashMap::new(),
            friendships,
            messages,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            receiver,
        }
    }

    /// Set the deadline for collaborator calls
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Run the Hub event loop
    ///
    /// Continuously receives and processes events until all senders are dropped.
    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(event) = self.receiver.recv().await {
            self.handle_event(event).await;
        }

        info!("Hub shutting down");
    }

    /// Process a single event
    pub async fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connected {
                user_id,
                connection_id,
                sender,
            } => {
                self.handle_connected(user_id, connection_id, sender);
            }
            HubEvent::Disconnected {
                user_id,
                connection_id,
            } => {
                self.handle_disconnected(user_id, connection_id);
            }
            HubEvent::JoinRandom {
                user_id,
                connection_id,
            } => {
                if self.is_current(user_id, connection_id) {
                    self.join_random(user_id).await;
                }
            }
            HubEvent::LeaveRandom {
                user_id,
                connection_id,
            } => {
                if self.is_current(user_id, connection_id) {
                    self.leave_random(user_id);
                }
            }
            HubEvent::RouteMessage {
                user_id,
                connection_id,
                route,
            } => {
                if self.is_current(user_id, connection_id) {
                    self.route(user_id, route).await;
                }
            }
            HubEvent::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Check that `connection_id` is the registered connection of `user_id`
    fn is_current(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        let current = self
            .clients
            .get(&user_id)
            .is_some_and(|c| c.connection_id == connection_id);
        if !current {
            debug!(%user_id, %connection_id, "Ignoring event from stale connection");
        }
        current
    }

    /// Handle new client connection
    ///
    /// A previous connection of the same user is evicted first.
    fn handle_connected(
        &mut self,
        user_id: UserId,
        connection_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        if let Some(previous) = self.clients.remove(&user_id) {
            info!(
                %user_id,
                old = %previous.connection_id,
                new = %connection_id,
                "Evicting superseded connection"
            );
            self.release(previous);
        }

        info!(%user_id, %connection_id, "Client connected");
        self.clients
            .insert(user_id, Client::new(user_id, connection_id, sender));
        debug!(
            "Total clients: {}, Queued: {}",
            self.clients.len(),
            self.queue.len()
        );
    }

    /// Handle client disconnection
    fn handle_disconnected(&mut self, user_id: UserId, connection_id: ConnectionId) {
        if !self.is_current(user_id, connection_id) {
            return;
        }

        if let Some(client) = self.clients.remove(&user_id) {
            info!(%user_id, %connection_id, "Client disconnected");
            self.release(client);
        }

        debug!(
            "Total clients: {}, Queued: {}",
            self.clients.len(),
            self.queue.len()
        );
    }

    /// Tear down a client that has already left the registry
    ///
    /// Dropping the record at the end closes its outbound queue.
    fn release(&mut self, client: Client) {
        match client.pairing {
            PairingState::Paired(partner_id) => {
                self.detach_partner(partner_id, client.user_id);
            }
            PairingState::Queued => {
                self.queue.remove(client.user_id);
            }
            PairingState::Idle => {}
        }
        self.clear_friend_requests(client.user_id);
    }

    /// Handle voluntary leave of the queue or the current pairing
    pub(crate) fn leave_random(&mut self, user_id: UserId) {
        let Some(client) = self.clients.get_mut(&user_id) else {
            return;
        };

        let pairing = client.pairing;
        match pairing {
            PairingState::Paired(partner_id) => {
                client.pairing = PairingState::Idle;
                info!(%user_id, partner = %partner_id, "Left random chat");
                self.detach_partner(partner_id, user_id);
                self.clear_friend_requests(user_id);
            }
            PairingState::Queued => {
                client.pairing = PairingState::Idle;
                self.queue.remove(user_id);
                debug!(%user_id, "Left random queue");
            }
            PairingState::Idle => {}
        }
    }

    /// Set both sides of a new pairing and notify them
    pub(crate) fn pair(&mut self, a: UserId, b: UserId) {
        for (me, partner) in [(a, b), (b, a)] {
            if let Some(client) = self.clients.get_mut(&me) {
                client.pairing = PairingState::Paired(partner);
            }
        }

        info!(a = %a, b = %b, "Paired random chat");

        self.notify(a, ServerMessage::RandomJoined { to: a });
        self.notify(b, ServerMessage::RandomJoined { to: b });
    }

    /// Reset the partner of `user_id` to idle and tell it the chat ended
    fn detach_partner(&mut self, partner_id: UserId, user_id: UserId) {
        if let Some(partner) = self.clients.get_mut(&partner_id) {
            if partner.pairing == PairingState::Paired(user_id) {
                partner.pairing = PairingState::Idle;
                self.notify(partner_id, ServerMessage::partner_left());
            }
        }
        self.clear_friend_requests(partner_id);
    }

    /// Drop pending friend requests made by or aimed at a user
    pub(crate) fn clear_friend_requests(&mut self, user_id: UserId) {
        self.friend_requests.remove(&user_id);
        self.friend_requests.retain(|_, target| *target != user_id);
    }

    /// Best-effort delivery to a registered client
    ///
    /// Full or closed queues drop the message.
    pub(crate) fn notify(&self, user_id: UserId, msg: ServerMessage) {
        let Some(client) = self.clients.get(&user_id) else {
            debug!(%user_id, "Dropping message for offline user");
            return;
        };

        if let Err(e) = client.send(msg) {
            warn!(%user_id, "Message dropped: {}", e);
        }
    }

    /// Current state, sorted for stable comparison
    pub fn snapshot(&self) -> HubSnapshot {
        let mut online: Vec<UserId> = self.clients.keys().copied().collect();
        online.sort();

        let mut pairs: Vec<(UserId, UserId)> = self
            .clients
            .values()
            .filter_map(|c| c.partner().map(|p| (c.user_id, p)))
            .filter(|(a, b)| a < b)
            .collect();
        pairs.sort();

        let mut friend_requests: Vec<(UserId, UserId)> = self
            .friend_requests
            .iter()
            .map(|(from, to)| (*from, *to))
            .collect();
        friend_requests.sort();

        HubSnapshot {
            online,
            queued: self.queue.to_vec(),
            pairs,
            friend_requests,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::error::ServiceError;
    use crate::memory::{InMemoryFriendships, InMemoryMessages};

    /// Message store that always fails
    pub(crate) struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn store_message(
            &self,
            _from: UserId,
            _to: UserId,
            _content: &str,
            _timestamp: DateTime<Utc>,
        ) -> Result<(), ServiceError> {
            Err(ServiceError::Unavailable("database down".to_string()))
        }
    }

    /// Friendship service whose calls never finish
    pub(crate) struct HangingFriendships;

    #[async_trait]
    impl FriendshipService for HangingFriendships {
        async fn has_relationship(&self, _a: UserId, _b: UserId) -> Result<bool, ServiceError> {
            std::future::pending().await
        }

        async fn add_friend(&self, _a: UserId, _b: UserId) -> Result<(), ServiceError> {
            std::future::pending().await
        }
    }

    /// Hub plus handles to its collaborators and per-user connections
    pub(crate) struct Harness {
        pub hub: Hub,
        pub friendships: Arc<InMemoryFriendships>,
        pub messages: Arc<InMemoryMessages>,
        pub connections: HashMap<UserId, (ConnectionId, mpsc::Receiver<ServerMessage>)>,
    }

    impl Harness {
        pub fn new() -> Self {
            let friendships = Arc::new(InMemoryFriendships::new());
            let messages = Arc::new(InMemoryMessages::new());
            Self::with(friendships.clone(), messages.clone(), friendships, messages)
        }

        pub fn with(
            friendship_service: Arc<dyn FriendshipService>,
            message_store: Arc<dyn MessageStore>,
            friendships: Arc<InMemoryFriendships>,
            messages: Arc<InMemoryMessages>,
        ) -> Self {
            let (_tx, rx) = mpsc::channel(16);
            Self {
                hub: Hub::new(rx, friendship_service, message_store)
                    .with_call_timeout(Duration::from_millis(100)),
                friendships,
                messages,
                connections: HashMap::new(),
            }
        }

        /// Register a fresh connection for `id`
        pub async fn connect(&mut self, id: i64) -> ConnectionId {
            let user_id = UserId(id);
            let connection_id = ConnectionId::new();
            let (tx, rx) = mpsc::channel(20);
            self.hub
                .handle_event(HubEvent::Connected {
                    user_id,
                    connection_id,
                    sender: tx,
                })
                .await;
            self.connections.insert(user_id, (connection_id, rx));
            connection_id
        }

        fn conn(&self, id: i64) -> ConnectionId {
            self.connections[&UserId(id)].0
        }

        pub async fn disconnect(&mut self, id: i64) {
            let connection_id = self.conn(id);
            self.hub
                .handle_event(HubEvent::Disconnected {
                    user_id: UserId(id),
                    connection_id,
                })
                .await;
        }

        pub async fn join(&mut self, id: i64) {
            let connection_id = self.conn(id);
            self.hub
                .handle_event(HubEvent::JoinRandom {
                    user_id: UserId(id),
                    connection_id,
                })
                .await;
        }

        pub async fn leave(&mut self, id: i64) {
            let connection_id = self.conn(id);
            self.hub
                .handle_event(HubEvent::LeaveRandom {
                    user_id: UserId(id),
                    connection_id,
                })
                .await;
        }

        pub async fn route(&mut self, id: i64, route: Route) {
            let connection_id = self.conn(id);
            self.hub
                .handle_event(HubEvent::RouteMessage {
                    user_id: UserId(id),
                    connection_id,
                    route,
                })
                .await;
        }

        /// Everything queued for `id` so far
        pub fn drain(&mut self, id: i64) -> Vec<ServerMessage> {
            let (_, rx) = self
                .connections
                .get_mut(&UserId(id))
                .expect("unknown test connection");
            let mut out = Vec::new();
            while let Ok(msg) = rx.try_recv() {
                out.push(msg);
            }
            out
        }

        pub fn pairing(&self, id: i64) -> Option<PairingState> {
            self.hub.clients.get(&UserId(id)).map(|c| c.pairing)
        }

        /// Check the registry/queue/pairing invariants
        pub fn assert_consistent(&self) {
            let queued = self.hub.queue.to_vec();
            for id in &queued {
                let client = self.hub.clients.get(id).expect("queued user not registered");
                assert_eq!(client.pairing, PairingState::Queued);
            }
            for client in self.hub.clients.values() {
                match client.pairing {
                    PairingState::Queued => assert!(queued.contains(&client.user_id)),
                    PairingState::Paired(p) => {
                        assert_ne!(p, client.user_id);
                        let partner = self.hub.clients.get(&p).expect("dangling pairing");
                        assert_eq!(partner.pairing, PairingState::Paired(client.user_id));
                        assert!(!queued.contains(&client.user_id));
                    }
                    PairingState::Idle => assert!(!queued.contains(&client.user_id)),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_connect_registers_idle_client() {
        let mut h = Harness::new();
        h.connect(1).await;

        assert_eq!(h.pairing(1), Some(PairingState::Idle));
        assert_eq!(h.hub.snapshot().online, vec![UserId(1)]);
    }

    #[tokio::test]
    async fn test_reconnect_evicts_previous_connection() {
        let mut h = Harness::new();
        let old = h.connect(1).await;
        let (_, mut old_rx) = h.connections.remove(&UserId(1)).unwrap();
        h.connect(2).await;
        h.hub
            .handle_event(HubEvent::JoinRandom {
                user_id: UserId(1),
                connection_id: old,
            })
            .await;
        h.join(2).await;
        assert_eq!(h.pairing(1), Some(PairingState::Paired(UserId(2))));
        old_rx.try_recv().unwrap(); // random_joined

        let new = h.connect(1).await;
        assert_ne!(old, new);

        // the old outbound queue is closed
        assert!(matches!(
            old_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(h.pairing(1), Some(PairingState::Idle));
        assert_eq!(h.pairing(2), Some(PairingState::Idle));
        assert_eq!(
            h.drain(2),
            vec![
                ServerMessage::RandomJoined { to: UserId(2) },
                ServerMessage::partner_left()
            ]
        );

        // late disconnect from the old connection leaves the new one alone
        h.hub
            .handle_event(HubEvent::Disconnected {
                user_id: UserId(1),
                connection_id: old,
            })
            .await;
        assert_eq!(h.pairing(1), Some(PairingState::Idle));
        h.assert_consistent();
    }

    #[tokio::test]
    async fn test_stale_connection_events_ignored() {
        let mut h = Harness::new();
        let old = h.connect(1).await;
        h.connect(1).await;

        h.hub
            .handle_event(HubEvent::JoinRandom {
                user_id: UserId(1),
                connection_id: old,
            })
            .await;
        assert_eq!(h.pairing(1), Some(PairingState::Idle));
        assert!(h.hub.queue.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut h = Harness::new();
        h.connect(1).await;
        h.connect(2).await;
        h.connect(3).await;
        h.join(1).await;
        h.join(2).await;
        h.join(3).await;

        h.disconnect(3).await;
        let once = h.hub.snapshot();
        h.disconnect(3).await;
        assert_eq!(h.hub.snapshot(), once);
        assert!(!once.online.contains(&UserId(3)));
        assert!(once.queued.is_empty());
        h.assert_consistent();
    }

    #[tokio::test]
    async fn test_partner_disconnect_notifies_and_resets() {
        let mut h = Harness::new();
        h.connect(1).await;
        h.connect(2).await;
        h.join(1).await;
        h.join(2).await;
        h.drain(1);

        h.disconnect(2).await;

        assert_eq!(h.drain(1), vec![ServerMessage::partner_left()]);
        assert_eq!(h.pairing(1), Some(PairingState::Idle));
        assert_eq!(h.pairing(2), None);
        h.assert_consistent();
    }

    #[tokio::test]
    async fn test_queued_disconnect_leaves_queue() {
        let mut h = Harness::new();
        h.connect(1).await;
        h.join(1).await;
        assert_eq!(h.hub.queue.to_vec(), vec![UserId(1)]);

        h.disconnect(1).await;
        assert!(h.hub.queue.is_empty());
        assert!(h.hub.clients.is_empty());
    }

    #[tokio::test]
    async fn test_leave_before_pairing() {
        let mut h = Harness::new();
        h.connect(1).await;
        h.join(1).await;
        h.leave(1).await;

        assert!(h.hub.queue.is_empty());
        assert_eq!(h.pairing(1), Some(PairingState::Idle));
        assert!(h.drain(1).is_empty());
    }

    #[tokio::test]
    async fn test_leave_while_paired() {
        let mut h = Harness::new();
        h.connect(1).await;
        h.connect(2).await;
        h.join(1).await;
        h.join(2).await;
        h.drain(1);
        h.drain(2);

        h.leave(1).await;

        assert_eq!(h.pairing(1), Some(PairingState::Idle));
        assert_eq!(h.pairing(2), Some(PairingState::Idle));
        assert_eq!(h.drain(2), vec![ServerMessage::partner_left()]);
        assert!(h.drain(1).is_empty());

        // leaving again is a no-op
        h.leave(1).await;
        assert!(h.drain(2).is_empty());
        h.assert_consistent();
    }

    #[tokio::test]
    async fn test_notification_dropped_when_queue_full() {
        let mut h = Harness::new();
        let user_id = UserId(1);
        let (tx, mut rx) = mpsc::channel(1);
        h.hub
            .handle_event(HubEvent::Connected {
                user_id,
                connection_id: ConnectionId::new(),
                sender: tx,
            })
            .await;

        h.hub.notify(user_id, ServerMessage::FriendRequest);
        h.hub.notify(user_id, ServerMessage::FriendRequestSuccess);

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::FriendRequest);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_answers_snapshot() {
        let (tx, rx) = mpsc::channel(8);
        let hub = Hub::new(
            rx,
            Arc::new(InMemoryFriendships::new()),
            Arc::new(InMemoryMessages::new()),
        );
        let handle = tokio::spawn(hub.run());

        let (out_tx, _out_rx) = mpsc::channel(4);
        tx.send(HubEvent::Connected {
            user_id: UserId(4),
            connection_id: ConnectionId::new(),
            sender: out_tx,
        })
        .await
        .unwrap();

        let (reply, snapshot) = oneshot::channel();
        tx.send(HubEvent::Snapshot { reply }).await.unwrap();
        assert_eq!(snapshot.await.unwrap().online, vec![UserId(4)]);

        drop(tx);
        handle.await.unwrap();
    }
}
