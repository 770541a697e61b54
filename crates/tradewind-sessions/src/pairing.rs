//! Exclusive pairing registry for trade conversations.
//!
//! Each live conversation is indexed under both participants' user ids and
//! holds a single last-activity timestamp, so a touch from either side keeps
//! the pair alive. A user id is never mapped to more than one live
//! conversation; [`PairingRegistry::try_register`] checks both participants
//! and inserts under one lock.
//!
//! A conversation is live while `now - last_activity <= timeout`. Liveness
//! is evaluated on every read; [`PairingRegistry::take_expired`] removes stale
//! entries for the sweeper.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tradewind_core::{Clock, TradeConversation, UserId};
use uuid::Uuid;

/// One side of a pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub user_id: UserId,
    pub display_name: String,
}

impl Participant {
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A live pairing between two users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveConversation {
    /// In-process identity, stable even before a durable id exists.
    pub key: Uuid,
    /// Durable `trade_conversations.id`, attached after the row is written.
    pub conversation_id: Option<i64>,
    pub order_id: i64,
    pub initiator: Participant,
    pub counterpart: Participant,
    pub last_activity: DateTime<Utc>,
}

impl ActiveConversation {
    pub fn new(
        order_id: i64,
        initiator: Participant,
        counterpart: Participant,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: Uuid::now_v7(),
            conversation_id: None,
            order_id,
            initiator,
            counterpart,
            last_activity: now,
        }
    }

    /// Rebuild from a durable row during recovery.
    pub fn from_record(row: &TradeConversation) -> Self {
        Self {
            key: Uuid::now_v7(),
            conversation_id: Some(row.id),
            order_id: row.order_id,
            initiator: Participant::new(row.initiator_id.clone(), row.initiator_name.clone()),
            counterpart: Participant::new(
                row.counterpart_id.clone(),
                row.counterpart_name.clone(),
            ),
            last_activity: row.last_activity,
        }
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        if self.initiator.user_id == user_id {
            Some(&self.initiator)
        } else if self.counterpart.user_id == user_id {
            Some(&self.counterpart)
        } else {
            None
        }
    }

    /// The participant that is not `user_id`.
    pub fn other_party(&self, user_id: &str) -> Option<&Participant> {
        if self.initiator.user_id == user_id {
            Some(&self.counterpart)
        } else if self.counterpart.user_id == user_id {
            Some(&self.initiator)
        } else {
            None
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity <= timeout
    }

    fn user_ids(&self) -> [&str; 2] {
        [self.initiator.user_id.as_str(), self.counterpart.user_id.as_str()]
    }
}

#[derive(Default)]
struct Inner {
    by_user: HashMap<UserId, Uuid>,
    conversations: HashMap<Uuid, ActiveConversation>,
}

impl Inner {
    fn live_for(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Option<&ActiveConversation> {
        self.by_user
            .get(user_id)
            .and_then(|key| self.conversations.get(key))
            .filter(|c| c.is_live(now, timeout))
    }

    fn insert(&mut self, conversation: ActiveConversation) {
        for user in conversation.user_ids() {
            self.by_user.insert(user.to_string(), conversation.key);
        }
        self.conversations.insert(conversation.key, conversation);
    }

    fn relink(&mut self, conversation: ActiveConversation) {
        for user in conversation.user_ids() {
            self.by_user
                .entry(user.to_string())
                .or_insert(conversation.key);
        }
        self.conversations.insert(conversation.key, conversation);
    }

    fn unlink(&mut self, conversation: &ActiveConversation) {
        for user in conversation.user_ids() {
            if self.by_user.get(user) == Some(&conversation.key) {
                self.by_user.remove(user);
            }
        }
    }
}

/// Registry of live trade conversations.
#[derive(Clone)]
pub struct PairingRegistry {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl PairingRegistry {
    pub fn new(clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register a new pairing if and only if neither participant holds a
    /// live conversation. The check and both inserts happen under one lock.
    ///
    /// A participant whose previous conversation has timed out counts as
    /// free; the stale conversation stays put until the sweep removes it.
    pub async fn try_register(&self, conversation: ActiveConversation) -> bool {
        if conversation.initiator.user_id == conversation.counterpart.user_id {
            warn!(user_id = %conversation.initiator.user_id, "Refusing self pairing");
            return false;
        }
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        let busy = conversation
            .user_ids()
            .iter()
            .any(|u| inner.live_for(u, now, self.timeout).is_some());
        if busy {
            debug!(
                initiator = %conversation.initiator.user_id,
                counterpart = %conversation.counterpart.user_id,
                "Pairing refused"
            );
            return false;
        }
        info!(
            initiator = %conversation.initiator.user_id,
            counterpart = %conversation.counterpart.user_id,
            order_id = conversation.order_id,
            "Conversation registered"
        );
        inner.insert(conversation);
        true
    }

    /// Insert without the exclusivity check. Startup recovery only.
    pub async fn register(&self, conversation: ActiveConversation) {
        let mut inner = self.inner.lock().await;
        debug!(
            conversation_id = ?conversation.conversation_id,
            "Conversation recovered"
        );
        inner.insert(conversation);
    }

    /// Live conversation for `user_id`, if any.
    pub async fn get_by_user(&self, user_id: &str) -> Option<ActiveConversation> {
        let now = self.clock.now();
        self.inner
            .lock()
            .await
            .live_for(user_id, now, self.timeout)
            .cloned()
    }

    pub async fn has_active(&self, user_id: &str) -> bool {
        self.get_by_user(user_id).await.is_some()
    }

    /// Refresh the shared last-activity timestamp through either
    /// participant. A timed-out conversation is not revived.
    pub async fn touch(&self, user_id: &str) -> Option<ActiveConversation> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        let key = *inner.by_user.get(user_id)?;
        let conversation = inner.conversations.get_mut(&key)?;
        if !conversation.is_live(now, self.timeout) {
            return None;
        }
        conversation.last_activity = now;
        Some(conversation.clone())
    }

    /// Attach the durable id once the row exists.
    pub async fn attach_conversation_id(&self, key: Uuid, conversation_id: i64) -> bool {
        match self.inner.lock().await.conversations.get_mut(&key) {
            Some(c) => {
                c.conversation_id = Some(conversation_id);
                true
            }
            None => false,
        }
    }

    /// Remove this conversation. User keys are cleared only while they still
    /// point at it, so a newer pairing that reused a key is left alone.
    pub async fn remove(&self, conversation: &ActiveConversation) -> bool {
        let mut inner = self.inner.lock().await;
        inner.unlink(conversation);
        let removed = inner.conversations.remove(&conversation.key).is_some();
        if removed {
            debug!(conversation_id = ?conversation.conversation_id, "Conversation removed");
        }
        removed
    }

    /// Atomically remove and return every timed-out conversation.
    pub async fn take_expired(&self) -> Vec<ActiveConversation> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        let stale: Vec<Uuid> = inner
            .conversations
            .values()
            .filter(|c| !c.is_live(now, self.timeout))
            .map(|c| c.key)
            .collect();
        let mut expired = Vec::with_capacity(stale.len());
        for key in stale {
            if let Some(c) = inner.conversations.remove(&key) {
                inner.unlink(&c);
                expired.push(c);
            }
        }
        expired
    }

    /// Put back a conversation the sweep took but could not close, so the
    /// next pass retries it. User keys claimed by a newer pairing in the
    /// meantime stay with that pairing.
    pub async fn restore(&self, conversation: ActiveConversation) {
        debug!(conversation_id = ?conversation.conversation_id, "Conversation restored");
        self.inner.lock().await.relink(conversation);
    }

    /// Whether the registry holds (live or not yet swept) this durable id.
    pub async fn tracks_conversation(&self, conversation_id: i64) -> bool {
        self.inner
            .lock()
            .await
            .conversations
            .values()
            .any(|c| c.conversation_id == Some(conversation_id))
    }

    /// Conversations currently held, stale-but-unswept included.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.conversations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
