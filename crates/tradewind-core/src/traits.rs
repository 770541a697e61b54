//! Collaborator traits for tradewind.
//!
//! Storage and messaging backends implement these; the workflow services
//! only ever see the traits, so they can run against the in-memory doubles
//! in [`crate::mock`] during tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::*;

// =============================================================================
// REGISTRY
// =============================================================================

/// Canonical entity registry (items and ports).
#[async_trait]
pub trait EntityRegistry: Send + Sync {
    /// Every entity of a kind, in registry (insertion) order.
    async fn list_candidates(&self, kind: EntityKind) -> Result<Vec<CanonicalEntity>>;

    /// Case-insensitive lookup by canonical name.
    async fn get_by_exact_name(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Option<CanonicalEntity>>;

    /// Case-insensitive lookup by alias.
    async fn get_by_alias(&self, kind: EntityKind, alias: &str)
        -> Result<Option<CanonicalEntity>>;

    /// Fetch by id.
    async fn get(&self, kind: EntityKind, id: EntityId) -> Result<Option<CanonicalEntity>>;

    /// Create an entity. A case-insensitive name collision is a `Conflict`.
    async fn create_entity(&self, req: NewEntity) -> Result<CanonicalEntity>;
}

// =============================================================================
// MARKETS
// =============================================================================

/// Committed market orders.
#[async_trait]
pub trait MarketRepository: Send + Sync {
    /// Replace all orders for (port, order type) in one all-or-nothing step.
    /// Returns the number of inserted lines.
    async fn replace_orders(&self, req: ReplaceOrdersRequest) -> Result<u64>;

    /// Delete rows whose `expires_at <= now`. Returns rows removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Player profiles (in-game names).
#[async_trait]
pub trait TradeDirectory: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<PlayerProfile>>;

    async fn set_display_name(&self, user_id: &str, display_name: &str) -> Result<()>;
}

// =============================================================================
// PLAYER ORDERS
// =============================================================================

/// Orders players post for others to contact them about.
#[async_trait]
pub trait PlayerOrderRepository: Send + Sync {
    async fn create_order(&self, req: NewPlayerOrder) -> Result<PlayerOrder>;

    /// An order that is active and not past its expiry.
    async fn get_active_order(&self, order_id: i64) -> Result<Option<PlayerOrder>>;

    /// Open orders posted by `user_id`, newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<PlayerOrder>>;

    /// Open orders passing every set filter, newest first, at most `limit`.
    async fn search(&self, query: &OrderSearch) -> Result<Vec<PlayerOrder>>;

    /// Cancel an active order owned by `user_id`. False when there is no
    /// such order.
    async fn cancel(&self, order_id: i64, user_id: &str) -> Result<bool>;

    /// Mark an active order completed. False when it is not active.
    async fn complete(&self, order_id: i64) -> Result<bool>;

    /// Cancel active orders whose `expires_at <= now`. Returns the count.
    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64>;
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// Durable trade conversation store.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create(&self, req: NewConversation) -> Result<TradeConversation>;

    /// Mark closed. Returns false if the row was already closed or missing.
    async fn close(&self, id: i64) -> Result<bool>;

    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Rows with `status = active`.
    async fn list_active(&self) -> Result<Vec<TradeConversation>>;

    /// Active rows whose last activity is older than `cutoff`.
    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<TradeConversation>>;
}

// =============================================================================
// MESSAGING
// =============================================================================

/// Outbound direct messages.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()>;
}
