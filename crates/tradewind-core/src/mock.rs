//! In-memory collaborator doubles for deterministic testing.
//!
//! Each double implements one of the traits in [`crate::traits`], records the
//! calls it receives, and can be told to fail so error paths are testable
//! without a database or a chat platform.
//!
//! ## Usage
//!
//! ```rust
//! use tradewind_core::mock::InMemoryEntityRegistry;
//!
//! let registry = InMemoryEntityRegistry::new()
//!     .with_port("Port Royal", &["Port Royale"], Some("Caribbean"))
//!     .with_item("Cannon", &[]);
//! assert_eq!(registry.len(), 2);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::clock::{Clock, SystemClock};
use crate::defaults::{MARKET_ORDER_TTL_DAYS, ORDER_SEARCH_LIMIT, PLAYER_ORDER_TTL_DAYS};
use crate::error::{Error, Result};
use crate::models::*;
use crate::traits::*;

fn injected(what: &str) -> Error {
    Error::Internal(format!("injected {what} failure"))
}

// =============================================================================
// ENTITY REGISTRY
// =============================================================================

/// Registry double keeping entities in insertion order.
#[derive(Clone, Default)]
pub struct InMemoryEntityRegistry {
    entities: Arc<Mutex<Vec<CanonicalEntity>>>,
    fail_lookups: Arc<AtomicBool>,
    list_calls: Arc<AtomicUsize>,
}

impl InMemoryEntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: EntityKind, name: &str, aliases: &[&str], metadata: EntityMetadata) {
        let mut entities = self.entities.lock().unwrap();
        let id = entities.len() as EntityId + 1;
        entities.push(CanonicalEntity {
            id,
            kind,
            name: name.to_string(),
            display_name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            metadata,
        });
    }

    pub fn with_port(self, name: &str, aliases: &[&str], region: Option<&str>) -> Self {
        self.push(
            EntityKind::Port,
            name,
            aliases,
            EntityMetadata::Port {
                region: region.map(str::to_string),
            },
        );
        self
    }

    pub fn with_item(self, name: &str, aliases: &[&str]) -> Self {
        self.push(
            EntityKind::Item,
            name,
            aliases,
            EntityMetadata::Item {
                is_tagged: false,
                tags: Vec::new(),
            },
        );
        self
    }

    /// Make every lookup fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.fail_lookups.store(failing, Ordering::SeqCst);
    }

    /// Number of `list_candidates` calls (fuzzy passes) so far.
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entities.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, kind: EntityKind, name: &str) -> Option<CanonicalEntity> {
        let name = name.to_lowercase();
        self.entities
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.kind == kind && e.name.to_lowercase() == name)
            .cloned()
    }

    fn check(&self) -> Result<()> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            Err(injected("registry"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EntityRegistry for InMemoryEntityRegistry {
    async fn list_candidates(&self, kind: EntityKind) -> Result<Vec<CanonicalEntity>> {
        self.check()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .entities
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect())
    }

    async fn get_by_exact_name(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Option<CanonicalEntity>> {
        self.check()?;
        Ok(self.find(kind, name))
    }

    async fn get_by_alias(
        &self,
        kind: EntityKind,
        alias: &str,
    ) -> Result<Option<CanonicalEntity>> {
        self.check()?;
        Ok(self
            .entities
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.kind == kind && e.has_alias(alias))
            .cloned())
    }

    async fn get(&self, kind: EntityKind, id: EntityId) -> Result<Option<CanonicalEntity>> {
        self.check()?;
        Ok(self
            .entities
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.kind == kind && e.id == id)
            .cloned())
    }

    async fn create_entity(&self, req: NewEntity) -> Result<CanonicalEntity> {
        self.check()?;
        if self.find(req.kind, &req.name).is_some() {
            return Err(Error::Conflict(format!(
                "{} '{}' already exists",
                req.kind, req.name
            )));
        }
        let metadata = match req.kind {
            EntityKind::Port => EntityMetadata::Port { region: req.region },
            EntityKind::Item => EntityMetadata::Item {
                is_tagged: false,
                tags: Vec::new(),
            },
        };
        let mut entities = self.entities.lock().unwrap();
        let entity = CanonicalEntity {
            id: entities.len() as EntityId + 1,
            kind: req.kind,
            name: req.name,
            display_name: req.display_name,
            aliases: Vec::new(),
            metadata,
        };
        entities.push(entity.clone());
        Ok(entity)
    }
}

// =============================================================================
// MARKETS
// =============================================================================

/// A committed line held by [`InMemoryMarketRepository`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMarketLine {
    pub port_id: EntityId,
    pub order_type: OrderType,
    pub line: OrderLine,
    pub expires_at: DateTime<Utc>,
}

/// Market double recording every replacement and holding the live lines.
#[derive(Clone)]
pub struct InMemoryMarketRepository {
    commits: Arc<Mutex<Vec<ReplaceOrdersRequest>>>,
    lines: Arc<Mutex<Vec<StoredMarketLine>>>,
    failing: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryMarketRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMarketRepository {
    pub fn new() -> Self {
        Self {
            commits: Arc::default(),
            lines: Arc::default(),
            failing: Arc::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn commits(&self) -> Vec<ReplaceOrdersRequest> {
        self.commits.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<StoredMarketLine> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketRepository for InMemoryMarketRepository {
    async fn replace_orders(&self, req: ReplaceOrdersRequest) -> Result<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(injected("market commit"));
        }
        let expires_at = self.clock.now() + Duration::days(MARKET_ORDER_TTL_DAYS);
        let count = req.orders.len() as u64;
        {
            let mut lines = self.lines.lock().unwrap();
            lines.retain(|l| !(l.port_id == req.port_id && l.order_type == req.order_type));
            lines.extend(req.orders.iter().map(|line| StoredMarketLine {
                port_id: req.port_id,
                order_type: req.order_type,
                line: *line,
                expires_at,
            }));
        }
        self.commits.lock().unwrap().push(req);
        Ok(count)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(injected("market purge"));
        }
        let mut lines = self.lines.lock().unwrap();
        let before = lines.len();
        lines.retain(|l| l.expires_at > now);
        Ok((before - lines.len()) as u64)
    }
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// Player profiles keyed by user id.
#[derive(Clone, Default)]
pub struct InMemoryTradeDirectory {
    profiles: Arc<Mutex<HashMap<UserId, PlayerProfile>>>,
}

impl InMemoryTradeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, user_id: &str, display_name: &str) -> Self {
        self.profiles.lock().unwrap().insert(
            user_id.to_string(),
            PlayerProfile {
                user_id: user_id.to_string(),
                display_name: Some(display_name.to_string()),
            },
        );
        self
    }
}

#[async_trait]
impl TradeDirectory for InMemoryTradeDirectory {
    async fn get_profile(&self, user_id: &str) -> Result<Option<PlayerProfile>> {
        Ok(self.profiles.lock().unwrap().get(user_id).cloned())
    }

    async fn set_display_name(&self, user_id: &str, display_name: &str) -> Result<()> {
        self.profiles.lock().unwrap().insert(
            user_id.to_string(),
            PlayerProfile {
                user_id: user_id.to_string(),
                display_name: Some(display_name.to_string()),
            },
        );
        Ok(())
    }
}

// =============================================================================
// PLAYER ORDERS
// =============================================================================

/// Player order double. Openness is judged against the injected clock.
#[derive(Clone)]
pub struct InMemoryPlayerOrderRepository {
    orders: Arc<Mutex<Vec<PlayerOrder>>>,
    failing: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryPlayerOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlayerOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: Arc::default(),
            failing: Arc::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Add a sell order for item 1 posted by `user_id` that expires in a week.
    pub fn with_order(self, order_id: i64, user_id: &str, ingame_name: &str) -> Self {
        let now = self.clock.now();
        self.insert(PlayerOrder {
            id: order_id,
            user_id: user_id.to_string(),
            item_id: 1,
            item_name: "Rum".to_string(),
            order_type: OrderType::Sell,
            price: 100,
            quantity: 1,
            port_id: None,
            port_name: None,
            notes: None,
            ingame_name: ingame_name.to_string(),
            status: PlayerOrderStatus::Active,
            created_at: now,
            expires_at: now + Duration::days(PLAYER_ORDER_TTL_DAYS),
        });
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn insert(&self, order: PlayerOrder) {
        self.orders.lock().unwrap().push(order);
    }

    pub fn get(&self, order_id: i64) -> Option<PlayerOrder> {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
    }

    fn check(&self, what: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(injected(what));
        }
        Ok(())
    }

    /// Open orders passing `keep`, newest first.
    fn open_where(&self, keep: impl Fn(&PlayerOrder) -> bool) -> Vec<PlayerOrder> {
        let now = self.clock.now();
        let mut out: Vec<PlayerOrder> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.is_open(now) && keep(o))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }

    fn transition(&self, order_id: i64, owner: Option<&str>, to: PlayerOrderStatus) -> bool {
        let mut orders = self.orders.lock().unwrap();
        match orders.iter_mut().find(|o| {
            o.id == order_id
                && o.status == PlayerOrderStatus::Active
                && owner.map_or(true, |u| o.user_id == u)
        }) {
            Some(order) => {
                order.status = to;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PlayerOrderRepository for InMemoryPlayerOrderRepository {
    async fn create_order(&self, req: NewPlayerOrder) -> Result<PlayerOrder> {
        self.check("order create")?;
        let mut orders = self.orders.lock().unwrap();
        let order = PlayerOrder {
            id: orders.iter().map(|o| o.id).max().unwrap_or(0) + 1,
            user_id: req.user_id,
            item_id: req.item_id,
            item_name: String::new(),
            order_type: req.order_type,
            price: req.price,
            quantity: req.quantity,
            port_id: req.port_id,
            port_name: None,
            notes: req.notes,
            ingame_name: req.ingame_name,
            status: PlayerOrderStatus::Active,
            created_at: self.clock.now(),
            expires_at: req.expires_at,
        };
        orders.push(order.clone());
        Ok(order)
    }

    async fn get_active_order(&self, order_id: i64) -> Result<Option<PlayerOrder>> {
        self.check("order lookup")?;
        Ok(self.open_where(|o| o.id == order_id).into_iter().next())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<PlayerOrder>> {
        self.check("order list")?;
        Ok(self.open_where(|o| o.user_id == user_id))
    }

    async fn search(&self, query: &OrderSearch) -> Result<Vec<PlayerOrder>> {
        self.check("order search")?;
        let mut found = self.open_where(|o| query.matches(o));
        found.truncate(if query.limit == 0 {
            ORDER_SEARCH_LIMIT
        } else {
            query.limit
        });
        Ok(found)
    }

    async fn cancel(&self, order_id: i64, user_id: &str) -> Result<bool> {
        self.check("order cancel")?;
        Ok(self.transition(order_id, Some(user_id), PlayerOrderStatus::Cancelled))
    }

    async fn complete(&self, order_id: i64) -> Result<bool> {
        self.check("order complete")?;
        Ok(self.transition(order_id, None, PlayerOrderStatus::Completed))
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64> {
        self.check("order expiry")?;
        let mut expired = 0;
        for order in self.orders.lock().unwrap().iter_mut() {
            if order.status == PlayerOrderStatus::Active && order.expires_at <= now {
                order.status = PlayerOrderStatus::Cancelled;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// Durable conversation double.
#[derive(Clone)]
pub struct InMemoryConversationRepository {
    rows: Arc<Mutex<Vec<TradeConversation>>>,
    fail_create: Arc<AtomicBool>,
    fail_close: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryConversationRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self {
            rows: Arc::default(),
            fail_create: Arc::default(),
            fail_close: Arc::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn set_fail_create(&self, failing: bool) {
        self.fail_create.store(failing, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, failing: bool) {
        self.fail_close.store(failing, Ordering::SeqCst);
    }

    /// Seed a row directly (e.g. a conversation left open before a restart).
    pub fn insert(&self, row: TradeConversation) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn rows(&self) -> Vec<TradeConversation> {
        self.rows.lock().unwrap().clone()
    }

    pub fn get_row(&self, id: i64) -> Option<TradeConversation> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn create(&self, req: NewConversation) -> Result<TradeConversation> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(injected("conversation create"));
        }
        let now = self.clock.now();
        let mut rows = self.rows.lock().unwrap();
        let row = TradeConversation {
            id: rows.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            order_id: req.order_id,
            initiator_id: req.initiator_id,
            initiator_name: req.initiator_name,
            counterpart_id: req.counterpart_id,
            counterpart_name: req.counterpart_name,
            status: ConversationStatus::Active,
            created_at: now,
            last_activity: now,
            closed_at: None,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn close(&self, id: i64) -> Result<bool> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(injected("conversation close"));
        }
        let now = self.clock.now();
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|r| r.id == id && r.status == ConversationStatus::Active)
        {
            Some(row) => {
                row.status = ConversationStatus::Closed;
                row.closed_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|r| r.id == id) {
            row.last_activity = at;
        }
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<TradeConversation>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == ConversationStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<TradeConversation>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == ConversationStatus::Active && r.last_activity < cutoff)
            .cloned()
            .collect())
    }
}

// =============================================================================
// MESSAGING
// =============================================================================

/// A direct message captured by [`RecordingMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub user_id: UserId,
    pub text: String,
}

/// Messenger double that records deliveries and can refuse specific users.
#[derive(Clone, Default)]
pub struct RecordingMessenger {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    unreachable: Arc<Mutex<HashSet<UserId>>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries to this user fail (closed DMs).
    pub fn with_unreachable(self, user_id: &str) -> Self {
        self.unreachable.lock().unwrap().insert(user_id.to_string());
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn messages_to(&self, user_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(user_id) {
            return Err(Error::Messaging(format!("cannot DM user {user_id}")));
        }
        self.sent.lock().unwrap().push(SentMessage {
            user_id: user_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
