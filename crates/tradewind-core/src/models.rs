//! Core data models for tradewind.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defaults::{HIGH_CONFIDENCE_THRESHOLD, MEDIUM_CONFIDENCE_THRESHOLD, ORDER_SEARCH_LIMIT};

/// Platform user id (Discord snowflake, kept opaque).
pub type UserId = String;

/// Storage id of a canonical item or port.
pub type EntityId = i64;

// =============================================================================
// CANONICAL ENTITIES
// =============================================================================

/// Kind of canonical entity held by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Item,
    Port,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Item => "item",
            EntityKind::Port => "port",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific attributes of a canonical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityMetadata {
    Item {
        /// Whether the item carries any tag flag.
        is_tagged: bool,
        tags: Vec<String>,
    },
    Port {
        region: Option<String>,
    },
}

/// Authoritative registry record (item or port).
///
/// Owned by storage; the resolver only ever sees snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    pub metadata: EntityMetadata,
}

impl CanonicalEntity {
    /// Case-insensitive alias membership.
    pub fn has_alias(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        self.aliases.iter().any(|a| a.to_lowercase() == candidate)
    }

    /// Region for ports, `None` for items.
    pub fn region(&self) -> Option<&str> {
        match &self.metadata {
            EntityMetadata::Port { region } => region.as_deref(),
            EntityMetadata::Item { .. } => None,
        }
    }
}

/// Request to create a canonical entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntity {
    pub kind: EntityKind,
    pub name: String,
    pub display_name: String,
    /// Only meaningful for ports.
    pub region: Option<String>,
    pub created_by: UserId,
}

// =============================================================================
// MATCHING
// =============================================================================

/// Discretized confidence derived from a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
    Exact,
}

impl Confidence {
    /// Tier for a fuzzy score. Exact is never produced here; it is reserved
    /// for authoritative name and alias hits.
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_CONFIDENCE_THRESHOLD {
            Confidence::High
        } else if score >= MEDIUM_CONFIDENCE_THRESHOLD {
            Confidence::Medium
        } else if score > 0.0 {
            Confidence::Low
        } else {
            Confidence::None
        }
    }

    /// Tiers that may be accepted without asking the user.
    pub fn is_auto_accept(&self) -> bool {
        matches!(self, Confidence::Exact | Confidence::High)
    }
}

/// How a match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
    ExactName,
    Alias,
    Fuzzy,
}

/// One resolution candidate. Created per call, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub entity: Option<CanonicalEntity>,
    pub score: f64,
    pub confidence: Confidence,
    pub origin: Option<MatchOrigin>,
}

impl MatchResult {
    pub fn exact(entity: CanonicalEntity, origin: MatchOrigin) -> Self {
        Self {
            entity: Some(entity),
            score: 1.0,
            confidence: Confidence::Exact,
            origin: Some(origin),
        }
    }

    pub fn fuzzy(entity: CanonicalEntity, score: f64) -> Self {
        Self {
            entity: Some(entity),
            score,
            confidence: Confidence::from_score(score),
            origin: Some(MatchOrigin::Fuzzy),
        }
    }

    pub fn no_match() -> Self {
        Self {
            entity: None,
            score: 0.0,
            confidence: Confidence::None,
            origin: None,
        }
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        self.entity.as_ref().map(|e| e.id)
    }
}

// =============================================================================
// ORDERS
// =============================================================================

/// Market side of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Buy,
    Sell,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Buy => "buy",
            OrderType::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(OrderType::Buy),
            "sell" => Ok(OrderType::Sell),
            other => Err(format!("unrecognized order type: {other}")),
        }
    }
}

/// One committed order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: EntityId,
    pub price: i64,
    pub quantity: i64,
}

/// Atomic replacement of a port's orders of one type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceOrdersRequest {
    pub port_id: EntityId,
    pub order_type: OrderType,
    pub orders: Vec<OrderLine>,
    pub submitter: UserId,
    /// Hex digest identifying the screenshot or payload the orders came from.
    pub provenance_hash: String,
}

// =============================================================================
// PLAYER ORDERS
// =============================================================================

/// Lifecycle of a player-posted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerOrderStatus {
    Active,
    Completed,
    Cancelled,
}

impl PlayerOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerOrderStatus::Active => "active",
            PlayerOrderStatus::Completed => "completed",
            PlayerOrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for PlayerOrderStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(PlayerOrderStatus::Active),
            "completed" => Ok(PlayerOrderStatus::Completed),
            "cancelled" => Ok(PlayerOrderStatus::Cancelled),
            other => Err(format!("unknown player order status: {other}")),
        }
    }
}

/// An order a player posted for others to respond to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerOrder {
    pub id: i64,
    /// Player who posted the order.
    pub user_id: UserId,
    pub item_id: EntityId,
    pub item_name: String,
    pub order_type: OrderType,
    pub price: i64,
    pub quantity: i64,
    pub port_id: Option<EntityId>,
    pub port_name: Option<String>,
    pub notes: Option<String>,
    /// Poster's in-game name at the time of posting.
    pub ingame_name: String,
    pub status: PlayerOrderStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PlayerOrder {
    /// Active and not yet past its expiry.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == PlayerOrderStatus::Active && self.expires_at > now
    }
}

/// Request to post a player order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlayerOrder {
    pub user_id: UserId,
    pub item_id: EntityId,
    pub order_type: OrderType,
    pub price: i64,
    pub quantity: i64,
    pub port_id: Option<EntityId>,
    pub notes: Option<String>,
    pub ingame_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Filters for searching open player orders. Unset filters match anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSearch {
    pub item_id: Option<EntityId>,
    pub order_type: Option<OrderType>,
    pub port_id: Option<EntityId>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub limit: usize,
}

impl Default for OrderSearch {
    fn default() -> Self {
        Self {
            item_id: None,
            order_type: None,
            port_id: None,
            min_price: None,
            max_price: None,
            limit: ORDER_SEARCH_LIMIT,
        }
    }
}

impl OrderSearch {
    /// Whether `order` passes every set filter. Openness is checked separately.
    pub fn matches(&self, order: &PlayerOrder) -> bool {
        self.item_id.map_or(true, |id| order.item_id == id)
            && self.order_type.map_or(true, |t| order.order_type == t)
            && self.port_id.map_or(true, |id| order.port_id == Some(id))
            && self.min_price.map_or(true, |p| order.price >= p)
            && self.max_price.map_or(true, |p| order.price <= p)
    }
}

/// Player profile holding the in-game display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub user_id: UserId,
    pub display_name: Option<String>,
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// Durable status of a trade conversation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ConversationStatus::Active),
            "closed" => Ok(ConversationStatus::Closed),
            other => Err(format!("unknown conversation status: {other}")),
        }
    }
}

/// Durable `trade_conversations` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeConversation {
    pub id: i64,
    pub order_id: i64,
    pub initiator_id: UserId,
    pub initiator_name: String,
    pub counterpart_id: UserId,
    pub counterpart_name: String,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Request to persist a new conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversation {
    pub order_id: i64,
    pub initiator_id: UserId,
    pub initiator_name: String,
    pub counterpart_id: UserId,
    pub counterpart_name: String,
}

/// Inbound direct message from the messaging platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender_id: UserId,
    pub text: String,
    /// Attachment URLs.
    pub attachments: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, aliases: &[&str]) -> CanonicalEntity {
        CanonicalEntity {
            id: 1,
            kind: EntityKind::Port,
            name: name.to_string(),
            display_name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            metadata: EntityMetadata::Port {
                region: Some("Caribbean".to_string()),
            },
        }
    }

    #[test]
    fn test_confidence_from_score_boundaries() {
        assert_eq!(Confidence::from_score(1.0), Confidence::High);
        assert_eq!(Confidence::from_score(0.85), Confidence::High);
        assert_eq!(Confidence::from_score(0.849), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.60), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.599), Confidence::Low);
        assert_eq!(Confidence::from_score(0.0), Confidence::None);
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::Exact > Confidence::High);
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert!(Confidence::Low > Confidence::None);
    }

    #[test]
    fn test_auto_accept_tiers() {
        assert!(Confidence::Exact.is_auto_accept());
        assert!(Confidence::High.is_auto_accept());
        assert!(!Confidence::Medium.is_auto_accept());
    }

    #[test]
    fn test_has_alias_case_insensitive() {
        let p = port("Port Royal", &["Port Royale"]);
        assert!(p.has_alias("port royale"));
        assert!(p.has_alias("PORT ROYALE"));
        assert!(!p.has_alias("Port Royal"));
        assert_eq!(p.region(), Some("Caribbean"));
    }

    #[test]
    fn test_order_type_from_str() {
        assert_eq!("buy".parse::<OrderType>().unwrap(), OrderType::Buy);
        assert_eq!(" SELL ".parse::<OrderType>().unwrap(), OrderType::Sell);
        assert!("trade".parse::<OrderType>().is_err());
    }

    #[test]
    fn test_conversation_status_roundtrip_str() {
        for status in [ConversationStatus::Active, ConversationStatus::Closed] {
            assert_eq!(status.as_str().parse::<ConversationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_player_order_status_roundtrip_str() {
        for status in [
            PlayerOrderStatus::Active,
            PlayerOrderStatus::Completed,
            PlayerOrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<PlayerOrderStatus>().unwrap(), status);
        }
        assert!("expired".parse::<PlayerOrderStatus>().is_err());
    }

    fn player_order(price: i64, port_id: Option<EntityId>) -> PlayerOrder {
        let now = Utc::now();
        PlayerOrder {
            id: 1,
            user_id: "u".to_string(),
            item_id: 3,
            item_name: "Rum".to_string(),
            order_type: OrderType::Sell,
            price,
            quantity: 10,
            port_id,
            port_name: None,
            notes: None,
            ingame_name: "Anne".to_string(),
            status: PlayerOrderStatus::Active,
            created_at: now,
            expires_at: now + chrono::Duration::days(1),
        }
    }

    #[test]
    fn test_order_search_filters() {
        let order = player_order(120, Some(4));
        assert!(OrderSearch::default().matches(&order));
        let by_port = OrderSearch {
            port_id: Some(4),
            ..Default::default()
        };
        assert!(by_port.matches(&order));
        assert!(!by_port.matches(&player_order(120, None)));
        let band = OrderSearch {
            min_price: Some(100),
            max_price: Some(120),
            order_type: Some(OrderType::Sell),
            ..Default::default()
        };
        assert!(band.matches(&order));
        assert!(!band.matches(&player_order(121, Some(4))));
        let buying = OrderSearch {
            order_type: Some(OrderType::Buy),
            ..Default::default()
        };
        assert!(!buying.matches(&order));
    }

    #[test]
    fn test_player_order_is_open() {
        let mut order = player_order(1, None);
        let now = order.created_at;
        assert!(order.is_open(now));
        assert!(!order.is_open(order.expires_at));
        order.status = PlayerOrderStatus::Cancelled;
        assert!(!order.is_open(now));
    }

    #[test]
    fn test_no_match_shape() {
        let m = MatchResult::no_match();
        assert!(m.entity.is_none());
        assert_eq!(m.confidence, Confidence::None);
        assert_eq!(m.entity_id(), None);
    }
}
