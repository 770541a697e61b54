//! Player-posted orders: post, search, list, cancel.
//!
//! Item and port names are resolved the same way submissions resolve them.
//! An unknown item is created on the spot; an unknown port is an error, since
//! a port is optional on an order and typos there are better caught.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, instrument};

use tradewind_core::defaults::PLAYER_ORDER_TTL_DAYS;
use tradewind_core::{
    Clock, Confidence, EntityId, EntityKind, Error, MatchResult, NewEntity, NewPlayerOrder,
    OrderSearch, OrderType, PlayerOrder, PlayerOrderRepository, Result, TradeDirectory,
};
use tradewind_search::EntityResolver;

/// Durations offered when posting an order.
pub const ORDER_DURATIONS: [&str; 4] = ["1d", "3d", "7d", "14d"];

/// Order lifetime for a duration choice. Anything unrecognized is a week.
pub fn order_duration(choice: Option<&str>) -> Duration {
    match choice.map(str::trim) {
        Some("1d") => Duration::days(1),
        Some("3d") => Duration::days(3),
        Some("14d") => Duration::days(14),
        _ => Duration::days(PLAYER_ORDER_TTL_DAYS),
    }
}

/// What a player asks to post.
#[derive(Debug, Clone)]
pub struct PostOrder {
    pub order_type: OrderType,
    pub item: String,
    pub price: i64,
    pub quantity: i64,
    /// One of [`ORDER_DURATIONS`].
    pub duration: Option<String>,
    pub port: Option<String>,
    pub notes: Option<String>,
}

/// Search filters by name, as typed by a player.
#[derive(Debug, Clone, Default)]
pub struct FindOrders {
    pub item: Option<String>,
    pub port: Option<String>,
    pub order_type: Option<OrderType>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn PlayerOrderRepository>,
    directory: Arc<dyn TradeDirectory>,
    resolver: EntityResolver,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn PlayerOrderRepository>,
        directory: Arc<dyn TradeDirectory>,
        resolver: EntityResolver,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            directory,
            resolver,
            clock,
        }
    }

    /// Post an order under the player's in-game name.
    #[instrument(skip(self, req), fields(subsystem = "orders", op = "post_order"))]
    pub async fn post_order(&self, user_id: &str, req: PostOrder) -> Result<PlayerOrder> {
        let ingame_name = self
            .directory
            .get_profile(user_id)
            .await?
            .and_then(|p| p.display_name)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidState(
                    "You need to set your in-game name first with `/set-name`".to_string(),
                )
            })?;
        if req.price <= 0 {
            return Err(Error::InvalidInput("Price must be greater than 0".to_string()));
        }
        if req.quantity <= 0 {
            return Err(Error::InvalidInput(
                "Quantity must be greater than 0".to_string(),
            ));
        }
        let item_name = req.item.trim();
        if item_name.is_empty() {
            return Err(Error::InvalidInput("item must not be empty".to_string()));
        }

        let item_id = match self.best_match(EntityKind::Item, item_name).await? {
            Some(id) => id,
            None => {
                let item = self
                    .resolver
                    .registry()
                    .create_entity(NewEntity {
                        kind: EntityKind::Item,
                        name: item_name.to_string(),
                        display_name: item_name.to_string(),
                        region: None,
                        created_by: user_id.to_string(),
                    })
                    .await?;
                info!(user_id, item_id = item.id, name = item_name, "Item created");
                item.id
            }
        };

        let port_id = match req.port.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(port) => Some(self.best_match(EntityKind::Port, port).await?.ok_or_else(
                || {
                    Error::NotFound(format!(
                        "Port not found: '{port}'. Ask an admin to add it, or omit the port."
                    ))
                },
            )?),
            None => None,
        };

        let notes = req
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let expires_at = self.clock.now() + order_duration(req.duration.as_deref());

        let order = self
            .orders
            .create_order(NewPlayerOrder {
                user_id: user_id.to_string(),
                item_id,
                order_type: req.order_type,
                price: req.price,
                quantity: req.quantity,
                port_id,
                notes,
                ingame_name,
                expires_at,
            })
            .await?;
        info!(
            user_id,
            order_id = order.id,
            item_id,
            order_type = %order.order_type,
            "Player order posted"
        );
        Ok(order)
    }

    /// Open orders matching the filters, newest first.
    ///
    /// An item filter that matches nothing is an error; a port filter that
    /// matches nothing is dropped.
    pub async fn search(&self, filters: FindOrders, limit: usize) -> Result<Vec<PlayerOrder>> {
        let item_id = match filters.item.as_deref().map(str::trim) {
            Some(item) if !item.is_empty() => Some(
                self.first_match(EntityKind::Item, item)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("Item not found: '{item}'")))?,
            ),
            _ => None,
        };
        let port_id = match filters.port.as_deref().map(str::trim) {
            Some(port) if !port.is_empty() => self.first_match(EntityKind::Port, port).await?,
            _ => None,
        };
        self.orders
            .search(&OrderSearch {
                item_id,
                order_type: filters.order_type,
                port_id,
                min_price: filters.min_price.filter(|p| *p > 0),
                max_price: filters.max_price.filter(|p| *p > 0),
                limit,
            })
            .await
    }

    /// The caller's open orders.
    pub async fn my_orders(&self, user_id: &str) -> Result<Vec<PlayerOrder>> {
        self.orders.list_by_user(user_id).await
    }

    /// Cancel one of the caller's open orders.
    pub async fn cancel(&self, user_id: &str, order_id: i64) -> Result<()> {
        if !self.orders.cancel(order_id, user_id).await? {
            return Err(Error::NotFound(format!(
                "Order #{order_id} not found or not owned by you"
            )));
        }
        info!(user_id, order_id, "Player order cancelled");
        Ok(())
    }

    /// Top match at Medium confidence or better.
    async fn best_match(&self, kind: EntityKind, name: &str) -> Result<Option<EntityId>> {
        let matches = self.resolver.resolve(kind, name, 1).await?;
        Ok(matches
            .first()
            .filter(|m| m.confidence >= Confidence::Medium)
            .and_then(MatchResult::entity_id))
    }

    async fn first_match(&self, kind: EntityKind, name: &str) -> Result<Option<EntityId>> {
        let matches = self.resolver.resolve(kind, name, 1).await?;
        Ok(matches.first().and_then(MatchResult::entity_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_duration_choices() {
        assert_eq!(order_duration(Some("1d")), Duration::days(1));
        assert_eq!(order_duration(Some("3d")), Duration::days(3));
        assert_eq!(order_duration(Some("7d")), Duration::days(7));
        assert_eq!(order_duration(Some("14d")), Duration::days(14));
        assert_eq!(order_duration(Some("90d")), Duration::days(7));
        assert_eq!(order_duration(None), Duration::days(7));
    }

    #[test]
    fn test_offered_durations_are_recognized() {
        for choice in ORDER_DURATIONS {
            assert!(order_duration(Some(choice)) <= Duration::days(14));
        }
    }
}
