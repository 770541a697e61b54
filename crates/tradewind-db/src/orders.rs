//! Player-posted orders.
//!
//! Reads join the item and port names so callers can render an order
//! without another lookup. An order is open while `status = 'active'` and
//! `expires_at > now()`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};

use tradewind_core::defaults::ORDER_SEARCH_LIMIT;
use tradewind_core::{
    Error, NewPlayerOrder, OrderSearch, OrderType, PlayerOrder, PlayerOrderRepository,
    PlayerOrderStatus, Result,
};

const SELECT_JOINED: &str = r#"
    SELECT po.id, po.user_id, po.item_id, i.display_name AS item_name, po.order_type,
           po.price, po.quantity, po.port_id, p.display_name AS port_name, po.notes,
           po.ingame_name, po.status, po.created_at, po.expires_at
    FROM player_orders po
    JOIN items i ON i.id = po.item_id
    LEFT JOIN ports p ON p.id = po.port_id
"#;

const OPEN: &str = "po.status = 'active' AND po.expires_at > now()";

/// PostgreSQL implementation of [`PlayerOrderRepository`].
#[derive(Clone)]
pub struct PgPlayerOrderRepository {
    pool: Pool<Postgres>,
}

impl PgPlayerOrderRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Fetch regardless of status or expiry.
    pub async fn get(&self, order_id: i64) -> Result<Option<PlayerOrder>> {
        let row = sqlx::query(&format!("{SELECT_JOINED} WHERE po.id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(order_from_row).transpose()
    }
}

fn order_from_row(row: &PgRow) -> Result<PlayerOrder> {
    let order_type: String = row.get("order_type");
    let status: String = row.get("status");
    Ok(PlayerOrder {
        id: row.get("id"),
        user_id: row.get("user_id"),
        item_id: row.get("item_id"),
        item_name: row.get("item_name"),
        order_type: order_type.parse::<OrderType>().map_err(Error::Internal)?,
        price: row.get("price"),
        quantity: row.get("quantity"),
        port_id: row.get("port_id"),
        port_name: row.get("port_name"),
        notes: row.get("notes"),
        ingame_name: row.get("ingame_name"),
        status: status.parse::<PlayerOrderStatus>().map_err(Error::Internal)?,
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    })
}

#[async_trait]
impl PlayerOrderRepository for PgPlayerOrderRepository {
    async fn create_order(&self, req: NewPlayerOrder) -> Result<PlayerOrder> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO player_orders
                (user_id, item_id, order_type, price, quantity, port_id, notes, ingame_name, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&req.user_id)
        .bind(req.item_id)
        .bind(req.order_type.as_str())
        .bind(req.price)
        .bind(req.quantity)
        .bind(req.port_id)
        .bind(&req.notes)
        .bind(&req.ingame_name)
        .bind(req.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "player_orders",
            op = "create",
            order_id = id,
            user_id = %req.user_id,
            order_type = %req.order_type,
            "Player order created"
        );
        self.get(id)
            .await?
            .ok_or_else(|| Error::Internal(format!("player order {id} vanished after insert")))
    }

    async fn get_active_order(&self, order_id: i64) -> Result<Option<PlayerOrder>> {
        let row = sqlx::query(&format!("{SELECT_JOINED} WHERE po.id = $1 AND {OPEN}"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<PlayerOrder>> {
        let rows = sqlx::query(&format!(
            "{SELECT_JOINED} WHERE po.user_id = $1 AND {OPEN} ORDER BY po.created_at DESC, po.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(order_from_row).collect()
    }

    async fn search(&self, query: &OrderSearch) -> Result<Vec<PlayerOrder>> {
        let limit = if query.limit == 0 {
            ORDER_SEARCH_LIMIT
        } else {
            query.limit
        };
        let rows = sqlx::query(&format!(
            r#"
            {SELECT_JOINED}
            WHERE {OPEN}
              AND ($1::BIGINT IS NULL OR po.item_id = $1)
              AND ($2::TEXT IS NULL OR po.order_type = $2)
              AND ($3::BIGINT IS NULL OR po.port_id = $3)
              AND ($4::BIGINT IS NULL OR po.price >= $4)
              AND ($5::BIGINT IS NULL OR po.price <= $5)
            ORDER BY po.created_at DESC, po.id DESC
            LIMIT $6
            "#
        ))
        .bind(query.item_id)
        .bind(query.order_type.map(|t| t.as_str()))
        .bind(query.port_id)
        .bind(query.min_price)
        .bind(query.max_price)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "player_orders",
            op = "search",
            result_count = rows.len(),
            "Player orders searched"
        );
        rows.iter().map(order_from_row).collect()
    }

    async fn cancel(&self, order_id: i64, user_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE player_orders SET status = 'cancelled' \
             WHERE id = $1 AND user_id = $2 AND status = 'active'",
        )
        .bind(order_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete(&self, order_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE player_orders SET status = 'completed' WHERE id = $1 AND status = 'active'",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE player_orders SET status = 'cancelled' \
             WHERE status = 'active' AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
