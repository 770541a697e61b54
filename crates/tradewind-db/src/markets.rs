//! Market order storage and player profiles.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::{Pool, Postgres, Row};
use tracing::info;

use tradewind_core::defaults::MARKET_ORDER_TTL_DAYS;
use tradewind_core::{
    Error, MarketRepository, PlayerProfile, ReplaceOrdersRequest, Result, TradeDirectory,
};

/// PostgreSQL implementation of [`MarketRepository`] and [`TradeDirectory`].
#[derive(Clone)]
pub struct PgMarketRepository {
    pool: Pool<Postgres>,
}

impl PgMarketRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarketRepository for PgMarketRepository {
    async fn replace_orders(&self, req: ReplaceOrdersRequest) -> Result<u64> {
        let expires_at = Utc::now() + Duration::days(MARKET_ORDER_TTL_DAYS);
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let deleted = sqlx::query("DELETE FROM markets WHERE port_id = $1 AND order_type = $2")
            .bind(req.port_id)
            .bind(req.order_type.as_str())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        for line in &req.orders {
            sqlx::query(
                r#"
                INSERT INTO markets
                    (port_id, item_id, order_type, price, quantity, user_id, screenshot_hash, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(req.port_id)
            .bind(line.item_id)
            .bind(req.order_type.as_str())
            .bind(line.price)
            .bind(line.quantity)
            .bind(&req.submitter)
            .bind(&req.provenance_hash)
            .bind(expires_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        sqlx::query("INSERT INTO audit_log (user_id, action, details) VALUES ($1, $2, $3)")
            .bind(&req.submitter)
            .bind("replace_orders")
            .bind(json!({
                "port_id": req.port_id,
                "order_type": req.order_type.as_str(),
                "orders": req.orders.len(),
                "replaced": deleted,
                "screenshot_hash": req.provenance_hash,
            }))
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "markets",
            op = "replace_orders",
            port_id = req.port_id,
            order_type = %req.order_type,
            user_id = %req.submitter,
            result_count = req.orders.len(),
            replaced = deleted,
            "Market orders replaced"
        );
        Ok(req.orders.len() as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM markets WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TradeDirectory for PgMarketRepository {
    async fn get_profile(&self, user_id: &str) -> Result<Option<PlayerProfile>> {
        let row = sqlx::query("SELECT user_id, display_name FROM player_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|r| PlayerProfile {
            user_id: r.get("user_id"),
            display_name: r.get("display_name"),
        }))
    }

    async fn set_display_name(&self, user_id: &str, display_name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO player_profiles (user_id, display_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET display_name = EXCLUDED.display_name, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
