//! Durable trade conversation rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use tradewind_core::{
    ConversationRepository, ConversationStatus, Error, NewConversation, Result, TradeConversation,
};

const COLUMNS: &str = "id, order_id, initiator_id, initiator_name, counterpart_id, \
                       counterpart_name, status, created_at, last_activity, closed_at";

/// PostgreSQL implementation of [`ConversationRepository`].
#[derive(Clone)]
pub struct PgConversationRepository {
    pool: Pool<Postgres>,
}

impl PgConversationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<TradeConversation>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM trade_conversations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(conversation_from_row).transpose()
    }
}

fn conversation_from_row(row: &PgRow) -> Result<TradeConversation> {
    let status: String = row.get("status");
    Ok(TradeConversation {
        id: row.get("id"),
        order_id: row.get("order_id"),
        initiator_id: row.get("initiator_id"),
        initiator_name: row.get("initiator_name"),
        counterpart_id: row.get("counterpart_id"),
        counterpart_name: row.get("counterpart_name"),
        status: status.parse::<ConversationStatus>().map_err(Error::Internal)?,
        created_at: row.get("created_at"),
        last_activity: row.get("last_activity"),
        closed_at: row.get("closed_at"),
    })
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn create(&self, req: NewConversation) -> Result<TradeConversation> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO trade_conversations
                (order_id, initiator_id, initiator_name, counterpart_id, counterpart_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(req.order_id)
        .bind(&req.initiator_id)
        .bind(&req.initiator_name)
        .bind(&req.counterpart_id)
        .bind(&req.counterpart_name)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        let conversation = conversation_from_row(&row)?;
        debug!(
            subsystem = "db",
            component = "conversations",
            conversation_id = conversation.id,
            "Conversation row created"
        );
        Ok(conversation)
    }

    async fn close(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE trade_conversations SET status = 'closed', closed_at = now() \
             WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE trade_conversations SET last_activity = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<TradeConversation>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM trade_conversations WHERE status = 'active' ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(conversation_from_row).collect()
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<TradeConversation>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM trade_conversations \
             WHERE status = 'active' AND last_activity < $1 ORDER BY id"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        rows.iter().map(conversation_from_row).collect()
    }
}
