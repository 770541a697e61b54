//! # tradewind-db
//!
//! PostgreSQL storage layer for tradewind.
//!
//! Implements every storage collaborator trait from `tradewind-core`:
//! - [`PgEntityRegistry`]: canonical items and ports with aliases
//! - [`PgMarketRepository`]: atomic order replacement with audit row, expiry
//!   purge, and player profiles
//! - [`PgPlayerOrderRepository`]: player-posted orders
//! - [`PgConversationRepository`]: durable trade conversation rows
//!
//! ## Example
//!
//! ```ignore
//! use tradewind_db::Database;
//!
//! let db = Database::connect("postgres://localhost/tradewind").await?;
//! db.migrate().await?;
//! let open = db.conversations.list_active().await?;
//! ```

pub mod conversations;
pub mod entities;
pub mod markets;
pub mod orders;
pub mod pool;
pub mod test_fixtures;

pub use conversations::PgConversationRepository;
pub use entities::PgEntityRegistry;
pub use markets::PgMarketRepository;
pub use orders::PgPlayerOrderRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};

// Re-export core types for consumers
pub use tradewind_core::*;

/// Handle bundling the pool and every repository.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Canonical items and ports.
    pub entities: PgEntityRegistry,
    /// Market orders and player directory.
    pub markets: PgMarketRepository,
    /// Player-posted orders.
    pub orders: PgPlayerOrderRepository,
    /// Trade conversation rows.
    pub conversations: PgConversationRepository,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            entities: PgEntityRegistry::new(pool.clone()),
            markets: PgMarketRepository::new(pool.clone()),
            orders: PgPlayerOrderRepository::new(pool.clone()),
            conversations: PgConversationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
