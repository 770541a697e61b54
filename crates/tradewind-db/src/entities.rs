//! Canonical item and port registry.
//!
//! Items and ports live in separate tables with the same shape; aliases are
//! kept in per-kind alias tables. Name and alias matching is
//! case-insensitive through `lower()` indexes.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;

use tradewind_core::{
    CanonicalEntity, EntityId, EntityKind, EntityMetadata, EntityRegistry, Error, NewEntity,
    Result,
};

/// Table names for one entity kind.
struct Tables {
    entity: &'static str,
    aliases: &'static str,
    fk: &'static str,
    /// Kind-specific columns projected into a uniform row shape.
    extra: &'static str,
}

fn tables(kind: EntityKind) -> Tables {
    match kind {
        EntityKind::Item => Tables {
            entity: "items",
            aliases: "item_aliases",
            fk: "item_id",
            extra: "e.is_tagged, NULL::text AS region",
        },
        EntityKind::Port => Tables {
            entity: "ports",
            aliases: "port_aliases",
            fk: "port_id",
            extra: "FALSE AS is_tagged, e.region",
        },
    }
}

/// PostgreSQL implementation of [`EntityRegistry`].
#[derive(Clone)]
pub struct PgEntityRegistry {
    pool: Pool<Postgres>,
}

impl PgEntityRegistry {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Attach an alias to an existing entity.
    pub async fn add_alias(&self, kind: EntityKind, id: EntityId, alias: &str) -> Result<()> {
        let t = tables(kind);
        sqlx::query(&format!(
            "INSERT INTO {} ({}, alias) VALUES ($1, $2)",
            t.aliases, t.fk
        ))
        .bind(id)
        .bind(alias)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, format!("alias '{alias}' already exists")))?;
        Ok(())
    }

    async fn select_where(
        &self,
        kind: EntityKind,
        predicate: &str,
        bind: Option<&str>,
        bind_id: Option<EntityId>,
    ) -> Result<Vec<CanonicalEntity>> {
        let t = tables(kind);
        let sql = format!(
            "SELECT e.id, e.name, e.display_name, {} FROM {} e {} ORDER BY e.id",
            t.extra, t.entity, predicate
        );
        let mut query = sqlx::query(&sql);
        if let Some(value) = bind {
            query = query.bind(value.to_string());
        }
        if let Some(id) = bind_id {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(Error::Database)?;
        self.hydrate(kind, rows).await
    }

    /// Attach aliases (and item tags) to base rows.
    async fn hydrate(&self, kind: EntityKind, rows: Vec<PgRow>) -> Result<Vec<CanonicalEntity>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<EntityId> = rows.iter().map(|r| r.get("id")).collect();
        let t = tables(kind);

        let alias_rows = sqlx::query(&format!(
            "SELECT {} AS owner, alias FROM {} WHERE {} = ANY($1) ORDER BY id",
            t.fk, t.aliases, t.fk
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        let mut aliases: HashMap<EntityId, Vec<String>> = HashMap::new();
        for row in alias_rows {
            aliases
                .entry(row.get("owner"))
                .or_default()
                .push(row.get("alias"));
        }

        let mut tags: HashMap<EntityId, Vec<String>> = HashMap::new();
        if kind == EntityKind::Item {
            let tag_rows = sqlx::query(
                "SELECT item_id, tag FROM item_tags WHERE item_id = ANY($1) ORDER BY tag",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
            for row in tag_rows {
                tags.entry(row.get("item_id")).or_default().push(row.get("tag"));
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let id: EntityId = row.get("id");
                let metadata = match kind {
                    EntityKind::Item => EntityMetadata::Item {
                        is_tagged: row.get("is_tagged"),
                        tags: tags.remove(&id).unwrap_or_default(),
                    },
                    EntityKind::Port => EntityMetadata::Port {
                        region: row.get("region"),
                    },
                };
                CanonicalEntity {
                    id,
                    kind,
                    name: row.get("name"),
                    display_name: row.get("display_name"),
                    aliases: aliases.remove(&id).unwrap_or_default(),
                    metadata,
                }
            })
            .collect())
    }
}

/// Map unique-key violations to `Conflict`, everything else to `Database`.
pub(crate) fn conflict_or_db(e: sqlx::Error, reason: String) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(reason),
        _ => Error::Database(e),
    }
}

#[async_trait]
impl EntityRegistry for PgEntityRegistry {
    async fn list_candidates(&self, kind: EntityKind) -> Result<Vec<CanonicalEntity>> {
        self.select_where(kind, "", None, None).await
    }

    async fn get_by_exact_name(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Option<CanonicalEntity>> {
        Ok(self
            .select_where(kind, "WHERE lower(e.name) = lower($1)", Some(name), None)
            .await?
            .into_iter()
            .next())
    }

    async fn get_by_alias(
        &self,
        kind: EntityKind,
        alias: &str,
    ) -> Result<Option<CanonicalEntity>> {
        let t = tables(kind);
        let predicate = format!(
            "WHERE e.id = (SELECT {} FROM {} WHERE lower(alias) = lower($1) ORDER BY id LIMIT 1)",
            t.fk, t.aliases
        );
        Ok(self
            .select_where(kind, &predicate, Some(alias), None)
            .await?
            .into_iter()
            .next())
    }

    async fn get(&self, kind: EntityKind, id: EntityId) -> Result<Option<CanonicalEntity>> {
        Ok(self
            .select_where(kind, "WHERE e.id = $1", None, Some(id))
            .await?
            .into_iter()
            .next())
    }

    async fn create_entity(&self, req: NewEntity) -> Result<CanonicalEntity> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(format!("{} name is empty", req.kind)));
        }
        let id: EntityId = match req.kind {
            EntityKind::Item => sqlx::query_scalar::<_, EntityId>(
                "INSERT INTO items (name, display_name, created_by) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(name)
            .bind(&req.display_name)
            .bind(&req.created_by)
            .fetch_one(&self.pool)
            .await,
            EntityKind::Port => sqlx::query_scalar::<_, EntityId>(
                "INSERT INTO ports (name, display_name, region, created_by) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(name)
            .bind(&req.display_name)
            .bind(&req.region)
            .bind(&req.created_by)
            .fetch_one(&self.pool)
            .await,
        }
        .map_err(|e| conflict_or_db(e, format!("{} '{}' already exists", req.kind, name)))?;

        info!(
            subsystem = "db",
            component = "entities",
            entity_kind = %req.kind,
            entity_id = id,
            user_id = %req.created_by,
            "Entity created"
        );

        self.get(req.kind, id)
            .await?
            .ok_or_else(|| Error::Internal(format!("{} {id} vanished after insert", req.kind)))
    }
}
