//! Screenshot submission workflow.
//!
//! Drives a [`SubmissionStore`] entry from OCR payload to committed market
//! orders: resolve the port, resolve each unique item, then replace the
//! user's orders for that port in one transaction. Every step returns a
//! [`SubmissionStep`] telling the caller what to ask the user next.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use tradewind_core::defaults::{ITEM_MATCH_LIMIT, PORT_MATCH_LIMIT};
use tradewind_core::{
    Confidence, EntityId, EntityKind, Error, MarketRepository, MatchResult, NewEntity, OcrPayload,
    OrderType, ReplaceOrdersRequest, Result,
};
use tradewind_search::EntityResolver;
use tradewind_sessions::{NewSubmission, SubmissionProgress, SubmissionStore};

use crate::command::ItemChoice;

/// What the user has to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionStep {
    /// Pick the port from `matches` or create a new one.
    ConfirmPort {
        raw_name: String,
        matches: Vec<MatchResult>,
    },
    /// Pick the item for `raw_name` from `matches` or create a new one.
    ConfirmItem {
        raw_name: String,
        matches: Vec<MatchResult>,
        progress: SubmissionProgress,
    },
    /// Everything is mapped; `commit` will succeed unless storage fails.
    ReadyToCommit {
        port_id: EntityId,
        order_type: OrderType,
        line_count: usize,
    },
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub port_id: EntityId,
    pub order_type: OrderType,
    pub lines: u64,
    pub provenance_hash: String,
}

#[derive(Clone)]
pub struct SubmissionService {
    store: SubmissionStore,
    resolver: EntityResolver,
    markets: Arc<dyn MarketRepository>,
}

impl SubmissionService {
    pub fn new(
        store: SubmissionStore,
        resolver: EntityResolver,
        markets: Arc<dyn MarketRepository>,
    ) -> Self {
        Self {
            store,
            resolver,
            markets,
        }
    }

    pub fn store(&self) -> &SubmissionStore {
        &self.store
    }

    /// Begin a submission from parsed OCR output.
    ///
    /// `declared` is the order type the user picked on the command; it must
    /// agree with what the screenshot shows.
    #[instrument(skip(self, payload), fields(subsystem = "submit", op = "start"))]
    pub async fn start(
        &self,
        user_id: &str,
        payload: OcrPayload,
        declared: OrderType,
        artifact: Option<PathBuf>,
    ) -> Result<SubmissionStep> {
        let detected = match payload.validate() {
            Ok(t) => t,
            Err(e) => {
                discard_artifact(artifact.as_deref()).await;
                return Err(e);
            }
        };
        if detected != declared {
            discard_artifact(artifact.as_deref()).await;
            return Err(Error::InvalidInput(format!(
                "screenshot shows {detected} orders but you submitted {declared} orders"
            )));
        }

        let port_name = payload.port.clone();
        let replaced = self
            .store
            .create(NewSubmission {
                user_id: user_id.to_string(),
                payload,
                order_type: detected,
                artifact: artifact.clone(),
            })
            .await;
        match replaced {
            Ok(Some(old)) => discard_artifact(old.artifact.as_deref()).await,
            Ok(None) => {}
            Err(e) => {
                discard_artifact(artifact.as_deref()).await;
                return Err(e);
            }
        }

        let matches = match self
            .resolver
            .resolve(EntityKind::Port, &port_name, PORT_MATCH_LIMIT)
            .await
        {
            Ok(m) => m,
            Err(e) => {
                warn!(user_id, error = %e, "Port resolution failed; dropping submission");
                if let Some(s) = self.store.remove(user_id).await {
                    discard_artifact(s.artifact.as_deref()).await;
                }
                return Err(e);
            }
        };

        let exact_port = matches
            .first()
            .filter(|m| m.confidence == Confidence::Exact)
            .and_then(MatchResult::entity_id);
        if let Some(port_id) = exact_port {
            debug!(user_id, port_id, "Port auto-confirmed");
            self.store.confirm_port(user_id, port_id).await?;
            return self.advance(user_id).await;
        }
        Ok(SubmissionStep::ConfirmPort {
            raw_name: port_name,
            matches,
        })
    }

    /// Auto-map every item that resolves with high confidence and stop at the
    /// first one that needs the user.
    pub async fn advance(&self, user_id: &str) -> Result<SubmissionStep> {
        let submission = self
            .store
            .get(user_id)
            .await
            .ok_or_else(|| Error::SubmissionNotFound(user_id.to_string()))?;

        if !submission.is_port_confirmed() {
            let matches = self
                .resolver
                .resolve(EntityKind::Port, &submission.payload.port, PORT_MATCH_LIMIT)
                .await?;
            return Ok(SubmissionStep::ConfirmPort {
                raw_name: submission.payload.port,
                matches,
            });
        }

        for raw_name in submission.unconfirmed_items() {
            let matches = self
                .resolver
                .resolve(EntityKind::Item, &raw_name, ITEM_MATCH_LIMIT)
                .await?;
            let auto = matches
                .first()
                .filter(|m| m.confidence.is_auto_accept())
                .and_then(MatchResult::entity_id);
            match auto {
                Some(item_id) => {
                    self.store
                        .add_item_mapping(user_id, &raw_name, item_id)
                        .await?;
                }
                None => {
                    let progress = self.store.progress(user_id).await?;
                    return Ok(SubmissionStep::ConfirmItem {
                        raw_name,
                        matches,
                        progress,
                    });
                }
            }
        }

        let plan = self.store.build_commit_orders(user_id).await?;
        Ok(SubmissionStep::ReadyToCommit {
            port_id: plan.port_id,
            order_type: plan.order_type,
            line_count: plan.orders.len(),
        })
    }

    /// The user picked an existing port.
    pub async fn select_port(&self, user_id: &str, port_id: EntityId) -> Result<SubmissionStep> {
        self.resolver
            .registry()
            .get(EntityKind::Port, port_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("port {port_id}")))?;
        self.store.confirm_port(user_id, port_id).await?;
        self.advance(user_id).await
    }

    /// The user asked for a new port. Name collisions surface as
    /// [`Error::Conflict`] and leave the submission untouched.
    #[instrument(skip(self), fields(subsystem = "submit", op = "create_port"))]
    pub async fn create_port(
        &self,
        user_id: &str,
        name: &str,
        region: Option<&str>,
    ) -> Result<SubmissionStep> {
        let name = validated_entity_name(name)?;
        // Fail before creating anything if the submission is gone.
        if self.store.get(user_id).await.is_none() {
            return Err(Error::SubmissionNotFound(user_id.to_string()));
        }
        let port = self
            .resolver
            .registry()
            .create_entity(NewEntity {
                kind: EntityKind::Port,
                name: name.to_string(),
                display_name: name.to_string(),
                region: region.map(str::to_string),
                created_by: user_id.to_string(),
            })
            .await?;
        info!(user_id, port_id = port.id, name, "Port created");
        self.store.confirm_port(user_id, port.id).await?;
        self.advance(user_id).await
    }

    /// The user resolved one raw item name.
    pub async fn select_item(
        &self,
        user_id: &str,
        raw_name: &str,
        choice: ItemChoice,
    ) -> Result<SubmissionStep> {
        let item_id = match choice {
            ItemChoice::Existing(id) => {
                self.resolver
                    .registry()
                    .get(EntityKind::Item, id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("item {id}")))?;
                id
            }
            ItemChoice::CreateNew => {
                let name = validated_entity_name(raw_name)?;
                let submission = self
                    .store
                    .get(user_id)
                    .await
                    .ok_or_else(|| Error::SubmissionNotFound(user_id.to_string()))?;
                if !submission.payload.items.iter().any(|i| i.name == raw_name) {
                    return Err(Error::InvalidInput(format!(
                        "'{raw_name}' is not part of this submission"
                    )));
                }
                if submission.item_mappings.contains_key(raw_name) {
                    // repeated click; the first mapping stands
                    debug!(user_id, raw_name, "Item already mapped; not creating");
                    return self.advance(user_id).await;
                }
                let item = self
                    .resolver
                    .registry()
                    .create_entity(NewEntity {
                        kind: EntityKind::Item,
                        name: name.to_string(),
                        display_name: name.to_string(),
                        region: None,
                        created_by: user_id.to_string(),
                    })
                    .await?;
                info!(user_id, item_id = item.id, name, "Item created");
                item.id
            }
        };
        self.store
            .add_item_mapping(user_id, raw_name, item_id)
            .await?;
        self.advance(user_id).await
    }

    /// Abandon the submission and its screenshot.
    pub async fn cancel(&self, user_id: &str) -> Result<()> {
        let removed = self
            .store
            .remove(user_id)
            .await
            .ok_or_else(|| Error::SubmissionNotFound(user_id.to_string()))?;
        discard_artifact(removed.artifact.as_deref()).await;
        info!(user_id, "Submission cancelled");
        Ok(())
    }

    /// Replace the user's orders for the confirmed port.
    ///
    /// On storage failure the submission is kept so the user can retry.
    #[instrument(skip(self), fields(subsystem = "submit", op = "commit"))]
    pub async fn commit(&self, user_id: &str) -> Result<CommitOutcome> {
        let plan = self.store.build_commit_orders(user_id).await?;
        let submission = self
            .store
            .get(user_id)
            .await
            .ok_or_else(|| Error::SubmissionNotFound(user_id.to_string()))?;
        let provenance_hash =
            provenance_hash(submission.artifact.as_deref(), &submission.payload).await?;

        let lines = self
            .markets
            .replace_orders(ReplaceOrdersRequest {
                port_id: plan.port_id,
                order_type: plan.order_type,
                orders: plan.orders,
                submitter: user_id.to_string(),
                provenance_hash: provenance_hash.clone(),
            })
            .await?;

        if let Some(done) = self.store.remove(user_id).await {
            discard_artifact(done.artifact.as_deref()).await;
        }
        info!(
            user_id,
            port_id = plan.port_id,
            order_type = %plan.order_type,
            lines,
            "Submission committed"
        );
        Ok(CommitOutcome {
            port_id: plan.port_id,
            order_type: plan.order_type,
            lines,
            provenance_hash,
        })
    }
}

fn validated_entity_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("name must not be empty".to_string()));
    }
    Ok(name)
}

/// SHA-256 hex of the screenshot when it is still on disk, otherwise of the
/// serialized OCR payload.
pub async fn provenance_hash(artifact: Option<&Path>, payload: &OcrPayload) -> Result<String> {
    if let Some(path) = artifact {
        match tokio::fs::read(path).await {
            Ok(bytes) => return Ok(hex::encode(Sha256::digest(&bytes))),
            Err(e) => warn!(path = %path.display(), error = %e, "Artifact unreadable; hashing payload"),
        }
    }
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

async fn discard_artifact(path: Option<&Path>) {
    let Some(path) = path else { return };
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Artifact deleted"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete artifact"),
    }
}
