//! Pending submission state machine.
//!
//! A submission moves `PortPending -> ItemsPending -> Ready` and ends in
//! commit, cancellation, or expiry (all of which remove it). Item
//! confirmation is deduplicated on the raw name: a name that occurs several
//! times in the screenshot is confirmed once and that mapping covers every
//! occurrence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use tradewind_core::ocr::OcrPayload;
use tradewind_core::{Clock, EntityId, Error, OrderLine, OrderType, Result, UserId};

/// Workflow position of a live submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    PortPending,
    ItemsPending,
    Ready,
}

/// Confirmation progress, counted in unique raw item names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmissionProgress {
    pub confirmed: usize,
    pub total: usize,
}

/// One user's in-flight submission.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub user_id: UserId,
    pub payload: OcrPayload,
    pub order_type: OrderType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set once the port is confirmed.
    pub port_id: Option<EntityId>,
    /// Unique raw item name -> resolved item id.
    pub item_mappings: HashMap<String, EntityId>,
    /// Temporary screenshot kept while the workflow runs.
    pub artifact: Option<PathBuf>,
}

impl PendingSubmission {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_port_confirmed(&self) -> bool {
        self.port_id.is_some()
    }

    pub fn unique_item_count(&self) -> usize {
        self.payload.unique_item_names().len()
    }

    pub fn is_complete(&self) -> bool {
        self.item_mappings.len() == self.unique_item_count()
    }

    pub fn state(&self) -> SubmissionState {
        if !self.is_port_confirmed() {
            SubmissionState::PortPending
        } else if !self.is_complete() {
            SubmissionState::ItemsPending
        } else {
            SubmissionState::Ready
        }
    }

    /// Unique raw names still lacking a mapping, in first-seen order.
    pub fn unconfirmed_items(&self) -> Vec<String> {
        self.payload
            .unique_item_names()
            .into_iter()
            .filter(|n| !self.item_mappings.contains_key(*n))
            .map(str::to_string)
            .collect()
    }

    pub fn progress(&self) -> SubmissionProgress {
        SubmissionProgress {
            confirmed: self.item_mappings.len(),
            total: self.unique_item_count(),
        }
    }
}

/// Input to [`SubmissionStore::create`].
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: UserId,
    pub payload: OcrPayload,
    pub order_type: OrderType,
    pub artifact: Option<PathBuf>,
}

/// Everything needed to replace a port's orders.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPlan {
    pub port_id: EntityId,
    pub order_type: OrderType,
    /// One line per payload occurrence, duplicates included.
    pub orders: Vec<OrderLine>,
}

/// Per-user submission registry.
#[derive(Clone)]
pub struct SubmissionStore {
    entries: Arc<Mutex<HashMap<UserId, PendingSubmission>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SubmissionStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a submission.
    ///
    /// Refuses to overwrite a live submission. An expired one still in the
    /// map is replaced and handed back so its artifact can be discarded.
    pub async fn create(&self, req: NewSubmission) -> Result<Option<PendingSubmission>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(&req.user_id) {
            if !existing.is_expired(now) {
                return Err(Error::Conflict(
                    "a submission is already in progress; finish or cancel it first".to_string(),
                ));
            }
        }
        let submission = PendingSubmission {
            user_id: req.user_id.clone(),
            payload: req.payload,
            order_type: req.order_type,
            created_at: now,
            expires_at: now + self.ttl,
            port_id: None,
            item_mappings: HashMap::new(),
            artifact: req.artifact,
        };
        info!(
            user_id = %req.user_id,
            items = submission.payload.items.len(),
            unique_items = submission.unique_item_count(),
            "Submission created"
        );
        Ok(entries.insert(req.user_id, submission))
    }

    /// Snapshot of a live submission; `None` once expired even if the sweep
    /// has not removed it yet.
    pub async fn get(&self, user_id: &str) -> Option<PendingSubmission> {
        let now = self.clock.now();
        self.entries
            .lock()
            .await
            .get(user_id)
            .filter(|s| !s.is_expired(now))
            .cloned()
    }

    /// Run `f` against the live submission for `user_id`.
    async fn with_live<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut PendingSubmission) -> Result<T>,
    ) -> Result<T> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(user_id) {
            Some(s) if !s.is_expired(now) => f(s),
            _ => Err(Error::SubmissionNotFound(user_id.to_string())),
        }
    }

    /// Confirm the port. A second confirmation is a no-op success and keeps
    /// the first port.
    pub async fn confirm_port(&self, user_id: &str, port_id: EntityId) -> Result<()> {
        self.with_live(user_id, |s| {
            match s.port_id {
                Some(existing) => {
                    debug!(user_id, existing, requested = port_id, "Port already confirmed")
                }
                None => {
                    s.port_id = Some(port_id);
                    debug!(user_id, port_id, "Port confirmed");
                }
            }
            Ok(())
        })
        .await
    }

    /// Record the mapping for a raw item name.
    ///
    /// Returns `true` when this is the first mapping for the name and
    /// `false` for a repeat (the first mapping is kept). Names that do not
    /// occur in the payload are rejected.
    pub async fn add_item_mapping(
        &self,
        user_id: &str,
        raw_name: &str,
        item_id: EntityId,
    ) -> Result<bool> {
        self.with_live(user_id, |s| {
            if !s.payload.items.iter().any(|i| i.name == raw_name) {
                return Err(Error::InvalidInput(format!(
                    "'{raw_name}' is not part of this submission"
                )));
            }
            if s.item_mappings.contains_key(raw_name) {
                return Ok(false);
            }
            s.item_mappings.insert(raw_name.to_string(), item_id);
            debug!(
                user_id,
                raw_name,
                item_id,
                confirmed = s.item_mappings.len(),
                "Item mapped"
            );
            Ok(true)
        })
        .await
    }

    pub async fn is_complete(&self, user_id: &str) -> Result<bool> {
        self.with_live(user_id, |s| Ok(s.is_complete())).await
    }

    pub async fn unconfirmed_items(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_live(user_id, |s| Ok(s.unconfirmed_items())).await
    }

    pub async fn progress(&self, user_id: &str) -> Result<SubmissionProgress> {
        self.with_live(user_id, |s| Ok(s.progress())).await
    }

    /// Expand the payload into one order line per occurrence.
    ///
    /// Only valid once the port is confirmed and every unique name is mapped.
    pub async fn build_commit_orders(&self, user_id: &str) -> Result<CommitPlan> {
        self.with_live(user_id, |s| {
            let port_id = s
                .port_id
                .ok_or_else(|| Error::InvalidState("port not confirmed".to_string()))?;
            if !s.is_complete() {
                let p = s.progress();
                return Err(Error::InvalidState(format!(
                    "{} of {} items confirmed",
                    p.confirmed, p.total
                )));
            }
            let orders = s
                .payload
                .items
                .iter()
                .map(|i| {
                    s.item_mappings
                        .get(&i.name)
                        .map(|&item_id| OrderLine {
                            item_id,
                            price: i.price,
                            quantity: i.quantity,
                        })
                        .ok_or_else(|| {
                            Error::Internal(format!("no mapping for '{}'", i.name))
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(CommitPlan {
                port_id,
                order_type: s.order_type,
                orders,
            })
        })
        .await
    }

    /// Delete a submission whether live or expired. Idempotent.
    pub async fn remove(&self, user_id: &str) -> Option<PendingSubmission> {
        let removed = self.entries.lock().await.remove(user_id);
        if removed.is_some() {
            debug!(user_id, "Submission removed");
        }
        removed
    }

    /// Atomically remove and return every expired submission.
    pub async fn take_expired(&self) -> Vec<PendingSubmission> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let expired: Vec<UserId> = entries
            .iter()
            .filter(|(_, s)| s.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        expired
            .iter()
            .filter_map(|k| entries.remove(k))
            .collect()
    }

    /// Entries currently held, expired-but-unswept included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
