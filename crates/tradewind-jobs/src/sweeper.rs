//! Periodic expiry sweeper.
//!
//! Eviction is atomic per registry (`take_expired`), so a submission or
//! conversation is either still live or handed to exactly one sweep. Side
//! effects of one eviction never stop the sweep from handling the rest;
//! failures are logged and counted.
//!
//! A third, slower pass deletes expired market rows and cancels expired
//! player orders once storage for them is attached with
//! [`ExpirySweeper::with_order_expiry`].

use std::collections::HashSet;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use tradewind_core::defaults::{
    CONVERSATION_SWEEP_INTERVAL_SECS, EVENT_BUS_CAPACITY, MAX_LIFETIME_SECS,
    ORDER_SWEEP_INTERVAL_SECS, SUBMISSION_SWEEP_INTERVAL_SECS,
};
use tradewind_core::{
    ConversationRepository, Error, MarketRepository, Messenger, PlayerOrderRepository, Result,
};
use tradewind_sessions::{PairingRegistry, SubmissionStore};

/// Sent to both parties when a conversation times out.
pub const INACTIVITY_NOTICE: &str = "Your trade conversation has been closed due to inactivity. \
                                     Use `/trade-search` to find more trades.";

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Seconds between submission passes.
    pub submission_interval_secs: u64,
    /// Seconds between conversation passes.
    pub conversation_interval_secs: u64,
    /// Seconds between market and player order passes.
    pub order_interval_secs: u64,
    /// Whether to run the sweeper at all.
    pub enabled: bool,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            submission_interval_secs: SUBMISSION_SWEEP_INTERVAL_SECS,
            conversation_interval_secs: CONVERSATION_SWEEP_INTERVAL_SECS,
            order_interval_secs: ORDER_SWEEP_INTERVAL_SECS,
            enabled: true,
        }
    }
}

impl SweeperConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SWEEPER_ENABLED` | `true` | Enable/disable the sweeper |
    /// | `SUBMISSION_SWEEP_INTERVAL_SECS` | `60` | Submission pass interval |
    /// | `CONVERSATION_SWEEP_INTERVAL_SECS` | `300` | Conversation pass interval |
    /// | `ORDER_SWEEP_INTERVAL_SECS` | `3600` | Market and player order pass interval |
    pub fn from_env() -> Self {
        let enabled = std::env::var("SWEEPER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let submission_interval_secs = std::env::var("SUBMISSION_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(SUBMISSION_SWEEP_INTERVAL_SECS, clamp_interval);

        let conversation_interval_secs = std::env::var("CONVERSATION_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(CONVERSATION_SWEEP_INTERVAL_SECS, clamp_interval);

        let order_interval_secs = std::env::var("ORDER_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(ORDER_SWEEP_INTERVAL_SECS, clamp_interval);

        Self {
            submission_interval_secs,
            conversation_interval_secs,
            order_interval_secs,
            enabled,
        }
    }

    pub fn with_submission_interval(mut self, secs: u64) -> Self {
        self.submission_interval_secs = clamp_interval(secs);
        self
    }

    pub fn with_conversation_interval(mut self, secs: u64) -> Self {
        self.conversation_interval_secs = clamp_interval(secs);
        self
    }

    pub fn with_order_interval(mut self, secs: u64) -> Self {
        self.order_interval_secs = clamp_interval(secs);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

fn clamp_interval(secs: u64) -> u64 {
    secs.clamp(1, MAX_LIFETIME_SECS)
}

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries evicted or closed.
    pub evicted: usize,
    /// Side effects that failed and were skipped.
    pub failures: usize,
}

/// Events emitted by the sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweeperEvent {
    SweeperStarted,
    SubmissionsSwept(SweepReport),
    ConversationsSwept(SweepReport),
    OrdersSwept(SweepReport),
    SweeperStopped,
}

/// Handle for controlling a running sweeper.
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SweeperEvent>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for sweeper events.
    pub fn events(&self) -> broadcast::Receiver<SweeperEvent> {
        self.event_rx.resubscribe()
    }
}

/// Background process evicting expired submissions and conversations.
pub struct ExpirySweeper {
    submissions: SubmissionStore,
    pairings: PairingRegistry,
    conversations: Arc<dyn ConversationRepository>,
    messenger: Arc<dyn Messenger>,
    markets: Option<Arc<dyn MarketRepository>>,
    orders: Option<Arc<dyn PlayerOrderRepository>>,
    config: SweeperConfig,
    event_tx: broadcast::Sender<SweeperEvent>,
}

impl ExpirySweeper {
    pub fn new(
        submissions: SubmissionStore,
        pairings: PairingRegistry,
        conversations: Arc<dyn ConversationRepository>,
        messenger: Arc<dyn Messenger>,
        config: SweeperConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            submissions,
            pairings,
            conversations,
            messenger,
            markets: None,
            orders: None,
            config,
            event_tx,
        }
    }

    /// Attach the stores swept by [`ExpirySweeper::sweep_orders`].
    pub fn with_order_expiry(
        mut self,
        markets: Arc<dyn MarketRepository>,
        orders: Arc<dyn PlayerOrderRepository>,
    ) -> Self {
        self.markets = Some(markets);
        self.orders = Some(orders);
        self
    }

    /// Start the sweeper in a background task.
    pub fn start(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SweeperHandle {
            shutdown_tx,
            event_rx,
        }
    }

    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "sweeper"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Expiry sweeper is disabled, not starting");
            return;
        }

        info!(
            submission_interval_secs = self.config.submission_interval_secs,
            conversation_interval_secs = self.config.conversation_interval_secs,
            order_interval_secs = self.config.order_interval_secs,
            "Expiry sweeper started"
        );
        let _ = self.event_tx.send(SweeperEvent::SweeperStarted);

        let submission_period = Duration::from_secs(self.config.submission_interval_secs);
        let conversation_period = Duration::from_secs(self.config.conversation_interval_secs);
        let order_period = Duration::from_secs(self.config.order_interval_secs);
        let now = tokio::time::Instant::now();
        let mut submission_tick = interval_at(now + submission_period, submission_period);
        let mut conversation_tick = interval_at(now + conversation_period, conversation_period);
        let mut order_tick = interval_at(now + order_period, order_period);
        submission_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        conversation_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        order_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let sweeps_orders = self.markets.is_some() || self.orders.is_some();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Expiry sweeper received shutdown signal");
                    break;
                }
                _ = submission_tick.tick() => {
                    let report = self.sweep_submissions().await;
                    let _ = self.event_tx.send(SweeperEvent::SubmissionsSwept(report));
                }
                _ = conversation_tick.tick() => {
                    let report = self.sweep_conversations().await;
                    let _ = self.event_tx.send(SweeperEvent::ConversationsSwept(report));
                }
                _ = order_tick.tick(), if sweeps_orders => {
                    let report = self.sweep_orders().await;
                    let _ = self.event_tx.send(SweeperEvent::OrdersSwept(report));
                }
            }
        }

        let _ = self.event_tx.send(SweeperEvent::SweeperStopped);
        info!("Expiry sweeper stopped");
    }

    /// Evict expired submissions and delete their temporary screenshots.
    pub async fn sweep_submissions(&self) -> SweepReport {
        let start = Instant::now();
        let expired = self.submissions.take_expired().await;
        let mut report = SweepReport {
            evicted: expired.len(),
            failures: 0,
        };

        for submission in &expired {
            debug!(user_id = %submission.user_id, "Submission expired");
            let Some(path) = &submission.artifact else {
                continue;
            };
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    report.failures += 1;
                    warn!(
                        user_id = %submission.user_id,
                        path = %path.display(),
                        error = %e,
                        "Failed to delete submission screenshot"
                    );
                }
            }
        }

        if report.evicted > 0 {
            info!(
                op = "sweep_submissions",
                evicted_count = report.evicted,
                failures = report.failures,
                duration_ms = start.elapsed().as_millis() as u64,
                "Expired submissions evicted"
            );
        }
        report
    }

    /// Close timed-out conversations durably and notify both parties.
    ///
    /// Parties are notified only after their row is closed. A pairing whose
    /// close fails goes back into the registry and is retried next pass.
    ///
    /// Handles in-memory pairings first, then durable rows that went stale
    /// without a registry entry (e.g. a recovered row nobody touched).
    pub async fn sweep_conversations(&self) -> SweepReport {
        let start = Instant::now();
        let mut report = SweepReport::default();
        let mut handled = HashSet::new();

        for conversation in self.pairings.take_expired().await {
            let mut notify = true;
            if let Some(id) = conversation.conversation_id {
                handled.insert(id);
                match self.conversations.close(id).await {
                    Ok(closed) => notify = closed,
                    Err(e) => {
                        // notice goes out once the close lands on a later pass
                        report.failures += 1;
                        warn!(conversation_id = id, error = %e, "Failed to close conversation");
                        self.pairings.restore(conversation).await;
                        continue;
                    }
                }
            }
            report.evicted += 1;
            if notify {
                for user in [&conversation.initiator.user_id, &conversation.counterpart.user_id] {
                    report.failures += self.notify(user).await;
                }
            }
        }

        let cutoff = self.pairings.now() - self.pairings.timeout();
        match self.conversations.list_stale(cutoff).await {
            Ok(rows) => {
                for row in rows {
                    if handled.contains(&row.id)
                        || self.pairings.tracks_conversation(row.id).await
                    {
                        continue;
                    }
                    match self.conversations.close(row.id).await {
                        Ok(true) => {
                            report.evicted += 1;
                            for user in [&row.initiator_id, &row.counterpart_id] {
                                report.failures += self.notify(user).await;
                            }
                        }
                        Ok(false) => {}
                        Err(e) => {
                            report.failures += 1;
                            warn!(conversation_id = row.id, error = %e, "Failed to close stale row");
                        }
                    }
                }
            }
            Err(e) => {
                report.failures += 1;
                warn!(error = %e, "Failed to list stale conversations");
            }
        }

        if report.evicted > 0 || report.failures > 0 {
            info!(
                op = "sweep_conversations",
                evicted_count = report.evicted,
                failures = report.failures,
                duration_ms = start.elapsed().as_millis() as u64,
                "Timed-out conversations closed"
            );
        }
        report
    }

    /// Delete expired market rows and cancel expired player orders.
    pub async fn sweep_orders(&self) -> SweepReport {
        let start = Instant::now();
        let now = self.pairings.now();
        let mut report = SweepReport::default();

        if let Some(markets) = &self.markets {
            match markets.purge_expired(now).await {
                Ok(n) => report.evicted += n as usize,
                Err(e) => {
                    report.failures += 1;
                    warn!(error = %e, "Failed to purge expired market orders");
                }
            }
        }
        if let Some(orders) = &self.orders {
            match orders.expire_stale(now).await {
                Ok(n) => report.evicted += n as usize,
                Err(e) => {
                    report.failures += 1;
                    warn!(error = %e, "Failed to expire player orders");
                }
            }
        }

        if report.evicted > 0 || report.failures > 0 {
            info!(
                op = "sweep_orders",
                evicted_count = report.evicted,
                failures = report.failures,
                duration_ms = start.elapsed().as_millis() as u64,
                "Expired orders swept"
            );
        }
        report
    }

    /// Returns 1 on failure so callers can add it to a failure count.
    async fn notify(&self, user_id: &str) -> usize {
        match self
            .messenger
            .send_direct_message(user_id, INACTIVITY_NOTICE)
            .await
        {
            Ok(()) => 0,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to send inactivity notice");
                1
            }
        }
    }
}
