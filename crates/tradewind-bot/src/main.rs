//! tradewind-bot binary: storage, background sweeper and services.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tradewind_bot::{
    console, recover_conversations, Backends, Bot, BotConfig, DiscordRestMessenger, LogMessenger,
};
use tradewind_core::{Clock, ConversationRepository, Messenger, SystemClock};
use tradewind_db::{Database, PoolConfig};
use tradewind_jobs::{ExpirySweeper, SweeperEvent};
use tradewind_sessions::{PairingRegistry, SubmissionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file, rotated daily (optional)
    //   LOG_ANSI    - "true"/"false" override ANSI colors
    //   RUST_LOG    - env filter (default: "tradewind_bot=debug,tradewind_jobs=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tradewind_bot=debug,tradewind_jobs=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("tradewind-bot.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    let config = BotConfig::from_env()?;
    info!(
        submission_ttl_secs = config.submission_ttl_secs,
        conversation_timeout_secs = config.conversation_timeout_secs,
        "Starting tradewind-bot"
    );

    tokio::fs::create_dir_all(&config.image_storage_path).await?;

    let db = Database::connect_with_config(&config.database_url, PoolConfig::from_env()).await?;
    db.migrate().await?;
    info!("Database migrations applied");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let submissions = SubmissionStore::new(clock.clone(), config.submission_ttl());
    let pairings = PairingRegistry::new(clock.clone(), config.conversation_timeout());
    let conversations: Arc<dyn ConversationRepository> = Arc::new(db.conversations.clone());

    let recovered = recover_conversations(&pairings, conversations.as_ref()).await?;
    info!(recovered, "Pairing registry restored");

    let messenger: Arc<dyn Messenger> = match &config.discord_token {
        Some(token) => Arc::new(DiscordRestMessenger::new(token, &config.discord_api_base)?),
        None => {
            warn!("DISCORD_TOKEN not set; direct messages will only be logged");
            Arc::new(LogMessenger)
        }
    };

    let bot = Bot::new(
        submissions.clone(),
        pairings.clone(),
        clock,
        Backends {
            registry: Arc::new(db.entities.clone()),
            markets: Arc::new(db.markets.clone()),
            directory: Arc::new(db.markets.clone()),
            orders: Arc::new(db.orders.clone()),
            conversations: conversations.clone(),
            messenger: messenger.clone(),
        },
    );

    let sweeper = ExpirySweeper::new(
        submissions,
        pairings,
        conversations,
        messenger,
        config.sweeper.clone(),
    )
    .with_order_expiry(Arc::new(db.markets.clone()), Arc::new(db.orders.clone()))
    .start();
    let mut events = sweeper.events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SweeperEvent::ConversationsSwept(report)) if report.failures > 0 => {
                    warn!(failures = report.failures, "Conversation sweep had failures");
                }
                Ok(SweeperEvent::OrdersSwept(report)) if report.failures > 0 => {
                    warn!(failures = report.failures, "Order sweep had failures");
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("tradewind-bot ready");
    if config.console {
        tokio::select! {
            result = console::run(bot) => {
                if let Err(e) = result {
                    warn!(error = %e, "Operator console failed");
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutdown signal received");
            }
        }
    } else {
        info!("Console disabled; set CONSOLE=true to drive the services from stdin");
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
    }

    if let Err(e) = sweeper.shutdown().await {
        warn!(error = %e, "Sweeper already stopped");
    }
    db.pool().close().await;
    Ok(())
}
