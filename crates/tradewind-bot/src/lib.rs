//! # tradewind-bot
//!
//! Application layer of the tradewind market bot.
//!
//! - [`SubmissionService`]: screenshot-to-orders workflow
//! - [`ContactService`]: trade contact, relay and in-game names
//! - [`OrderService`]: player-posted orders
//! - [`ComponentAction`]: custom ids carried by buttons and menus
//! - [`DiscordRestMessenger`] / [`LogMessenger`]: direct-message backends
//! - [`recover_conversations`]: reload open conversations at startup
//! - [`console`]: stdin operator console over a [`Bot`]
//!
//! The Discord gateway itself lives outside this crate; it parses incoming
//! interactions with [`ComponentAction::parse`] and calls the services held
//! by a [`Bot`].

pub mod command;
pub mod config;
pub mod console;
pub mod messenger;
pub mod orders;
pub mod recovery;
pub mod submit;
pub mod trading;

pub use command::{ComponentAction, ItemChoice, CREATE_NEW_VALUE};
pub use config::BotConfig;
pub use messenger::{DiscordRestMessenger, LogMessenger};
pub use orders::{order_duration, FindOrders, OrderService, PostOrder, ORDER_DURATIONS};
pub use recovery::recover_conversations;
pub use submit::{CommitOutcome, SubmissionService, SubmissionStep};
pub use trading::{format_relay, ContactService, NO_CONVERSATION_HELP};

use std::sync::Arc;

use tradewind_core::{
    Clock, ConversationRepository, EntityRegistry, MarketRepository, Messenger,
    PlayerOrderRepository, TradeDirectory,
};
use tradewind_search::EntityResolver;
use tradewind_sessions::{PairingRegistry, SubmissionStore};

/// Storage and messaging backends the services run on.
#[derive(Clone)]
pub struct Backends {
    pub registry: Arc<dyn EntityRegistry>,
    pub markets: Arc<dyn MarketRepository>,
    pub directory: Arc<dyn TradeDirectory>,
    pub orders: Arc<dyn PlayerOrderRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messenger: Arc<dyn Messenger>,
}

/// Every service a gateway adapter dispatches to, over shared state.
#[derive(Clone)]
pub struct Bot {
    pub submissions: SubmissionService,
    pub contacts: ContactService,
    pub orders: OrderService,
}

impl Bot {
    pub fn new(
        store: SubmissionStore,
        pairings: PairingRegistry,
        clock: Arc<dyn Clock>,
        backends: Backends,
    ) -> Self {
        let resolver = EntityResolver::new(backends.registry);
        Self {
            submissions: SubmissionService::new(store, resolver.clone(), backends.markets),
            contacts: ContactService::new(
                pairings,
                backends.conversations,
                backends.directory.clone(),
                backends.orders.clone(),
                backends.messenger,
            ),
            orders: OrderService::new(backends.orders, backends.directory, resolver, clock),
        }
    }
}
