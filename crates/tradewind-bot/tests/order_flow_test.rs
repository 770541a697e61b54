//! Player order posting, search and cancellation against in-memory collaborators.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tradewind_bot::console::handle_line;
use tradewind_bot::{Backends, Bot, FindOrders, OrderService, PostOrder};
use tradewind_core::mock::{
    InMemoryConversationRepository, InMemoryEntityRegistry, InMemoryMarketRepository,
    InMemoryPlayerOrderRepository, InMemoryTradeDirectory, RecordingMessenger,
};
use tradewind_core::{Clock, Error, ManualClock, OrderType, PlayerOrderStatus};
use tradewind_search::EntityResolver;
use tradewind_sessions::{PairingRegistry, SubmissionStore};

struct Fixture {
    clock: ManualClock,
    registry: InMemoryEntityRegistry,
    orders: InMemoryPlayerOrderRepository,
    service: OrderService,
}

impl Fixture {
    fn new() -> Self {
        let clock = ManualClock::new(Utc::now());
        let shared: Arc<ManualClock> = Arc::new(clock.clone());
        // ids: Port Royal = 1, Cannon = 2
        let registry = InMemoryEntityRegistry::new()
            .with_port("Port Royal", &["Port Royale"], Some("Caribbean"))
            .with_item("Cannon", &[]);
        let directory = InMemoryTradeDirectory::new()
            .with_profile("anne", "Anne")
            .with_profile("bart", "Bart");
        let orders = InMemoryPlayerOrderRepository::new().with_clock(shared.clone());
        let service = OrderService::new(
            Arc::new(orders.clone()),
            Arc::new(directory),
            EntityResolver::new(Arc::new(registry.clone())),
            shared,
        );
        Self {
            clock,
            registry,
            orders,
            service,
        }
    }
}

fn sell(item: &str, price: i64) -> PostOrder {
    PostOrder {
        order_type: OrderType::Sell,
        item: item.to_string(),
        price,
        quantity: 5,
        duration: None,
        port: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_post_requires_in_game_name() {
    let fx = Fixture::new();
    let err = fx
        .service
        .post_order("nobody", sell("Cannon", 100))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert!(fx.service.search(FindOrders::default(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_rejects_non_positive_amounts() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.service.post_order("anne", sell("Cannon", 0)).await,
        Err(Error::InvalidInput(_))
    ));
    let mut req = sell("Cannon", 100);
    req.quantity = -1;
    assert!(matches!(
        fx.service.post_order("anne", req).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_post_matches_known_item_and_creates_unknown() {
    let fx = Fixture::new();
    let known = fx
        .service
        .post_order("anne", sell("cannon", 100))
        .await
        .unwrap();
    assert_eq!(known.item_id, 2);
    assert_eq!(known.ingame_name, "Anne");
    assert_eq!(fx.registry.len(), 2);

    let created = fx
        .service
        .post_order("anne", sell("Spyglass", 40))
        .await
        .unwrap();
    assert_eq!(fx.registry.len(), 3);
    assert_ne!(created.item_id, known.item_id);
}

#[tokio::test]
async fn test_post_with_port_and_duration() {
    let fx = Fixture::new();
    let mut req = sell("Cannon", 100);
    req.port = Some("Port Royale".to_string());
    req.duration = Some("3d".to_string());
    req.notes = Some("   ".to_string());
    let order = fx.service.post_order("anne", req).await.unwrap();
    assert_eq!(order.port_id, Some(1));
    assert_eq!(order.expires_at, fx.clock.now() + Duration::days(3));
    assert!(order.notes.is_none());

    let mut req = sell("Cannon", 100);
    req.port = Some("Atlantis".to_string());
    assert!(matches!(
        fx.service.post_order("anne", req).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_search_filters() {
    let fx = Fixture::new();
    fx.service.post_order("anne", sell("Cannon", 100)).await.unwrap();
    fx.service.post_order("bart", sell("Cannon", 300)).await.unwrap();
    let mut buy = sell("Cannon", 150);
    buy.order_type = OrderType::Buy;
    fx.service.post_order("bart", buy).await.unwrap();
    fx.service.post_order("bart", sell("Spyglass", 50)).await.unwrap();

    let cannons = FindOrders {
        item: Some("Cannon".to_string()),
        ..Default::default()
    };
    assert_eq!(fx.service.search(cannons.clone(), 10).await.unwrap().len(), 3);

    let band = FindOrders {
        order_type: Some(OrderType::Sell),
        min_price: Some(90),
        max_price: Some(200),
        ..cannons.clone()
    };
    let found = fx.service.search(band, 10).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].user_id, "anne");

    // An unknown port filter is dropped rather than matching nothing.
    let anywhere = FindOrders {
        port: Some("Atlantis".to_string()),
        ..cannons
    };
    assert_eq!(fx.service.search(anywhere, 10).await.unwrap().len(), 3);

    let unknown = FindOrders {
        item: Some("Unobtainium".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        fx.service.search(unknown, 10).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_expired_orders_drop_out_of_listings() {
    let fx = Fixture::new();
    let mut short = sell("Cannon", 100);
    short.duration = Some("1d".to_string());
    fx.service.post_order("anne", short).await.unwrap();
    fx.service.post_order("anne", sell("Cannon", 120)).await.unwrap();
    assert_eq!(fx.service.my_orders("anne").await.unwrap().len(), 2);

    fx.clock.advance(Duration::days(2));
    let mine = fx.service.my_orders("anne").await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].price, 120);
}

#[tokio::test]
async fn test_cancel_only_own_open_orders() {
    let fx = Fixture::new();
    let order = fx
        .service
        .post_order("anne", sell("Cannon", 100))
        .await
        .unwrap();

    let err = fx.service.cancel("bart", order.id).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("Not found: Order #{} not found or not owned by you", order.id)
    );

    fx.service.cancel("anne", order.id).await.unwrap();
    assert_eq!(
        fx.orders.get(order.id).unwrap().status,
        PlayerOrderStatus::Cancelled
    );
    assert!(fx.service.my_orders("anne").await.unwrap().is_empty());
    assert!(matches!(
        fx.service.cancel("anne", order.id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_console_posts_and_contacts() {
    let clock = ManualClock::new(Utc::now());
    let shared: Arc<ManualClock> = Arc::new(clock.clone());
    let messenger = RecordingMessenger::new();
    let bot = Bot::new(
        SubmissionStore::new(shared.clone(), Duration::minutes(5)),
        PairingRegistry::new(shared.clone(), Duration::minutes(30)),
        shared.clone(),
        Backends {
            registry: Arc::new(InMemoryEntityRegistry::new().with_item("Cannon", &[])),
            markets: Arc::new(InMemoryMarketRepository::new()),
            directory: Arc::new(InMemoryTradeDirectory::new()),
            orders: Arc::new(InMemoryPlayerOrderRepository::new().with_clock(shared.clone())),
            conversations: Arc::new(InMemoryConversationRepository::new().with_clock(shared)),
            messenger: Arc::new(messenger.clone()),
        },
    );

    assert_eq!(
        handle_line(&bot, "name anne Anne Bonny").await,
        "In-game name set to **Anne Bonny**"
    );
    handle_line(&bot, "name bart Bart").await;
    assert_eq!(
        handle_line(&bot, "post anne sell 100 2 Cannon").await,
        "Order #1 posted"
    );
    assert!(handle_line(&bot, "post anne sell lots 2 Cannon")
        .await
        .contains("whole number"));
    assert!(handle_line(&bot, "find cannon").await.contains("by Anne Bonny"));

    assert_eq!(
        handle_line(&bot, "contact bart 1").await,
        "Connected with **Anne Bonny**"
    );
    assert_eq!(handle_line(&bot, "say bart ahoy").await, "relayed 1 message(s)");
    assert!(messenger
        .messages_to("anne")
        .contains(&"**[Bart]**: ahoy".to_string()));
    assert_eq!(handle_line(&bot, "end anne").await, "Trade conversation ended");
    assert!(handle_line(&bot, "say anne hello?")
        .await
        .starts_with("You're not in an active trade conversation"));
    assert!(handle_line(&bot, "bogus").await.starts_with("commands:"));
}
