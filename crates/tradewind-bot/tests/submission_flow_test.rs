//! Submission workflow against in-memory collaborators.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tradewind_bot::{ItemChoice, SubmissionService, SubmissionStep};
use tradewind_core::mock::{InMemoryEntityRegistry, InMemoryMarketRepository};
use tradewind_core::ocr::{OcrItem, OcrPayload};
use tradewind_core::{Confidence, EntityKind, Error, ManualClock, MatchOrigin, OrderType};
use tradewind_search::EntityResolver;
use tradewind_sessions::{SubmissionProgress, SubmissionStore};

struct Fixture {
    clock: ManualClock,
    registry: InMemoryEntityRegistry,
    markets: InMemoryMarketRepository,
    service: SubmissionService,
}

impl Fixture {
    fn new(registry: InMemoryEntityRegistry) -> Self {
        let clock = ManualClock::new(Utc::now());
        let store = SubmissionStore::new(Arc::new(clock.clone()), Duration::minutes(5));
        let markets = InMemoryMarketRepository::new();
        let service = SubmissionService::new(
            store,
            EntityResolver::new(Arc::new(registry.clone())),
            Arc::new(markets.clone()),
        );
        Self {
            clock,
            registry,
            markets,
            service,
        }
    }
}

fn item(name: &str, price: i64, quantity: i64) -> OcrItem {
    OcrItem {
        name: name.to_string(),
        price,
        quantity,
    }
}

fn payload(port: &str, order_type: &str, items: Vec<OcrItem>) -> OcrPayload {
    OcrPayload {
        port: port.to_string(),
        order_type: order_type.to_string(),
        items,
    }
}

fn caribbean() -> InMemoryEntityRegistry {
    // ids: Port Royal = 1, Cannon = 2
    InMemoryEntityRegistry::new()
        .with_port("Port Royal", &["Port Royale"], Some("Caribbean"))
        .with_item("Cannon", &[])
}

#[tokio::test]
async fn test_alias_port_needs_no_prompt_and_commits_two_lines() {
    let fx = Fixture::new(caribbean());
    let step = fx
        .service
        .start(
            "anne",
            payload(
                "Port Royale",
                "sell",
                vec![item("Cannon", 100, 3), item("Wood", 10, 5)],
            ),
            OrderType::Sell,
            None,
        )
        .await
        .unwrap();

    // Port resolved through the alias; first prompt is the unknown item.
    let SubmissionStep::ConfirmItem {
        raw_name,
        matches,
        progress,
    } = step
    else {
        panic!("expected item prompt");
    };
    assert_eq!(raw_name, "Wood");
    assert!(matches.is_empty());
    assert_eq!(
        progress,
        SubmissionProgress {
            confirmed: 1,
            total: 2
        }
    );
    let pending = fx.service.store().get("anne").await.unwrap();
    assert_eq!(pending.port_id, Some(1));

    let step = fx
        .service
        .select_item("anne", "Wood", ItemChoice::CreateNew)
        .await
        .unwrap();
    assert_eq!(
        step,
        SubmissionStep::ReadyToCommit {
            port_id: 1,
            order_type: OrderType::Sell,
            line_count: 2
        }
    );
    let wood = fx.registry.find(EntityKind::Item, "Wood").unwrap();

    let outcome = fx.service.commit("anne").await.unwrap();
    assert_eq!(outcome.lines, 2);
    assert_eq!(outcome.provenance_hash.len(), 64);

    let commits = fx.markets.commits();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].port_id, 1);
    assert_eq!(commits[0].submitter, "anne");
    assert_eq!(commits[0].orders[0].item_id, 2);
    assert_eq!(commits[0].orders[1].item_id, wood.id);
    assert_eq!(commits[0].orders[1].quantity, 5);
    assert!(fx.service.store().get("anne").await.is_none());
}

#[tokio::test]
async fn test_unknown_port_prompts_then_select() {
    let fx = Fixture::new(caribbean());
    let step = fx
        .service
        .start(
            "anne",
            payload("Port Roya", "sell", vec![item("Cannon", 100, 3)]),
            OrderType::Sell,
            None,
        )
        .await
        .unwrap();
    let SubmissionStep::ConfirmPort { raw_name, matches } = step else {
        panic!("expected port prompt");
    };
    assert_eq!(raw_name, "Port Roya");
    assert_eq!(matches[0].entity_id(), Some(1));
    assert_eq!(matches[0].origin, Some(MatchOrigin::Fuzzy));
    assert_eq!(matches[0].confidence, Confidence::High);

    let step = fx.service.select_port("anne", 1).await.unwrap();
    assert!(matches!(
        step,
        SubmissionStep::ReadyToCommit { line_count: 1, .. }
    ));
}

#[tokio::test]
async fn test_repeated_names_prompt_once_each() {
    let fx = Fixture::new(
        InMemoryEntityRegistry::new()
            .with_port("Tortuga", &[], None)
            .with_item("Wood", &[]),
    );
    let items = vec![
        item("Cannon", 100, 1),
        item("Wood", 10, 5),
        item("Cannon", 110, 2),
        item("Rum", 7, 20),
        item("Cannon", 120, 3),
    ];
    let mut step = fx
        .service
        .start("jack", payload("Tortuga", "buy", items), OrderType::Buy, None)
        .await
        .unwrap();

    let mut prompted = Vec::new();
    while let SubmissionStep::ConfirmItem { raw_name, .. } = &step {
        let name = raw_name.clone();
        prompted.push(name.clone());
        step = fx
            .service
            .select_item("jack", &name, ItemChoice::CreateNew)
            .await
            .unwrap();
    }
    // Three "Cannon" lines, one prompt; "Wood" resolves on its own.
    assert_eq!(prompted, vec!["Cannon", "Rum"]);
    assert!(matches!(
        step,
        SubmissionStep::ReadyToCommit { line_count: 5, .. }
    ));

    fx.service.commit("jack").await.unwrap();
    let orders = &fx.markets.commits()[0].orders;
    let cannon = fx.registry.find(EntityKind::Item, "Cannon").unwrap().id;
    assert_eq!(orders.iter().filter(|o| o.item_id == cannon).count(), 3);
    assert_eq!(
        orders.iter().map(|o| o.price).collect::<Vec<_>>(),
        vec![100, 10, 110, 7, 120]
    );
}

#[tokio::test]
async fn test_create_new_for_mapped_name_creates_nothing() {
    let fx = Fixture::new(InMemoryEntityRegistry::new().with_port("Tortuga", &[], None));
    let items = vec![item("Rum", 7, 20), item("Grog", 3, 40)];
    fx.service
        .start("jack", payload("Tortuga", "buy", items), OrderType::Buy, None)
        .await
        .unwrap();

    fx.service
        .select_item("jack", "Rum", ItemChoice::CreateNew)
        .await
        .unwrap();
    let entities = fx.registry.len();
    let rum = fx.registry.find(EntityKind::Item, "Rum").unwrap().id;

    // a second "create new" click for the same name
    let step = fx
        .service
        .select_item("jack", "Rum", ItemChoice::CreateNew)
        .await
        .unwrap();
    assert_eq!(fx.registry.len(), entities);
    match step {
        SubmissionStep::ConfirmItem {
            raw_name, progress, ..
        } => {
            assert_eq!(raw_name, "Grog");
            assert_eq!(progress, SubmissionProgress { confirmed: 1, total: 2 });
        }
        other => panic!("expected the Grog prompt, got {other:?}"),
    }
    let submission = fx.service.store().get("jack").await.unwrap();
    assert_eq!(submission.item_mappings.get("Rum"), Some(&rum));
}

#[tokio::test]
async fn test_high_confidence_item_is_auto_mapped() {
    let fx = Fixture::new(caribbean());
    let step = fx
        .service
        .start(
            "anne",
            payload("Port Royal", "sell", vec![item("Cannons", 90, 1)]),
            OrderType::Sell,
            None,
        )
        .await
        .unwrap();
    // "cannons" vs "cannon" scores 6/7, above the auto-accept threshold.
    assert!(matches!(
        step,
        SubmissionStep::ReadyToCommit { line_count: 1, .. }
    ));
}

#[tokio::test]
async fn test_order_type_mismatch_rejected_without_submission() {
    let fx = Fixture::new(caribbean());
    let err = fx
        .service
        .start(
            "anne",
            payload("Port Royal", "buy", vec![item("Cannon", 1, 1)]),
            OrderType::Sell,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(fx.service.store().is_empty().await);
}

#[tokio::test]
async fn test_second_start_while_live_conflicts() {
    let fx = Fixture::new(caribbean());
    let p = payload("Port Royal", "sell", vec![item("Wood", 1, 1)]);
    fx.service
        .start("anne", p.clone(), OrderType::Sell, None)
        .await
        .unwrap();
    let err = fx
        .service
        .start("anne", p.clone(), OrderType::Sell, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Once the first one lapses a new start replaces it.
    fx.clock.advance(Duration::minutes(6));
    fx.service
        .start("anne", p, OrderType::Sell, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_commit_failure_keeps_submission() {
    let fx = Fixture::new(caribbean());
    fx.service
        .start(
            "anne",
            payload("Port Royal", "sell", vec![item("Cannon", 100, 3)]),
            OrderType::Sell,
            None,
        )
        .await
        .unwrap();

    fx.markets.set_failing(true);
    assert!(fx.service.commit("anne").await.is_err());
    assert!(fx.service.store().get("anne").await.is_some());

    fx.markets.set_failing(false);
    let outcome = fx.service.commit("anne").await.unwrap();
    assert_eq!(outcome.lines, 1);
}

#[tokio::test]
async fn test_commit_before_complete_is_invalid_state() {
    let fx = Fixture::new(caribbean());
    fx.service
        .start(
            "anne",
            payload("Port Royal", "sell", vec![item("Wood", 10, 5)]),
            OrderType::Sell,
            None,
        )
        .await
        .unwrap();
    let err = fx.service.commit("anne").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid state: 0 of 1 items confirmed");
    assert!(fx.markets.commits().is_empty());
}

#[tokio::test]
async fn test_create_port_conflict_leaves_submission() {
    let fx = Fixture::new(caribbean());
    fx.service
        .start(
            "anne",
            payload("Nassau", "sell", vec![item("Cannon", 100, 3)]),
            OrderType::Sell,
            None,
        )
        .await
        .unwrap();
    let err = fx
        .service
        .create_port("anne", "port royal", Some("Caribbean"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let step = fx.service.create_port("anne", "Nassau", None).await.unwrap();
    assert!(matches!(step, SubmissionStep::ReadyToCommit { .. }));
    assert!(fx.registry.find(EntityKind::Port, "Nassau").is_some());
}

#[tokio::test]
async fn test_registry_failure_drops_submission_and_artifact() {
    let fx = Fixture::new(caribbean());
    let dir = tempfile::tempdir().unwrap();
    let shot = dir.path().join("shot.png");
    std::fs::write(&shot, b"png").unwrap();

    fx.registry.set_failing(true);
    let err = fx
        .service
        .start(
            "anne",
            payload("Port Royal", "sell", vec![item("Cannon", 1, 1)]),
            OrderType::Sell,
            Some(shot.clone()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    assert!(fx.service.store().is_empty().await);
    assert!(!shot.exists());
}

#[tokio::test]
async fn test_cancel_removes_submission_and_artifact() {
    let fx = Fixture::new(caribbean());
    let dir = tempfile::tempdir().unwrap();
    let shot = dir.path().join("shot.png");
    std::fs::write(&shot, b"png").unwrap();

    fx.service
        .start(
            "anne",
            payload("Nassau", "sell", vec![item("Cannon", 1, 1)]),
            OrderType::Sell,
            Some(shot.clone()),
        )
        .await
        .unwrap();
    fx.service.cancel("anne").await.unwrap();
    assert!(!shot.exists());
    assert!(matches!(
        fx.service.cancel("anne").await,
        Err(Error::SubmissionNotFound(_))
    ));
}
