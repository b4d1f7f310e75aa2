use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use trackbert_application::{
    EngineConfig, NotificationDispatcher, NotifierRegistry, ProviderRegistry,
    ReconciliationEngine, ShipmentOutcome, ShutdownSignal,
};
use trackbert_domain::ports::{Notifier, TrackingProvider};
use trackbert_domain::repositories::EventStore;
use trackbert_testing_utils::{
    new_call_log, EventBuilder, MockEventStore, MockNotifier, MockProvider, ShipmentBuilder,
    TestData,
};

struct Harness {
    engine: ReconciliationEngine,
}

async fn build_engine(
    store: &MockEventStore,
    providers: Vec<MockProvider>,
    notifiers: Vec<MockNotifier>,
    config: EngineConfig,
) -> Harness {
    let providers: Vec<Arc<dyn TrackingProvider>> = providers
        .into_iter()
        .map(|p| Arc::new(p) as Arc<dyn TrackingProvider>)
        .collect();
    let notifiers: Vec<Arc<dyn Notifier>> = notifiers
        .into_iter()
        .map(|n| Arc::new(n) as Arc<dyn Notifier>)
        .collect();

    let registry = Arc::new(ProviderRegistry::from_providers(providers).await);
    let notifier_registry = Arc::new(NotifierRegistry::from_notifiers(notifiers).await);
    let dispatcher = Arc::new(NotificationDispatcher::new(notifier_registry));
    let store: Arc<dyn EventStore> = Arc::new(store.clone());

    Harness {
        engine: ReconciliationEngine::new(store, registry, dispatcher, config),
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        interval: Duration::from_secs(60),
        fetch_timeout: Duration::from_secs(5),
        max_concurrent: 4,
    }
}

#[tokio::test]
async fn test_shipment_without_carrier_is_skipped() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("NOCARRIER")
        .without_carrier()
        .build()]);
    let provider = MockProvider::new("any").supporting("*", 1).with_events(
        "NOCARRIER",
        TestData::observed_many(&[("2024-01-01 00:00:00", "已揽收")]),
    );
    let harness = build_engine(&store, vec![provider.clone()], vec![], fast_config()).await;

    let report = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.outcome_for("NOCARRIER"), Some(&ShipmentOutcome::Skipped));
    assert_eq!(provider.call_count(), 0);
    assert!(store.all_events().is_empty());
}

#[tokio::test]
async fn test_unmatched_carrier_is_skipped_without_error() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("UPS1")
        .with_carrier("ups")
        .build()]);
    let provider = MockProvider::new("dhl-only").supporting("dhl", 1);
    let harness = build_engine(&store, vec![provider.clone()], vec![], fast_config()).await;

    let report = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.outcome_for("UPS1"), Some(&ShipmentOutcome::NoProvider));
    assert_eq!(report.failures(), 0);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_highest_priority_provider_is_queried() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("DHL1")
        .with_carrier("dhl")
        .build()]);
    let a = MockProvider::new("A").supporting("dhl", 1);
    let b = MockProvider::new("B").supporting("dhl", 5);
    let c = MockProvider::new("C").supporting("*", 0);
    let harness = build_engine(
        &store,
        vec![a.clone(), b.clone(), c.clone()],
        vec![],
        fast_config(),
    )
    .await;

    harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(a.call_count(), 0);
    assert_eq!(b.calls(), vec![("DHL1".to_string(), "dhl".to_string())]);
    assert_eq!(c.call_count(), 0);
}

#[tokio::test]
async fn test_only_events_after_latest_known_are_persisted_in_order() {
    let shipment = ShipmentBuilder::new()
        .with_id(7)
        .with_tracking_number("ORDER1")
        .with_carrier("dhl")
        .build();
    let store = MockEventStore::with_shipments(vec![shipment]).with_events(vec![EventBuilder::new()
        .with_id(1)
        .with_shipment_id(7)
        .with_time("2024-01-01T00:00:00")
        .build()]);
    let provider = MockProvider::new("dhl").supporting("dhl", 1).with_events(
        "ORDER1",
        TestData::observed_many(&[
            ("2024-01-03", "派送中"),
            ("2024-01-01T00:00:00", "已揽收"),
            ("2024-01-02", "运输中"),
        ]),
    );
    let notifier = MockNotifier::new("desktop");
    let harness = build_engine(&store, vec![provider], vec![notifier.clone()], fast_config()).await;

    let report = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(
        report.outcome_for("ORDER1"),
        Some(&ShipmentOutcome::Processed { new_events: 2 })
    );

    let persisted: Vec<_> = store
        .events_for(7)
        .into_iter()
        .skip(1)
        .map(|e| e.event_time)
        .collect();
    assert_eq!(persisted, vec!["2024-01-02 00:00:00", "2024-01-03 00:00:00"]);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].message, "运输中 - 2024-01-02 00:00:00");
    assert!(!sent[0].urgent);
    assert_eq!(sent[1].message, "派送中 - 2024-01-03 00:00:00");
    assert!(sent[1].urgent);
}

#[tokio::test]
async fn test_no_prior_event_persists_everything_oldest_first() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_id(3)
        .with_tracking_number("FRESH")
        .build()]);
    let provider = MockProvider::new("dhl").supporting("dhl", 1).with_events(
        "FRESH",
        TestData::observed_many(&[
            ("2024-02-03 12:00:00", "派送中"),
            ("2024-02-01 12:00:00", "已揽收"),
            ("2024-02-02 12:00:00", "运输中"),
        ]),
    );
    let notifier = MockNotifier::new("desktop");
    let harness = build_engine(&store, vec![provider], vec![notifier.clone()], fast_config()).await;

    harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    let descriptions: Vec<_> = store
        .events_for(3)
        .into_iter()
        .map(|e| e.event_description)
        .collect();
    assert_eq!(descriptions, vec!["已揽收", "运输中", "派送中"]);

    let urgency: Vec<_> = notifier.sent().iter().map(|n| n.urgent).collect();
    assert_eq!(urgency, vec![false, false, true]);
}

#[tokio::test]
async fn test_second_cycle_without_upstream_changes_persists_nothing() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("IDEMP")
        .build()]);
    let provider = MockProvider::new("dhl").supporting("dhl", 1).with_events(
        "IDEMP",
        TestData::observed_many(&[
            ("2024-01-01T08:00:00Z", "已揽收"),
            ("2024-01-02T08:00:00Z", "运输中"),
        ]),
    );
    let notifier = MockNotifier::new("desktop");
    let harness = build_engine(
        &store,
        vec![provider.clone()],
        vec![notifier.clone()],
        fast_config(),
    )
    .await;
    let shutdown = ShutdownSignal::never();

    let first = harness.engine.run_cycle(&shutdown).await.unwrap();
    let second = harness.engine.run_cycle(&shutdown).await.unwrap();

    assert_eq!(first.new_events(), 2);
    assert_eq!(second.new_events(), 0);
    assert_eq!(second.outcome_for("IDEMP"), Some(&ShipmentOutcome::UpToDate));
    assert_eq!(store.all_events().len(), 2);
    assert_eq!(notifier.sent().len(), 2);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_unparseable_timestamp_does_not_block_later_events() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_id(11)
        .with_tracking_number("ODDTIME")
        .build()]);
    let provider = MockProvider::new("dhl")
        .supporting("dhl", 1)
        .with_events("ODDTIME", TestData::observed_many(&[("Mon, 01 Jan 2024", "未知")]));
    let notifier = MockNotifier::new("desktop");
    let harness = build_engine(
        &store,
        vec![provider.clone()],
        vec![notifier.clone()],
        fast_config(),
    )
    .await;
    let shutdown = ShutdownSignal::never();

    let first = harness.engine.run_cycle(&shutdown).await.unwrap();
    assert_eq!(first.outcome_for("ODDTIME"), Some(&ShipmentOutcome::UpToDate));
    assert!(store.events_for(11).is_empty());

    provider.set_events(
        "ODDTIME",
        TestData::observed_many(&[
            ("Mon, 01 Jan 2024", "未知"),
            ("2024-06-01 10:00:00", "已签收"),
        ]),
    );
    let second = harness.engine.run_cycle(&shutdown).await.unwrap();

    assert_eq!(
        second.outcome_for("ODDTIME"),
        Some(&ShipmentOutcome::Processed { new_events: 1 })
    );
    let stored: Vec<_> = store
        .events_for(11)
        .into_iter()
        .map(|e| e.event_time)
        .collect();
    assert_eq!(stored, vec!["2024-06-01 10:00:00"]);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].urgent);
}

#[tokio::test]
async fn test_empty_upstream_response_is_up_to_date() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("EMPTY")
        .build()]);
    let provider = MockProvider::new("dhl").supporting("dhl", 1);
    let harness = build_engine(&store, vec![provider], vec![], fast_config()).await;

    let report = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.outcome_for("EMPTY"), Some(&ShipmentOutcome::UpToDate));
    assert_eq!(store.append_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_does_not_affect_other_shipments() {
    let store = MockEventStore::with_shipments(vec![
        ShipmentBuilder::new()
            .with_id(1)
            .with_tracking_number("SLOW")
            .with_carrier("slowpost")
            .build(),
        ShipmentBuilder::new()
            .with_id(2)
            .with_tracking_number("FAST")
            .with_carrier("dhl")
            .build(),
    ]);
    let slow = MockProvider::new("slow")
        .supporting("slowpost", 1)
        .with_delay(Duration::from_secs(600))
        .with_events("SLOW", TestData::observed_many(&[("2024-01-01 00:00:00", "已揽收")]));
    let fast = MockProvider::new("fast")
        .supporting("dhl", 1)
        .with_events("FAST", TestData::observed_many(&[("2024-01-01 00:00:00", "已揽收")]));
    let notifier = MockNotifier::new("desktop");
    let harness = build_engine(
        &store,
        vec![slow, fast],
        vec![notifier.clone()],
        fast_config(),
    )
    .await;

    let report = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.outcome_for("SLOW"), Some(&ShipmentOutcome::TimedOut));
    assert_eq!(
        report.outcome_for("FAST"),
        Some(&ShipmentOutcome::Processed { new_events: 1 })
    );
    assert!(store.events_for(1).is_empty());
    assert_eq!(store.events_for(2).len(), 1);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(notifier.sent()[0].title, "New event for FAST");
}

#[tokio::test]
async fn test_fetch_failure_is_isolated() {
    let store = MockEventStore::with_shipments(vec![
        ShipmentBuilder::new().with_id(1).with_tracking_number("BROKEN").build(),
        ShipmentBuilder::new().with_id(2).with_tracking_number("GOOD").build(),
    ]);
    let provider = MockProvider::new("dhl")
        .supporting("dhl", 1)
        .failing_for("BROKEN")
        .with_events("GOOD", TestData::observed_many(&[("2024-01-01 00:00:00", "已揽收")]));
    let harness = build_engine(&store, vec![provider], vec![], fast_config()).await;

    let report = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.outcome_for("BROKEN"), Some(&ShipmentOutcome::FetchFailed));
    assert_eq!(report.failures(), 1);
    assert!(store.events_for(1).is_empty());
    assert_eq!(store.events_for(2).len(), 1);
}

#[tokio::test]
async fn test_failing_notifier_does_not_block_persistence_or_others() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("NOTIFY")
        .build()]);
    let provider = MockProvider::new("dhl").supporting("dhl", 1).with_events(
        "NOTIFY",
        TestData::observed_many(&[
            ("2024-01-01 00:00:00", "已揽收"),
            ("2024-01-02 00:00:00", "运输中"),
        ]),
    );
    let failing = MockNotifier::new("matrix").failing();
    let healthy = MockNotifier::new("desktop");
    let harness = build_engine(
        &store,
        vec![provider],
        vec![failing.clone(), healthy.clone()],
        fast_config(),
    )
    .await;

    let report = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(
        report.outcome_for("NOTIFY"),
        Some(&ShipmentOutcome::Processed { new_events: 2 })
    );
    assert_eq!(store.all_events().len(), 2);
    assert_eq!(failing.sent().len(), 2);
    assert_eq!(healthy.sent().len(), 2);
}

#[tokio::test]
async fn test_store_failure_aborts_remaining_events_of_shipment() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("PARTIAL")
        .build()])
    .fail_appends_after(1);
    let provider = MockProvider::new("dhl").supporting("dhl", 1).with_events(
        "PARTIAL",
        TestData::observed_many(&[
            ("2024-01-01 00:00:00", "已揽收"),
            ("2024-01-02 00:00:00", "运输中"),
            ("2024-01-03 00:00:00", "派送中"),
        ]),
    );
    let notifier = MockNotifier::new("desktop");
    let harness = build_engine(&store, vec![provider], vec![notifier.clone()], fast_config()).await;

    let report = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(
        report.outcome_for("PARTIAL"),
        Some(&ShipmentOutcome::StoreFailed { persisted: 1 })
    );
    assert_eq!(store.all_events().len(), 1);
    assert_eq!(store.append_attempts(), 2);
    assert_eq!(notifier.sent().len(), 1);
    assert!(!notifier.sent()[0].urgent);
}

#[tokio::test]
async fn test_each_event_is_persisted_before_it_is_notified() {
    let log = new_call_log();
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("SEQ")
        .build()])
    .with_call_log(log.clone());
    let provider = MockProvider::new("dhl").supporting("dhl", 1).with_events(
        "SEQ",
        TestData::observed_many(&[
            ("2024-01-02 00:00:00", "运输中"),
            ("2024-01-01 00:00:00", "已揽收"),
        ]),
    );
    let notifier = MockNotifier::new("desktop").with_call_log(log.clone());
    let harness = build_engine(&store, vec![provider], vec![notifier], fast_config()).await;

    harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "append:2024-01-01 00:00:00".to_string(),
            "notify:desktop:false".to_string(),
            "append:2024-01-02 00:00:00".to_string(),
            "notify:desktop:true".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_bounded() {
    let shipments = (1..=6)
        .map(|id| {
            ShipmentBuilder::new()
                .with_id(id)
                .with_tracking_number(&format!("PKG{id}"))
                .build()
        })
        .collect();
    let store = MockEventStore::with_shipments(shipments);
    let provider = MockProvider::new("dhl")
        .supporting("dhl", 1)
        .with_delay(Duration::from_secs(1));
    let config = EngineConfig {
        max_concurrent: 2,
        ..fast_config()
    };
    let harness = build_engine(&store, vec![provider.clone()], vec![], config).await;

    let report = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap();

    assert_eq!(report.shipment_count(), 6);
    assert_eq!(provider.call_count(), 6);
    assert_eq!(provider.max_in_flight(), 2);
}

#[tokio::test]
async fn test_listing_failure_is_reported_as_store_error() {
    let store = MockEventStore::new().failing_listing();
    let harness = build_engine(&store, vec![], vec![], fast_config()).await;

    let err = harness
        .engine
        .run_cycle(&ShutdownSignal::never())
        .await
        .unwrap_err();

    assert!(err.is_store_failure());
    assert!(!err.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_in_flight_fetch_and_stops_loop() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("HANGING")
        .build()]);
    let provider = MockProvider::new("dhl")
        .supporting("dhl", 1)
        .with_delay(Duration::from_secs(1000))
        .with_events("HANGING", TestData::observed_many(&[("2024-01-01 00:00:00", "已揽收")]));
    let config = EngineConfig {
        fetch_timeout: Duration::from_secs(3000),
        ..fast_config()
    };
    let harness = build_engine(&store, vec![provider.clone()], vec![], config).await;

    let (tx, rx) = watch::channel(false);
    let engine = Arc::new(harness.engine);
    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run(ShutdownSignal::new(rx)).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(provider.call_count(), 1);
    tx.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("engine should stop promptly")
        .unwrap();
    assert!(result.is_ok());
    assert!(store.all_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_loop_runs_cycles_on_interval() {
    let store = MockEventStore::with_shipments(vec![ShipmentBuilder::new()
        .with_tracking_number("LOOP")
        .build()]);
    let provider = MockProvider::new("dhl").supporting("dhl", 1);
    let config = EngineConfig {
        interval: Duration::from_secs(60),
        ..fast_config()
    };
    let harness = build_engine(&store, vec![provider.clone()], vec![], config).await;

    let (tx, rx) = watch::channel(false);
    let engine = Arc::new(harness.engine);
    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run(ShutdownSignal::new(rx)).await })
    };

    // 第0秒和第60秒各一个周期
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(provider.call_count(), 2);

    // 后续周期中上游出现新事件
    provider.set_events("LOOP", TestData::observed_many(&[("2024-03-01 00:00:00", "已揽收")]));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(store.all_events().len(), 1);

    tx.send(true).unwrap();
    runner.await.unwrap().unwrap();
}
