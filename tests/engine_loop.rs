//! Integration tests for the collection loop: cadence, gating, failure
//! isolation and cancellation, driven with tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use sysscope::config::EngineConfig;
use sysscope::engine::{ListenerId, TierEvent, TierScheduler};
use sysscope::providers::mock::MockProvider;
use sysscope::stats::{InterfaceCounters, Tier};
use sysscope::subscription::{RefreshMode, Subscription};

fn engine(provider: Arc<MockProvider>) -> Arc<TierScheduler> {
    Arc::new(TierScheduler::new(provider, EngineConfig::default()))
}

fn drain(rx: &mut mpsc::UnboundedReceiver<TierEvent>) -> Vec<TierEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn fast_tier_publishes_roughly_once_per_second() {
    let provider = Arc::new(MockProvider::new());
    let scheduler = engine(provider.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    scheduler
        .broadcaster()
        .subscribe(Tier::Fast, ListenerId::new(), tx);

    let handle = tokio::spawn(scheduler.clone().run());
    tokio::time::sleep(Duration::from_millis(3500)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    let fast_updates = drain(&mut rx)
        .iter()
        .filter(|e| matches!(e, TierEvent::FastUpdate(_)))
        .count();
    // Iterations at t = 0s, 1s, 2s, 3s.
    assert!(
        (3..=5).contains(&fast_updates),
        "expected ~4 fast updates, got {fast_updates}"
    );
    assert!(scheduler.is_primed().await);
}

#[tokio::test(start_paused = true)]
async fn medium_and_slow_tiers_are_gated() {
    let provider = Arc::new(MockProvider::new());
    let scheduler = engine(provider.clone());

    let handle = tokio::spawn(scheduler.clone().run());
    tokio::time::sleep(Duration::from_millis(11_500)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    // Medium (5 s) due at t = 0, 5, 10; slow (20 s) only at t = 0.
    assert_eq!(provider.disk_calls(), 3, "medium tier fired too often");
    assert_eq!(provider.temperature_calls(), 3);
    assert_eq!(provider.process_calls(), 1, "slow tier fired too often");
    assert_eq!(provider.gpu_calls(), 1);
    assert!(provider.cpu_calls() >= 11, "fast tier stalled");
}

#[tokio::test(start_paused = true)]
async fn medium_snapshot_unchanged_across_gated_iterations() {
    let provider = Arc::new(MockProvider::new());
    let scheduler = engine(provider.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    scheduler
        .broadcaster()
        .subscribe(Tier::Medium, ListenerId::new(), tx);

    let handle = tokio::spawn(scheduler.clone().run());
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    // Only the t = 0 iteration was due; ticks 1-4 were skipped, not
    // republished.
    let medium_updates = drain(&mut rx)
        .iter()
        .filter(|e| matches!(e, TierEvent::MediumUpdate(_)))
        .count();
    assert_eq!(medium_updates, 1);
}

#[tokio::test(start_paused = true)]
async fn fast_failure_does_not_stall_the_loop() {
    let provider = Arc::new(MockProvider::new());
    provider.set_fail_cpu(true);
    let scheduler = engine(provider.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    scheduler
        .broadcaster()
        .subscribe(Tier::Fast, ListenerId::new(), tx);

    let handle = tokio::spawn(scheduler.clone().run());
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    // No fast publishes while the provider fails, but the loop keeps
    // retrying every second.
    assert!(drain(&mut rx).is_empty());
    assert!(provider.cpu_calls() >= 3);
    assert!(!scheduler.is_primed().await);

    provider.set_fail_cpu(false);
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    assert!(!drain(&mut rx).is_empty(), "loop did not recover");
    assert!(scheduler.is_primed().await);
}

#[tokio::test(start_paused = true)]
async fn panicking_iteration_rearms_the_loop() {
    let provider = Arc::new(MockProvider::new());
    provider.set_panic_cpu(true);
    let scheduler = engine(provider.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    scheduler
        .broadcaster()
        .subscribe(Tier::Fast, ListenerId::new(), tx);

    let handle = tokio::spawn(scheduler.clone().run());
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    // Each iteration panics inside the provider; the loop must keep
    // re-arming and retrying every second instead of dying.
    assert!(drain(&mut rx).is_empty());
    assert!(provider.cpu_calls() >= 3, "loop died after a panic");

    provider.set_panic_cpu(false);
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    let recovered = drain(&mut rx)
        .iter()
        .any(|e| matches!(e, TierEvent::FastUpdate(_)));
    assert!(recovered, "publishing did not resume after the panics stopped");
    assert!(scheduler.is_primed().await);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_publishing() {
    let provider = Arc::new(MockProvider::new());
    let scheduler = engine(provider.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    scheduler
        .broadcaster()
        .subscribe(Tier::Fast, ListenerId::new(), tx);

    let handle = tokio::spawn(scheduler.clone().run());
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    scheduler.shutdown();
    handle.await.unwrap();
    drain(&mut rx);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn network_rates_settle_after_first_loop_tick() {
    let provider = Arc::new(MockProvider::new());
    provider.set_network_counters(vec![InterfaceCounters {
        name: "eth0".to_string(),
        ip: None,
        rx_total_bytes: 1_000_000,
        tx_total_bytes: 500_000,
    }]);
    let scheduler = engine(provider.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    scheduler
        .broadcaster()
        .subscribe(Tier::Fast, ListenerId::new(), tx);

    let handle = tokio::spawn(scheduler.clone().run());
    tokio::time::sleep(Duration::from_millis(500)).await;
    provider.set_network_counters(vec![InterfaceCounters {
        name: "eth0".to_string(),
        ip: None,
        rx_total_bytes: 1_250_000,
        tx_total_bytes: 500_000,
    }]);
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    scheduler.shutdown();
    handle.await.unwrap();

    let events = drain(&mut rx);
    let rates: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            TierEvent::FastUpdate(snap) => Some(snap.network[0].rx_bytes_per_sec),
            _ => None,
        })
        .collect();
    assert_eq!(rates[0], 0, "first tick must report a zero rate");
    assert!(rates.contains(&250_000), "delta not observed: {rates:?}");
}

#[tokio::test(start_paused = true)]
async fn live_to_fixed_and_back_delivers_through_one_mechanism() {
    let provider = Arc::new(MockProvider::new());
    let scheduler = engine(provider.clone());
    let handle = tokio::spawn(scheduler.clone().run());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = Subscription::new(scheduler.clone(), tx);

    // Live mode: pushed on scheduler publishes.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let live_events = drain(&mut rx);
    assert!(live_events
        .iter()
        .any(|e| matches!(e, TierEvent::FastUpdate(_))));
    assert!(!live_events
        .iter()
        .any(|e| matches!(e, TierEvent::MetricsUpdate(_))));

    // Fixed mode: full overviews from forced collections, no tier pushes.
    subscription.set_mode(RefreshMode::Every5s).await;
    drain(&mut rx);
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    let fixed_events = drain(&mut rx);
    assert!(fixed_events
        .iter()
        .all(|e| matches!(e, TierEvent::MetricsUpdate(_))));
    assert!(!fixed_events.is_empty());

    // Back to live: tier pushes resume.
    subscription.set_mode(RefreshMode::Live).await;
    drain(&mut rx);
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, TierEvent::FastUpdate(_))));

    subscription.close().await;
    scheduler.shutdown();
    handle.await.unwrap();
}
