//! Per-connection refresh subscriptions.
//!
//! Each connection has exactly one active delivery mechanism at any
//! instant: `live` registers with the broadcaster for all three tiers and
//! receives pushes when the scheduler publishes; the fixed-interval modes
//! own a private timer that triggers a fresh forced collection on each fire
//! and delivers the full overview to this connection only. Mode switches
//! tear the old mechanism down before installing the new one, under the
//! connection's lock.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as DeliveryLock;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::{ListenerId, TierEvent, TierScheduler};
use crate::stats::Tier;

/// A client's requested refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Push on every tier update from the scheduler.
    Live,
    Every5s,
    Every10s,
    EveryMinute,
    Every10Minutes,
}

impl RefreshMode {
    /// Timer period for fixed-interval modes; `None` for live.
    pub fn period(&self) -> Option<Duration> {
        match self {
            RefreshMode::Live => None,
            RefreshMode::Every5s => Some(Duration::from_secs(5)),
            RefreshMode::Every10s => Some(Duration::from_secs(10)),
            RefreshMode::EveryMinute => Some(Duration::from_secs(60)),
            RefreshMode::Every10Minutes => Some(Duration::from_secs(600)),
        }
    }
}

impl FromStr for RefreshMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(RefreshMode::Live),
            "5s" => Ok(RefreshMode::Every5s),
            "10s" => Ok(RefreshMode::Every10s),
            "1m" => Ok(RefreshMode::EveryMinute),
            "10m" => Ok(RefreshMode::Every10Minutes),
            other => Err(crate::Error::Other(format!(
                "unknown refresh mode: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefreshMode::Live => "live",
            RefreshMode::Every5s => "5s",
            RefreshMode::Every10s => "10s",
            RefreshMode::EveryMinute => "1m",
            RefreshMode::Every10Minutes => "10m",
        };
        write!(f, "{s}")
    }
}

enum Mechanism {
    /// Registered with the broadcaster for all three tiers.
    Live,
    /// Private timer driving forced collections. The timer task checks the
    /// token and delivers while holding `delivery`, so teardown can make
    /// cancellation atomic with the last send.
    Timer {
        cancel: CancellationToken,
        delivery: Arc<DeliveryLock<()>>,
        task: JoinHandle<()>,
    },
    /// Torn down; terminal.
    Closed,
}

/// One client connection's subscription state.
pub struct Subscription {
    scheduler: Arc<TierScheduler>,
    outbound: UnboundedSender<TierEvent>,
    listener_id: ListenerId,
    mechanism: Mutex<Mechanism>,
}

impl Subscription {
    /// Create a subscription starting in `live` mode; the connection is
    /// never without an active mechanism.
    pub fn new(scheduler: Arc<TierScheduler>, outbound: UnboundedSender<TierEvent>) -> Self {
        let listener_id = ListenerId::new();
        for tier in Tier::ALL {
            scheduler
                .broadcaster()
                .subscribe(tier, listener_id, outbound.clone());
        }
        Self {
            scheduler,
            outbound,
            listener_id,
            mechanism: Mutex::new(Mechanism::Live),
        }
    }

    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }

    /// Switch the delivery mechanism. The old one is torn down before the
    /// new one starts; both steps happen under the connection's lock, so no
    /// interleaving observer can see two mechanisms (or none) active.
    pub async fn set_mode(&self, mode: RefreshMode) {
        let mut mechanism = self.mechanism.lock().await;
        if matches!(*mechanism, Mechanism::Closed) {
            debug!("ignoring mode change on closed subscription");
            return;
        }

        Self::teardown(&self.scheduler, self.listener_id, &mut mechanism);

        *mechanism = match mode.period() {
            None => {
                for tier in Tier::ALL {
                    self.scheduler.broadcaster().subscribe(
                        tier,
                        self.listener_id,
                        self.outbound.clone(),
                    );
                }
                Mechanism::Live
            }
            Some(period) => {
                let cancel = CancellationToken::new();
                let delivery = Arc::new(DeliveryLock::new(()));
                let task = spawn_timer(
                    self.scheduler.clone(),
                    self.outbound.clone(),
                    period,
                    cancel.clone(),
                    delivery.clone(),
                );
                Mechanism::Timer {
                    cancel,
                    delivery,
                    task,
                }
            }
        };

        debug!(%mode, "subscription mode changed");
    }

    /// Tear down whichever mechanism is active. Idempotent.
    pub async fn close(&self) {
        let mut mechanism = self.mechanism.lock().await;
        Self::teardown(&self.scheduler, self.listener_id, &mut mechanism);
        *mechanism = Mechanism::Closed;
    }

    fn teardown(scheduler: &TierScheduler, listener_id: ListenerId, mechanism: &mut Mechanism) {
        match std::mem::replace(mechanism, Mechanism::Closed) {
            Mechanism::Live => {
                scheduler.broadcaster().unsubscribe_all(listener_id);
            }
            Mechanism::Timer {
                cancel,
                delivery,
                task,
            } => {
                // Cancel under the delivery lock: an in-flight forced
                // collection either sends before this point or observes the
                // cancelled token and discards. Nothing arrives after
                // teardown returns. The task itself is detached.
                let _in_flight = delivery.lock();
                cancel.cancel();
                drop(task);
            }
            Mechanism::Closed => {}
        }
    }
}

fn spawn_timer(
    scheduler: Arc<TierScheduler>,
    outbound: UnboundedSender<TierEvent>,
    period: Duration,
    cancel: CancellationToken,
    delivery: Arc<DeliveryLock<()>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; consume it
        // so deliveries start one period after the mode change.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let overview = scheduler.collect_now().await;
                    // Token check and send share the lock teardown cancels
                    // under; the guard never lives across an await.
                    let _in_flight = delivery.lock();
                    if cancel.is_cancelled() {
                        break;
                    }
                    if outbound.send(TierEvent::MetricsUpdate(overview)).is_err() {
                        warn!("subscriber channel closed; stopping refresh timer");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::providers::mock::MockProvider;
    use tokio::sync::mpsc;

    fn scheduler() -> Arc<TierScheduler> {
        Arc::new(TierScheduler::new(
            Arc::new(MockProvider::new()),
            EngineConfig::default(),
        ))
    }

    #[test]
    fn test_mode_parse_round_trip() {
        for s in ["live", "5s", "10s", "1m", "10m"] {
            let mode: RefreshMode = s.parse().unwrap();
            assert_eq!(mode.to_string(), s);
        }
        assert!("2h".parse::<RefreshMode>().is_err());
    }

    #[test]
    fn test_mode_periods() {
        assert_eq!(RefreshMode::Live.period(), None);
        assert_eq!(
            RefreshMode::Every10Minutes.period(),
            Some(Duration::from_secs(600))
        );
    }

    #[tokio::test]
    async fn test_new_subscription_is_live_on_all_tiers() {
        let scheduler = scheduler();
        let (tx, _rx) = mpsc::unbounded_channel();
        let _subscription = Subscription::new(scheduler.clone(), tx);

        for tier in Tier::ALL {
            assert_eq!(scheduler.broadcaster().subscriber_count(tier), 1);
        }
    }

    #[tokio::test]
    async fn test_switch_to_fixed_unsubscribes_broadcaster() {
        let scheduler = scheduler();
        let (tx, _rx) = mpsc::unbounded_channel();
        let subscription = Subscription::new(scheduler.clone(), tx);

        subscription.set_mode(RefreshMode::Every10s).await;
        for tier in Tier::ALL {
            assert_eq!(scheduler.broadcaster().subscriber_count(tier), 0);
        }
    }

    #[tokio::test]
    async fn test_switch_back_to_live_restores_exactly_one_registration() {
        let scheduler = scheduler();
        let (tx, _rx) = mpsc::unbounded_channel();
        let subscription = Subscription::new(scheduler.clone(), tx);

        subscription.set_mode(RefreshMode::Every10s).await;
        subscription.set_mode(RefreshMode::Live).await;
        subscription.set_mode(RefreshMode::Live).await;

        for tier in Tier::ALL {
            assert_eq!(scheduler.broadcaster().subscriber_count(tier), 1);
        }
    }

    #[tokio::test]
    async fn test_close_tears_down_live_registration() {
        let scheduler = scheduler();
        let (tx, _rx) = mpsc::unbounded_channel();
        let subscription = Subscription::new(scheduler.clone(), tx);

        subscription.close().await;
        for tier in Tier::ALL {
            assert_eq!(scheduler.broadcaster().subscriber_count(tier), 0);
        }

        // Mode changes after close are ignored.
        subscription.set_mode(RefreshMode::Live).await;
        assert_eq!(scheduler.broadcaster().subscriber_count(Tier::Fast), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_mode_delivers_forced_collections() {
        let scheduler = scheduler();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = Subscription::new(scheduler.clone(), tx);

        subscription.set_mode(RefreshMode::Every5s).await;
        tokio::time::sleep(Duration::from_secs(11)).await;

        let mut updates = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, TierEvent::MetricsUpdate(_)));
            updates += 1;
        }
        assert_eq!(updates, 2);

        subscription.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_under_delivery_lock_discards_in_flight_send() {
        let scheduler = scheduler();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let delivery = Arc::new(DeliveryLock::new(()));
        let task = spawn_timer(
            scheduler,
            tx,
            Duration::from_millis(1),
            cancel.clone(),
            delivery.clone(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;

        // Teardown's sequence: once the cancel happens under the delivery
        // lock, any send the timer still makes happened before this block.
        {
            let _in_flight = delivery.lock();
            cancel.cancel();
        }
        while rx.try_recv().is_ok() {}

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err(), "delivery arrived after teardown");
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delivery_after_mode_switch() {
        let scheduler = scheduler();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = Subscription::new(scheduler.clone(), tx);

        subscription.set_mode(RefreshMode::Every5s).await;
        subscription.set_mode(RefreshMode::Live).await;
        tokio::time::sleep(Duration::from_secs(12)).await;

        // The cancelled timer never delivers; live mode only delivers when
        // the scheduler publishes, which it has not.
        assert!(rx.try_recv().is_err());
        subscription.close().await;
    }
}
