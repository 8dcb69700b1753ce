//! Tier update fan-out.
//!
//! A registry of listeners per tier rather than a broadcast channel: the
//! delivery contract requires registration order, idempotent subscribe per
//! listener, and per-listener failure isolation.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use crate::stats::{FastSnapshot, MediumSnapshot, MetricsOverview, SlowSnapshot, Tier};

/// Events delivered to listeners and, ultimately, to dashboard clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TierEvent {
    FastUpdate(FastSnapshot),
    MediumUpdate(MediumSnapshot),
    SlowUpdate(SlowSnapshot),
    /// Full overview, used for forced-refresh and one-shot deliveries.
    MetricsUpdate(MetricsOverview),
}

impl TierEvent {
    pub fn tier(&self) -> Option<Tier> {
        match self {
            TierEvent::FastUpdate(_) => Some(Tier::Fast),
            TierEvent::MediumUpdate(_) => Some(Tier::Medium),
            TierEvent::SlowUpdate(_) => Some(Tier::Slow),
            TierEvent::MetricsUpdate(_) => None,
        }
    }
}

/// Identity of a registered listener; subscribe/unsubscribe are idempotent
/// per id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Listener = (ListenerId, UnboundedSender<TierEvent>);

/// Publish/subscribe fan-out for tier snapshots.
#[derive(Default)]
pub struct TierBroadcaster {
    tiers: RwLock<HashMap<Tier, Vec<Listener>>>,
}

impl TierBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one tier. Subscribing an already-registered
    /// id again is a no-op; delivery is never duplicated.
    pub fn subscribe(&self, tier: Tier, id: ListenerId, sender: UnboundedSender<TierEvent>) {
        let mut tiers = self.tiers.write();
        let listeners = tiers.entry(tier).or_default();
        if listeners.iter().any(|(existing, _)| *existing == id) {
            return;
        }
        listeners.push((id, sender));
    }

    /// Remove a listener from one tier. Unknown ids are a no-op.
    pub fn unsubscribe(&self, tier: Tier, id: ListenerId) {
        let mut tiers = self.tiers.write();
        if let Some(listeners) = tiers.get_mut(&tier) {
            listeners.retain(|(existing, _)| *existing != id);
        }
    }

    /// Remove a listener from every tier.
    pub fn unsubscribe_all(&self, id: ListenerId) {
        let mut tiers = self.tiers.write();
        for listeners in tiers.values_mut() {
            listeners.retain(|(existing, _)| *existing != id);
        }
    }

    /// Deliver an event to all listeners of a tier, in registration order.
    /// A listener whose channel is gone is skipped and logged; it never
    /// blocks delivery to the rest.
    pub fn publish(&self, tier: Tier, event: TierEvent) {
        let tiers = self.tiers.read();
        let Some(listeners) = tiers.get(&tier) else {
            return;
        };
        for (id, sender) in listeners {
            if sender.send(event.clone()).is_err() {
                debug!(listener = %id, %tier, "listener channel closed; skipping delivery");
            }
        }
    }

    pub fn subscriber_count(&self, tier: Tier) -> usize {
        self.tiers.read().get(&tier).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn fast_event() -> TierEvent {
        TierEvent::FastUpdate(FastSnapshot::default())
    }

    #[test]
    fn test_publish_reaches_subscriber() {
        let broadcaster = TierBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.subscribe(Tier::Fast, ListenerId::new(), tx);

        broadcaster.publish(Tier::Fast, fast_event());
        assert!(matches!(rx.try_recv(), Ok(TierEvent::FastUpdate(_))));
    }

    #[test]
    fn test_duplicate_subscribe_delivers_once() {
        let broadcaster = TierBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ListenerId::new();
        broadcaster.subscribe(Tier::Fast, id, tx.clone());
        broadcaster.subscribe(Tier::Fast, id, tx);

        broadcaster.publish(Tier::Fast, fast_event());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(broadcaster.subscriber_count(Tier::Fast), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let broadcaster = TierBroadcaster::new();
        broadcaster.unsubscribe(Tier::Medium, ListenerId::new());
        assert_eq!(broadcaster.subscriber_count(Tier::Medium), 0);
    }

    #[test]
    fn test_dead_listener_does_not_block_others() {
        let broadcaster = TierBroadcaster::new();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();

        broadcaster.subscribe(Tier::Slow, ListenerId::new(), dead_tx);
        broadcaster.subscribe(Tier::Slow, ListenerId::new(), live_tx);

        broadcaster.publish(Tier::Slow, TierEvent::SlowUpdate(SlowSnapshot::default()));
        assert!(matches!(live_rx.try_recv(), Ok(TierEvent::SlowUpdate(_))));
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let broadcaster = TierBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Two ids sharing one channel: order of arrival mirrors
        // registration order because publish iterates the registry in order.
        let first = ListenerId::new();
        let second = ListenerId::new();
        broadcaster.subscribe(Tier::Fast, first, tx.clone());
        broadcaster.subscribe(Tier::Fast, second, tx);
        broadcaster.unsubscribe(Tier::Fast, first);
        broadcaster.publish(Tier::Fast, fast_event());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_all_clears_every_tier() {
        let broadcaster = TierBroadcaster::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = ListenerId::new();
        for tier in Tier::ALL {
            broadcaster.subscribe(tier, id, tx.clone());
        }
        broadcaster.unsubscribe_all(id);
        for tier in Tier::ALL {
            assert_eq!(broadcaster.subscriber_count(tier), 0);
        }
    }
}
