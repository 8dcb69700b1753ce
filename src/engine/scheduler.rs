//! The tiered collection scheduler.
//!
//! One drift-corrected loop drives three cadences: the fast tier runs every
//! iteration, the medium and slow tiers are gated by elapsed wall-clock
//! time against the same per-iteration clock reading. Tier failures are
//! isolated — a failed fetch keeps the previous snapshot visible and never
//! stops the loop.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::broadcaster::{TierBroadcaster, TierEvent};
use super::gate::TierGate;
use crate::Result;
use crate::config::EngineConfig;
use crate::history::RingHistory;
use crate::providers::StatProvider;
use crate::stats::{
    CpuStats, DiskStats, FastSnapshot, GpuPoint, GpuStats, HistoryOverview, HostInfo,
    InterfaceCounters, InterfaceStats, MediumSnapshot, MemoryPoint, MemoryStats,
    MetricsOverview, NetPoint, ProcessInfo, SlowSnapshot, TemperatureReading, UsagePoint,
};

/// Delay before the next loop iteration: the fast tier's target period less
/// the time the iteration itself took, floored at zero.
pub(crate) fn drift_corrected_delay(target: Duration, elapsed: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

/// Everything mutated by collections, behind one lock: tier snapshots,
/// ring histories, the network delta baseline, and the primed flag.
struct EngineState {
    fast: FastSnapshot,
    medium: MediumSnapshot,
    slow: SlowSnapshot,
    cpu_history: RingHistory<UsagePoint>,
    memory_history: RingHistory<MemoryPoint>,
    gpu_history: RingHistory<GpuPoint>,
    net_history: HashMap<String, RingHistory<NetPoint>>,
    /// Previous cumulative per-interface counters (rx, tx).
    net_counters: HashMap<String, (u64, u64)>,
    primed: bool,
}

impl EngineState {
    fn new(history_capacity: usize) -> Self {
        Self {
            fast: FastSnapshot::default(),
            medium: MediumSnapshot::default(),
            slow: SlowSnapshot::default(),
            cpu_history: RingHistory::new(history_capacity),
            memory_history: RingHistory::new(history_capacity),
            gpu_history: RingHistory::new(history_capacity),
            net_history: HashMap::new(),
            net_counters: HashMap::new(),
            primed: false,
        }
    }
}

struct FastFetch {
    cpu: CpuStats,
    memory: MemoryStats,
    network: Vec<InterfaceCounters>,
}

/// Medium-tier fields are individually guarded: one provider failing must
/// not block the other field's update.
struct MediumFetch {
    disks: Result<Vec<DiskStats>>,
    temperatures: Result<Vec<TemperatureReading>>,
}

struct SlowFetch {
    processes: Result<Vec<ProcessInfo>>,
    gpu: Result<Option<GpuStats>>,
}

/// The collection engine: owns the snapshots, histories and delta state,
/// runs the sampling loop, and publishes successful tier updates.
pub struct TierScheduler {
    providers: Arc<dyn StatProvider>,
    state: Mutex<EngineState>,
    broadcaster: TierBroadcaster,
    config: EngineConfig,
    cancel: CancellationToken,
    host: HostInfo,
}

impl TierScheduler {
    pub fn new(providers: Arc<dyn StatProvider>, config: EngineConfig) -> Self {
        let host = providers.host_info();
        Self {
            providers,
            state: Mutex::new(EngineState::new(config.history_capacity)),
            broadcaster: TierBroadcaster::new(),
            config,
            cancel: CancellationToken::new(),
            host,
        }
    }

    pub fn broadcaster(&self) -> &TierBroadcaster {
        &self.broadcaster
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token cancelling the loop's pending delay. In-flight provider calls
    /// are allowed to complete; their results are discarded.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub async fn is_primed(&self) -> bool {
        self.state.lock().await.primed
    }

    /// The sampling loop. Re-arms after every iteration, including a
    /// panicked one; it stops only through the cancellation token.
    pub async fn run(self: Arc<Self>) {
        let mut medium_gate = TierGate::new(self.config.medium_period);
        let mut slow_gate = TierGate::new(self.config.slow_period);

        info!(
            fast_ms = self.config.fast_period.as_millis() as u64,
            medium_ms = self.config.medium_period.as_millis() as u64,
            slow_ms = self.config.slow_period.as_millis() as u64,
            "tier scheduler started"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            // tokio's clock so tests can drive the loop with paused time.
            let started = tokio::time::Instant::now();
            let started_std = started.into_std();

            let medium_due = medium_gate.is_due(started_std);
            if medium_due {
                medium_gate.mark(started_std);
            }
            let slow_due = slow_gate.is_due(started_std);
            if slow_due {
                slow_gate.mark(started_std);
            }

            let iteration = self.tick(medium_due, slow_due);
            if AssertUnwindSafe(iteration).catch_unwind().await.is_err() {
                warn!("collection iteration panicked; re-arming loop");
            }

            let delay = drift_corrected_delay(self.config.fast_period, started.elapsed());
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("tier scheduler stopped");
    }

    /// One loop iteration: issue all due provider calls concurrently, then
    /// apply results sequentially under the state lock and publish each
    /// successfully updated tier.
    async fn tick(&self, medium_due: bool, slow_due: bool) {
        let (fast, medium, slow) = tokio::join!(
            self.fetch_fast(),
            async {
                if medium_due {
                    Some(self.fetch_medium().await)
                } else {
                    None
                }
            },
            async {
                if slow_due {
                    Some(self.fetch_slow().await)
                } else {
                    None
                }
            },
        );

        let mut events = Vec::new();
        {
            let mut state = self.state.lock().await;

            match fast {
                Ok(fetch) => {
                    let snapshot = self.apply_fast(&mut state, fetch);
                    events.push(TierEvent::FastUpdate(snapshot));
                }
                Err(error) => {
                    warn!(error = %error, "fast tier collection failed; keeping previous snapshot");
                }
            }

            if let Some(fetch) = medium
                && let Some(snapshot) = Self::apply_medium(&mut state, fetch)
            {
                events.push(TierEvent::MediumUpdate(snapshot));
            }

            if let Some(fetch) = slow
                && let Some(snapshot) = Self::apply_slow(&mut state, fetch)
            {
                events.push(TierEvent::SlowUpdate(snapshot));
            }
        }

        for event in events {
            if let Some(tier) = event.tier() {
                self.broadcaster.publish(tier, event);
            }
        }
    }

    /// Forced collection for fixed-interval subscribers and one-shot
    /// refreshes: fresh fetches of all three tiers, written through to the
    /// shared state under the engine lock. Not published to the
    /// broadcaster — delivery stays private to the requesting connection.
    pub async fn collect_now(&self) -> MetricsOverview {
        let (fast, medium, slow) = tokio::join!(
            self.fetch_fast(),
            self.fetch_medium(),
            self.fetch_slow(),
        );

        let mut state = self.state.lock().await;
        match fast {
            Ok(fetch) => {
                self.apply_fast(&mut state, fetch);
            }
            Err(error) => {
                warn!(error = %error, "forced fast collection failed; serving previous snapshot");
            }
        }
        Self::apply_medium(&mut state, medium);
        Self::apply_slow(&mut state, slow);

        self.overview_from(&state)
    }

    /// Last-known-good union of the three tiers; zeroed defaults before the
    /// first successful collection. No side effect on the scheduler.
    pub async fn overview(&self) -> MetricsOverview {
        let state = self.state.lock().await;
        self.overview_from(&state)
    }

    pub async fn history(&self) -> HistoryOverview {
        let state = self.state.lock().await;
        HistoryOverview {
            cpu: state.cpu_history.snapshot(),
            memory: state.memory_history.snapshot(),
            gpu: state.gpu_history.snapshot(),
            network: state
                .net_history
                .iter()
                .map(|(name, history)| (name.clone(), history.snapshot()))
                .collect(),
        }
    }

    fn overview_from(&self, state: &EngineState) -> MetricsOverview {
        MetricsOverview {
            host: self.host.clone(),
            fast: state.fast.clone(),
            medium: state.medium.clone(),
            slow: state.slow.clone(),
        }
    }

    async fn fetch_fast(&self) -> Result<FastFetch> {
        let (cpu, memory, network) = tokio::join!(
            self.providers.cpu(),
            self.providers.memory(),
            self.providers.network(),
        );
        Ok(FastFetch {
            cpu: cpu?,
            memory: memory?,
            network: network?,
        })
    }

    async fn fetch_medium(&self) -> MediumFetch {
        let (disks, temperatures) =
            tokio::join!(self.providers.disks(), self.providers.temperatures());
        MediumFetch {
            disks,
            temperatures,
        }
    }

    async fn fetch_slow(&self) -> SlowFetch {
        let (processes, gpu) = tokio::join!(
            self.providers.processes(self.config.top_processes),
            self.providers.gpu(),
        );
        SlowFetch { processes, gpu }
    }

    fn apply_fast(&self, state: &mut EngineState, fetch: FastFetch) -> FastSnapshot {
        let now = Utc::now();
        let time_label = Local::now().format("%H:%M:%S").to_string();

        let mut interfaces = Vec::with_capacity(fetch.network.len());
        let mut counters = HashMap::with_capacity(fetch.network.len());
        for iface in &fetch.network {
            // No baseline (first sighting) and counter wrap both report
            // zero instead of a spurious delta.
            let (rx_rate, tx_rate) = match state.net_counters.get(&iface.name) {
                Some((rx_prev, tx_prev)) => (
                    iface.rx_total_bytes.saturating_sub(*rx_prev),
                    iface.tx_total_bytes.saturating_sub(*tx_prev),
                ),
                None => (0, 0),
            };
            counters.insert(iface.name.clone(), (iface.rx_total_bytes, iface.tx_total_bytes));

            let history = state
                .net_history
                .entry(iface.name.clone())
                .or_insert_with(|| RingHistory::new(self.config.history_capacity));
            history.push(NetPoint {
                time: time_label.clone(),
                rx_bytes_per_sec: rx_rate,
                tx_bytes_per_sec: tx_rate,
            });

            interfaces.push(InterfaceStats {
                name: iface.name.clone(),
                ip: iface.ip.clone(),
                rx_bytes_per_sec: rx_rate,
                tx_bytes_per_sec: tx_rate,
                rx_total_bytes: iface.rx_total_bytes,
                tx_total_bytes: iface.tx_total_bytes,
                history: history.snapshot(),
            });
        }
        // Baseline overwritten on every fast tick.
        state.net_counters = counters;

        state.cpu_history.push(UsagePoint {
            time: time_label.clone(),
            usage: fetch.cpu.overall,
        });
        state.memory_history.push(MemoryPoint {
            time: time_label,
            used_bytes: fetch.memory.used_bytes,
            cached_bytes: fetch.memory.cached_bytes,
        });

        let snapshot = FastSnapshot {
            timestamp: now,
            cpu: fetch.cpu,
            cpu_history: state.cpu_history.snapshot(),
            memory: fetch.memory,
            memory_history: state.memory_history.snapshot(),
            network: interfaces,
        };
        state.fast = snapshot.clone();
        state.primed = true;
        snapshot
    }

    /// Returns the new snapshot when at least one field updated; `None`
    /// when every sub-fetch failed (the stale snapshot stays visible).
    fn apply_medium(state: &mut EngineState, fetch: MediumFetch) -> Option<MediumSnapshot> {
        let mut updated = false;

        match fetch.disks {
            Ok(disks) => {
                state.medium.disks = disks;
                updated = true;
            }
            Err(error) => {
                warn!(error = %error, "disk collection failed; keeping last-known disks");
            }
        }
        match fetch.temperatures {
            Ok(temperatures) => {
                state.medium.temperatures = temperatures;
                updated = true;
            }
            Err(error) => {
                warn!(error = %error, "temperature collection failed; keeping last-known readings");
            }
        }

        if updated {
            state.medium.timestamp = Utc::now();
            Some(state.medium.clone())
        } else {
            None
        }
    }

    fn apply_slow(state: &mut EngineState, fetch: SlowFetch) -> Option<SlowSnapshot> {
        let mut updated = false;

        match fetch.processes {
            Ok(processes) => {
                state.slow.processes = processes;
                updated = true;
            }
            Err(error) => {
                warn!(error = %error, "process collection failed; keeping last-known list");
            }
        }
        match fetch.gpu {
            Ok(gpu) => {
                if let Some(stats) = &gpu {
                    state.gpu_history.push(GpuPoint {
                        time: Local::now().format("%H:%M:%S").to_string(),
                        utilization: stats.utilization,
                        temperature: stats.temperature,
                    });
                } else {
                    debug!("no GPU reported");
                }
                state.slow.gpu = gpu;
                updated = true;
            }
            Err(error) => {
                warn!(error = %error, "gpu collection failed; keeping last-known stats");
            }
        }

        if updated {
            state.slow.timestamp = Utc::now();
            state.slow.gpu_history = state.gpu_history.snapshot();
            Some(state.slow.clone())
        } else {
            None
        }
    }
}
