//! Wire-level telemetry data model.
//!
//! Everything here is serialized as camelCase JSON for dashboard clients.
//! Tier snapshots default to zeroed values; the engine replaces them
//! wholesale on each successful collection of the corresponding tier.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the three collection cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    Medium,
    Slow,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Fast => write!(f, "fast"),
            Tier::Medium => write!(f, "medium"),
            Tier::Slow => write!(f, "slow"),
        }
    }
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Fast, Tier::Medium, Tier::Slow];
}

/// Static host identity, gathered once at engine construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub kernel: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreStats {
    pub id: usize,
    /// Utilization percentage (0-100).
    pub usage: f32,
    pub frequency_mhz: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    /// Overall utilization percentage (0-100).
    pub overall: f32,
    pub cores: Vec<CoreStats>,
    /// 1/5/15 minute load averages.
    pub load_avg: [f64; 3],
    pub uptime_secs: u64,
    pub model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub cached_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
}

/// Raw cumulative counters for one network interface, as read from the
/// provider. Rates are derived by the engine from consecutive readings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceCounters {
    pub name: String,
    pub ip: Option<String>,
    pub rx_total_bytes: u64,
    pub tx_total_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceStats {
    pub name: String,
    pub ip: Option<String>,
    pub rx_bytes_per_sec: u64,
    pub tx_bytes_per_sec: u64,
    pub rx_total_bytes: u64,
    pub tx_total_bytes: u64,
    pub history: Vec<NetPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskStats {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub read_bytes_per_sec: u64,
    pub write_bytes_per_sec: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureReading {
    pub label: String,
    pub celsius: f32,
    pub max: Option<f32>,
    pub critical: Option<f32>,
}

/// GPU statistics. Wrapped in `Option` throughout: `None` means the host
/// has no GPU, which is a first-class state rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuStats {
    pub name: String,
    /// Utilization percentage (0-100).
    pub utilization: f32,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub temperature: f32,
    pub fan_speed: f32,
    pub power_watts: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// CPU percentage (0-100 per core).
    pub cpu: f32,
    /// Share of total memory (0-100).
    pub memory: f32,
    pub resident_bytes: u64,
    /// Not available on every platform.
    pub threads: Option<usize>,
    pub state: String,
}

// Chart points. `time` is a local "HH:MM:SS" label used directly as the
// x-axis by the dashboard.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePoint {
    pub time: String,
    pub usage: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPoint {
    pub time: String,
    pub used_bytes: u64,
    pub cached_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetPoint {
    pub time: String,
    pub rx_bytes_per_sec: u64,
    pub tx_bytes_per_sec: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuPoint {
    pub time: String,
    pub utilization: f32,
    pub temperature: f32,
}

/// Fast tier (nominally 1 Hz): CPU, memory, network throughput.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu: CpuStats,
    pub cpu_history: Vec<UsagePoint>,
    pub memory: MemoryStats,
    pub memory_history: Vec<MemoryPoint>,
    pub network: Vec<InterfaceStats>,
}

impl Default for FastSnapshot {
    fn default() -> Self {
        Self {
            timestamp: DateTime::UNIX_EPOCH,
            cpu: CpuStats::default(),
            cpu_history: Vec::new(),
            memory: MemoryStats::default(),
            memory_history: Vec::new(),
            network: Vec::new(),
        }
    }
}

/// Medium tier (nominally every 5 s): disks and temperature sensors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediumSnapshot {
    pub timestamp: DateTime<Utc>,
    pub disks: Vec<DiskStats>,
    pub temperatures: Vec<TemperatureReading>,
}

impl Default for MediumSnapshot {
    fn default() -> Self {
        Self {
            timestamp: DateTime::UNIX_EPOCH,
            disks: Vec::new(),
            temperatures: Vec::new(),
        }
    }
}

/// Slow tier (nominally every 20 s): process list and GPU.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowSnapshot {
    pub timestamp: DateTime<Utc>,
    pub processes: Vec<ProcessInfo>,
    pub gpu: Option<GpuStats>,
    pub gpu_history: Vec<GpuPoint>,
}

impl Default for SlowSnapshot {
    fn default() -> Self {
        Self {
            timestamp: DateTime::UNIX_EPOCH,
            processes: Vec::new(),
            gpu: None,
            gpu_history: Vec::new(),
        }
    }
}

/// Union of the three tiers' last-known-good values, served by the pull
/// endpoint and by one-shot snapshot requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsOverview {
    pub host: HostInfo,
    pub fast: FastSnapshot,
    pub medium: MediumSnapshot,
    pub slow: SlowSnapshot,
}

/// All ring histories in one document, for the history endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryOverview {
    pub cpu: Vec<UsagePoint>,
    pub memory: Vec<MemoryPoint>,
    pub gpu: Vec<GpuPoint>,
    pub network: HashMap<String, Vec<NetPoint>>,
}
