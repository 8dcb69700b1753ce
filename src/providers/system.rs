//! `sysinfo`-backed stat provider.
//!
//! Refresh state (CPU deltas, per-interface counters, disk IO baselines)
//! lives inside `sysinfo` collections guarded by `parking_lot` mutexes;
//! none of the locks is held across an await point.

use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::{
    Components, CpuRefreshKind, Disks, MemoryRefreshKind, Networks, ProcessRefreshKind,
    ProcessesToUpdate, RefreshKind, System,
};

use super::{StatProvider, gpu::GpuProbe};
use crate::Result;
use crate::stats::{
    CoreStats, CpuStats, DiskStats, GpuStats, HostInfo, InterfaceCounters, MemoryStats,
    ProcessInfo, TemperatureReading,
};

/// Disk collection plus the instant of its previous refresh, needed to turn
/// per-refresh IO byte counts into rates.
struct DiskSampler {
    disks: Disks,
    last_refresh: Option<Instant>,
}

/// Production provider reading from the local host.
pub struct SystemProvider {
    system: Mutex<System>,
    networks: Mutex<Networks>,
    disks: Mutex<DiskSampler>,
    components: Mutex<Components>,
    gpu: GpuProbe,
    host: HostInfo,
}

impl SystemProvider {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        let host = HostInfo {
            hostname: System::host_name().unwrap_or_default(),
            os: format!(
                "{} {}",
                System::name().unwrap_or_default(),
                System::os_version().unwrap_or_default()
            )
            .trim()
            .to_string(),
            kernel: System::kernel_version().unwrap_or_default(),
        };

        Self {
            system: Mutex::new(system),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            disks: Mutex::new(DiskSampler {
                disks: Disks::new_with_refreshed_list(),
                last_refresh: None,
            }),
            components: Mutex::new(Components::new_with_refreshed_list()),
            gpu: GpuProbe::new(),
            host,
        }
    }
}

impl Default for SystemProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatProvider for SystemProvider {
    fn host_info(&self) -> HostInfo {
        self.host.clone()
    }

    async fn cpu(&self) -> Result<CpuStats> {
        let mut system = self.system.lock();
        system.refresh_cpu_all();

        let cores = system
            .cpus()
            .iter()
            .enumerate()
            .map(|(id, cpu)| CoreStats {
                id,
                usage: cpu.cpu_usage(),
                frequency_mhz: cpu.frequency(),
            })
            .collect();

        let model = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .unwrap_or_default();

        let load = System::load_average();

        Ok(CpuStats {
            overall: system.global_cpu_usage(),
            cores,
            load_avg: [load.one, load.five, load.fifteen],
            uptime_secs: System::uptime(),
            model,
        })
    }

    async fn memory(&self) -> Result<MemoryStats> {
        let mut system = self.system.lock();
        system.refresh_memory();

        let free = system.free_memory();
        let available = system.available_memory();

        Ok(MemoryStats {
            total_bytes: system.total_memory(),
            used_bytes: system.used_memory(),
            free_bytes: free,
            available_bytes: available,
            // Reclaimable page cache approximated from available - free.
            cached_bytes: available.saturating_sub(free),
            swap_total_bytes: system.total_swap(),
            swap_used_bytes: system.used_swap(),
        })
    }

    async fn network(&self) -> Result<Vec<InterfaceCounters>> {
        let mut networks = self.networks.lock();
        networks.refresh(true);

        let mut counters: Vec<InterfaceCounters> = networks
            .iter()
            .map(|(name, data)| InterfaceCounters {
                name: name.clone(),
                ip: data
                    .ip_networks()
                    .iter()
                    .find(|ip| ip.addr.is_ipv4())
                    .map(|ip| ip.addr.to_string()),
                rx_total_bytes: data.total_received(),
                tx_total_bytes: data.total_transmitted(),
            })
            .collect();

        // sysinfo iterates a map; sort for a stable wire order.
        counters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(counters)
    }

    async fn disks(&self) -> Result<Vec<DiskStats>> {
        let mut sampler = self.disks.lock();
        let elapsed_secs = sampler
            .last_refresh
            .map(|at| at.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        sampler.disks.refresh(true);
        sampler.last_refresh = Some(Instant::now());

        let stats = sampler
            .disks
            .iter()
            .map(|disk| {
                let io = disk.usage();
                // `read_bytes`/`written_bytes` cover the window since the
                // previous refresh; on the first refresh there is no window
                // and the rate is reported as zero.
                let (read_rate, write_rate) = if elapsed_secs > 0.0 {
                    (
                        (io.read_bytes as f64 / elapsed_secs) as u64,
                        (io.written_bytes as f64 / elapsed_secs) as u64,
                    )
                } else {
                    (0, 0)
                };
                DiskStats {
                    device: disk.name().to_string_lossy().into_owned(),
                    mount_point: disk.mount_point().to_string_lossy().into_owned(),
                    fs_type: disk.file_system().to_string_lossy().into_owned(),
                    total_bytes: disk.total_space(),
                    used_bytes: disk.total_space().saturating_sub(disk.available_space()),
                    read_bytes_per_sec: read_rate,
                    write_bytes_per_sec: write_rate,
                }
            })
            .collect();

        Ok(stats)
    }

    async fn temperatures(&self) -> Result<Vec<TemperatureReading>> {
        let mut components = self.components.lock();
        components.refresh(true);

        let readings = components
            .iter()
            .filter_map(|component| {
                component.temperature().map(|celsius| TemperatureReading {
                    label: component.label().to_string(),
                    celsius,
                    max: component.max(),
                    critical: component.critical(),
                })
            })
            .collect();

        Ok(readings)
    }

    async fn processes(&self, limit: usize) -> Result<Vec<ProcessInfo>> {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );

        let total_memory = system.total_memory().max(1);

        let mut processes: Vec<ProcessInfo> = system
            .processes()
            .values()
            .map(|process| ProcessInfo {
                pid: process.pid().as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                cpu: process.cpu_usage(),
                memory: (process.memory() as f64 / total_memory as f64 * 100.0) as f32,
                resident_bytes: process.memory(),
                threads: process.tasks().map(|tasks| tasks.len()),
                state: process.status().to_string(),
            })
            .collect();

        // Pin down the map's arbitrary order, then sort by CPU descending;
        // the stable sort keeps pid order among ties.
        processes.sort_by_key(|p| p.pid);
        processes.sort_by(|a, b| b.cpu.partial_cmp(&a.cpu).unwrap_or(std::cmp::Ordering::Equal));
        processes.truncate(limit);

        Ok(processes)
    }

    async fn gpu(&self) -> Result<Option<GpuStats>> {
        self.gpu.query().await
    }
}
