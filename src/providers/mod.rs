//! Stat providers: the boundary to the OS and hardware.
//!
//! Each metric family is one independently fallible async operation. The
//! scheduler must tolerate any of them failing without stalling the other
//! tiers, so provider errors never carry more weight than a log line and a
//! kept-stale snapshot.

mod gpu;
pub mod mock;
mod system;

use async_trait::async_trait;

pub use system::SystemProvider;

use crate::Result;
use crate::stats::{
    CpuStats, DiskStats, GpuStats, HostInfo, InterfaceCounters, MemoryStats, ProcessInfo,
    TemperatureReading,
};

/// One async operation per metric family.
#[async_trait]
pub trait StatProvider: Send + Sync {
    /// Static host identity. Infallible; gathered from whatever the
    /// platform reports at construction time.
    fn host_info(&self) -> HostInfo;

    async fn cpu(&self) -> Result<CpuStats>;

    async fn memory(&self) -> Result<MemoryStats>;

    /// Cumulative per-interface counters. Rates are derived by the engine.
    async fn network(&self) -> Result<Vec<InterfaceCounters>>;

    async fn disks(&self) -> Result<Vec<DiskStats>>;

    async fn temperatures(&self) -> Result<Vec<TemperatureReading>>;

    /// Top `limit` processes by CPU, descending. The sort is stable so
    /// provider order breaks ties.
    async fn processes(&self, limit: usize) -> Result<Vec<ProcessInfo>>;

    /// `Ok(None)` on GPU-less hosts; this is not an error.
    async fn gpu(&self) -> Result<Option<GpuStats>>;
}
