//! Scriptable stat provider for tests.
//!
//! Every family can be flipped between success and failure at runtime, the
//! returned values can be replaced, and per-family call counts are recorded
//! so tests can assert tier cadences.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::StatProvider;
use crate::stats::{
    CpuStats, DiskStats, GpuStats, HostInfo, InterfaceCounters, MemoryStats, ProcessInfo,
    TemperatureReading,
};
use crate::{Error, Result};

#[derive(Default)]
struct MockState {
    fail_cpu: bool,
    panic_cpu: bool,
    fail_memory: bool,
    fail_network: bool,
    fail_disks: bool,
    fail_temperatures: bool,
    fail_processes: bool,
    fail_gpu: bool,
    cpu: CpuStats,
    memory: MemoryStats,
    network: Vec<InterfaceCounters>,
    disks: Vec<DiskStats>,
    temperatures: Vec<TemperatureReading>,
    processes: Vec<ProcessInfo>,
    gpu: Option<GpuStats>,
}

#[derive(Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
    cpu_calls: AtomicUsize,
    network_calls: AtomicUsize,
    disk_calls: AtomicUsize,
    temperature_calls: AtomicUsize,
    process_calls: AtomicUsize,
    gpu_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_cpu(&self, fail: bool) {
        self.state.lock().fail_cpu = fail;
    }

    /// Make `cpu()` panic instead of returning, for loop re-arm tests.
    pub fn set_panic_cpu(&self, panic: bool) {
        self.state.lock().panic_cpu = panic;
    }

    pub fn set_fail_memory(&self, fail: bool) {
        self.state.lock().fail_memory = fail;
    }

    pub fn set_fail_network(&self, fail: bool) {
        self.state.lock().fail_network = fail;
    }

    pub fn set_fail_disks(&self, fail: bool) {
        self.state.lock().fail_disks = fail;
    }

    pub fn set_fail_temperatures(&self, fail: bool) {
        self.state.lock().fail_temperatures = fail;
    }

    pub fn set_fail_processes(&self, fail: bool) {
        self.state.lock().fail_processes = fail;
    }

    pub fn set_fail_gpu(&self, fail: bool) {
        self.state.lock().fail_gpu = fail;
    }

    pub fn set_cpu_usage(&self, overall: f32) {
        self.state.lock().cpu.overall = overall;
    }

    pub fn set_network_counters(&self, counters: Vec<InterfaceCounters>) {
        self.state.lock().network = counters;
    }

    pub fn set_disks(&self, disks: Vec<DiskStats>) {
        self.state.lock().disks = disks;
    }

    pub fn set_temperatures(&self, temperatures: Vec<TemperatureReading>) {
        self.state.lock().temperatures = temperatures;
    }

    pub fn set_processes(&self, processes: Vec<ProcessInfo>) {
        self.state.lock().processes = processes;
    }

    pub fn set_gpu(&self, gpu: Option<GpuStats>) {
        self.state.lock().gpu = gpu;
    }

    pub fn cpu_calls(&self) -> usize {
        self.cpu_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    pub fn disk_calls(&self) -> usize {
        self.disk_calls.load(Ordering::SeqCst)
    }

    pub fn temperature_calls(&self) -> usize {
        self.temperature_calls.load(Ordering::SeqCst)
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }

    pub fn gpu_calls(&self) -> usize {
        self.gpu_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatProvider for MockProvider {
    fn host_info(&self) -> HostInfo {
        HostInfo {
            hostname: "mock-host".to_string(),
            os: "MockOS 1.0".to_string(),
            kernel: "0.0.0-mock".to_string(),
        }
    }

    async fn cpu(&self) -> Result<CpuStats> {
        self.cpu_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.panic_cpu {
            panic!("mock cpu panic");
        }
        if state.fail_cpu {
            return Err(Error::provider("cpu", "mock cpu failure"));
        }
        Ok(state.cpu.clone())
    }

    async fn memory(&self) -> Result<MemoryStats> {
        let state = self.state.lock();
        if state.fail_memory {
            return Err(Error::provider("memory", "mock memory failure"));
        }
        Ok(state.memory.clone())
    }

    async fn network(&self) -> Result<Vec<InterfaceCounters>> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.fail_network {
            return Err(Error::provider("network", "mock network failure"));
        }
        Ok(state.network.clone())
    }

    async fn disks(&self) -> Result<Vec<DiskStats>> {
        self.disk_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.fail_disks {
            return Err(Error::provider("disks", "mock disk failure"));
        }
        Ok(state.disks.clone())
    }

    async fn temperatures(&self) -> Result<Vec<TemperatureReading>> {
        self.temperature_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.fail_temperatures {
            return Err(Error::provider("temperatures", "mock temperature failure"));
        }
        Ok(state.temperatures.clone())
    }

    async fn processes(&self, limit: usize) -> Result<Vec<ProcessInfo>> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.fail_processes {
            return Err(Error::provider("processes", "mock process failure"));
        }
        let mut processes = state.processes.clone();
        processes.truncate(limit);
        Ok(processes)
    }

    async fn gpu(&self) -> Result<Option<GpuStats>> {
        self.gpu_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.fail_gpu {
            return Err(Error::provider("gpu", "mock gpu failure"));
        }
        Ok(state.gpu.clone())
    }
}
