//! Runtime and host samplers feeding the metrics collection.
//!
//! The gauge catalog keeps the well-known names dashboards already consume:
//! allocator counters come from [`TrackingAllocator`], address-space figures
//! from the process entry in `sysinfo`, and fields tied to a tracing garbage
//! collector report zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use rand::RngCore;
use rand::rngs::OsRng;
use sysinfo::{Pid, System as SysInfo};

use super::collection::MetricsCollection;
use crate::core::POLL_COUNT;

static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static TOTAL_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static ALLOC_CALLS: AtomicU64 = AtomicU64::new(0);
static FREE_CALLS: AtomicU64 = AtomicU64::new(0);

static POLL_COUNTER: AtomicI64 = AtomicI64::new(0);

/// Counting wrapper around the system allocator. Installed as the global
/// allocator by the agent binary so the runtime collector can report live
/// and cumulative allocation figures.
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            ALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
            TOTAL_ALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
            ALLOC_CALLS.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        ALLOCATED.fetch_sub(layout.size() as u64, Ordering::Relaxed);
        FREE_CALLS.fetch_add(1, Ordering::Relaxed);
    }
}

/// Samples process memory statistics and the poll counter.
pub struct RuntimeCollector {
    sys: Mutex<SysInfo>,
    pid: Option<Pid>,
}

impl Default for RuntimeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeCollector {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(SysInfo::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Writes the full runtime gauge catalog and increments `PollCount`.
    /// Never fails; an entropy failure only omits `RandomValue` this cycle.
    pub fn collect(&self, collection: &MetricsCollection) {
        let poll_count = POLL_COUNTER.fetch_add(1, Ordering::SeqCst) + 1;
        collection.set_counter(POLL_COUNT, poll_count);

        let (rss, virt) = self.process_memory();

        let allocated = ALLOCATED.load(Ordering::Relaxed);
        let total_allocated = TOTAL_ALLOCATED.load(Ordering::Relaxed);
        let mallocs = ALLOC_CALLS.load(Ordering::Relaxed);
        let frees = FREE_CALLS.load(Ordering::Relaxed);

        collection.set_gauges([
            ("Alloc".to_string(), allocated as f64),
            ("TotalAlloc".to_string(), total_allocated as f64),
            ("Mallocs".to_string(), mallocs as f64),
            ("Frees".to_string(), frees as f64),
            ("HeapAlloc".to_string(), allocated as f64),
            ("HeapObjects".to_string(), mallocs.saturating_sub(frees) as f64),
            ("HeapSys".to_string(), rss as f64),
            ("HeapInuse".to_string(), rss as f64),
            ("HeapIdle".to_string(), rss.saturating_sub(allocated) as f64),
            ("HeapReleased".to_string(), 0.0),
            ("Sys".to_string(), virt as f64),
            ("OtherSys".to_string(), virt.saturating_sub(rss) as f64),
            ("StackInuse".to_string(), 0.0),
            ("StackSys".to_string(), 0.0),
            ("MCacheInuse".to_string(), 0.0),
            ("MCacheSys".to_string(), 0.0),
            ("MSpanInuse".to_string(), 0.0),
            ("MSpanSys".to_string(), 0.0),
            ("BuckHashSys".to_string(), 0.0),
            ("Lookups".to_string(), 0.0),
            ("GCCPUFraction".to_string(), 0.0),
            ("GCSys".to_string(), 0.0),
            ("LastGC".to_string(), 0.0),
            ("NextGC".to_string(), 0.0),
            ("NumGC".to_string(), 0.0),
            ("NumForcedGC".to_string(), 0.0),
            ("PauseTotalNs".to_string(), 0.0),
        ]);

        match random_value() {
            Ok(value) => collection.set_gauge("RandomValue", value),
            Err(err) => {
                tracing::warn!(error = %err, "entropy source failed, omitting RandomValue");
            }
        }
    }

    fn process_memory(&self) -> (u64, u64) {
        let Some(pid) = self.pid else {
            return (0, 0);
        };
        let mut sys = self.sys.lock().expect("sysinfo lock poisoned");
        if !sys.refresh_process(pid) {
            return (0, 0);
        }
        sys.process(pid)
            .map(|p| (p.memory(), p.virtual_memory()))
            .unwrap_or((0, 0))
    }
}

/// Samples host virtual memory and per-CPU utilization. Values are sticky:
/// when a refresh yields nothing, previously collected gauges stay intact.
pub struct HostCollector {
    sys: Mutex<SysInfo>,
}

impl Default for HostCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl HostCollector {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(SysInfo::new()),
        }
    }

    pub fn collect(&self, collection: &MetricsCollection) {
        let mut sys = self.sys.lock().expect("sysinfo lock poisoned");
        sys.refresh_memory();
        sys.refresh_cpu_usage();

        let total = sys.total_memory();
        if total == 0 {
            tracing::warn!("host memory refresh returned nothing, keeping previous values");
        } else {
            collection.set_gauges([
                ("TotalMemory".to_string(), total as f64),
                ("FreeMemory".to_string(), sys.free_memory() as f64),
            ]);
        }

        let cpus = sys.cpus();
        if cpus.is_empty() {
            tracing::warn!("cpu refresh returned nothing, keeping previous values");
        } else {
            collection.set_gauges(
                cpus.iter()
                    .enumerate()
                    .map(|(i, cpu)| (format!("CPUutilization{i}"), f64::from(cpu.cpu_usage())))
                    .collect::<Vec<_>>(),
            );
        }
    }
}

/// Random gauge in [0, 2^63) sourced from OS entropy.
fn random_value() -> Result<f64, rand::Error> {
    let mut bytes = [0u8; 8];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok((u64::from_le_bytes(bytes) >> 1) as f64)
}
