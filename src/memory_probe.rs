use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

// One minute of history at the default sampling interval.
const SAMPLE_SLOTS: usize = 60;
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Source of the current resident memory size of the process.
///
/// Reading must be cheap enough to call on the data-plane hot path, so
/// implementations expose the most recent known value rather than measuring
/// on demand.
pub trait MemoryProbe: Send + Sync {
    fn current_resident_bytes(&self) -> u64;
}

/// Probe returning a fixed, settable value. Used where real measurements are
/// unwanted, for example in tests that script memory pressure.
pub struct FixedMemoryProbe {
    bytes: AtomicU64,
}

impl FixedMemoryProbe {
    pub fn new(bytes: u64) -> FixedMemoryProbe {
        FixedMemoryProbe {
            bytes: AtomicU64::new(bytes),
        }
    }

    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::Relaxed);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn current_resident_bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

// Lock-free ring of recent samples. The writer stores the sample first and
// publishes the cursor after it, so a reader following the cursor always
// observes a fully written slot.
struct SampleRing {
    slots: Vec<AtomicU64>,
    cursor: AtomicUsize,
}

impl SampleRing {
    fn new() -> SampleRing {
        SampleRing {
            slots: (0..SAMPLE_SLOTS).map(|_| AtomicU64::new(0)).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    fn record(&self, value: u64) {
        let next = (self.cursor.load(Ordering::Relaxed) + 1) % self.slots.len();
        self.slots[next].store(value, Ordering::Relaxed);
        self.cursor.store(next, Ordering::Release);
    }

    fn latest(&self) -> u64 {
        self.slots[self.cursor.load(Ordering::Acquire)].load(Ordering::Relaxed)
    }
}

/// Samples the resident set size of the current process once per second on a
/// background thread. The sampler never blocks the thread that reads it; the
/// thread is stopped and joined on drop.
pub struct ResidentMemoryProbe {
    ring: Arc<SampleRing>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ResidentMemoryProbe {
    pub fn start() -> ResidentMemoryProbe {
        let ring = Arc::new(SampleRing::new());
        let stop = Arc::new(AtomicBool::new(false));

        let mut system = System::new();
        // immediate first sample so early readers do not observe zero
        ring.record(sample_resident_bytes(&mut system));

        let sampler_ring = Arc::clone(&ring);
        let sampler_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("memory-probe".to_string())
            .spawn(move || {
                loop {
                    let mut waited = Duration::ZERO;
                    while waited < SAMPLE_INTERVAL {
                        if sampler_stop.load(Ordering::Relaxed) {
                            return;
                        }
                        thread::sleep(SHUTDOWN_POLL);
                        waited += SHUTDOWN_POLL;
                    }
                    sampler_ring.record(sample_resident_bytes(&mut system));
                }
            })
            .expect("spawn memory probe thread");

        ResidentMemoryProbe {
            ring,
            stop,
            handle: Some(handle),
        }
    }
}

impl MemoryProbe for ResidentMemoryProbe {
    fn current_resident_bytes(&self) -> u64 {
        self.ring.latest()
    }
}

impl Drop for ResidentMemoryProbe {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn sample_resident_bytes(system: &mut System) -> u64 {
    let pid = Pid::from(std::process::id() as usize);
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        ProcessRefreshKind::new().with_memory(),
    );
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use crate::memory_probe::{FixedMemoryProbe, MemoryProbe, ResidentMemoryProbe, SampleRing};

    #[test]
    fn test_fixed_probe() {
        let probe = FixedMemoryProbe::new(42);
        assert_eq!(probe.current_resident_bytes(), 42);
        probe.set(7);
        assert_eq!(probe.current_resident_bytes(), 7);
    }

    #[test]
    fn test_sample_ring_keeps_latest() {
        let ring = SampleRing::new();
        assert_eq!(ring.latest(), 0);
        for value in 1..200u64 {
            ring.record(value);
            assert_eq!(ring.latest(), value);
        }
    }

    #[test]
    fn test_resident_probe_starts_and_stops() {
        let probe = ResidentMemoryProbe::start();
        // the warm-up sample is taken synchronously
        let _ = probe.current_resident_bytes();
        drop(probe);
    }
}
