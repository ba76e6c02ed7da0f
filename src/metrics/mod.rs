mod circular_buffer;
mod gpu;
mod history;
mod network;
mod source;

pub use circular_buffer::*;
pub use gpu::*;
pub use history::*;
pub use network::*;
pub use source::*;

use crate::error::{KillError, SamplerError};
use crate::process::{filtered_view, MemoryMetric, ProcessSnapshot, SortBy};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const MIN_INTERVAL_SECS: u64 = 1;
pub const MAX_INTERVAL_SECS: u64 = 10;

pub fn clamp_interval(seconds: u64) -> u64 {
    seconds.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub interval_secs: u64,
    pub history_len: usize,
    pub memory_metric: MemoryMetric,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            history_len: DEFAULT_HISTORY_LEN,
            memory_metric: MemoryMetric::Percent,
        }
    }
}

/// Everything a reader sees after one successful tick. Never mutated once
/// published.
#[derive(Debug, Clone, Default)]
pub struct SamplerState {
    /// Number of successful ticks so far; 0 before the first one
    pub version: u64,
    pub processes: Vec<ProcessSnapshot>,
    pub history: MetricsHistory,
    pub network_rate: NetworkRate,
    /// Wall time the network rate was measured over; zero on the first tick
    pub network_window: Duration,
    /// Sampling interval in effect for this tick
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerStatus {
    Idle,
    Running,
}

enum Command {
    Reschedule,
    Shutdown,
}

/// Tick-side state. Holding its lock is what makes a tick exclusive.
struct Collector {
    source: Box<dyn SystemSource>,
    gpu: Option<Box<dyn GpuSource>>,
    history: MetricsHistory,
    previous_network: Option<(NetworkCounters, Instant)>,
    version: u64,
}

struct Shared {
    collector: Mutex<Collector>,
    control: Mutex<Box<dyn ProcessControl>>,
    published: RwLock<Arc<SamplerState>>,
    interval_secs: AtomicU64,
    history_len: AtomicUsize,
    memory_metric: MemoryMetric,
}

struct Worker {
    commands: Sender<Command>,
    handle: JoinHandle<()>,
}

/// Samples the system on a background thread and publishes immutable
/// snapshots for the UI to read.
pub struct Sampler {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self::with_source(config, Box::new(SysinfoSource::new()))
    }

    pub fn with_source(config: SamplerConfig, source: Box<dyn SystemSource>) -> Self {
        let interval_secs = clamp_interval(config.interval_secs);
        let history = MetricsHistory::new(config.history_len);
        let history_len = history.history_len();
        let control: Box<dyn ProcessControl> = Box::new(SysinfoControl::new());
        let published = SamplerState {
            history: history.clone(),
            interval_secs,
            ..Default::default()
        };

        Self {
            shared: Arc::new(Shared {
                collector: Mutex::new(Collector {
                    source,
                    gpu: None,
                    history,
                    previous_network: None,
                    version: 0,
                }),
                control: Mutex::new(control),
                published: RwLock::new(Arc::new(published)),
                interval_secs: AtomicU64::new(interval_secs),
                history_len: AtomicUsize::new(history_len),
                memory_metric: config.memory_metric,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Plugs in a GPU source. Without one the GPU series stays empty.
    pub fn with_gpu(self, gpu: Box<dyn GpuSource>) -> Self {
        lock(&self.shared.collector).gpu = Some(gpu);
        self
    }

    /// Replaces what `kill` talks to. Defaults to [`SysinfoControl`].
    pub fn with_control(self, control: Box<dyn ProcessControl>) -> Self {
        *lock(&self.shared.control) = control;
        self
    }

    /// Seeds the series with samples collected elsewhere, usually by the
    /// sampler this one replaces. Resized to this sampler's history length.
    pub fn with_history(self, mut history: MetricsHistory) -> Self {
        history.resize(self.history_len());
        let published = SamplerState {
            history: history.clone(),
            interval_secs: self.interval(),
            ..Default::default()
        };
        lock(&self.shared.collector).history = history;
        *self
            .shared
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(published);
        self
    }

    pub fn status(&self) -> SamplerStatus {
        if lock(&self.worker).is_some() {
            SamplerStatus::Running
        } else {
            SamplerStatus::Idle
        }
    }

    /// Spawns the sampling thread. The first tick runs immediately. Returns
    /// `false` if the sampler was already running.
    pub fn start(&self) -> bool {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return false;
        }

        let (tx, rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("sampler".to_string())
            .spawn(move || run(shared, rx));

        match spawned {
            Ok(handle) => {
                info!("Sampler started, interval {}s", self.interval());
                *worker = Some(Worker { commands: tx, handle });
                true
            }
            Err(e) => {
                warn!("Failed to spawn sampler thread: {}", e);
                false
            }
        }
    }

    /// Stops the sampling thread and waits for it to exit.
    pub fn stop(&self) {
        let Some(worker) = lock(&self.worker).take() else {
            return;
        };
        let _ = worker.commands.send(Command::Shutdown);
        if worker.handle.join().is_err() {
            warn!("Sampler thread panicked");
        }
        info!("Sampler stopped");
    }

    /// Stops and drops the sampler on a helper thread, so a caller on the UI
    /// thread does not wait for an in-flight tick.
    pub fn stop_in_background(self) {
        let spawned = thread::Builder::new()
            .name("sampler-stop".to_string())
            .spawn(move || drop(self));
        if let Err(e) = spawned {
            warn!("Failed to spawn sampler stop thread: {}", e);
        }
    }

    /// Runs one tick on the caller's thread, waiting for any tick already in
    /// flight.
    pub fn tick(&self) -> Result<Arc<SamplerState>, SamplerError> {
        let mut collector = lock(&self.shared.collector);
        self.shared.tick(&mut collector)
    }

    /// Sets the sampling period, clamped to 1..=10 seconds, and reschedules
    /// the next tick. Returns the value actually applied.
    pub fn set_interval(&self, seconds: u64) -> u64 {
        let clamped = clamp_interval(seconds);
        if clamped != seconds {
            debug!("Interval {}s clamped to {}s", seconds, clamped);
        }
        let previous = self.shared.interval_secs.swap(clamped, Ordering::SeqCst);
        if previous != clamped {
            info!("Sampling interval changed from {}s to {}s", previous, clamped);
            if let Some(worker) = lock(&self.worker).as_ref() {
                let _ = worker.commands.send(Command::Reschedule);
            }
        }
        clamped
    }

    pub fn interval(&self) -> u64 {
        self.shared.interval_secs.load(Ordering::SeqCst)
    }

    /// Changes how many samples each series keeps. The series are resized by
    /// the next tick.
    pub fn set_history_len(&self, history_len: usize) {
        self.shared
            .history_len
            .store(history_len.max(1), Ordering::SeqCst);
    }

    pub fn history_len(&self) -> usize {
        self.shared.history_len.load(Ordering::SeqCst)
    }

    /// Asks the OS to terminate `pid`. Failures are returned, never fatal.
    pub fn kill(&self, pid: u32) -> Result<(), KillError> {
        let result = lock(&self.shared.control).kill(pid);
        match &result {
            Ok(()) => info!("Killed process with PID {}", pid),
            Err(e) => warn!("Failed to kill process: {}", e),
        }
        result
    }

    /// Latest published state. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<SamplerState> {
        self.shared.snapshot()
    }

    /// Latest process list, filtered and sorted into a new vector.
    pub fn filtered_view(&self, keyword: &str, sort_by: SortBy) -> Vec<ProcessSnapshot> {
        filtered_view(&self.snapshot().processes, keyword, sort_by)
    }

    /// Logical cores seen by the last tick.
    pub fn cpu_count(&self) -> usize {
        self.snapshot().history.cpu_cores().len()
    }

    pub fn memory_metric(&self) -> MemoryMetric {
        self.shared.memory_metric
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(SamplerConfig::default())
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn snapshot(&self) -> Arc<SamplerState> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.load(Ordering::SeqCst))
    }

    fn tick(&self, collector: &mut Collector) -> Result<Arc<SamplerState>, SamplerError> {
        let interval_secs = self.interval_secs.load(Ordering::SeqCst);

        // Nothing below may fail once the reading is in hand.
        let reading = collector.source.read()?;
        let gpu = collector.gpu.as_mut().and_then(|g| g.sample());

        collector
            .history
            .resize(self.history_len.load(Ordering::SeqCst));

        collector.history.record_cpu(&reading.cpu_per_core);
        collector.history.record_memory(
            MemoryMetric::Percent.scale(reading.used_memory, reading.total_memory),
        );

        let network_window = collector
            .previous_network
            .map(|(_, at)| reading.taken_at.saturating_duration_since(at))
            .unwrap_or_default();
        let network_rate = reading.network.rate_since(
            collector.previous_network.map(|(counters, _)| counters),
            network_window,
        );
        collector.history.record_network(network_rate);
        collector.previous_network = Some((reading.network, reading.taken_at));

        if let Some(gpu) = &gpu {
            collector.history.record_gpu(gpu.used_percent);
        }

        let mut skipped = 0usize;
        let processes: Vec<ProcessSnapshot> = reading
            .processes
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(p) => Some(ProcessSnapshot {
                    pid: p.pid,
                    gpu_memory_mb: gpu
                        .as_ref()
                        .and_then(|g| g.per_process_mb.get(&p.pid).copied()),
                    memory: self.memory_metric.scale(p.memory_bytes, reading.total_memory),
                    cpu_percent: p.cpu_percent,
                    name: p.name,
                }),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        collector.version += 1;
        let state = Arc::new(SamplerState {
            version: collector.version,
            processes,
            history: collector.history.clone(),
            network_rate,
            network_window,
            interval_secs,
        });

        *self.published.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&state);

        debug!(
            "Tick {}: {} processes ({} skipped), {} cores",
            state.version,
            state.processes.len(),
            skipped,
            state.history.cpu_cores().len()
        );

        Ok(state)
    }

    /// Tick from the scheduler. Skipped if another tick is still running.
    fn scheduled_tick(&self) {
        let mut collector = match self.collector.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("Previous tick still running, skipping");
                return;
            }
        };
        if let Err(e) = self.tick(&mut collector) {
            warn!("Tick failed, keeping previous snapshot: {}", e);
        }
    }
}

fn run(shared: Arc<Shared>, commands: Receiver<Command>) {
    let mut last_tick = Instant::now();
    shared.scheduled_tick();

    loop {
        let next_tick = last_tick + shared.interval();
        let now = Instant::now();
        if now >= next_tick {
            last_tick = now;
            shared.scheduled_tick();
            continue;
        }

        match commands.recv_timeout(next_tick - now) {
            // next_tick is recomputed from the new interval at the top of the loop
            Ok(Command::Reschedule) | Err(RecvTimeoutError::Timeout) => {}
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
