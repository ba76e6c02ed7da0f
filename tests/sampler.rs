use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use systop::metrics::{
    GpuSample, GpuSource, MetricsHistory, NetworkCounters, ProcessControl, ProcessReadError,
    ProcessReading, Reading, SystemSource,
};
use systop::{
    KillError, MemoryMetric, Sampler, SamplerConfig, SamplerError, SamplerStatus, SortBy,
};

const MB: u64 = 1024 * 1024;

/// Fixed origin for scripted reading timestamps.
fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Stamps a reading as taken `millis` after [`epoch`].
fn at(millis: u64, mut reading: Reading) -> Reading {
    reading.taken_at = epoch() + Duration::from_millis(millis);
    reading
}

/// Plays back scripted readings, then repeats the last good one.
struct ScriptedSource {
    script: VecDeque<Result<Reading, SamplerError>>,
    last: Reading,
}

impl ScriptedSource {
    fn new(script: Vec<Result<Reading, SamplerError>>) -> Self {
        Self {
            script: script.into(),
            last: Reading::default(),
        }
    }
}

impl SystemSource for ScriptedSource {
    fn read(&mut self) -> Result<Reading, SamplerError> {
        match self.script.pop_front() {
            Some(Ok(reading)) => {
                self.last = reading.clone();
                Ok(reading)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last.clone()),
        }
    }
}

/// Kills only the pids it was told are alive and remembers them.
#[derive(Default)]
struct RecordingControl {
    alive: Vec<u32>,
    killed: Arc<Mutex<Vec<u32>>>,
}

impl ProcessControl for RecordingControl {
    fn kill(&mut self, pid: u32) -> Result<(), KillError> {
        if !self.alive.contains(&pid) {
            return Err(KillError::NoSuchProcess(pid));
        }
        self.killed.lock().unwrap().push(pid);
        Ok(())
    }
}

/// Blocks every read until the test lets it through, and counts reads that
/// overlap.
struct GatedSource {
    entered: Sender<()>,
    gate: Receiver<()>,
    in_read: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
}

impl SystemSource for GatedSource {
    fn read(&mut self) -> Result<Reading, SamplerError> {
        if self.in_read.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let _ = self.entered.send(());
        // A dropped gate releases every later read.
        let _ = self.gate.recv();
        self.in_read.store(false, Ordering::SeqCst);
        Ok(reading(&[1.0], 0, 0))
    }
}

struct Gate {
    entered: Receiver<()>,
    release: Sender<()>,
    overlaps: Arc<AtomicUsize>,
}

fn gated_source() -> (GatedSource, Gate) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let overlaps = Arc::new(AtomicUsize::new(0));
    let source = GatedSource {
        entered: entered_tx,
        gate: release_rx,
        in_read: Arc::default(),
        overlaps: Arc::clone(&overlaps),
    };
    let gate = Gate {
        entered: entered_rx,
        release: release_tx,
        overlaps,
    };
    (source, gate)
}

struct FixedGpu(GpuSample);

impl GpuSource for FixedGpu {
    fn sample(&mut self) -> Option<GpuSample> {
        Some(self.0.clone())
    }
}

fn process(
    pid: u32,
    name: &str,
    cpu: f32,
    memory_bytes: u64,
) -> Result<ProcessReading, ProcessReadError> {
    Ok(ProcessReading {
        pid,
        name: name.to_string(),
        cpu_percent: cpu,
        memory_bytes,
    })
}

fn reading(cores: &[f32], sent: u64, received: u64) -> Reading {
    Reading {
        processes: vec![
            process(1, "a", 10.0, 5 * MB),
            process(2, "b", 90.0, 2 * MB),
        ],
        cpu_per_core: cores.to_vec(),
        total_memory: 100 * MB,
        used_memory: 40 * MB,
        network: NetworkCounters { sent, received },
        taken_at: epoch(),
    }
}

fn config(interval_secs: u64, history_len: usize) -> SamplerConfig {
    SamplerConfig {
        interval_secs,
        history_len,
        memory_metric: MemoryMetric::Percent,
    }
}

#[test]
fn series_never_exceed_capacity() {
    let script = (0..10)
        .map(|i| Ok(reading(&[i as f32, 100.0 - i as f32], i * 100, i * 200)))
        .collect();
    let sampler = Sampler::with_source(config(1, 3), Box::new(ScriptedSource::new(script)));

    let mut previous_len = 0;
    for _ in 0..10 {
        let state = sampler.tick().unwrap();
        for series in state.history.all_series() {
            assert!(series.len() <= 3);
        }
        let len = state.history.cpu_core(0).unwrap().len();
        assert!(len >= previous_len);
        previous_len = len;
    }

    let state = sampler.snapshot();
    assert_eq!(state.version, 10);
    assert_eq!(state.history.cpu_core(0).unwrap().to_vec(), vec![7.0, 8.0, 9.0]);
    assert_eq!(state.history.cpu_core(1).unwrap().last(), Some(91.0));
    assert_eq!(sampler.cpu_count(), 2);
}

#[test]
fn network_rate_is_counter_delta_over_elapsed_time() {
    let script = vec![
        Ok(at(0, reading(&[0.0], 1_000, 5_000))),
        Ok(at(2_000, reading(&[0.0], 3_000, 5_400))),
    ];
    let sampler = Sampler::with_source(config(2, 50), Box::new(ScriptedSource::new(script)));

    let first = sampler.tick().unwrap();
    assert_eq!(first.network_rate.sent, 0.0);
    assert_eq!(first.network_rate.received, 0.0);
    assert_eq!(first.network_window, Duration::ZERO);

    let second = sampler.tick().unwrap();
    assert_eq!(second.network_rate.sent, 1_000.0);
    assert_eq!(second.network_rate.received, 200.0);
    assert_eq!(second.network_window, Duration::from_secs(2));
    assert_eq!(second.history.net_sent().to_vec(), vec![0.0, 1_000.0]);
    assert_eq!(second.history.net_received().to_vec(), vec![0.0, 200.0]);
}

#[test]
fn network_rate_follows_the_clock_not_the_interval() {
    // Interval is 1s, but the second reading lands 4s later (skipped ticks)
    // and the third only 500ms after that (manual tick).
    let script = vec![
        Ok(at(0, reading(&[0.0], 0, 0))),
        Ok(at(4_000, reading(&[0.0], 8_000, 4_000))),
        Ok(at(4_500, reading(&[0.0], 9_000, 4_100))),
        Ok(at(4_500, reading(&[0.0], 9_500, 4_100))),
    ];
    let sampler = Sampler::with_source(config(1, 50), Box::new(ScriptedSource::new(script)));
    sampler.tick().unwrap();

    let late = sampler.tick().unwrap();
    assert_eq!(late.network_rate.sent, 2_000.0);
    assert_eq!(late.network_rate.received, 1_000.0);

    let early = sampler.tick().unwrap();
    assert_eq!(early.network_rate.sent, 2_000.0);
    assert_eq!(early.network_rate.received, 200.0);

    // No time passed: no rate rather than a division by zero
    let same_instant = sampler.tick().unwrap();
    assert_eq!(same_instant.network_rate.sent, 0.0);
    assert_eq!(same_instant.network_window, Duration::ZERO);
}

#[test]
fn failed_tick_keeps_previous_snapshot() {
    let script = vec![
        Ok(at(0, reading(&[25.0], 1_000, 1_000))),
        Err(SamplerError::Source("process table unavailable".to_string())),
        Ok(at(2_000, reading(&[50.0], 2_000, 3_000))),
    ];
    let sampler = Sampler::with_source(config(1, 50), Box::new(ScriptedSource::new(script)));

    let first = sampler.tick().unwrap();
    let err = sampler.tick().unwrap_err();
    assert_eq!(err, SamplerError::Source("process table unavailable".to_string()));

    let after_failure = sampler.snapshot();
    assert_eq!(after_failure.version, first.version);
    assert_eq!(after_failure.processes, first.processes);
    assert_eq!(after_failure.history.cpu_core(0).unwrap().to_vec(), vec![25.0]);

    // Counters from the failed tick were never taken, so the delta spans
    // back to the last good reading.
    let third = sampler.tick().unwrap();
    assert_eq!(third.version, 2);
    assert_eq!(third.network_window, Duration::from_secs(2));
    assert_eq!(third.network_rate.sent, 500.0);
    assert_eq!(third.network_rate.received, 1_000.0);
}

#[test]
fn unreadable_processes_are_skipped() {
    let mut r = reading(&[1.0], 0, 0);
    r.processes = vec![
        process(10, "init", 0.5, MB),
        Err(ProcessReadError::Vanished),
        Err(ProcessReadError::AccessDenied),
        process(11, "shell", 2.0, MB),
        Err(ProcessReadError::Zombie),
    ];
    let sampler = Sampler::with_source(config(1, 50), Box::new(ScriptedSource::new(vec![Ok(r)])));

    let state = sampler.tick().unwrap();
    let pids: Vec<u32> = state.processes.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![10, 11]);
}

#[test]
fn each_tick_replaces_the_process_list() {
    let mut second = reading(&[1.0], 0, 0);
    second.processes = vec![process(3, "c", 1.0, MB)];
    let script = vec![Ok(reading(&[1.0], 0, 0)), Ok(second)];
    let sampler = Sampler::with_source(config(1, 50), Box::new(ScriptedSource::new(script)));

    assert_eq!(sampler.tick().unwrap().processes.len(), 2);
    let state = sampler.tick().unwrap();
    assert_eq!(state.processes.len(), 1);
    assert_eq!(state.processes[0].name, "c");
}

#[test]
fn filtered_view_does_not_reorder_snapshot() {
    let mut r = reading(&[1.0], 0, 0);
    r.processes.push(process(3, "ABC-agent", 40.0, MB));
    r.processes.push(process(4, "xabcx", 60.0, MB));
    let sampler = Sampler::with_source(config(1, 50), Box::new(ScriptedSource::new(vec![Ok(r)])));
    sampler.tick().unwrap();

    let all = sampler.filtered_view("", SortBy::Cpu);
    let pids: Vec<u32> = all.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![2, 4, 3, 1]);

    let matching = sampler.filtered_view("abc", SortBy::Cpu);
    let pids: Vec<u32> = matching.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![4, 3]);

    let stored: Vec<u32> = sampler.snapshot().processes.iter().map(|p| p.pid).collect();
    assert_eq!(stored, vec![1, 2, 3, 4]);
}

#[test]
fn memory_metric_is_applied_per_process() {
    let percent = Sampler::with_source(
        config(1, 50),
        Box::new(ScriptedSource::new(vec![Ok(reading(&[1.0], 0, 0))])),
    );
    let state = percent.tick().unwrap();
    assert_eq!(state.processes[0].memory, 5.0);
    assert_eq!(state.history.memory().last(), Some(40.0));

    let resident = Sampler::with_source(
        SamplerConfig {
            memory_metric: MemoryMetric::ResidentMb,
            ..config(1, 50)
        },
        Box::new(ScriptedSource::new(vec![Ok(reading(&[1.0], 0, 0))])),
    );
    let state = resident.tick().unwrap();
    assert_eq!(state.processes[0].memory, 5.0);
    assert_eq!(state.processes[1].memory, 2.0);
    assert_eq!(resident.memory_metric(), MemoryMetric::ResidentMb);
}

#[test]
fn gpu_source_feeds_series_and_processes() {
    let gpu = GpuSample {
        used_percent: 30.0,
        per_process_mb: HashMap::from([(2, 512.0)]),
    };
    let sampler = Sampler::with_source(
        config(1, 50),
        Box::new(ScriptedSource::new(vec![Ok(reading(&[1.0], 0, 0))])),
    )
    .with_gpu(Box::new(FixedGpu(gpu)));

    let state = sampler.tick().unwrap();
    assert_eq!(state.history.gpu().to_vec(), vec![30.0]);
    assert_eq!(state.processes[0].gpu_memory_mb, None);
    assert_eq!(state.processes[1].gpu_memory_mb, Some(512.0));
}

#[test]
fn no_gpu_source_leaves_gpu_empty() {
    let sampler = Sampler::with_source(
        config(1, 50),
        Box::new(ScriptedSource::new(vec![Ok(reading(&[1.0], 0, 0))])),
    );
    let state = sampler.tick().unwrap();
    assert!(state.history.gpu().is_empty());
    assert!(state.processes.iter().all(|p| p.gpu_memory_mb.is_none()));
}

#[test]
fn interval_is_clamped() {
    let sampler = Sampler::with_source(config(0, 50), Box::new(ScriptedSource::new(vec![])));
    assert_eq!(sampler.interval(), 1);
    assert_eq!(sampler.set_interval(15), 10);
    assert_eq!(sampler.interval(), 10);
    assert_eq!(sampler.set_interval(0), 1);
    assert_eq!(sampler.set_interval(4), 4);
    assert_eq!(sampler.interval(), 4);
}

#[test]
fn interval_change_does_not_touch_collected_samples() {
    let script = vec![Ok(reading(&[5.0], 0, 0)), Ok(reading(&[6.0], 0, 0))];
    let sampler = Sampler::with_source(config(1, 50), Box::new(ScriptedSource::new(script)));
    sampler.tick().unwrap();
    sampler.set_interval(7);
    let state = sampler.snapshot();
    assert_eq!(state.history.cpu_core(0).unwrap().to_vec(), vec![5.0]);
    assert_eq!(state.interval_secs, 1);
    assert_eq!(sampler.tick().unwrap().interval_secs, 7);
}

#[test]
fn kill_unknown_pid_reports_failure() {
    let control = RecordingControl {
        alive: vec![1, 2],
        ..Default::default()
    };
    let killed = Arc::clone(&control.killed);
    let source = ScriptedSource::new(vec![Ok(reading(&[1.0], 0, 0))]);
    let sampler =
        Sampler::with_source(config(1, 50), Box::new(source)).with_control(Box::new(control));
    let before = sampler.tick().unwrap();

    assert_eq!(sampler.kill(999_999), Err(KillError::NoSuchProcess(999_999)));
    let after = sampler.snapshot();
    assert_eq!(after.version, before.version);
    assert_eq!(after.processes, before.processes);

    assert_eq!(sampler.kill(2), Ok(()));
    assert_eq!(*killed.lock().unwrap(), vec![2]);
}

#[test]
fn history_len_change_applies_on_next_tick() {
    let script = (0..6).map(|i| Ok(reading(&[i as f32], 0, 0))).collect();
    let sampler = Sampler::with_source(config(1, 5), Box::new(ScriptedSource::new(script)));
    for _ in 0..5 {
        sampler.tick().unwrap();
    }
    sampler.set_history_len(2);
    assert_eq!(sampler.history_len(), 2);
    assert_eq!(sampler.snapshot().history.history_len(), 5);

    let state = sampler.tick().unwrap();
    assert_eq!(state.history.history_len(), 2);
    assert_eq!(state.history.cpu_core(0).unwrap().to_vec(), vec![4.0, 5.0]);
}

#[test]
fn replacement_sampler_keeps_history() {
    let script = (0..3).map(|i| Ok(reading(&[i as f32], 0, 0))).collect();
    let old = Sampler::with_source(config(1, 50), Box::new(ScriptedSource::new(script)));
    for _ in 0..3 {
        old.tick().unwrap();
    }
    let history: MetricsHistory = old.snapshot().history.clone();
    old.stop_in_background();

    let script = vec![Ok(reading(&[9.0], 0, 0))];
    let replacement = Sampler::with_source(config(1, 2), Box::new(ScriptedSource::new(script)))
        .with_history(history);
    assert_eq!(replacement.snapshot().version, 0);
    assert_eq!(
        replacement.snapshot().history.cpu_core(0).unwrap().to_vec(),
        vec![1.0, 2.0]
    );

    let state = replacement.tick().unwrap();
    assert_eq!(state.history.cpu_core(0).unwrap().to_vec(), vec![2.0, 9.0]);
}

fn wait_for_version(sampler: &Sampler, version: u64) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if sampler.snapshot().version >= version {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn background_loop_ticks_until_stopped() {
    let sampler = Sampler::with_source(
        config(1, 50),
        Box::new(ScriptedSource::new(vec![Ok(reading(&[1.0], 0, 0))])),
    );
    assert_eq!(sampler.status(), SamplerStatus::Idle);
    assert_eq!(sampler.snapshot().version, 0);

    assert!(sampler.start());
    assert!(!sampler.start());
    assert_eq!(sampler.status(), SamplerStatus::Running);

    // The first tick fires right away, the second after one interval.
    assert!(wait_for_version(&sampler, 1));
    assert!(wait_for_version(&sampler, 2));

    sampler.stop();
    assert_eq!(sampler.status(), SamplerStatus::Idle);
    let stopped_at = sampler.snapshot().version;
    thread::sleep(Duration::from_millis(1_200));
    assert_eq!(sampler.snapshot().version, stopped_at);
}

#[test]
fn readers_and_commands_interleave_with_running_loop() {
    let sampler = Arc::new(Sampler::with_source(
        config(1, 50),
        Box::new(ScriptedSource::new(vec![Ok(reading(&[1.0, 2.0], 0, 0))])),
    ));
    sampler.start();
    assert!(wait_for_version(&sampler, 1));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let sampler = Arc::clone(&sampler);
            thread::spawn(move || {
                for _ in 0..200 {
                    let state = sampler.snapshot();
                    assert_eq!(state.history.cpu_cores().len(), 2);
                    assert!(state.history.all_series().all(|s| s.len() <= 50));
                    let _ = sampler.filtered_view("a", SortBy::Memory);
                }
            })
        })
        .collect();

    for secs in [3, 1, 2, 1] {
        sampler.set_interval(secs);
        let _ = sampler.tick();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    sampler.stop();
}

#[test]
fn stalled_tick_blocks_neither_readers_nor_commands() {
    let (source, gate) = gated_source();
    let control = RecordingControl {
        alive: vec![1],
        ..Default::default()
    };
    let sampler = Arc::new(
        Sampler::with_source(config(1, 50), Box::new(source)).with_control(Box::new(control)),
    );

    // A manual tick parks inside the read while holding the tick lock.
    let manual = {
        let sampler = Arc::clone(&sampler);
        thread::spawn(move || sampler.tick())
    };
    gate.entered.recv_timeout(Duration::from_secs(2)).unwrap();

    let started = Instant::now();
    assert_eq!(sampler.snapshot().version, 0);
    assert!(sampler.filtered_view("", SortBy::Cpu).is_empty());
    assert_eq!(sampler.kill(1), Ok(()));
    assert_eq!(sampler.kill(7), Err(KillError::NoSuchProcess(7)));
    sampler.set_history_len(20);
    assert_eq!(sampler.set_interval(1), 1);
    assert!(started.elapsed() < Duration::from_millis(500));

    // The loop's immediate first tick finds the lock taken and is skipped
    // instead of starting a second read.
    assert!(sampler.start());
    thread::sleep(Duration::from_millis(300));
    assert!(gate.entered.try_recv().is_err());
    assert_eq!(sampler.snapshot().version, 0);

    gate.release.send(()).unwrap();
    let state = manual.join().unwrap().unwrap();
    assert_eq!(state.version, 1);
    assert_eq!(sampler.snapshot().version, 1);
    assert_eq!(state.history.history_len(), 20);

    // The next scheduled tick reads again and advances by exactly one.
    gate.entered.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(sampler.snapshot().version, 1);
    gate.release.send(()).unwrap();
    assert!(wait_for_version(&sampler, 2));
    assert_eq!(sampler.snapshot().version, 2);

    drop(gate.release);
    sampler.stop();
    assert_eq!(gate.overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn stop_in_background_returns_while_a_tick_is_stalled() {
    let (source, gate) = gated_source();
    let sampler = Sampler::with_source(config(1, 50), Box::new(source));
    assert!(sampler.start());
    gate.entered.recv_timeout(Duration::from_secs(2)).unwrap();

    let started = Instant::now();
    sampler.stop_in_background();
    assert!(started.elapsed() < Duration::from_millis(500));

    // Let the stalled read finish so the helper thread can join the loop.
    drop(gate.release);
}
