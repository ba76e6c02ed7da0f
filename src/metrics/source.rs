use crate::error::{KillError, SamplerError};
use super::network::NetworkCounters;
use log::{debug, trace};
use std::fmt;
use std::time::Instant;
use sysinfo::{Networks, Pid, ProcessStatus, ProcessesToUpdate, System};

/// Raw per-process figures as read from the OS.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReading {
    pub pid: u32,
    pub name: String,
    /// Share of the whole machine, 0..=100
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

/// Why a single process could not be read. These never fail a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessReadError {
    Vanished,
    AccessDenied,
    Zombie,
}

impl fmt::Display for ProcessReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ProcessReadError::Vanished => "vanished",
            ProcessReadError::AccessDenied => "access denied",
            ProcessReadError::Zombie => "zombie",
        };
        f.write_str(reason)
    }
}

/// Everything a single tick needs from the OS.
#[derive(Debug, Clone)]
pub struct Reading {
    /// In enumeration order. Failed entries are kept so the sampler can skip them.
    pub processes: Vec<Result<ProcessReading, ProcessReadError>>,
    pub cpu_per_core: Vec<f32>,
    pub total_memory: u64,
    pub used_memory: u64,
    pub network: NetworkCounters,
    /// When the network counters were read
    pub taken_at: Instant,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            processes: Vec::new(),
            cpu_per_core: Vec::new(),
            total_memory: 0,
            used_memory: 0,
            network: NetworkCounters::default(),
            taken_at: Instant::now(),
        }
    }
}

/// Where the sampler gets its numbers from.
pub trait SystemSource: Send {
    fn read(&mut self) -> Result<Reading, SamplerError>;
}

/// Terminates processes. Kept apart from [`SystemSource`] so a kill never
/// waits for a refresh in progress.
pub trait ProcessControl: Send {
    fn kill(&mut self, pid: u32) -> Result<(), KillError>;
}

/// [`SystemSource`] backed by `sysinfo`.
pub struct SysinfoSource {
    system: System,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    fn network_counters() -> NetworkCounters {
        let networks = Networks::new_with_refreshed_list();
        networks
            .list()
            .values()
            .fold(NetworkCounters::default(), |acc, data| NetworkCounters {
                sent: acc.sent.saturating_add(data.total_transmitted()),
                received: acc.received.saturating_add(data.total_received()),
            })
    }

    fn collect_process(
        process: &sysinfo::Process,
        cpu_count: usize,
    ) -> Result<ProcessReading, ProcessReadError> {
        if process.status() == ProcessStatus::Zombie {
            return Err(ProcessReadError::Zombie);
        }
        Ok(ProcessReading {
            pid: process.pid().as_u32(),
            name: process.name().to_string_lossy().into_owned(),
            cpu_percent: process.cpu_usage() / cpu_count as f32,
            memory_bytes: process.memory(),
        })
    }
}

impl SystemSource for SysinfoSource {
    fn read(&mut self) -> Result<Reading, SamplerError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SamplerError::Unsupported);
        }

        self.system.refresh_all();

        let cpu_per_core: Vec<f32> = self.system.cpus().iter().map(|c| c.cpu_usage()).collect();
        if cpu_per_core.is_empty() {
            return Err(SamplerError::NoCpus);
        }

        let mut listed: Vec<&sysinfo::Process> = self
            .system
            .processes()
            .values()
            // Linux tasks show up as processes; only keep the real ones
            .filter(|p| p.thread_kind().is_none())
            .collect();
        listed.sort_by_key(|p| p.pid());

        let processes = listed
            .into_iter()
            .map(|p| Self::collect_process(p, cpu_per_core.len()))
            .collect();

        trace!("sysinfo refreshed {} processes", self.system.processes().len());

        Ok(Reading {
            processes,
            cpu_per_core,
            total_memory: self.system.total_memory(),
            used_memory: self.system.used_memory(),
            network: Self::network_counters(),
            taken_at: Instant::now(),
        })
    }
}

/// [`ProcessControl`] backed by its own `sysinfo::System`, refreshing only
/// the pid being killed.
pub struct SysinfoControl {
    system: System,
}

impl Default for SysinfoControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoControl {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl ProcessControl for SysinfoControl {
    fn kill(&mut self, pid: u32) -> Result<(), KillError> {
        let target = Pid::from_u32(pid);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        let process = self
            .system
            .process(target)
            .ok_or(KillError::NoSuchProcess(pid))?;

        if process.kill() {
            Ok(())
        } else {
            debug!("kill signal for pid {} was rejected", pid);
            Err(KillError::Denied(pid))
        }
    }
}
