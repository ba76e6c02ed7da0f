use std::cmp::Ordering;

/// One row of the process table as of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    /// Percent of host memory or resident megabytes, see [`MemoryMetric`].
    pub memory: f32,
    /// Dedicated GPU memory in megabytes, when a GPU source reports it.
    pub gpu_memory_mb: Option<f32>,
}

/// Unit of [`ProcessSnapshot::memory`], fixed when the sampler is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum MemoryMetric {
    Percent,
    ResidentMb,
}

impl MemoryMetric {
    pub fn scale(&self, bytes: u64, total_bytes: u64) -> f32 {
        match self {
            MemoryMetric::Percent if total_bytes == 0 => 0.0,
            MemoryMetric::Percent => (bytes as f64 / total_bytes as f64 * 100.0) as f32,
            MemoryMetric::ResidentMb => (bytes as f64 / (1024.0 * 1024.0)) as f32,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            MemoryMetric::Percent => "%",
            MemoryMetric::ResidentMb => "MB",
        }
    }
}

impl Default for MemoryMetric {
    fn default() -> Self {
        Self::Percent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum SortBy {
    None,
    Cpu,
    Memory,
}

impl SortBy {
    pub const ALL: [SortBy; 3] = [SortBy::None, SortBy::Cpu, SortBy::Memory];

    pub fn label(&self) -> &'static str {
        match self {
            SortBy::None => "None",
            SortBy::Cpu => "CPU Usage",
            SortBy::Memory => "RAM Usage",
        }
    }
}

impl Default for SortBy {
    fn default() -> Self {
        Self::None
    }
}

/// Builds a new filtered and ordered list from `processes`.
///
/// The keyword matches process names case-insensitively; an empty or
/// whitespace-only keyword keeps every row. Sorting is stable and
/// descending, with NaN values placed last. `SortBy::None` keeps
/// enumeration order.
pub fn filtered_view(
    processes: &[ProcessSnapshot],
    keyword: &str,
    sort_by: SortBy,
) -> Vec<ProcessSnapshot> {
    let keyword = keyword.trim().to_lowercase();

    let mut view: Vec<ProcessSnapshot> = processes
        .iter()
        .filter(|p| keyword.is_empty() || p.name.to_lowercase().contains(&keyword))
        .cloned()
        .collect();

    match sort_by {
        SortBy::None => {}
        SortBy::Cpu => view.sort_by(|a, b| descending(a.cpu_percent, b.cpu_percent)),
        SortBy::Memory => view.sort_by(|a, b| descending(a.memory, b.memory)),
    }

    view
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
