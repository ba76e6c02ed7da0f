use super::circular_buffer::RollingSeries;
use super::network::NetworkRate;

/// Rolling series for every chart the sampler feeds.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    /// One series per logical core, indexed by core number
    cpu_cores: Vec<RollingSeries>,
    /// Host memory in use, percent
    memory: RollingSeries,
    /// Aggregate GPU memory in use, percent. Empty without a GPU source
    gpu: RollingSeries,
    net_sent: RollingSeries,
    net_received: RollingSeries,
    /// Maximum number of data points to store per series
    history_len: usize,
}

impl MetricsHistory {
    pub fn new(history_len: usize) -> Self {
        let history_len = history_len.max(1);
        Self {
            cpu_cores: Vec::new(),
            memory: RollingSeries::new(history_len),
            gpu: RollingSeries::new(history_len),
            net_sent: RollingSeries::new(history_len),
            net_received: RollingSeries::new(history_len),
            history_len,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Appends one sample per core. A change in core count keeps the
    /// history of surviving cores and starts new cores empty.
    pub fn record_cpu(&mut self, per_core: &[f32]) {
        if per_core.len() != self.cpu_cores.len() {
            let len = self.history_len;
            self.cpu_cores
                .resize_with(per_core.len(), || RollingSeries::new(len));
        }
        for (series, usage) in self.cpu_cores.iter_mut().zip(per_core) {
            series.push(*usage);
        }
    }

    pub fn record_memory(&mut self, used_percent: f32) {
        self.memory.push(used_percent);
    }

    pub fn record_gpu(&mut self, used_percent: f32) {
        self.gpu.push(used_percent);
    }

    pub fn record_network(&mut self, rate: NetworkRate) {
        self.net_sent.push(rate.sent);
        self.net_received.push(rate.received);
    }

    /// Rebuilds every series with a new capacity, keeping the newest samples.
    pub fn resize(&mut self, history_len: usize) {
        let history_len = history_len.max(1);
        if history_len == self.history_len {
            return;
        }
        self.cpu_cores = self
            .cpu_cores
            .iter()
            .map(|s| s.resized(history_len))
            .collect();
        self.memory = self.memory.resized(history_len);
        self.gpu = self.gpu.resized(history_len);
        self.net_sent = self.net_sent.resized(history_len);
        self.net_received = self.net_received.resized(history_len);
        self.history_len = history_len;
    }

    pub fn cpu_cores(&self) -> &[RollingSeries] {
        &self.cpu_cores
    }

    pub fn cpu_core(&self, idx: usize) -> Option<&RollingSeries> {
        self.cpu_cores.get(idx)
    }

    pub fn memory(&self) -> &RollingSeries {
        &self.memory
    }

    pub fn gpu(&self) -> &RollingSeries {
        &self.gpu
    }

    pub fn net_sent(&self) -> &RollingSeries {
        &self.net_sent
    }

    pub fn net_received(&self) -> &RollingSeries {
        &self.net_received
    }

    /// Every series, used to check the capacity bound in one place.
    pub fn all_series(&self) -> impl Iterator<Item = &RollingSeries> {
        self.cpu_cores.iter().chain([
            &self.memory,
            &self.gpu,
            &self.net_sent,
            &self.net_received,
        ])
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(super::circular_buffer::DEFAULT_HISTORY_LEN)
    }
}
