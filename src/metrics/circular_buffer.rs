use std::fmt;

/// Default number of samples kept per chart.
pub const DEFAULT_HISTORY_LEN: usize = 50;

/// A fixed-capacity FIFO of samples. Once full, every push evicts the
/// oldest value.
#[derive(Clone)]
pub struct RollingSeries {
    buffer: Vec<f32>,
    write_pos: usize,
    capacity: usize,
}

impl RollingSeries {
    /// Creates an empty series. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            write_pos: 0,
            capacity,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(value);
        } else {
            self.buffer[self.write_pos] = value;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        let head = if self.buffer.len() < self.capacity {
            0
        } else {
            self.write_pos
        };

        self.buffer[head..].iter().chain(&self.buffer[..head])
    }

    /// Returns the samples in chronological order with the newest at the end.
    pub fn to_vec(&self) -> Vec<f32> {
        self.iter().copied().collect()
    }

    /// Returns the most recent sample.
    pub fn last(&self) -> Option<f32> {
        if self.buffer.is_empty() {
            return None;
        }
        let idx = (self.write_pos + self.capacity - 1) % self.capacity;
        self.buffer.get(idx).copied()
    }

    pub fn max(&self) -> Option<f32> {
        self.buffer.iter().copied().reduce(f32::max)
    }

    /// Mean of the samples currently held, accumulated in `f64`.
    pub fn mean(&self) -> Option<f32> {
        if self.buffer.is_empty() {
            return None;
        }
        let sum: f64 = self.buffer.iter().map(|v| *v as f64).sum();
        Some((sum / self.buffer.len() as f64) as f32)
    }

    /// Rebuilds the series with a new capacity, keeping the newest samples.
    pub fn resized(&self, capacity: usize) -> Self {
        let mut series = Self::new(capacity);
        let skip = self.len().saturating_sub(series.capacity);
        for value in self.iter().skip(skip) {
            series.push(*value);
        }
        series
    }
}

impl Default for RollingSeries {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl fmt::Debug for RollingSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
