use std::time::Duration;

/// Cumulative byte counters summed over every interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub sent: u64,
    pub received: u64,
}

/// Bytes per second over the last measured window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkRate {
    pub sent: f32,
    pub received: f32,
}

impl NetworkCounters {
    /// Rate since `previous`, which was read `elapsed` ago. Without a
    /// previous reading, with no measurable time in between, or when a
    /// counter went backwards because an interface disappeared, the rate is
    /// zero.
    pub fn rate_since(
        &self,
        previous: Option<NetworkCounters>,
        elapsed: Duration,
    ) -> NetworkRate {
        let Some(previous) = previous else {
            return NetworkRate::default();
        };
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return NetworkRate::default();
        }
        NetworkRate {
            sent: (self.sent.saturating_sub(previous.sent) as f64 / secs) as f32,
            received: (self.received.saturating_sub(previous.received) as f64 / secs) as f32,
        }
    }
}
