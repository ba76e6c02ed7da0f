#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub mod components;
pub mod error;
pub mod metrics;
pub mod process;
pub use app::ProcessMonitorApp;
pub use error::{KillError, SamplerError};
pub use metrics::{Sampler, SamplerConfig, SamplerState, SamplerStatus};
pub use process::{filtered_view, MemoryMetric, ProcessSnapshot, SortBy};
