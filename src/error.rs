use thiserror::Error;

/// A tick that could not read the system at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    #[error("process and CPU statistics are not supported on this platform")]
    Unsupported,

    #[error("the system reported no logical CPUs")]
    NoCpus,

    #[error("system source failed: {0}")]
    Source(String),
}

/// Why a process could not be terminated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KillError {
    #[error("no process with pid {0}")]
    NoSuchProcess(u32),

    #[error("not permitted to terminate pid {0}")]
    Denied(u32),
}
