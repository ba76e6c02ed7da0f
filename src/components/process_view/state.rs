use crate::error::KillError;
use crate::process::SortBy;

#[derive(Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ProcessView {
    pub filter: String,
    pub sort_by: SortBy,
    #[serde(skip)]
    pub status: Option<String>,
}

impl ProcessView {
    pub fn record_kill(&mut self, pid: u32, result: Result<(), KillError>) {
        self.status = Some(match result {
            Ok(()) => format!("Killed process with PID {}", pid),
            Err(e) => format!("Failed to kill process: {}", e),
        });
    }
}
