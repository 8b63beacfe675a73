mod state;
mod summary;

pub use state::{RunState, Stage};
pub use summary::{now_utc_iso, write_summary, RunSummary};

/// Fresh identifier for one mockup run, e.g. `run-20260219T101500-1a2b3c4d`.
pub fn new_run_id() -> String {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{stamp}-{}", &suffix[..8])
}
