use std::path::{Path, PathBuf};

use anyhow::Context;
use brandscout_contracts::events::{
    payload, EventWriter, BACKGROUND_SYNTHESIZED, RUN_FINISHED, RUN_STARTED, RUN_WARNING,
    STYLE_DESCRIBED,
};
use brandscout_contracts::runs::{now_utc_iso, write_summary, RunState, RunSummary};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::PipelineError;
use crate::pipeline::{MockupResult, RunObserver};
use crate::prompts::StyleDescription;

pub const MOCKUP_FILE: &str = "mockup.png";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const SUMMARY_FILE: &str = "summary.json";

/// Writes the artifacts of a single run into its output directory.
pub struct RunRecorder {
    run_dir: PathBuf,
    run_id: String,
    events: EventWriter,
    started_at: String,
}

impl RunRecorder {
    pub fn new(run_dir: impl Into<PathBuf>, run_id: impl Into<String>) -> anyhow::Result<Self> {
        let run_dir = run_dir.into();
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("failed to create run directory {}", run_dir.display()))?;
        let run_id = run_id.into();
        let events = EventWriter::new(run_dir.join(EVENTS_FILE), run_id.clone());
        let started_at = now_utc_iso();

        events.emit(
            RUN_STARTED,
            payload(json!({
                "out_dir": run_dir.to_string_lossy().to_string(),
            })),
        )?;

        Ok(Self {
            run_dir,
            run_id,
            events,
            started_at,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn events(&self) -> EventWriter {
        self.events.clone()
    }

    pub fn mockup_path(&self) -> PathBuf {
        self.run_dir.join(MOCKUP_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.run_dir.join(SUMMARY_FILE)
    }

    /// Persists the outcome: the mockup (only on success), `summary.json`, and a
    /// closing `run_finished` or `run_failed` event.
    pub fn finish(
        &self,
        outcome: &Result<MockupResult, PipelineError>,
    ) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary {
            run_id: self.run_id.clone(),
            started_at: self.started_at.clone(),
            finished_at: String::new(),
            final_state: RunState::Done,
            failed_stage: None,
            error: None,
            style_description: None,
            output_path: None,
            warnings: Vec::new(),
        };
        let mut extra = Map::new();

        match outcome {
            Ok(result) => {
                let mockup_path = self.mockup_path();
                result
                    .image
                    .save(&mockup_path)
                    .with_context(|| format!("failed to write {}", mockup_path.display()))?;
                summary.style_description = Some(result.style.to_string());
                summary.output_path = Some(mockup_path.to_string_lossy().to_string());
                summary.warnings = result.warnings.clone();
                extra.insert("placement".to_string(), serde_json::to_value(&result.placement)?);
                extra.insert(
                    "aspect_ratio".to_string(),
                    Value::String(result.aspect_ratio.clone()),
                );
            }
            Err(err) => {
                summary.final_state = RunState::Errored;
                summary.failed_stage = err.stage();
                summary.error = Some(err.chain_text());
                extra.insert("timed_out".to_string(), Value::Bool(err.is_timeout()));
            }
        }

        summary.finished_at = now_utc_iso();
        let summary_path = self.summary_path();
        write_summary(&summary_path, &summary, Some(&extra))?;

        match outcome {
            Ok(_) => {
                self.events.emit(
                    RUN_FINISHED,
                    payload(json!({
                        "summary_path": summary_path.to_string_lossy().to_string(),
                        "output_path": summary.output_path,
                    })),
                )?;
            }
            Err(err) => {
                self.events.emit_failure(err.stage(), &err.chain_text())?;
            }
        }
        Ok(summary)
    }
}

/// Streams pipeline progress into `events.jsonl`. A failed write is logged and
/// never aborts the run.
impl RunObserver for EventWriter {
    fn state_changed(&mut self, from: RunState, to: RunState) {
        if let Err(err) = self.emit_state_change(from, to) {
            warn!(error = %err, "failed to record state change");
        }
    }

    fn style_described(&mut self, style: &StyleDescription) {
        let result = self.emit(
            STYLE_DESCRIBED,
            payload(json!({
                "style_description": style.as_str(),
            })),
        );
        if let Err(err) = result {
            warn!(error = %err, "failed to record style description");
        }
    }

    fn background_synthesized(&mut self, width: u32, height: u32) {
        let result = self.emit(
            BACKGROUND_SYNTHESIZED,
            payload(json!({
                "width": width,
                "height": height,
            })),
        );
        if let Err(err) = result {
            warn!(error = %err, "failed to record background");
        }
    }

    fn warning(&mut self, message: &str) {
        if let Err(err) = self.emit(RUN_WARNING, payload(json!({ "message": message }))) {
            warn!(error = %err, "failed to record warning");
        }
    }
}
