//! The run state machine: validate, analyze, synthesize, composite.
//!
//! Each stage consumes the previous stage's output, so nothing runs in parallel
//! and nothing is retried here. A pipeline value is single use.

use brandscout_contracts::runs::RunState;
use tracing::{debug, error, info, warn};

use crate::compositor::{self, LogoPlacement};
use crate::error::{MissingInput, PipelineError, Result};
use crate::prompts::{build_synthesis_prompt, StyleDescription, STYLE_ANALYSIS_INSTRUCTION, STYLE_LEAD_IN};
use crate::providers::{MockupSynthesizer, StyleAnalyzer};
use crate::raster::{ImageUpload, RasterImage, ReferenceSet};

/// What the user handed in. Either side may be missing; validation decides.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    pub logo: Option<ImageUpload>,
    pub references: Vec<ImageUpload>,
}

/// Output of a run that reached `Done`.
#[derive(Debug, Clone)]
pub struct MockupResult {
    pub image: RasterImage,
    pub style: StyleDescription,
    pub placement: LogoPlacement,
    pub aspect_ratio: String,
    pub warnings: Vec<String>,
}

/// Hooks for surfacing progress and intermediate results while a run is live.
pub trait RunObserver {
    fn state_changed(&mut self, _from: RunState, _to: RunState) {}
    fn style_described(&mut self, _style: &StyleDescription) {}
    fn background_synthesized(&mut self, _width: u32, _height: u32) {}
    fn warning(&mut self, _message: &str) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

pub struct MockupPipeline<'a> {
    analyzer: &'a dyn StyleAnalyzer,
    synthesizer: &'a dyn MockupSynthesizer,
    aspect_ratio: String,
    max_references: usize,
    state: RunState,
    history: Vec<RunState>,
}

struct ValidatedInputs {
    logo: RasterImage,
    references: ReferenceSet,
}

impl<'a> MockupPipeline<'a> {
    pub fn new(
        analyzer: &'a dyn StyleAnalyzer,
        synthesizer: &'a dyn MockupSynthesizer,
        aspect_ratio: impl Into<String>,
        max_references: usize,
    ) -> Self {
        Self {
            analyzer,
            synthesizer,
            aspect_ratio: aspect_ratio.into(),
            max_references: max_references.max(1),
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn run(&mut self, inputs: RunInputs, observer: &mut dyn RunObserver) -> Result<MockupResult> {
        if self.state != RunState::Idle {
            return Err(PipelineError::InvalidInput {
                reason: format!("pipeline already used (state: {})", self.state),
            });
        }

        let outcome = self.drive(inputs, observer);
        if let Err(err) = &outcome {
            error!(stage = ?err.stage(), error = %err.chain_text(), "mockup run failed");
            self.transition(RunState::Errored, observer);
        }
        outcome
    }

    fn drive(&mut self, inputs: RunInputs, observer: &mut dyn RunObserver) -> Result<MockupResult> {
        let mut warnings = Vec::new();

        self.transition(RunState::Validating, observer);
        let ValidatedInputs { logo, references } = self.validate(inputs)?;

        self.transition(RunState::Analyzing, observer);
        let text = self
            .analyzer
            .analyze(STYLE_ANALYSIS_INSTRUCTION, references.images())
            .map_err(PipelineError::AnalysisFailed)?;
        let style = StyleDescription::new(text);
        if !style.has_expected_lead_in() {
            let message = format!("style description does not start with \"{STYLE_LEAD_IN}\"");
            warn!("{message}");
            observer.warning(&message);
            warnings.push(message);
        }
        observer.style_described(&style);

        self.transition(RunState::Synthesizing, observer);
        let prompt = build_synthesis_prompt(&style);
        let generated = self
            .synthesizer
            .synthesize(&prompt, &self.aspect_ratio)
            .map_err(PipelineError::SynthesisFailed)?;

        self.transition(RunState::Compositing, observer);
        let background = generated.decode().map_err(PipelineError::CompositeFailed)?;
        observer.background_synthesized(background.width(), background.height());
        let (image, placement) =
            compositor::composite(&background, &logo).map_err(PipelineError::CompositeFailed)?;
        debug!(?placement, "logo composited");

        self.transition(RunState::Done, observer);
        Ok(MockupResult {
            image,
            style,
            placement,
            aspect_ratio: self.aspect_ratio.clone(),
            warnings,
        })
    }

    fn validate(&self, inputs: RunInputs) -> Result<ValidatedInputs> {
        let logo = inputs.logo.filter(|logo| !logo.is_empty());
        let references = ReferenceSet::new(
            inputs
                .references
                .into_iter()
                .filter(|reference| !reference.is_empty())
                .collect(),
        );

        let (logo, references) = match (logo, references) {
            (Some(logo), Some(references)) => (logo, references),
            (None, Some(_)) => return Err(PipelineError::MissingInput(MissingInput::Logo)),
            (Some(_), None) => return Err(PipelineError::MissingInput(MissingInput::References)),
            (None, None) => {
                return Err(PipelineError::MissingInput(MissingInput::LogoAndReferences))
            }
        };

        if references.len() > self.max_references {
            return Err(PipelineError::InvalidInput {
                reason: format!(
                    "{} reference images supplied; at most {} are accepted",
                    references.len(),
                    self.max_references
                ),
            });
        }

        let logo = logo.decode().map_err(|err| PipelineError::InvalidInput {
            reason: format!("logo '{}' could not be decoded: {err}", logo.name),
        })?;
        if logo.width() == 0 || logo.height() == 0 {
            return Err(PipelineError::InvalidInput {
                reason: "logo image has no pixels".to_string(),
            });
        }

        Ok(ValidatedInputs { logo, references })
    }

    fn transition(&mut self, to: RunState, observer: &mut dyn RunObserver) {
        let from = self.state;
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
        self.state = to;
        self.history.push(to);
        info!(%from, %to, "run state changed");
        observer.state_changed(from, to);
    }
}
