use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use brandscout_contracts::events::EventWriter;
use brandscout_contracts::runs::{RunState, Stage};
use brandscout_engine::config::EngineConfig;
use brandscout_engine::error::{MissingInput, PipelineError, ProviderError};
use brandscout_engine::pipeline::{MockupPipeline, NoopObserver, RunInputs};
use brandscout_engine::providers::{MockupSynthesizer, StyleAnalyzer};
use brandscout_engine::raster::{GeneratedImage, ImageUpload, RasterImage};
use brandscout_engine::MockupEngine;
use image::{Rgba, RgbaImage};
use serde_json::Value;

const STYLE: &str = "A photorealistic product shot on a pale oak desk, soft morning light.";

#[derive(Clone, Copy)]
enum AnalyzerBehaviour {
    Reply(&'static str),
    TimeOut,
    Refuse,
}

struct StubAnalyzer {
    behaviour: AnalyzerBehaviour,
    calls: Arc<AtomicUsize>,
    seen_images: Arc<AtomicUsize>,
}

impl StyleAnalyzer for StubAnalyzer {
    fn name(&self) -> &str {
        "stub-analyzer"
    }

    fn analyze(&self, _instruction: &str, images: &[ImageUpload]) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_images.store(images.len(), Ordering::SeqCst);
        match self.behaviour {
            AnalyzerBehaviour::Reply(text) => Ok(text.to_string()),
            AnalyzerBehaviour::TimeOut => Err(ProviderError::Timeout {
                provider: "stub-analyzer".to_string(),
                timeout: Duration::from_secs(90),
            }),
            AnalyzerBehaviour::Refuse => Err(ProviderError::Status {
                provider: "stub-analyzer".to_string(),
                code: 403,
                body: "permission denied".to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy)]
enum SynthesizerBehaviour {
    Background(u32, u32),
    Garbage,
    Empty,
}

struct StubSynthesizer {
    behaviour: SynthesizerBehaviour,
    calls: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<String>>,
    last_ratio: Arc<Mutex<String>>,
}

impl MockupSynthesizer for StubSynthesizer {
    fn name(&self) -> &str {
        "stub-synthesizer"
    }

    fn synthesize(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = prompt.to_string();
        }
        if let Ok(mut last) = self.last_ratio.lock() {
            *last = aspect_ratio.to_string();
        }
        match self.behaviour {
            SynthesizerBehaviour::Background(width, height) => Ok(GeneratedImage {
                bytes: png(width, height, Rgba([20, 30, 40, 255])),
                mime_type: Some("image/png".to_string()),
            }),
            SynthesizerBehaviour::Garbage => Ok(GeneratedImage {
                bytes: b"definitely not a png".to_vec(),
                mime_type: Some("image/png".to_string()),
            }),
            SynthesizerBehaviour::Empty => Err(ProviderError::EmptyResult {
                provider: "stub-synthesizer".to_string(),
                what: "images",
            }),
        }
    }
}

struct Harness {
    analyzer: StubAnalyzer,
    synthesizer: StubSynthesizer,
    analyzer_calls: Arc<AtomicUsize>,
    analyzer_images: Arc<AtomicUsize>,
    synthesizer_calls: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<String>>,
    last_ratio: Arc<Mutex<String>>,
}

impl Harness {
    fn new(analyzer: AnalyzerBehaviour, synthesizer: SynthesizerBehaviour) -> Self {
        let analyzer_calls = Arc::new(AtomicUsize::new(0));
        let analyzer_images = Arc::new(AtomicUsize::new(0));
        let synthesizer_calls = Arc::new(AtomicUsize::new(0));
        let last_prompt = Arc::new(Mutex::new(String::new()));
        let last_ratio = Arc::new(Mutex::new(String::new()));
        Self {
            analyzer: StubAnalyzer {
                behaviour: analyzer,
                calls: analyzer_calls.clone(),
                seen_images: analyzer_images.clone(),
            },
            synthesizer: StubSynthesizer {
                behaviour: synthesizer,
                calls: synthesizer_calls.clone(),
                last_prompt: last_prompt.clone(),
                last_ratio: last_ratio.clone(),
            },
            analyzer_calls,
            analyzer_images,
            synthesizer_calls,
            last_prompt,
            last_ratio,
        }
    }

    fn pipeline(&self) -> MockupPipeline<'_> {
        MockupPipeline::new(&self.analyzer, &self.synthesizer, "16:9", 8)
    }

    fn calls(&self) -> (usize, usize) {
        (
            self.analyzer_calls.load(Ordering::SeqCst),
            self.synthesizer_calls.load(Ordering::SeqCst),
        )
    }
}

fn png(width: u32, height: u32, colour: Rgba<u8>) -> Vec<u8> {
    RasterImage::from(RgbaImage::from_pixel(width, height, colour))
        .encode_png()
        .unwrap()
}

fn logo(width: u32, height: u32) -> ImageUpload {
    ImageUpload::new("logo.png", png(width, height, Rgba([255, 0, 0, 255])), None)
}

fn references(count: usize) -> Vec<ImageUpload> {
    (0..count)
        .map(|index| {
            ImageUpload::new(
                format!("ref-{index}.png"),
                png(4, 4, Rgba([index as u8, 0, 0, 255])),
                None,
            )
        })
        .collect()
}

fn full_inputs() -> RunInputs {
    RunInputs {
        logo: Some(logo(400, 200)),
        references: references(3),
    }
}

#[test]
fn happy_path_places_logo_centered_at_quarter_width() {
    let harness = Harness::new(
        AnalyzerBehaviour::Reply(STYLE),
        SynthesizerBehaviour::Background(1600, 900),
    );
    let mut pipeline = harness.pipeline();

    let result = pipeline.run(full_inputs(), &mut NoopObserver).unwrap();

    assert_eq!(result.image.dimensions(), (1600, 900));
    assert_eq!((result.placement.x, result.placement.y), (600, 350));
    assert_eq!((result.placement.width, result.placement.height), (400, 200));
    assert_eq!(result.style.as_str(), STYLE);
    assert!(result.warnings.is_empty());

    let canvas = result.image.to_rgba();
    assert_eq!(canvas.get_pixel(800, 450).0, [255, 0, 0, 255]);
    assert_eq!(canvas.get_pixel(10, 10).0, [20, 30, 40, 255]);

    assert_eq!(harness.calls(), (1, 1));
    assert_eq!(harness.analyzer_images.load(Ordering::SeqCst), 3);
    let prompt = harness.last_prompt.lock().unwrap().clone();
    assert!(prompt.starts_with(STYLE));
    assert_eq!(*harness.last_ratio.lock().unwrap(), "16:9");
    assert_eq!(
        pipeline.history(),
        &[
            RunState::Idle,
            RunState::Validating,
            RunState::Analyzing,
            RunState::Synthesizing,
            RunState::Compositing,
            RunState::Done,
        ]
    );
}

#[test]
fn missing_inputs_stop_before_any_external_call() {
    let cases = [
        (
            RunInputs {
                logo: None,
                references: references(2),
            },
            MissingInput::Logo,
        ),
        (
            RunInputs {
                logo: Some(logo(10, 10)),
                references: Vec::new(),
            },
            MissingInput::References,
        ),
        (RunInputs::default(), MissingInput::LogoAndReferences),
    ];

    for (inputs, expected) in cases {
        let harness = Harness::new(
            AnalyzerBehaviour::Reply(STYLE),
            SynthesizerBehaviour::Background(160, 90),
        );
        let mut pipeline = harness.pipeline();
        let err = pipeline.run(inputs, &mut NoopObserver).unwrap_err();

        assert!(matches!(err, PipelineError::MissingInput(what) if what == expected));
        assert_eq!(err.stage(), Some(Stage::Validating));
        assert_eq!(harness.calls(), (0, 0));
        assert_eq!(pipeline.state(), RunState::Errored);
        assert_eq!(
            pipeline.history(),
            &[RunState::Idle, RunState::Validating, RunState::Errored]
        );
    }
}

#[test]
fn analysis_failure_never_reaches_synthesis() {
    let harness = Harness::new(
        AnalyzerBehaviour::Refuse,
        SynthesizerBehaviour::Background(160, 90),
    );
    let mut pipeline = harness.pipeline();
    let err = pipeline.run(full_inputs(), &mut NoopObserver).unwrap_err();

    assert!(matches!(err, PipelineError::AnalysisFailed(ProviderError::Status { code: 403, .. })));
    assert_eq!(err.stage(), Some(Stage::Analyzing));
    assert!(!err.is_timeout());
    assert_eq!(harness.calls(), (1, 0));
    assert_eq!(
        err.chain_text(),
        "style analysis failed | caused by: stub-analyzer request failed (403): permission denied"
    );
    assert_eq!(pipeline.history().last(), Some(&RunState::Errored));
}

#[test]
fn analysis_timeout_is_reported_as_such() {
    let harness = Harness::new(
        AnalyzerBehaviour::TimeOut,
        SynthesizerBehaviour::Background(160, 90),
    );
    let err = harness
        .pipeline()
        .run(full_inputs(), &mut NoopObserver)
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.stage(), Some(Stage::Analyzing));
    assert_eq!(harness.calls(), (1, 0));
}

#[test]
fn synthesis_failure_is_attributed_to_synthesis() {
    let harness = Harness::new(AnalyzerBehaviour::Reply(STYLE), SynthesizerBehaviour::Empty);
    let mut pipeline = harness.pipeline();
    let err = pipeline.run(full_inputs(), &mut NoopObserver).unwrap_err();

    assert!(matches!(err, PipelineError::SynthesisFailed(_)));
    assert_eq!(err.stage(), Some(Stage::Synthesizing));
    assert_eq!(harness.calls(), (1, 1));
    assert_eq!(
        pipeline.history(),
        &[
            RunState::Idle,
            RunState::Validating,
            RunState::Analyzing,
            RunState::Synthesizing,
            RunState::Errored,
        ]
    );
}

#[test]
fn undecodable_background_fails_compositing() {
    let harness = Harness::new(AnalyzerBehaviour::Reply(STYLE), SynthesizerBehaviour::Garbage);
    let mut pipeline = harness.pipeline();
    let err = pipeline.run(full_inputs(), &mut NoopObserver).unwrap_err();

    assert!(matches!(err, PipelineError::CompositeFailed(_)));
    assert_eq!(err.stage(), Some(Stage::Compositing));
    assert_eq!(harness.calls(), (1, 1));
    assert_eq!(pipeline.state(), RunState::Errored);
}

#[test]
fn square_background_rounds_offsets_down() {
    let harness = Harness::new(
        AnalyzerBehaviour::Reply(STYLE),
        SynthesizerBehaviour::Background(1000, 1000),
    );
    let inputs = RunInputs {
        logo: Some(logo(100, 50)),
        references: references(1),
    };
    let result = harness.pipeline().run(inputs, &mut NoopObserver).unwrap();

    assert_eq!((result.placement.width, result.placement.height), (250, 125));
    assert_eq!((result.placement.x, result.placement.y), (375, 437));
    assert!(result.placement.fits_within(1000, 1000));
}

#[test]
fn event_writer_records_the_run() {
    let temp = tempfile::tempdir().unwrap();
    let events_path = temp.path().join("events.jsonl");
    let mut events = EventWriter::new(&events_path, "run-test");

    let harness = Harness::new(
        AnalyzerBehaviour::Reply("Flat lay of pastel stationery."),
        SynthesizerBehaviour::Background(320, 180),
    );
    let result = harness.pipeline().run(full_inputs(), &mut events).unwrap();
    assert_eq!(result.warnings.len(), 1);

    let rows: Vec<Value> = std::fs::read_to_string(&events_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let kinds: Vec<&str> = rows.iter().map(|row| row["type"].as_str().unwrap()).collect();
    assert_eq!(
        kinds,
        vec![
            "state_changed",
            "state_changed",
            "run_warning",
            "style_described",
            "state_changed",
            "state_changed",
            "background_synthesized",
            "state_changed",
        ]
    );
    assert!(rows.iter().all(|row| row["run_id"] == "run-test"));
    assert_eq!(rows[0]["from"], "idle");
    assert_eq!(rows[0]["to"], "validating");
    assert_eq!(rows[6]["width"], 320);
    assert_eq!(rows[7]["to"], "done");
}

#[test]
fn engine_runs_each_request_on_a_fresh_pipeline() {
    let analyzer_calls = Arc::new(AtomicUsize::new(0));
    let synthesizer_calls = Arc::new(AtomicUsize::new(0));
    let ratio_seen = Arc::new(Mutex::new(String::new()));
    let mut config = EngineConfig::default();
    config.synthesis.aspect_ratio = "1:1".to_string();
    let engine = MockupEngine::with_providers(
        config,
        Box::new(StubAnalyzer {
            behaviour: AnalyzerBehaviour::Reply(STYLE),
            calls: analyzer_calls.clone(),
            seen_images: Arc::new(AtomicUsize::new(0)),
        }),
        Box::new(StubSynthesizer {
            behaviour: SynthesizerBehaviour::Background(500, 500),
            calls: synthesizer_calls.clone(),
            last_prompt: Arc::new(Mutex::new(String::new())),
            last_ratio: ratio_seen.clone(),
        }),
    )
    .unwrap();

    let first = engine.run(full_inputs(), &mut NoopObserver).unwrap();
    let second = engine.run(full_inputs(), &mut NoopObserver).unwrap();

    assert_eq!(first.aspect_ratio, "1:1");
    assert_eq!(*ratio_seen.lock().unwrap(), "1:1");
    assert_eq!(first.image, second.image);
    assert_eq!(analyzer_calls.load(Ordering::SeqCst), 2);
    assert_eq!(synthesizer_calls.load(Ordering::SeqCst), 2);
    assert_eq!(engine.analysis_model().name, "stub-analyzer");
    assert!(engine.notes().is_empty());
}

#[test]
fn engine_rejects_invalid_configuration() {
    let mut config = EngineConfig::default();
    config.synthesis.aspect_ratio = "wide".to_string();
    let harness = Harness::new(
        AnalyzerBehaviour::Reply(STYLE),
        SynthesizerBehaviour::Background(10, 10),
    );
    let result = MockupEngine::with_providers(
        config,
        Box::new(harness.analyzer),
        Box::new(harness.synthesizer),
    );
    assert!(result.is_err());
}
