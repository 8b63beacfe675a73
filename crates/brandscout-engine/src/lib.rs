//! BrandScout engine: turns a logo plus a handful of style references into a
//! product mockup.
//!
//! A run describes the references' style with a vision model, synthesizes a
//! background from that description, then composites the logo onto it. See
//! [`MockupEngine`] for the entry point and [`pipeline`] for the state machine.

pub mod compositor;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod raster;
pub mod recorder;

use brandscout_contracts::models::{ModelSelector, ModelSpec, CAPABILITY_IMAGE, CAPABILITY_VISION};
use tracing::info;

pub use compositor::{composite, composite_encoded, LogoPlacement, LOGO_WIDTH_RATIO};
pub use config::{Credentials, EngineConfig};
pub use error::{CompositeError, ConfigError, MissingInput, PipelineError, ProviderError};
pub use pipeline::{MockupPipeline, MockupResult, NoopObserver, RunInputs, RunObserver};
pub use prompts::StyleDescription;
pub use providers::{MockupSynthesizer, ProviderSet, StyleAnalyzer};
pub use raster::{ImageUpload, RasterImage};
pub use recorder::RunRecorder;

/// Validated configuration plus the providers it resolved to. Immutable after
/// construction; every call to [`MockupEngine::run`] gets a fresh pipeline.
pub struct MockupEngine {
    config: EngineConfig,
    providers: ProviderSet,
}

impl MockupEngine {
    pub fn new(config: EngineConfig, credentials: &Credentials) -> Result<Self, ConfigError> {
        config.validate()?;
        let providers = ProviderSet::from_config(&config, credentials, &ModelSelector::default())?;
        for note in &providers.notes {
            info!("{note}");
        }
        info!(
            analysis_model = %providers.analysis_model.name,
            synthesis_model = %providers.synthesis_model.name,
            "engine ready"
        );
        Ok(Self { config, providers })
    }

    /// Builds an engine around caller-supplied providers, skipping model resolution.
    pub fn with_providers(
        config: EngineConfig,
        analyzer: Box<dyn StyleAnalyzer>,
        synthesizer: Box<dyn MockupSynthesizer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let analysis_model = ModelSpec {
            name: analyzer.name().to_string(),
            provider: analyzer.name().to_string(),
            capabilities: vec![CAPABILITY_VISION.to_string()],
            max_input_images: None,
        };
        let synthesis_model = ModelSpec {
            name: synthesizer.name().to_string(),
            provider: synthesizer.name().to_string(),
            capabilities: vec![CAPABILITY_IMAGE.to_string()],
            max_input_images: None,
        };
        Ok(Self {
            config,
            providers: ProviderSet {
                analyzer,
                synthesizer,
                analysis_model,
                synthesis_model,
                notes: Vec::new(),
            },
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analysis_model(&self) -> &ModelSpec {
        &self.providers.analysis_model
    }

    pub fn synthesis_model(&self) -> &ModelSpec {
        &self.providers.synthesis_model
    }

    /// Model fallbacks applied while resolving the configuration.
    pub fn notes(&self) -> &[String] {
        &self.providers.notes
    }

    /// The configured reference cap, tightened to what the analysis model accepts.
    pub fn max_references(&self) -> usize {
        let configured = self.config.analysis.max_references;
        match self.providers.analysis_model.max_input_images {
            Some(model_limit) => configured.min(model_limit),
            None => configured,
        }
    }

    pub fn pipeline(&self) -> MockupPipeline<'_> {
        MockupPipeline::new(
            self.providers.analyzer.as_ref(),
            self.providers.synthesizer.as_ref(),
            self.config.synthesis.aspect_ratio.clone(),
            self.max_references(),
        )
    }

    pub fn run(
        &self,
        inputs: RunInputs,
        observer: &mut dyn RunObserver,
    ) -> Result<MockupResult, PipelineError> {
        self.pipeline().run(inputs, observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DryrunAnalyzer, DryrunSynthesizer};

    fn dryrun_engine(max_references: usize, model_limit: Option<usize>) -> MockupEngine {
        let mut config = EngineConfig::default();
        config.analysis.max_references = max_references;
        let mut engine = MockupEngine::with_providers(
            config,
            Box::new(DryrunAnalyzer),
            Box::new(DryrunSynthesizer { long_edge: 64 }),
        )
        .unwrap();
        engine.providers.analysis_model.max_input_images = model_limit;
        engine
    }

    fn upload(name: &str) -> ImageUpload {
        let bytes = RasterImage::from(image::RgbaImage::from_pixel(
            8,
            8,
            image::Rgba([0, 0, 0, 255]),
        ))
        .encode_png()
        .unwrap();
        ImageUpload::new(name, bytes, None)
    }

    #[test]
    fn model_image_limit_tightens_the_reference_cap() {
        assert_eq!(dryrun_engine(8, None).max_references(), 8);
        assert_eq!(dryrun_engine(8, Some(16)).max_references(), 8);
        assert_eq!(dryrun_engine(8, Some(2)).max_references(), 2);

        let engine = dryrun_engine(8, Some(2));
        let err = engine
            .run(
                RunInputs {
                    logo: Some(upload("logo.png")),
                    references: vec![upload("a.png"), upload("b.png"), upload("c.png")],
                },
                &mut NoopObserver,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
        assert!(err.to_string().contains("at most 2"));
    }

    #[test]
    fn gemini_models_carry_an_image_limit() {
        let mut config = EngineConfig::default();
        config.analysis.max_references = 32;
        let engine = MockupEngine::new(config, &Credentials::new(Some("key".to_string()), None)).unwrap();
        assert_eq!(engine.analysis_model().max_input_images, Some(16));
        assert_eq!(engine.max_references(), 16);
    }
}
