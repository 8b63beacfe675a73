use std::time::Duration;

use brandscout_contracts::runs::Stage;
use thiserror::Error;

/// Failure of one call to an external generative service.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        provider: String,
        timeout: Duration,
    },

    #[error("{provider} request failed ({endpoint})")]
    Transport {
        provider: String,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} request failed ({code}): {body}")]
    Status {
        provider: String,
        code: u16,
        body: String,
    },

    #[error("{provider} returned an unusable response: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("{provider} returned no {what}")]
    EmptyResult { provider: String, what: &'static str },
}

impl ProviderError {
    pub fn invalid_response(provider: &str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Timeouts and connection-level failures; HTTP status errors are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport { source, .. } => source.is_connect() || source.is_request(),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("image data could not be decoded")]
    Decode(#[from] image::ImageError),

    #[error("{role} image has no pixels ({width}x{height})")]
    EmptyImage {
        role: &'static str,
        width: u32,
        height: u32,
    },

    #[error("scaled logo would be {width}x{height} pixels, over the compositing budget")]
    LogoTooLarge { width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential: set {keys}")]
    MissingCredential { keys: &'static str },

    #[error("no {capability} model available: {reason}")]
    NoModel {
        capability: &'static str,
        reason: String,
    },

    #[error("provider '{provider}' cannot serve {capability} requests")]
    UnsupportedProvider {
        provider: String,
        capability: &'static str,
    },

    #[error("invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("failed to read configuration file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// Which input a run was started without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInput {
    Logo,
    References,
    LogoAndReferences,
}

impl std::fmt::Display for MissingInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Logo => "a logo image",
            Self::References => "at least one reference image",
            Self::LogoAndReferences => "a logo image and at least one reference image",
        })
    }
}

/// Why a mockup run stopped. Each variant belongs to exactly one stage, except
/// configuration problems which stop the process before any run starts.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("missing input: upload {0}")]
    MissingInput(MissingInput),

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("style analysis failed")]
    AnalysisFailed(#[source] ProviderError),

    #[error("mockup synthesis failed")]
    SynthesisFailed(#[source] ProviderError),

    #[error("logo compositing failed")]
    CompositeFailed(#[source] CompositeError),

    #[error("configuration error")]
    Configuration(#[from] ConfigError),
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::MissingInput(_) | Self::InvalidInput { .. } => Some(Stage::Validating),
            Self::AnalysisFailed(_) => Some(Stage::Analyzing),
            Self::SynthesisFailed(_) => Some(Stage::Synthesizing),
            Self::CompositeFailed(_) => Some(Stage::Compositing),
            Self::Configuration(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::AnalysisFailed(err) | Self::SynthesisFailed(err) => err.is_timeout(),
            _ => false,
        }
    }

    /// The error and every cause below it, joined for one-line display.
    pub fn chain_text(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let text = cause.to_string();
            if parts.last().map(|last| last != &text).unwrap_or(true) {
                parts.push(text);
            }
            source = cause.source();
        }
        parts.join(" | caused by: ")
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
