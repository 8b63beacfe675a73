//! Adapters over the external generative services.
//!
//! The core only sees the two traits below. Hosted implementations speak HTTP
//! with a bounded timeout per call; the dryrun pair is offline and deterministic.

mod dryrun;
mod gemini;
mod imagen;

use std::thread;

use brandscout_contracts::models::{ModelSelector, ModelSpec, CAPABILITY_IMAGE, CAPABILITY_VISION};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Credentials, EngineConfig, TransportSettings};
use crate::error::{ConfigError, ProviderError};
use crate::raster::{GeneratedImage, ImageUpload};

pub use dryrun::{DryrunAnalyzer, DryrunSynthesizer};
pub use gemini::GeminiAnalyzer;
pub use imagen::ImagenSynthesizer;

/// Vision-language capability: instruction plus images in, one paragraph out.
pub trait StyleAnalyzer: Send + Sync {
    fn name(&self) -> &str;
    fn analyze(&self, instruction: &str, images: &[ImageUpload]) -> Result<String, ProviderError>;
}

/// Text-to-image capability: exactly one image per call.
pub trait MockupSynthesizer: Send + Sync {
    fn name(&self) -> &str;
    fn synthesize(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage, ProviderError>;
}

/// The analyzer/synthesizer pair resolved from configuration.
pub struct ProviderSet {
    pub analyzer: Box<dyn StyleAnalyzer>,
    pub synthesizer: Box<dyn MockupSynthesizer>,
    pub analysis_model: ModelSpec,
    pub synthesis_model: ModelSpec,
    /// Model fallback explanations worth showing the user.
    pub notes: Vec<String>,
}

impl ProviderSet {
    /// Resolves models and builds providers. Fails before any run when a hosted
    /// provider is selected without its credential.
    pub fn from_config(
        config: &EngineConfig,
        credentials: &Credentials,
        selector: &ModelSelector,
    ) -> Result<Self, ConfigError> {
        let mut notes = Vec::new();

        let analysis = selector
            .select(config.analysis.model.as_deref(), CAPABILITY_VISION)
            .map_err(|reason| ConfigError::NoModel {
                capability: CAPABILITY_VISION,
                reason,
            })?;
        if let Some(reason) = analysis.fallback_reason.filter(|_| config.analysis.model.is_some()) {
            notes.push(reason);
        }
        let synthesis = selector
            .select(config.synthesis.model.as_deref(), CAPABILITY_IMAGE)
            .map_err(|reason| ConfigError::NoModel {
                capability: CAPABILITY_IMAGE,
                reason,
            })?;
        if let Some(reason) = synthesis.fallback_reason.filter(|_| config.synthesis.model.is_some()) {
            notes.push(reason);
        }

        let analyzer: Box<dyn StyleAnalyzer> = match analysis.model.provider.as_str() {
            "dryrun" => Box::new(DryrunAnalyzer),
            "gemini" => {
                let api_key = credentials
                    .gemini_api_key()
                    .ok_or(ConfigError::MissingCredential {
                        keys: "GEMINI_API_KEY or GOOGLE_API_KEY",
                    })?;
                Box::new(GeminiAnalyzer::new(
                    config.analysis.api_base.as_deref(),
                    api_key,
                    &analysis.model.name,
                    config.analysis.transport(),
                )?)
            }
            other => {
                return Err(ConfigError::UnsupportedProvider {
                    provider: other.to_string(),
                    capability: CAPABILITY_VISION,
                })
            }
        };

        let synthesizer: Box<dyn MockupSynthesizer> = match synthesis.model.provider.as_str() {
            "dryrun" => Box::new(DryrunSynthesizer::default()),
            "imagen" => {
                let api_key = credentials
                    .imagen_api_key()
                    .ok_or(ConfigError::MissingCredential {
                        keys: "IMAGEN_API_KEY, GEMINI_API_KEY or GOOGLE_API_KEY",
                    })?;
                Box::new(ImagenSynthesizer::new(
                    config.synthesis.api_base.as_deref(),
                    api_key,
                    &synthesis.model.name,
                    config.synthesis.image_size.as_deref(),
                    config.synthesis.transport(),
                )?)
            }
            other => {
                return Err(ConfigError::UnsupportedProvider {
                    provider: other.to_string(),
                    capability: CAPABILITY_IMAGE,
                })
            }
        };

        Ok(Self {
            analyzer,
            synthesizer,
            analysis_model: analysis.model,
            synthesis_model: synthesis.model,
            notes,
        })
    }
}

/// Shared HTTP plumbing for the hosted providers.
#[derive(Debug, Clone)]
pub(crate) struct JsonTransport {
    provider: &'static str,
    http: HttpClient,
    settings: TransportSettings,
}

impl JsonTransport {
    pub(crate) fn new(provider: &'static str, settings: TransportSettings) -> Result<Self, ConfigError> {
        let http = HttpClient::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            provider,
            http,
            settings,
        })
    }

    pub(crate) fn settings(&self) -> TransportSettings {
        self.settings
    }

    /// POSTs `payload` with the API key as a query parameter and returns the
    /// parsed JSON body. Only timeouts and connection failures are retried, and
    /// only as often as the settings allow.
    pub(crate) fn post_json(
        &self,
        endpoint: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<Value, ProviderError> {
        let mut attempt = 0u32;
        loop {
            debug!(provider = self.provider, endpoint, attempt, "sending request");
            let outcome = self
                .http
                .post(endpoint)
                .query(&[("key", api_key)])
                .timeout(self.settings.timeout)
                .json(payload)
                .send()
                .map_err(|source| self.transport_error(endpoint, source))
                .and_then(|response| self.response_json_or_error(response));

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(
                        provider = self.provider,
                        attempt,
                        max_retries = self.settings.max_retries,
                        error = %err,
                        "transient request failure; retrying"
                    );
                    thread::sleep(self.settings.retry_backoff * attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn transport_error(&self, endpoint: &str, source: reqwest::Error) -> ProviderError {
        if source.is_timeout() {
            return ProviderError::Timeout {
                provider: self.provider.to_string(),
                timeout: self.settings.timeout,
            };
        }
        ProviderError::Transport {
            provider: self.provider.to_string(),
            endpoint: endpoint.to_string(),
            source,
        }
    }

    fn response_json_or_error(&self, response: HttpResponse) -> Result<Value, ProviderError> {
        let status = response.status();
        let body = response
            .text()
            .map_err(|source| self.transport_error("response body", source))?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: self.provider.to_string(),
                code: status.as_u16(),
                body: truncate_text(&body, 512),
            });
        }
        serde_json::from_str(&body).map_err(|err| {
            ProviderError::invalid_response(self.provider, format!("invalid JSON payload: {err}"))
        })
    }
}

pub(crate) fn resolve_api_base(configured: Option<&str>, env_keys: &[&str], default: &str) -> String {
    configured
        .map(str::to_string)
        .or_else(|| env_keys.iter().find_map(|key| crate::config::non_empty_env(key)))
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
