use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

/// Everything a [`crate::MockupEngine`] needs besides credentials.
///
/// Loaded once at startup and handed to the engine; nothing reads it globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub analysis: AnalysisConfig,
    pub synthesis: SynthesisConfig,
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;
        self.synthesis.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Vision model name; unknown names fall back to the registry default.
    pub model: Option<String>,
    pub api_base: Option<String>,
    pub max_references: usize,
    pub timeout_s: f64,
    pub max_retries: u32,
    pub retry_backoff_s: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: Some("gemini-2.5-flash".to_string()),
            api_base: None,
            max_references: 8,
            timeout_s: 90.0,
            max_retries: 0,
            retry_backoff_s: 1.2,
        }
    }
}

impl AnalysisConfig {
    pub fn transport(&self) -> TransportSettings {
        TransportSettings::clamped(self.timeout_s, self.max_retries, self.retry_backoff_s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_references == 0 {
            return Err(invalid("analysis.max_references", self.max_references));
        }
        validate_transport("analysis", self.timeout_s, self.retry_backoff_s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Text-to-image model name; unknown names fall back to the registry default.
    pub model: Option<String>,
    pub api_base: Option<String>,
    pub aspect_ratio: String,
    /// Output size hint ("1K" or "2K"); ignored by models that do not take one.
    pub image_size: Option<String>,
    pub timeout_s: f64,
    pub max_retries: u32,
    pub retry_backoff_s: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: Some("imagen-4.0-generate-001".to_string()),
            api_base: None,
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            image_size: None,
            timeout_s: 120.0,
            max_retries: 0,
            retry_backoff_s: 1.2,
        }
    }
}

impl SynthesisConfig {
    pub fn transport(&self) -> TransportSettings {
        TransportSettings::clamped(self.timeout_s, self.max_retries, self.retry_backoff_s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if parse_ratio(&self.aspect_ratio).is_none() {
            return Err(invalid("synthesis.aspect_ratio", &self.aspect_ratio));
        }
        validate_transport("synthesis", self.timeout_s, self.retry_backoff_s)
    }
}

/// Per-call HTTP policy for an external service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl TransportSettings {
    pub fn clamped(timeout_s: f64, max_retries: u32, retry_backoff_s: f64) -> Self {
        Self {
            timeout: Duration::from_secs_f64(clamp_finite(timeout_s, 90.0, 1.0, 600.0)),
            max_retries: max_retries.min(4),
            retry_backoff: Duration::from_secs_f64(clamp_finite(retry_backoff_s, 1.2, 0.1, 10.0)),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::clamped(90.0, 0, 1.2)
    }
}

/// API keys for the hosted providers, read once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    gemini_api_key: Option<String>,
    imagen_api_key: Option<String>,
}

impl Credentials {
    pub fn new(gemini_api_key: Option<String>, imagen_api_key: Option<String>) -> Self {
        Self {
            gemini_api_key: gemini_api_key.and_then(non_blank),
            imagen_api_key: imagen_api_key.and_then(non_blank),
        }
    }

    pub fn from_env() -> Self {
        let gemini = non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"));
        Self::new(gemini, non_empty_env("IMAGEN_API_KEY"))
    }

    pub fn gemini_api_key(&self) -> Option<&str> {
        self.gemini_api_key.as_deref()
    }

    /// Imagen shares the Gemini key unless a dedicated one is set.
    pub fn imagen_api_key(&self) -> Option<&str> {
        self.imagen_api_key
            .as_deref()
            .or(self.gemini_api_key.as_deref())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<set>"))
            .field("imagen_api_key", &self.imagen_api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Parses `"W:H"` (or `"W/H"`) into positive numbers.
pub fn parse_ratio(raw: &str) -> Option<(f64, f64)> {
    let value = raw.trim().replace('/', ":");
    let (left, right) = value.split_once(':')?;
    let left = left.trim().parse::<f64>().ok()?;
    let right = right.trim().parse::<f64>().ok()?;
    if left <= 0.0 || right <= 0.0 || !left.is_finite() || !right.is_finite() {
        return None;
    }
    Some((left, right))
}

fn validate_transport(section: &str, timeout_s: f64, retry_backoff_s: f64) -> Result<(), ConfigError> {
    if !(timeout_s.is_finite() && timeout_s > 0.0) {
        return Err(invalid(&format!("{section}.timeout_s"), timeout_s));
    }
    if !(retry_backoff_s.is_finite() && retry_backoff_s >= 0.0) {
        return Err(invalid(&format!("{section}.retry_backoff_s"), retry_backoff_s));
    }
    Ok(())
}

fn invalid(key: &str, value: impl fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn clamp_finite(value: f64, default: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        default
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(non_blank)
}
