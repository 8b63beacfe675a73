use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{resolve_api_base, JsonTransport, MockupSynthesizer};
use crate::config::{parse_ratio, TransportSettings};
use crate::error::{ConfigError, ProviderError};
use crate::raster::GeneratedImage;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const ALLOWED_ASPECT_RATIOS: [&str; 5] = ["1:1", "3:4", "4:3", "9:16", "16:9"];

/// Background synthesis over Imagen `predict`, one sample per call.
pub struct ImagenSynthesizer {
    endpoint: String,
    api_key: String,
    image_size: Option<String>,
    transport: JsonTransport,
}

impl ImagenSynthesizer {
    pub fn new(
        api_base: Option<&str>,
        api_key: &str,
        model: &str,
        image_size: Option<&str>,
        settings: TransportSettings,
    ) -> Result<Self, ConfigError> {
        let api_base = resolve_api_base(
            api_base,
            &["IMAGEN_API_BASE", "GEMINI_API_BASE"],
            DEFAULT_API_BASE,
        );
        let model = resolve_model_name(model);
        let mut warnings = Vec::new();
        let image_size = normalize_image_size(image_size.unwrap_or_default(), &model, &mut warnings);
        for warning in warnings {
            warn!("{warning}");
        }
        Ok(Self {
            endpoint: format!("{api_base}/models/{model}:predict"),
            api_key: api_key.to_string(),
            image_size,
            transport: JsonTransport::new("imagen", settings)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_payload(&self, prompt: &str, aspect_ratio: &str, warnings: &mut Vec<String>) -> Value {
        let mut parameters = Map::new();
        parameters.insert("sampleCount".to_string(), json!(1));
        let ratio = normalize_aspect_ratio(aspect_ratio, warnings).unwrap_or_else(|| "16:9".to_string());
        parameters.insert("aspectRatio".to_string(), Value::String(ratio));
        if let Some(image_size) = &self.image_size {
            parameters.insert("imageSize".to_string(), Value::String(image_size.clone()));
        }
        json!({
            "instances": [{ "prompt": prompt }],
            "parameters": parameters,
        })
    }
}

impl MockupSynthesizer for ImagenSynthesizer {
    fn name(&self) -> &str {
        "imagen"
    }

    fn synthesize(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage, ProviderError> {
        let mut warnings = Vec::new();
        let payload = self.build_payload(prompt, aspect_ratio, &mut warnings);
        for warning in &warnings {
            warn!("{warning}");
        }
        debug!(prompt_chars = prompt.chars().count(), "imagen synthesis request");
        let response = self
            .transport
            .post_json(&self.endpoint, &self.api_key, &payload)?;
        extract_predictions(&response)?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmptyResult {
                provider: "imagen".to_string(),
                what: "images",
            })
    }
}

fn resolve_model_name(raw_model: &str) -> String {
    let trimmed = raw_model.trim().trim_start_matches("models/").to_string();
    match trimmed.to_ascii_lowercase().as_str() {
        "imagen-4.0-ultra" | "imagen-4-ultra" => "imagen-4.0-ultra-generate-001".to_string(),
        "imagen-4" | "imagen-4.0" => "imagen-4.0-generate-001".to_string(),
        "imagen-3" | "imagen-3.0" => "imagen-3.0-generate-002".to_string(),
        _ => trimmed,
    }
}

/// Maps a requested ratio onto the nearest one Imagen accepts.
fn normalize_aspect_ratio(raw: &str, warnings: &mut Vec<String>) -> Option<String> {
    let value = raw.trim().replace('/', ":");
    if value.is_empty() {
        return None;
    }
    if ALLOWED_ASPECT_RATIOS.contains(&value.as_str()) {
        return Some(value);
    }
    let Some((left, right)) = parse_ratio(&value) else {
        push_unique_warning(
            warnings,
            format!("Imagen aspect_ratio '{raw}' unsupported; using 16:9."),
        );
        return None;
    };
    let target = left / right;
    let mut best = ALLOWED_ASPECT_RATIOS[0];
    let mut best_delta = f64::MAX;
    for candidate in ALLOWED_ASPECT_RATIOS {
        let Some((a, b)) = parse_ratio(candidate) else {
            continue;
        };
        let delta = (a / b - target).abs();
        if delta < best_delta {
            best = candidate;
            best_delta = delta;
        }
    }
    push_unique_warning(warnings, format!("Imagen aspect_ratio snapped to {best}."));
    Some(best.to_string())
}

/// Imagen 3 takes no size hint; later models accept 1K or 2K.
fn normalize_image_size(raw: &str, model: &str, warnings: &mut Vec<String>) -> Option<String> {
    if model.trim().to_ascii_lowercase().starts_with("imagen-3") {
        return None;
    }
    let normalized = raw.trim().to_ascii_uppercase();
    match normalized.as_str() {
        "" => None,
        "1K" | "2K" => Some(normalized),
        _ => {
            push_unique_warning(
                warnings,
                format!("Imagen image_size '{raw}' unsupported; using 2K."),
            );
            Some("2K".to_string())
        }
    }
}

fn extract_predictions(response: &Value) -> Result<Vec<GeneratedImage>, ProviderError> {
    let mut out = Vec::new();
    let predictions = response
        .get("predictions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for row in predictions {
        let Some(obj) = row.as_object() else {
            continue;
        };
        let (encoded, mime_source) = if let Some(encoded) = obj
            .get("bytesBase64Encoded")
            .or_else(|| obj.get("bytes_base64_encoded"))
            .and_then(Value::as_str)
        {
            (encoded, obj)
        } else if let Some(generated) = obj
            .get("image")
            .or_else(|| obj.get("generatedImage"))
            .and_then(Value::as_object)
        {
            let Some(encoded) = generated
                .get("imageBytes")
                .or_else(|| generated.get("bytesBase64Encoded"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            (encoded, generated)
        } else {
            continue;
        };

        let bytes = BASE64.decode(encoded.as_bytes()).map_err(|err| {
            ProviderError::invalid_response("imagen", format!("image base64 decode failed: {err}"))
        })?;
        out.push(GeneratedImage {
            bytes,
            mime_type: mime_source
                .get("mimeType")
                .or_else(|| mime_source.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }
    Ok(out)
}

fn push_unique_warning(warnings: &mut Vec<String>, message: String) {
    if message.trim().is_empty() || warnings.iter().any(|existing| existing == &message) {
        return;
    }
    warnings.push(message);
}
