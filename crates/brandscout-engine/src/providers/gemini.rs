use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::debug;

use super::{resolve_api_base, JsonTransport, StyleAnalyzer};
use crate::config::TransportSettings;
use crate::error::{ConfigError, ProviderError};
use crate::raster::ImageUpload;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Style analysis over Gemini `generateContent`.
pub struct GeminiAnalyzer {
    endpoint: String,
    api_key: String,
    transport: JsonTransport,
}

impl GeminiAnalyzer {
    pub fn new(
        api_base: Option<&str>,
        api_key: &str,
        model: &str,
        settings: TransportSettings,
    ) -> Result<Self, ConfigError> {
        let api_base = resolve_api_base(api_base, &["GEMINI_API_BASE"], DEFAULT_API_BASE);
        Ok(Self {
            endpoint: endpoint_for_model(&api_base, model),
            api_key: api_key.to_string(),
            transport: JsonTransport::new("gemini", settings)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn settings(&self) -> TransportSettings {
        self.transport.settings()
    }
}

impl StyleAnalyzer for GeminiAnalyzer {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze(&self, instruction: &str, images: &[ImageUpload]) -> Result<String, ProviderError> {
        let payload = build_payload(instruction, images);
        debug!(
            images = images.len(),
            bytes = images.iter().map(|image| image.bytes.len()).sum::<usize>(),
            "gemini style analysis request"
        );
        let response = self
            .transport
            .post_json(&self.endpoint, &self.api_key, &payload)?;
        extract_text(&response)
    }
}

fn endpoint_for_model(api_base: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{api_base}/{model_path}:generateContent")
}

fn build_payload(instruction: &str, images: &[ImageUpload]) -> Value {
    let mut parts = vec![json!({ "text": instruction })];
    for image in images {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": BASE64.encode(&image.bytes),
            }
        }));
    }
    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }]
    })
}

/// Joins the text parts of the first candidate, unmodified. Blank text counts as
/// no answer.
fn extract_text(response: &Value) -> Result<String, ProviderError> {
    let Some(candidate) = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
    else {
        let reason = response
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str);
        return Err(match reason {
            Some(reason) => ProviderError::invalid_response("gemini", format!("prompt blocked ({reason})")),
            None => ProviderError::EmptyResult {
                provider: "gemini".to_string(),
                what: "candidates",
            },
        });
    };

    let text = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResult {
            provider: "gemini".to_string(),
            what: "style description",
        });
    }
    Ok(text)
}
