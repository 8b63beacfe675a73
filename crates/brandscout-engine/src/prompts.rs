/// Opening the analyzer is asked to start its paragraph with.
pub const STYLE_LEAD_IN: &str = "A photorealistic product shot";

pub const STYLE_ANALYSIS_INSTRUCTION: &str = "You are an Art Director. Analyze these reference images.
Describe the visual style in a way that can be used as a prompt for an image generator.
Focus on: Lighting type (cinematic, natural, neon), Texture (matte, glossy, wood),
Composition (minimalist, cluttered, centered), and Color Palette.
Output ONE concise paragraph describing this style. Start with \"A photorealistic product shot...\"";

pub const PRODUCT_PHOTOGRAPHY_DIRECTIVE: &str = "The product features a clean, legible logo centered on the packaging.
High resolution, 8k, highly detailed, professional photography.";

/// Free-text style paragraph returned by the analysis stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDescription {
    text: String,
}

impl StyleDescription {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Advisory only: the analyzer is asked for the lead-in but nothing enforces it.
    pub fn has_expected_lead_in(&self) -> bool {
        self.text
            .trim_start()
            .to_ascii_lowercase()
            .starts_with(&STYLE_LEAD_IN.to_ascii_lowercase())
    }
}

impl std::fmt::Display for StyleDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// The style paragraph verbatim, followed by the fixed product-photography directive.
pub fn build_synthesis_prompt(style: &StyleDescription) -> String {
    format!("{}\n{}", style.as_str(), PRODUCT_PHOTOGRAPHY_DIRECTIVE)
}
