use indexmap::IndexMap;

/// Models that accept images plus text and answer in text.
pub const CAPABILITY_VISION: &str = "vision";
/// Models that turn a text prompt into an image.
pub const CAPABILITY_IMAGE: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    pub max_input_images: Option<usize>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }

    pub fn is_offline(&self) -> bool {
        self.provider == "dryrun"
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        let model = self.get(name)?;
        if model.supports(capability) {
            return Some(model.clone());
        }
        None
    }
}

// Registration order matters: the first model of a capability is its default.
fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str,
                      provider: &str,
                      capabilities: &[&str],
                      max_input_images: Option<usize>| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: provider.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
                max_input_images,
            },
        );
    };

    insert(
        "gemini-2.5-flash",
        "gemini",
        &[CAPABILITY_VISION],
        Some(16),
    );
    insert(
        "gemini-2.5-pro",
        "gemini",
        &[CAPABILITY_VISION],
        Some(16),
    );
    insert(
        "gemini-1.5-flash-001",
        "gemini",
        &[CAPABILITY_VISION],
        Some(16),
    );
    insert("imagen-4.0-generate-001", "imagen", &[CAPABILITY_IMAGE], None);
    insert(
        "imagen-4.0-ultra-generate-001",
        "imagen",
        &[CAPABILITY_IMAGE],
        None,
    );
    insert("imagen-3.0-generate-002", "imagen", &[CAPABILITY_IMAGE], None);
    insert("imagen-3.0-generate-001", "imagen", &[CAPABILITY_IMAGE], None);
    insert("dryrun-vision-1", "dryrun", &[CAPABILITY_VISION], None);
    insert("dryrun-image-1", "dryrun", &[CAPABILITY_IMAGE], None);

    map
}
