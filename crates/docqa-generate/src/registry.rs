//! Named generators, one per configured model profile.

use std::collections::BTreeMap;
use std::sync::Arc;

use docqa_types::Settings;
use tracing::info;

use crate::api::{ApiGenerator, ApiGeneratorConfig};
use crate::error::GeneratorError;
use crate::generator::Generator;

#[derive(Clone)]
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Arc<dyn Generator>>,
    default_model: String,
}

impl GeneratorRegistry {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            generators: BTreeMap::new(),
            default_model: default_model.into(),
        }
    }

    /// One [`ApiGenerator`] per entry in `settings.models`.
    pub fn from_settings(settings: &Settings) -> Result<Self, GeneratorError> {
        let mut registry = Self::new(settings.generation.default_model.clone());
        for (name, profile) in &settings.models {
            let config = ApiGeneratorConfig::from_profile(name, profile)?;
            info!(
                model = %name,
                provider = %profile.provider,
                url = %config.chat_url(),
                "Registered model"
            );
            registry.register(name.clone(), Arc::new(ApiGenerator::new(config)?));
        }
        if !registry.generators.contains_key(&registry.default_model) {
            return Err(GeneratorError::UnknownModel(registry.default_model));
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: impl Into<String>, generator: Arc<dyn Generator>) {
        self.generators.insert(name.into(), generator);
    }

    pub fn with(mut self, name: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        self.register(name, generator);
        self
    }

    /// The named generator, or the default one when `name` is `None`.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn Generator>, GeneratorError> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.default_model);
        self.generators
            .get(name)
            .cloned()
            .ok_or_else(|| GeneratorError::UnknownModel(name.to_string()))
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.generators.keys().cloned().collect()
    }
}
