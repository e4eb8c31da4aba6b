use std::path::Path;

use serde::Deserialize;
use switchboard_catalog::{CatalogSnapshot, Credential, Model, Provider};

use crate::ConfigError;

/// On-disk catalog document
///
/// This is the surface the external configuration sync writes; the core
/// turns it into a validated snapshot and never mutates it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

impl CatalogFile {
    /// Load a catalog file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validate into an installable snapshot
    pub fn into_snapshot(self) -> Result<CatalogSnapshot, ConfigError> {
        CatalogSnapshot::new(self.providers, self.models, self.credentials)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[providers]]
        name = "openrouter"
        type = "openai-compatible"
        base_url = "https://openrouter.ai/api"
        api_keys = [{ env = "OPENROUTER_API_KEY" }]

        [[providers]]
        name = "local-ollama"
        type = "ollama-local"

        [[models]]
        name = "glm-chat"
        provider_name = "openrouter"
        remote_identifier = "z-ai/glm-4.5-air:free"
        tags = ["chat", "free"]
        default_params = { temperature = 0.7 }

        [models.config]
        context_window = 131072
        cost_per_1k_tokens = 0.0002

        [models.rate_limit]
        max_requests = 60
        per_seconds = 60
        burst_size = 80

        [[models]]
        name = "qwen-local"
        provider_name = "local-ollama"
        tags = ["chat", "local"]

        [[credentials]]
        id = "team-key"
        secret = "sk-team-1"
        allowed_providers = ["openrouter"]

        [credentials.parameter_limits]
        max_tokens = 4096
    "#;

    #[test]
    fn sample_catalog_parses_and_validates() {
        let file: CatalogFile = toml::from_str(SAMPLE).unwrap();
        assert_eq!(file.providers.len(), 2);
        assert_eq!(file.models.len(), 2);
        assert_eq!(file.credentials.len(), 1);

        let snapshot = file.into_snapshot().unwrap();
        assert!(snapshot.model("openrouter", "glm-chat").is_some());

        let model = snapshot.model("openrouter", "glm-chat").unwrap();
        assert_eq!(model.remote_identifier(), "z-ai/glm-4.5-air:free");
        assert_eq!(model.rate_limit.unwrap().burst_size, Some(80));
        assert_eq!(model.config.cost_per_1k_tokens, Some(0.0002));
    }

    #[test]
    fn dangling_model_reference_fails_validation() {
        let file: CatalogFile = toml::from_str(
            r#"
            [[models]]
            name = "orphan"
            provider_name = "nope"
            "#,
        )
        .unwrap();
        assert!(file.into_snapshot().is_err());
    }
}
