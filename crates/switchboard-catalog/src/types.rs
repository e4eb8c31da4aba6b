use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Supported upstream protocol families
///
/// Closed set; an unrecognized type is a configuration error surfaced when
/// the snapshot is installed, never at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    /// OpenAI chat-completions wire format (also deepseek, glm, qwen,
    /// kimi, openrouter, grok and other compatible vendors)
    OpenaiCompatible,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Gemini,
    /// Local Ollama daemon
    OllamaLocal,
    /// Local vLLM server
    VllmLocal,
    /// Local transformers inference server
    TransformersLocal,
    /// Opaque JSON-over-HTTP endpoint
    GenericHttp,
}

impl ProviderType {
    /// Kebab-case name as it appears in catalog files and queries
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenaiCompatible => "openai-compatible",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::OllamaLocal => "ollama-local",
            Self::VllmLocal => "vllm-local",
            Self::TransformersLocal => "transformers-local",
            Self::GenericHttp => "generic-http",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a secret value comes from
///
/// Environment references are resolved at read time so key rotation in the
/// environment takes effect without a catalog refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeySource {
    /// Reference to an environment variable holding the secret
    Env {
        /// Environment variable name
        env: String,
    },
    /// Literal secret value (may be a comma-separated key list)
    Literal(SecretString),
}

impl KeySource {
    /// Resolve to the raw secret string, `None` when the referenced
    /// environment variable is unset or empty
    pub fn resolve(&self) -> Option<SecretString> {
        match self {
            Self::Literal(secret) => Some(secret.clone()),
            Self::Env { env } => match std::env::var(env) {
                Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value)),
                _ => None,
            },
        }
    }

    /// Resolve and split a comma-separated key list
    pub fn resolve_keys(&self) -> Vec<SecretString> {
        self.resolve()
            .map(|secret| {
                secret
                    .expose_secret()
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(SecretString::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// An upstream provider entry
#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    /// Unique provider name
    pub name: String,
    /// Protocol family served by this provider
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Base URL override; each adapter has a documented default
    #[serde(default)]
    pub base_url: Option<Url>,
    /// API key sources (each may expand to several keys)
    #[serde(default)]
    pub api_keys: Vec<KeySource>,
    /// Free-form settings consumed by the matching adapter
    /// (endpoint overrides, auth header/scheme, extra headers, ...)
    #[serde(default)]
    pub settings: IndexMap<String, Value>,
    /// Whether the provider accepts traffic
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Provider {
    /// All currently resolvable API keys, in configuration order
    pub fn resolved_api_keys(&self) -> Vec<SecretString> {
        self.api_keys.iter().flat_map(KeySource::resolve_keys).collect()
    }

    /// String-valued setting lookup
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }
}

/// Per-model rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub max_requests: u32,
    /// Window length in seconds
    pub per_seconds: u32,
    /// Bucket capacity; defaults to `max_requests`, must not be smaller
    #[serde(default)]
    pub burst_size: Option<u32>,
}

impl RateLimitConfig {
    /// Effective bucket capacity
    pub fn capacity(&self) -> u32 {
        self.burst_size.unwrap_or(self.max_requests)
    }

    /// Refill rate in tokens per second
    pub fn refill_rate(&self) -> f64 {
        f64::from(self.max_requests) / f64::from(self.per_seconds.max(1))
    }
}

/// Capability and pricing metadata for a model
///
/// Unknown keys are preserved so catalog conventions (priority, vendor
/// hints) survive round-trips without the core assigning them meaning.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    /// Context window in tokens
    #[serde(default)]
    pub context_window: Option<u32>,
    /// Whether the model accepts image inputs
    #[serde(default)]
    pub supports_vision: bool,
    /// Whether the model supports tool calling
    #[serde(default)]
    pub supports_tools: bool,
    /// Whether the model accepts audio inputs
    #[serde(default)]
    pub supports_audio: bool,
    /// Whether the model accepts video inputs
    #[serde(default)]
    pub supports_video: bool,
    /// Uniform price per 1k tokens (prompt + completion)
    #[serde(default)]
    pub cost_per_1k_tokens: Option<f64>,
    /// Separate price per 1k completion tokens
    #[serde(default)]
    pub cost_per_1k_completion_tokens: Option<f64>,
    /// Unrecognized keys kept verbatim
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ModelConfig {
    /// Cost of a call given token counts, `None` when either the counts
    /// or the pricing are absent
    ///
    /// With a completion-specific rate, prompt tokens are billed at the
    /// uniform rate (when present) and completion tokens at their own;
    /// otherwise the uniform rate covers the total.
    pub fn cost(&self, prompt_tokens: Option<u64>, completion_tokens: Option<u64>) -> Option<f64> {
        if prompt_tokens.is_none() && completion_tokens.is_none() {
            return None;
        }

        let mut cost = 0.0;
        match (self.cost_per_1k_tokens, self.cost_per_1k_completion_tokens) {
            (uniform, Some(completion_rate)) => {
                if let Some(tokens) = completion_tokens {
                    cost += tokens as f64 / 1000.0 * completion_rate;
                }
                if let (Some(rate), Some(tokens)) = (uniform, prompt_tokens) {
                    cost += tokens as f64 / 1000.0 * rate;
                }
            }
            (Some(rate), None) => {
                let total = prompt_tokens.unwrap_or(0) + completion_tokens.unwrap_or(0);
                cost = total as f64 / 1000.0 * rate;
            }
            (None, None) => return None,
        }

        (cost > 0.0).then(|| (cost * 1e6).round() / 1e6)
    }
}

/// A routable model entry
#[derive(Debug, Clone, Deserialize)]
pub struct Model {
    /// Name unique within its provider
    pub name: String,
    /// Owning provider name
    pub provider_name: String,
    /// Human-facing name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Identifier sent upstream; defaults to `name`
    #[serde(default)]
    pub remote_identifier: Option<String>,
    /// Routing tags (lowercased, deduplicated, order preserved)
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    /// Parameters merged under every request (caller wins)
    #[serde(default)]
    pub default_params: IndexMap<String, Value>,
    /// Capability and pricing metadata
    #[serde(default)]
    pub config: ModelConfig,
    /// Optional per-model rate limit
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    /// Whether the model accepts traffic
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Model {
    /// `provider/model` coordinates used in keys, allow-lists, and records
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.provider_name, self.name)
    }

    /// Identifier to send upstream
    pub fn remote_identifier(&self) -> &str {
        self.remote_identifier.as_deref().unwrap_or(&self.name)
    }

    /// Whether this model's tag set contains every queried tag
    pub fn has_tags(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|tag| self.tags.iter().any(|t| t == tag))
    }
}

/// Upper bounds a credential imposes on request parameters
///
/// Values above a limit are clamped down rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParameterLimits {
    /// Cap on `max_tokens`
    #[serde(default)]
    pub max_tokens: Option<u64>,
    /// Cap on `temperature`
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Cap on `top_p`
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Cap on `frequency_penalty`
    #[serde(default)]
    pub frequency_penalty: Option<f64>,
    /// Cap on `presence_penalty`
    #[serde(default)]
    pub presence_penalty: Option<f64>,
    /// Caps on arbitrary numeric parameters
    #[serde(default)]
    pub custom_limits: IndexMap<String, f64>,
}

impl ParameterLimits {
    /// Clamp every limited parameter in `params` down to its bound
    ///
    /// Non-numeric caller values are left untouched; the adapters will
    /// surface those as upstream validation errors.
    pub fn clamp(&self, params: &mut IndexMap<String, Value>) {
        clamp_number(params, "max_tokens", self.max_tokens.map(|v| v as f64));
        clamp_number(params, "temperature", self.temperature);
        clamp_number(params, "top_p", self.top_p);
        clamp_number(params, "frequency_penalty", self.frequency_penalty);
        clamp_number(params, "presence_penalty", self.presence_penalty);
        for (key, limit) in &self.custom_limits {
            clamp_number(params, key, Some(*limit));
        }
    }
}

fn clamp_number(params: &mut IndexMap<String, Value>, key: &str, limit: Option<f64>) {
    let Some(limit) = limit else { return };
    let Some(value) = params.get(key).and_then(Value::as_f64) else {
        return;
    };
    if value > limit {
        let clamped = if limit.fract() == 0.0 && value.fract() == 0.0 {
            Value::from(limit as i64)
        } else {
            Value::from(limit)
        };
        params.insert(key.to_owned(), clamped);
    }
}

/// An access credential
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    /// Stable identifier (used by sessions; never the secret)
    pub id: String,
    /// Secret source; a dangling env reference disables the credential
    pub secret: KeySource,
    /// Human-facing label
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the credential is usable
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Allowed `provider/model` coordinates (or bare model names);
    /// `None` means unrestricted
    #[serde(default)]
    pub allowed_models: Option<Vec<String>>,
    /// Allowed provider names; `None` means unrestricted
    #[serde(default)]
    pub allowed_providers: Option<Vec<String>>,
    /// Upper bounds on request parameters
    #[serde(default)]
    pub parameter_limits: Option<ParameterLimits>,
}

impl Credential {
    /// Compare a presented secret against this credential
    ///
    /// Constant-time over the stored value; an unresolvable or inactive
    /// credential never matches.
    pub fn matches_secret(&self, presented: &str) -> bool {
        if !self.is_active {
            return false;
        }
        let Some(stored) = self.secret.resolve() else {
            return false;
        };
        constant_time_eq(stored.expose_secret().as_bytes(), presented.as_bytes())
    }

    /// Whether this credential may call `provider/model`
    pub fn allows_model(&self, provider_name: &str, model_name: &str) -> bool {
        if !self.is_active {
            return false;
        }
        if let Some(providers) = &self.allowed_providers
            && !providers.iter().any(|p| p == provider_name)
        {
            return false;
        }
        if let Some(models) = &self.allowed_models {
            let qualified = format!("{provider_name}/{model_name}");
            if !models.iter().any(|m| m == &qualified || m == model_name) {
                return false;
            }
        }
        true
    }
}

/// Tag-routed selection query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelQuery {
    /// Tags the candidate's tag set must contain (empty matches everything)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Provider types to keep (empty keeps all)
    #[serde(default)]
    pub provider_types: Vec<ProviderType>,
    /// Include inactive models and providers
    #[serde(default)]
    pub include_inactive: bool,
}

/// Lowercase, trim, and deduplicate a tag list preserving first-seen order
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(normalize_tags(raw))
}

/// Byte-wise equality without early exit
///
/// The accumulated difference is folded over every byte so timing does not
/// reveal the first mismatching position. Length is compared first; only
/// the secret's length is observable, not its contents.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn limits() -> ParameterLimits {
        ParameterLimits {
            max_tokens: Some(500),
            temperature: Some(1.0),
            ..ParameterLimits::default()
        }
    }

    #[test]
    fn clamp_lowers_values_above_the_limit() {
        let mut params = IndexMap::new();
        params.insert("max_tokens".to_owned(), json!(2000));
        limits().clamp(&mut params);
        assert_eq!(params["max_tokens"], json!(500));
    }

    #[test]
    fn clamp_passes_values_under_the_limit() {
        let mut params = IndexMap::new();
        params.insert("max_tokens".to_owned(), json!(100));
        params.insert("temperature".to_owned(), json!(0.2));
        limits().clamp(&mut params);
        assert_eq!(params["max_tokens"], json!(100));
        assert_eq!(params["temperature"], json!(0.2));
    }

    #[test]
    fn clamp_ignores_absent_and_non_numeric_parameters() {
        let mut params = IndexMap::new();
        params.insert("stop".to_owned(), json!(["\n"]));
        limits().clamp(&mut params);
        assert_eq!(params.len(), 1);
        assert_eq!(params["stop"], json!(["\n"]));
    }

    #[test]
    fn custom_limits_apply_to_arbitrary_keys() {
        let mut custom = IndexMap::new();
        custom.insert("top_k".to_owned(), 40.0);
        let limits = ParameterLimits {
            custom_limits: custom,
            ..ParameterLimits::default()
        };
        let mut params = IndexMap::new();
        params.insert("top_k".to_owned(), json!(100));
        limits.clamp(&mut params);
        assert_eq!(params["top_k"], json!(40));
    }

    #[test]
    fn tags_are_normalized() {
        assert_eq!(
            normalize_tags(["Chat", " coding ", "chat", ""]),
            vec!["chat".to_owned(), "coding".to_owned()]
        );
    }

    #[test]
    fn cost_uses_uniform_rate_for_total() {
        let config = ModelConfig {
            cost_per_1k_tokens: Some(0.002),
            ..ModelConfig::default()
        };
        let cost = config.cost(Some(1000), Some(500)).unwrap();
        assert!((cost - 0.003).abs() < 1e-9);
    }

    #[test]
    fn cost_splits_completion_rate() {
        let config = ModelConfig {
            cost_per_1k_tokens: Some(0.001),
            cost_per_1k_completion_tokens: Some(0.004),
            ..ModelConfig::default()
        };
        let cost = config.cost(Some(1000), Some(1000)).unwrap();
        assert!((cost - 0.005).abs() < 1e-9);
    }

    #[test]
    fn cost_is_null_without_tokens_or_pricing() {
        let priced = ModelConfig {
            cost_per_1k_tokens: Some(0.002),
            ..ModelConfig::default()
        };
        assert_eq!(priced.cost(None, None), None);
        assert_eq!(ModelConfig::default().cost(Some(10), Some(10)), None);
    }

    #[test]
    fn allow_list_accepts_qualified_and_bare_names() {
        let credential = Credential {
            id: "k1".to_owned(),
            secret: KeySource::Literal(SecretString::from("sk-test")),
            name: None,
            is_active: true,
            allowed_models: Some(vec!["p2/m2".to_owned(), "m3".to_owned()]),
            allowed_providers: None,
            parameter_limits: None,
        };
        assert!(credential.allows_model("p2", "m2"));
        assert!(credential.allows_model("p9", "m3"));
        assert!(!credential.allows_model("p1", "m1"));
    }

    #[test]
    fn provider_allow_list_checked_before_models() {
        let credential = Credential {
            id: "k1".to_owned(),
            secret: KeySource::Literal(SecretString::from("sk-test")),
            name: None,
            is_active: true,
            allowed_models: None,
            allowed_providers: Some(vec!["p1".to_owned()]),
            parameter_limits: None,
        };
        assert!(credential.allows_model("p1", "anything"));
        assert!(!credential.allows_model("p2", "anything"));
    }

    #[test]
    fn secret_match_is_exact() {
        let credential = Credential {
            id: "k1".to_owned(),
            secret: KeySource::Literal(SecretString::from("sk-secret")),
            name: None,
            is_active: true,
            allowed_models: None,
            allowed_providers: None,
            parameter_limits: None,
        };
        assert!(credential.matches_secret("sk-secret"));
        assert!(!credential.matches_secret("sk-secret2"));
        assert!(!credential.matches_secret("sk-secre"));
    }

    #[test]
    fn missing_env_reference_disables_the_credential() {
        let credential = Credential {
            id: "k1".to_owned(),
            secret: KeySource::Env {
                env: "SWITCHBOARD_TEST_UNSET_KEY".to_owned(),
            },
            name: None,
            is_active: true,
            allowed_models: None,
            allowed_providers: None,
            parameter_limits: None,
        };
        assert!(!credential.matches_secret("anything"));
    }

    #[test]
    fn key_source_splits_comma_separated_keys() {
        let source = KeySource::Literal(SecretString::from("k1, k2 ,,k3"));
        let keys = source.resolve_keys();
        let raw: Vec<&str> = keys.iter().map(ExposeSecret::expose_secret).collect();
        assert_eq!(raw, ["k1", "k2", "k3"]);
    }
}
