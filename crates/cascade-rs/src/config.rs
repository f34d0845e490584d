//! JSON configuration file and orchestrator assembly.
//!
//! A config file lists providers in the order they should be tried, plus
//! the quality threshold and transport defaults:
//!
//! ```json
//! {
//!   "quality_threshold": 100,
//!   "transport": { "timeout_secs": 30, "max_retries": 3, "retry_delay_ms": 1000 },
//!   "providers": [
//!     { "type": "completion", "model": "openai/gpt-4o-mini", "api_key_env": "OPENROUTER_KEY" },
//!     { "type": "encyclopedia", "language": "en" },
//!     { "type": "search", "max_topics": 5 },
//!     { "type": "local", "entries": [{ "keywords": ["tacos"], "text": "..." }] }
//!   ]
//! }
//! ```
//!
//! Credentials never appear in the file. Completion entries name the
//! environment variable holding the key, and [`CascadeConfig::build_orchestrator`]
//! resolves it through a caller-supplied lookup.

use crate::api::{TransportClient, TransportConfig};
use crate::cascade::{DEFAULT_QUALITY_THRESHOLD, FallbackOrchestrator, OrchestratorBuilder};
use crate::providers::completion::{
    CompletionSettings, DEFAULT_COMPLETION_BASE_URL, DEFAULT_COMPLETION_MODEL, DEFAULT_SYSTEM_PROMPT,
};
use crate::providers::encyclopedia::DEFAULT_LANGUAGE;
use crate::providers::local::LocalEntry;
use crate::providers::search::{DEFAULT_MAX_TOPICS, DEFAULT_SEARCH_BASE_URL};
use crate::providers::{
    CachingProvider, CompletionProvider, EncyclopediaProvider, LocalProvider, ProviderAdapter, SearchProvider,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default environment variable holding the completion API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_KEY";

/// Errors from loading configuration or constructing clients.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config{}: {source}", display_path(.path.as_deref()))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| format!(" {}", p.display())).unwrap_or_default()
}

// ── Transport settings ─────────────────────────────────────────────

/// Transport defaults shared by every network-backed provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TransportSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Cap on a single backoff delay. Unbounded when absent.
    pub max_delay_ms: Option<u64>,
    pub jitter: bool,
    /// Completion endpoints are slower; they get their own timeout and retry count.
    pub completion_timeout_secs: u64,
    pub completion_max_retries: u32,
    pub user_agent: Option<String>,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        let generic = TransportConfig::default();
        let completion = TransportConfig::for_completion();
        Self {
            timeout_secs: generic.timeout.as_secs(),
            max_retries: generic.max_retries,
            retry_delay_ms: duration_millis(generic.retry_delay),
            max_delay_ms: None,
            jitter: false,
            completion_timeout_secs: completion.timeout.as_secs(),
            completion_max_retries: completion.max_retries,
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl TransportSettings {
    /// Client configuration for generic providers.
    pub fn generic(&self) -> TransportConfig {
        self.apply(TransportConfig::default(), self.timeout_secs, self.max_retries)
    }

    /// Client configuration for AI-completion providers.
    pub fn completion(&self) -> TransportConfig {
        self.apply(
            TransportConfig::for_completion(),
            self.completion_timeout_secs,
            self.completion_max_retries,
        )
    }

    fn apply(&self, base: TransportConfig, timeout_secs: u64, max_retries: u32) -> TransportConfig {
        let mut config = base
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_retries(max_retries)
            .with_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_jitter(self.jitter);
        if let Some(max) = self.max_delay_ms {
            config = config.with_max_delay(Duration::from_millis(max));
        }
        if let Some(ua) = &self.user_agent {
            config.user_agent = ua.clone();
        }
        for (name, value) in &self.headers {
            config = config.with_header(name.clone(), value.clone());
        }
        config
    }
}

// ── Provider entries ───────────────────────────────────────────────

fn default_completion_base_url() -> String {
    DEFAULT_COMPLETION_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_COMPLETION_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_max_tokens() -> u32 {
    CompletionSettings::default().max_tokens
}

fn default_temperature() -> f32 {
    CompletionSettings::default().temperature
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_search_base_url() -> String {
    DEFAULT_SEARCH_BASE_URL.to_string()
}

fn default_max_topics() -> usize {
    DEFAULT_MAX_TOPICS
}

/// One provider in the cascade, in file order.
///
/// `rank` overrides the position-derived priority (lower is tried first).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEntry {
    Completion {
        #[serde(default = "default_completion_base_url")]
        base_url: String,
        #[serde(default = "default_model")]
        model: String,
        /// Name of the environment variable holding the API key.
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
        #[serde(default = "default_temperature")]
        temperature: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        system_prompt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rank: Option<usize>,
    },
    Encyclopedia {
        /// Full REST base. Derived from `language` when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
        #[serde(default = "default_language")]
        language: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rank: Option<usize>,
    },
    Search {
        #[serde(default = "default_search_base_url")]
        base_url: String,
        #[serde(default = "default_max_topics")]
        max_topics: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rank: Option<usize>,
    },
    Local {
        #[serde(default)]
        entries: Vec<LocalEntry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rank: Option<usize>,
    },
}

impl ProviderEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderEntry::Completion { .. } => "completion",
            ProviderEntry::Encyclopedia { .. } => "encyclopedia",
            ProviderEntry::Search { .. } => "search",
            ProviderEntry::Local { .. } => "local",
        }
    }

    pub fn rank(&self) -> Option<usize> {
        match self {
            ProviderEntry::Completion { rank, .. }
            | ProviderEntry::Encyclopedia { rank, .. }
            | ProviderEntry::Search { rank, .. }
            | ProviderEntry::Local { rank, .. } => *rank,
        }
    }

    pub fn requires_network(&self) -> bool {
        !matches!(self, ProviderEntry::Local { .. })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let blank = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(ConfigError::Invalid(format!("{} provider: '{field}' is empty", self.kind())))
            } else {
                Ok(())
            }
        };
        match self {
            ProviderEntry::Completion {
                base_url,
                model,
                api_key_env,
                ..
            } => {
                blank("base_url", base_url)?;
                blank("model", model)?;
                blank("api_key_env", api_key_env)
            }
            ProviderEntry::Encyclopedia { language, .. } => blank("language", language),
            ProviderEntry::Search { base_url, .. } => blank("base_url", base_url),
            ProviderEntry::Local { .. } => Ok(()),
        }
    }
}

// ── CascadeConfig ──────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CascadeConfig {
    /// Minimum answer length (exclusive) accepted by the quality gate.
    pub quality_threshold: usize,
    /// Memoize network providers' answers in memory.
    pub cache_responses: bool,
    pub transport: TransportSettings,
    pub providers: Vec<ProviderEntry>,
}

impl Default for CascadeConfig {
    /// Completion, then encyclopedia, then web search.
    fn default() -> Self {
        Self {
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            cache_responses: false,
            transport: TransportSettings::default(),
            providers: vec![
                ProviderEntry::Completion {
                    base_url: default_completion_base_url(),
                    model: default_model(),
                    api_key_env: default_api_key_env(),
                    max_tokens: default_max_tokens(),
                    temperature: default_temperature(),
                    system_prompt: None,
                    rank: None,
                },
                ProviderEntry::Encyclopedia {
                    base_url: None,
                    language: default_language(),
                    rank: None,
                },
                ProviderEntry::Search {
                    base_url: default_search_base_url(),
                    max_topics: default_max_topics(),
                    rank: None,
                },
            ],
        }
    }
}

impl CascadeConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        config.validate()?;
        debug!(
            "Loaded config from {} ({} provider(s))",
            path.display(),
            config.providers.len()
        );
        Ok(config)
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|source| ConfigError::Parse { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.providers.iter().try_for_each(ProviderEntry::validate)
    }

    /// Drop every provider that needs the network.
    pub fn offline(mut self) -> Self {
        self.providers.retain(|p| !p.requires_network());
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// Build the configured adapters, in file order.
    ///
    /// `lookup` resolves environment variable names to values; pass
    /// `|name| std::env::var(name).ok()` for the process environment. A
    /// completion provider whose key is missing is still registered and
    /// reports `NotConfigured` when tried.
    pub fn build_providers<L>(&self, lookup: L) -> Result<Vec<(Option<usize>, Box<dyn ProviderAdapter>)>, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        self.validate()?;
        let mut adapters: Vec<(Option<usize>, Box<dyn ProviderAdapter>)> = Vec::new();
        for entry in &self.providers {
            let adapter: Box<dyn ProviderAdapter> = match entry {
                ProviderEntry::Completion {
                    base_url,
                    model,
                    api_key_env,
                    max_tokens,
                    temperature,
                    system_prompt,
                    ..
                } => {
                    let settings = CompletionSettings {
                        base_url: base_url.clone(),
                        model: model.clone(),
                        max_tokens: *max_tokens,
                        temperature: *temperature,
                        system_prompt: system_prompt
                            .clone()
                            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
                    };
                    let provider = match lookup(api_key_env).filter(|k| !k.trim().is_empty()) {
                        Some(key) => {
                            let client = TransportClient::new(self.transport.completion())?;
                            CompletionProvider::with_client(settings, client, key)
                        }
                        None => {
                            debug!("{api_key_env} not set; completion provider is unconfigured");
                            CompletionProvider::unconfigured(settings)
                        }
                    };
                    self.maybe_cached(provider)
                }
                ProviderEntry::Encyclopedia {
                    base_url, language, ..
                } => {
                    let base = base_url
                        .clone()
                        .unwrap_or_else(|| format!("https://{language}.wikipedia.org/api/rest_v1"));
                    let client = TransportClient::new(
                        self.transport.generic().with_header("Accept", "application/json"),
                    )?;
                    self.maybe_cached(EncyclopediaProvider::with_client(base, client))
                }
                ProviderEntry::Search {
                    base_url,
                    max_topics,
                    ..
                } => {
                    let client = TransportClient::new(self.transport.generic())?;
                    self.maybe_cached(
                        SearchProvider::with_client(base_url.clone(), client).with_max_topics(*max_topics),
                    )
                }
                ProviderEntry::Local { entries, .. } => Box::new(LocalProvider::new(entries.clone())),
            };
            adapters.push((entry.rank(), adapter));
        }
        Ok(adapters)
    }

    fn maybe_cached<P: ProviderAdapter + 'static>(&self, provider: P) -> Box<dyn ProviderAdapter> {
        if self.cache_responses {
            Box::new(CachingProvider::new(provider))
        } else {
            Box::new(provider)
        }
    }

    /// An [`OrchestratorBuilder`] with every configured provider and the
    /// quality threshold applied. Callers can still add an observer.
    pub fn orchestrator_builder<L>(&self, lookup: L) -> Result<OrchestratorBuilder, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let builder = self
            .build_providers(lookup)?
            .into_iter()
            .fold(FallbackOrchestrator::builder(), |builder, (rank, adapter)| {
                builder.register_shared(adapter.into(), rank)
            });
        Ok(builder.with_threshold(self.quality_threshold))
    }

    pub fn build_orchestrator<L>(&self, lookup: L) -> Result<FallbackOrchestrator, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(self.orchestrator_builder(lookup)?.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_name: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CascadeConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, CascadeConfig::default());
        assert_eq!(config.quality_threshold, 100);
        let kinds: Vec<&str> = config.providers.iter().map(ProviderEntry::kind).collect();
        assert_eq!(kinds, vec!["completion", "encyclopedia", "search"]);
    }

    #[test]
    fn loads_partial_file_with_defaults_filled_in() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "quality_threshold": 60,
                "transport": {{ "max_retries": 1 }},
                "providers": [
                    {{ "type": "local", "entries": [{{ "keywords": ["tacos"], "text": "Veracruz." }}] }},
                    {{ "type": "completion", "api_key_env": "MY_KEY", "rank": 5 }},
                    {{ "type": "encyclopedia", "language": "de" }}
                ]
            }}"#
        )
        .unwrap();

        let config = CascadeConfig::load(file.path()).unwrap();
        assert_eq!(config.quality_threshold, 60);
        assert_eq!(config.transport.max_retries, 1);
        assert_eq!(config.transport.timeout_secs, 30);
        assert_eq!(config.transport.completion_timeout_secs, 60);
        assert_eq!(config.providers.len(), 3);
        match &config.providers[1] {
            ProviderEntry::Completion {
                api_key_env,
                model,
                rank,
                ..
            } => {
                assert_eq!(api_key_env, "MY_KEY");
                assert_eq!(model, DEFAULT_COMPLETION_MODEL);
                assert_eq!(*rank, Some(5));
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = CascadeConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn unknown_provider_type_is_rejected() {
        let err = CascadeConfig::from_json(r#"{"providers":[{"type":"oracle"}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: None, .. }));
    }

    #[test]
    fn blank_fields_are_invalid() {
        let err = CascadeConfig::from_json(r#"{"providers":[{"type":"completion","model":" "}]}"#).unwrap_err();
        assert!(err.to_string().contains("'model' is empty"));
    }

    #[test]
    fn transport_settings_map_to_client_config() {
        let settings = TransportSettings {
            max_delay_ms: Some(5_000),
            headers: BTreeMap::from([("X-App".to_string(), "venue-map".to_string())]),
            ..Default::default()
        };
        let generic = settings.generic();
        assert_eq!(generic.timeout, Duration::from_secs(30));
        assert_eq!(generic.max_retries, 3);
        assert_eq!(generic.max_delay, Some(Duration::from_secs(5)));
        assert_eq!(generic.default_headers.get("X-App").map(String::as_str), Some("venue-map"));

        let completion = settings.completion();
        assert_eq!(completion.timeout, Duration::from_secs(60));
        assert_eq!(completion.max_retries, 2);
    }

    #[test]
    fn offline_keeps_only_local_providers() {
        let config = CascadeConfig {
            providers: vec![
                ProviderEntry::Local {
                    entries: vec![],
                    rank: None,
                },
                ProviderEntry::Search {
                    base_url: default_search_base_url(),
                    max_topics: 3,
                    rank: None,
                },
            ],
            ..Default::default()
        }
        .offline();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].kind(), "local");
    }

    #[test]
    fn builds_orchestrator_in_rank_order() {
        let config = CascadeConfig::from_json(
            r#"{"providers":[
                {"type":"search"},
                {"type":"encyclopedia"},
                {"type":"local","rank":0}
            ]}"#,
        )
        .unwrap();
        let orchestrator = config.build_orchestrator(no_env).unwrap();
        assert_eq!(orchestrator.provider_names(), vec!["local", "search", "encyclopedia"]);
    }

    #[tokio::test]
    async fn completion_without_key_is_not_configured() {
        let config = CascadeConfig::from_json(r#"{"providers":[{"type":"completion"}]}"#).unwrap();
        let result = config.build_orchestrator(no_env).unwrap().resolve("jazz").await;
        assert!(result.is_fallback());
        assert!(matches!(
            &result.attempts[0].outcome,
            crate::cascade::AttemptOutcome::Failed {
                error: crate::providers::ProviderError::NotConfigured(_)
            }
        ));
    }

    #[tokio::test]
    async fn local_only_config_answers_offline() {
        let config = CascadeConfig::from_json(
            r#"{
                "quality_threshold": 10,
                "providers":[{"type":"local","entries":[
                    {"keywords":["bbq"],"text":"Franklin Barbecue opens at 11; arrive early."}
                ]}]
            }"#,
        )
        .unwrap();
        let orchestrator = config.build_orchestrator(no_env).unwrap();
        let result = orchestrator.resolve("best bbq in Austin").await;
        assert_eq!(result.winner, "local");
        assert_eq!(result.text, "Franklin Barbecue opens at 11; arrive early.");
    }
}
