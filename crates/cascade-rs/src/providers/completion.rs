//! AI-completion provider for OpenAI-compatible chat completion endpoints.
//!
//! Sends the query as a user message under a fixed system prompt and
//! returns the first choice's content. The API key is injected at
//! construction time through a bearer [`HeaderInterceptor`]; without one the
//! adapter reports [`ProviderError::NotConfigured`] and makes no call.

use super::{ProviderAdapter, ProviderError, ProviderFuture, ProviderResult, normalize_text};
use crate::api::{
    HeaderInterceptor, LoggingInterceptor, RequestIdInterceptor, RequestOptions, TransportClient,
    TransportConfig,
};
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default endpoint base (OpenRouter's OpenAI-compatible API).
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model for completion calls.
pub const DEFAULT_COMPLETION_MODEL: &str = "openai/gpt-4o-mini";

/// Default system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a local guide. Answer questions about venues, \
     events, food and things to do in a few helpful sentences. Be specific.";

/// Request-shaping settings for a [`CompletionProvider`].
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            max_tokens: 512,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Provider backed by a chat completion endpoint.
#[derive(Debug)]
pub struct CompletionProvider {
    name: String,
    settings: CompletionSettings,
    /// `None` when no API key was supplied.
    client: Option<TransportClient>,
}

impl CompletionProvider {
    /// Build with the default completion transport (60s timeout, 2 retries).
    pub fn new(settings: CompletionSettings, api_key: Option<String>) -> Result<Self, ConfigError> {
        let config = TransportConfig::for_completion();
        match api_key {
            Some(key) => {
                let client = TransportClient::new(config)?;
                Ok(Self::with_client(settings, client, key))
            }
            None => Ok(Self::unconfigured(settings)),
        }
    }

    /// Build over an existing client. The base address comes from `settings`.
    pub fn with_client(settings: CompletionSettings, client: TransportClient, api_key: String) -> Self {
        let client = client
            .with_interceptor(HeaderInterceptor::bearer(api_key))
            .with_interceptor(RequestIdInterceptor)
            .with_interceptor(LoggingInterceptor);
        Self {
            name: "completion".to_string(),
            settings,
            client: Some(client),
        }
    }

    /// An adapter with no credentials. Every attempt fails with `NotConfigured`.
    pub fn unconfigured(settings: CompletionSettings) -> Self {
        Self {
            name: "completion".to_string(),
            settings,
            client: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    async fn complete(&self, client: &TransportClient, query: &str) -> ProviderResult {
        let body = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.settings.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: query,
                },
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to encode request: {e}")))?;

        debug!(
            "Completion request: model={}, max_tokens={}",
            self.settings.model, self.settings.max_tokens
        );
        let parsed: RawChatResponse = client
            .post_json(self.endpoint(), body, RequestOptions::new())
            .await?;

        if let Some(err) = parsed.error {
            return Err(ProviderError::Unavailable(format!("API error: {}", err.message)));
        }

        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .and_then(|content| normalize_text(&content))
            .ok_or_else(|| ProviderError::InvalidResponse("completion had no content".into()))
    }
}

impl ProviderAdapter for CompletionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt<'a>(&'a self, query: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            let Some(client) = &self.client else {
                return Err(ProviderError::NotConfigured("no API key supplied".into()));
            };
            if query.trim().is_empty() {
                return Err(ProviderError::InvalidResponse("empty query".into()));
            }
            self.complete(client, query).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RawResponse, RequestSpec, SendError, Transport, TransportFuture};
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct Canned {
        response: Result<RawResponse, SendError>,
        seen: Arc<Mutex<Vec<RequestSpec>>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: Ok(RawResponse::new(status, body)),
                seen: Arc::default(),
            }
        }
    }

    impl Transport for Canned {
        fn send(&self, request: RequestSpec) -> TransportFuture<'_> {
            self.seen.lock().unwrap().push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn provider(backend: Canned) -> CompletionProvider {
        let settings = CompletionSettings {
            base_url: "http://llm.test/v1/".into(),
            ..Default::default()
        };
        let client = TransportClient::with_transport(TransportConfig::default().with_retries(0), backend);
        CompletionProvider::with_client(settings, client, "sk-test".into())
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let backend = Canned::new(
            200,
            r#"{"choices":[{"message":{"content":"  Catch a show at Stubb's.\n"}}]}"#,
        );
        let provider = provider(backend.clone());
        let text = provider.attempt("live music in Austin").await.unwrap();
        assert_eq!(text, "Catch a show at Stubb's.");

        let sent = backend.seen.lock().unwrap()[0].clone();
        assert_eq!(sent.url, "http://llm.test/v1/chat/completions");
        assert_eq!(sent.header("authorization"), Some("Bearer sk-test"));
        assert!(sent.header("x-request-id").is_some());
        let body = sent.body.unwrap();
        assert_eq!(body["messages"][1]["content"], "live music in Austin");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["model"], DEFAULT_COMPLETION_MODEL);
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let provider = CompletionProvider::new(CompletionSettings::default(), None).unwrap();
        assert!(matches!(
            provider.attempt("anything").await,
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn rate_limit_maps_to_rate_limited() {
        let provider = provider(Canned::new(429, "slow down"));
        assert_eq!(provider.attempt("q").await, Err(ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_not_configured() {
        let provider = provider(Canned::new(401, "bad key"));
        assert!(matches!(
            provider.attempt("q").await,
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn empty_choices_are_invalid() {
        let provider = provider(Canned::new(200, r#"{"choices":[]}"#));
        assert!(matches!(
            provider.attempt("q").await,
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn api_error_body_is_unavailable() {
        let provider = provider(Canned::new(200, r#"{"error":{"message":"model overloaded"}}"#));
        let err = provider.attempt("q").await.unwrap_err();
        assert!(err.to_string().contains("model overloaded"));
    }
}
