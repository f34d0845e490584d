//! Encyclopedia provider backed by a Wikipedia-style REST summary endpoint.
//!
//! The page title is the place named in the query ("jazz in Austin" →
//! `Austin`), or the whole trimmed query when no place is named. Answers
//! come from the summary's `extract` field.

use super::{ProviderAdapter, ProviderError, ProviderFuture, ProviderResult, normalize_text, urlencoded};
use crate::api::{LoggingInterceptor, RequestOptions, TransportClient, TransportConfig};
use crate::cascade::fallback::extract_place;
use crate::config::ConfigError;
use serde::Deserialize;
use tracing::debug;

/// Default summary language.
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Deserialize, Debug)]
struct PageSummary {
    #[serde(rename = "type", default)]
    page_type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    extract: Option<String>,
}

/// Structured-knowledge provider.
#[derive(Debug)]
pub struct EncyclopediaProvider {
    base_url: String,
    client: TransportClient,
}

impl EncyclopediaProvider {
    /// Build against `https://{language}.wikipedia.org/api/rest_v1`.
    pub fn for_language(language: &str) -> Result<Self, ConfigError> {
        Self::new(format!("https://{language}.wikipedia.org/api/rest_v1"))
    }

    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let client = TransportClient::new(
            TransportConfig::default().with_header("Accept", "application/json"),
        )?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: TransportClient) -> Self {
        Self {
            base_url: base_url.into(),
            client: client.with_interceptor(LoggingInterceptor),
        }
    }

    fn summary_url(&self, title: &str) -> String {
        format!(
            "{}/page/summary/{}",
            self.base_url.trim_end_matches('/'),
            urlencoded(&title.replace(' ', "_"))
        )
    }

    async fn lookup(&self, query: &str) -> ProviderResult {
        let title = extract_place(query).unwrap_or_else(|| query.trim().to_string());
        if title.is_empty() {
            return Err(ProviderError::InvalidResponse("nothing to look up".into()));
        }
        debug!("Encyclopedia lookup: {title}");

        let summary: PageSummary = self
            .client
            .get_json(self.summary_url(&title), RequestOptions::new())
            .await?;

        if summary.page_type.as_deref() == Some("disambiguation") {
            return Err(ProviderError::InvalidResponse(format!(
                "'{}' is ambiguous",
                summary.title.unwrap_or(title)
            )));
        }
        summary
            .extract
            .as_deref()
            .and_then(normalize_text)
            .ok_or_else(|| ProviderError::InvalidResponse("summary had no extract".into()))
    }
}

impl ProviderAdapter for EncyclopediaProvider {
    fn name(&self) -> &str {
        "encyclopedia"
    }

    fn attempt<'a>(&'a self, query: &'a str) -> ProviderFuture<'a> {
        Box::pin(self.lookup(query))
    }
}
