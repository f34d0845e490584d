//! Web-search provider backed by a keyless instant-answer API
//! (DuckDuckGo's `?format=json` endpoint shape).
//!
//! Prefers the abstract, then the direct answer, then a numbered list of
//! related topics.

use super::{ProviderAdapter, ProviderError, ProviderFuture, ProviderResult, normalize_text, urlencoded};
use crate::api::{LoggingInterceptor, RequestOptions, TransportClient, TransportConfig};
use crate::config::ConfigError;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.duckduckgo.com";

/// Default number of related topics included in an answer.
pub const DEFAULT_MAX_TOPICS: usize = 5;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    abstract_text: String,
    #[serde(default)]
    abstract_source: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// A related topic, or a named group of them.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct RelatedTopic {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    topics: Vec<RelatedTopic>,
}

/// Generic web-search provider.
#[derive(Debug)]
pub struct SearchProvider {
    base_url: String,
    max_topics: usize,
    client: TransportClient,
}

impl SearchProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let client = TransportClient::new(TransportConfig::default())?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: TransportClient) -> Self {
        Self {
            base_url: base_url.into(),
            max_topics: DEFAULT_MAX_TOPICS,
            client: client.with_interceptor(LoggingInterceptor),
        }
    }

    pub fn with_max_topics(mut self, max_topics: usize) -> Self {
        self.max_topics = max_topics;
        self
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/?q={}&format=json&no_html=1&skip_disambig=1",
            self.base_url.trim_end_matches('/'),
            urlencoded(query.trim()),
        )
    }

    async fn search(&self, query: &str) -> ProviderResult {
        if query.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("empty query".into()));
        }
        debug!("Web search: {}", query.trim());
        let answer: InstantAnswer = self
            .client
            .get_json(self.search_url(query), RequestOptions::new())
            .await?;
        format_answer(&answer, self.max_topics)
            .ok_or_else(|| ProviderError::InvalidResponse(format!("no results for '{}'", query.trim())))
    }
}

fn format_answer(answer: &InstantAnswer, max_topics: usize) -> Option<String> {
    if let Some(text) = normalize_text(&answer.abstract_text) {
        return Some(match normalize_text(&answer.abstract_source) {
            Some(source) => format!("{text} (Source: {source})"),
            None => text,
        });
    }
    if let Some(text) = normalize_text(&answer.answer) {
        return Some(text);
    }

    let mut topics = Vec::new();
    collect_topics(&answer.related_topics, &mut topics, max_topics);
    let out: Vec<String> = topics
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {t}", i + 1))
        .collect();
    if out.is_empty() { None } else { Some(out.join("\n")) }
}

/// Flatten topic groups depth-first until `limit` texts are collected.
fn collect_topics(topics: &[RelatedTopic], out: &mut Vec<String>, limit: usize) {
    for topic in topics {
        if out.len() >= limit {
            return;
        }
        if let Some(text) = topic.text.as_deref().and_then(normalize_text) {
            out.push(text);
        }
        collect_topics(&topic.topics, out, limit);
    }
}

impl ProviderAdapter for SearchProvider {
    fn name(&self) -> &str {
        "search"
    }

    fn attempt<'a>(&'a self, query: &'a str) -> ProviderFuture<'a> {
        Box::pin(self.search(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RawResponse, RequestSpec, Transport, TransportFuture};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recording {
        body: String,
        urls: Arc<Mutex<Vec<String>>>,
    }

    impl Transport for Recording {
        fn send(&self, request: RequestSpec) -> TransportFuture<'_> {
            self.urls.lock().unwrap().push(request.url);
            let response = RawResponse::new(200, self.body.clone());
            Box::pin(async move { Ok(response) })
        }
    }

    fn provider(body: &str) -> (SearchProvider, Recording) {
        let backend = Recording {
            body: body.to_string(),
            ..Default::default()
        };
        let client = TransportClient::with_transport(TransportConfig::default(), backend.clone());
        (SearchProvider::with_client("http://search.test", client), backend)
    }

    #[tokio::test]
    async fn prefers_abstract_with_source() {
        let (provider, backend) = provider(
            r#"{"AbstractText":"Zilker Park is a 351-acre park.","AbstractSource":"Wikipedia","Answer":"ignored"}"#,
        );
        let text = provider.attempt("zilker park & trails").await.unwrap();
        assert_eq!(text, "Zilker Park is a 351-acre park. (Source: Wikipedia)");
        assert_eq!(
            backend.urls.lock().unwrap()[0],
            "http://search.test/?q=zilker+park+%26+trails&format=json&no_html=1&skip_disambig=1"
        );
    }

    #[tokio::test]
    async fn falls_back_to_related_topics() {
        let (provider, _) = provider(
            r#"{"AbstractText":"","RelatedTopics":[
                {"Text":"Stubb's BBQ - venue"},
                {"Name":"Bars","Topics":[{"Text":"Mohawk"},{"Text":"Elephant Room"}]},
                {"Text":"Continental Club"}
            ]}"#,
        );
        let provider = provider.with_max_topics(3);
        let text = provider.attempt("austin music").await.unwrap();
        assert_eq!(text, "1. Stubb's BBQ - venue\n2. Mohawk\n3. Elephant Room");
    }

    #[tokio::test]
    async fn empty_answer_is_invalid() {
        let (provider, _) = provider(r#"{"AbstractText":"","Answer":"","RelatedTopics":[]}"#);
        assert!(matches!(
            provider.attempt("nothing").await,
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn non_json_body_is_invalid() {
        let (provider, _) = provider("<html>captcha</html>");
        assert!(matches!(
            provider.attempt("anything").await,
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
