//! Offline provider answering from an in-memory keyword corpus.

use super::{ProviderAdapter, ProviderError, ProviderFuture};
use serde::{Deserialize, Serialize};

/// One corpus entry: the text is a candidate whenever any keyword appears
/// in the query.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LocalEntry {
    pub keywords: Vec<String>,
    pub text: String,
}

impl LocalEntry {
    pub fn new<K: Into<String>>(keywords: impl IntoIterator<Item = K>, text: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            text: text.into(),
        }
    }

    /// Number of distinct keywords present in the lowercased query.
    fn score(&self, query_lower: &str) -> usize {
        self.keywords
            .iter()
            .filter(|k| {
                let k = k.trim().to_lowercase();
                !k.is_empty() && contains_word(query_lower, &k)
            })
            .count()
    }
}

/// Whole-word (or whole-phrase) containment.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack.get(..start).and_then(|s| s.chars().next_back());
        let after = haystack
            .get(start + needle.len()..)
            .and_then(|s| s.chars().next());
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Keyword-matched offline answers. The entry matching the most keywords
/// wins; ties go to the earlier entry.
#[derive(Clone, Debug, Default)]
pub struct LocalProvider {
    name: String,
    entries: Vec<LocalEntry>,
}

impl LocalProvider {
    pub fn new(entries: Vec<LocalEntry>) -> Self {
        Self {
            name: "local".to_string(),
            entries,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add an entry (builder pattern).
    pub fn with_entry<K: Into<String>>(
        mut self,
        keywords: impl IntoIterator<Item = K>,
        text: impl Into<String>,
    ) -> Self {
        self.entries.push(LocalEntry::new(keywords, text));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-matching entry text, if any keyword matches.
    pub fn lookup(&self, query: &str) -> Option<&str> {
        let query_lower = query.to_lowercase();
        let mut best: Option<(usize, &LocalEntry)> = None;
        for entry in &self.entries {
            let score = entry.score(&query_lower);
            if score > 0 && best.is_none_or(|(s, _)| score > s) {
                best = Some((score, entry));
            }
        }
        best.map(|(_, e)| e.text.as_str())
    }
}

impl ProviderAdapter for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn attempt<'a>(&'a self, query: &'a str) -> ProviderFuture<'a> {
        let result = self
            .lookup(query)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Unavailable("no local entry matches".into()));
        Box::pin(async move { result })
    }
}
