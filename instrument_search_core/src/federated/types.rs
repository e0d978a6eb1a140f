//! Result types for aggregated searches.

use crate::identity::ExternalId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A search hit ready for display by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Provider-qualified identifier, stored by the host as the selected value
    pub external_id: ExternalId,

    /// Display text, prefixed with the provider's `text_prefix`
    pub label: String,

    /// Provider that produced the hit
    pub provider: String,

    /// Rank within the provider (1-indexed, before merge)
    pub source_rank: usize,

    /// The matched item as the registry returned it
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub item: Value,
}

impl SearchResult {
    /// The `(value, label)` pair an option-set provider hands to its host.
    pub fn as_option(&self) -> (String, &str) {
        (self.external_id.to_string(), self.label.as_str())
    }
}

/// A provider that failed during aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceError {
    /// `id_prefix` of the provider that failed
    pub provider: String,

    /// Error message
    pub error: String,

    /// Stable error code (`timeout`, `upstream_error`, ...)
    pub code: String,

    /// Whether this was a timeout
    #[serde(default)]
    pub is_timeout: bool,
}

/// Merged results of one search across every configured provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResponse {
    /// The search query
    pub query: String,

    /// Results in configuration order, then provider order
    pub results: Vec<SearchResult>,

    /// Providers that completed successfully
    pub completed: Vec<String>,

    /// Providers that failed (partial results)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SourceError>,

    /// Whether results are partial (some providers failed/timed out)
    #[serde(default)]
    pub partial: bool,

    /// Whether the query was below the minimum length and nothing was sent
    #[serde(default)]
    pub skipped: bool,

    /// Total time taken (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl AggregatedResponse {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            completed: Vec::new(),
            errors: Vec::new(),
            partial: false,
            skipped: false,
            duration_ms: None,
        }
    }

    /// Response for a query below the minimum length.
    pub fn too_short(query: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::new(query)
        }
    }

    pub fn add_completed(&mut self, provider: impl Into<String>) {
        self.completed.push(provider.into());
    }

    /// Add an error from a failed provider.
    pub fn add_error(
        &mut self,
        provider: impl Into<String>,
        error: impl Into<String>,
        code: impl Into<String>,
        is_timeout: bool,
    ) {
        self.errors.push(SourceError {
            provider: provider.into(),
            error: error.into(),
            code: code.into(),
            is_timeout,
        });
        self.partial = true;
    }

    /// Results contributed by one provider.
    pub fn results_from<'a>(&'a self, provider: &'a str) -> impl Iterator<Item = &'a SearchResult> {
        self.results.iter().filter(move |r| r.provider == provider)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}
