//! Aggregated search execution.
//!
//! Fans a query out to every configured provider and merges the results.

use super::{AggregatedResponse, SearchResult};
use crate::config::{ProviderSpec, Settings};
use crate::error::ProviderError;
use crate::identity::ExternalId;
use crate::recipe::{NativeHit, RecipeEngine};
use crate::template::{self, TemplateVars};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Engine for searching every configured provider at once.
#[derive(Debug, Clone)]
pub struct Aggregator {
    settings: Arc<Settings>,
    engine: RecipeEngine,
}

impl Aggregator {
    pub fn new(settings: Arc<Settings>, engine: RecipeEngine) -> Self {
        Self { settings, engine }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Search with the configured minimum query length.
    pub async fn search_default(&self, query: &str) -> AggregatedResponse {
        self.search(query, self.settings.min_search_len).await
    }

    /// Search every provider.
    ///
    /// A query shorter than `min_len` characters returns an empty response
    /// without contacting any provider. Provider failures and timeouts are
    /// recorded in the response and never abort it.
    ///
    /// Branches run concurrently inside this future; dropping it cancels all
    /// of them.
    pub async fn search(&self, query: &str, min_len: usize) -> AggregatedResponse {
        let start = Instant::now();
        let query = query.trim();

        if query.chars().count() < min_len {
            debug!(min_len, "query below minimum length, skipping providers");
            let mut response = AggregatedResponse::too_short(query);
            response.duration_ms = Some(start.elapsed().as_millis() as u64);
            return response;
        }

        let futures: Vec<_> = self
            .settings
            .providers()
            .iter()
            .map(|provider| {
                let engine = &self.engine;
                async move {
                    let branch_start = Instant::now();
                    let outcome = match timeout(provider.timeout, engine.search(provider, query))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::Timeout(provider.timeout.as_millis() as u64)),
                    };
                    debug!(
                        provider = %provider.id_prefix,
                        ok = outcome.is_ok(),
                        duration_ms = %branch_start.elapsed().as_millis(),
                        "provider branch finished"
                    );
                    (provider, outcome)
                }
            })
            .collect();

        // join_all keeps input order, so completion order never reaches the merge.
        let outcomes = futures::future::join_all(futures).await;

        let mut response = AggregatedResponse::new(query);
        let mut seen = HashSet::new();
        for (provider, outcome) in outcomes {
            match outcome {
                Ok(hits) => {
                    response.add_completed(&provider.id_prefix);
                    for (rank, hit) in hits.into_iter().take(provider.max_hits).enumerate() {
                        let result = to_result(provider, hit, rank + 1);
                        if seen.insert(result.external_id.clone()) {
                            response.results.push(result);
                        }
                    }
                }
                Err(error) => {
                    warn!(
                        provider = %provider.id_prefix,
                        code = error.code_str(),
                        "provider search failed: {}",
                        error
                    );
                    response.add_error(
                        &provider.id_prefix,
                        error.to_string(),
                        error.code_str(),
                        error.is_timeout(),
                    );
                }
            }
        }

        if let Some(cap) = self.settings.max_total_hits {
            response.results.truncate(cap);
        }

        response.duration_ms = Some(start.elapsed().as_millis() as u64);
        response
    }
}

fn to_result(provider: &ProviderSpec, hit: NativeHit, source_rank: usize) -> SearchResult {
    let mut vars = TemplateVars::new();
    vars.insert(template::PREFIX, provider.text_prefix.clone());
    vars.insert(template::LABEL, hit.label.clone());
    vars.insert(template::ID, hit.native_id.clone());

    let label = provider
        .search
        .label_template
        .render(&vars)
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|_| hit.label.clone());

    SearchResult {
        external_id: ExternalId::new(&provider.id_prefix, hit.native_id),
        label,
        provider: provider.id_prefix.clone(),
        source_rank,
        item: hit.item,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryFetcher;
    use serde_json::json;

    const CONFIG: &str = r#"
        [generic_search]
        min_search_len = 3

        [[generic_search.providers]]
        id_prefix = "ex"
        text_prefix = "Example:"
        base_url = "https://ex.example.org"
        max_hits = 2
        [generic_search.providers.search]
        url = "{base_url}/search?q={query}"
        id_path = "id"
        label_path = "name"

        [[generic_search.providers]]
        id_prefix = "other"
        base_url = "https://other.example.org"
        [generic_search.providers.search]
        url = "{base_url}/find/{query}"
        id_path = "id"
        label_template = "[{id}] {label}"
    "#;

    fn aggregator(fetcher: MemoryFetcher) -> Aggregator {
        let settings = Arc::new(Settings::from_toml_str(CONFIG).unwrap());
        Aggregator::new(settings, RecipeEngine::new(Arc::new(fetcher)))
    }

    #[tokio::test]
    async fn test_short_query_contacts_nobody() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let settings = Arc::new(Settings::from_toml_str(CONFIG).unwrap());
        let aggregator = Aggregator::new(settings, RecipeEngine::new(fetcher.clone()));

        let response = aggregator.search_default("ab").await;
        assert!(response.is_empty());
        assert!(response.skipped);
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_merges_in_configuration_order() {
        let fetcher = MemoryFetcher::new()
            .with_json(
                "https://ex.example.org/search?q=alp",
                json!([{"id": "1", "name": "Alpha"}, {"id": "2", "name": "Beta"}, {"id": "3", "name": "Gamma"}]),
            )
            .with_json("https://other.example.org/find/alp", json!([{"id": "9"}]))
            .with_delay("https://ex.example.org/search?q=alp", std::time::Duration::from_millis(30));

        let response = aggregator(fetcher).search_default("alp").await;
        let labels: Vec<_> = response.results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Example: Alpha", "Example: Beta", "[9] 9"]);
        assert_eq!(response.completed, vec!["ex", "other"]);
        assert!(!response.partial);
        assert_eq!(response.results_from("ex").count(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let fetcher = MemoryFetcher::new()
            .with_status("https://ex.example.org/search?q=alp", 502)
            .with_json("https://other.example.org/find/alp", json!([{"id": "9"}]));

        let response = aggregator(fetcher).search("alp", 3).await;
        assert_eq!(response.len(), 1);
        assert!(response.partial);
        assert_eq!(response.errors[0].provider, "ex");
        assert_eq!(response.errors[0].code, "upstream_error");
    }

    #[tokio::test]
    async fn test_duplicates_dropped() {
        let fetcher = MemoryFetcher::new()
            .with_json(
                "https://ex.example.org/search?q=alp",
                json!([{"id": "1", "name": "Alpha"}, {"id": "1", "name": "Alpha again"}]),
            )
            .with_json("https://other.example.org/find/alp", json!([]));

        let response = aggregator(fetcher).search("alp", 3).await;
        assert_eq!(response.len(), 1);
        assert_eq!(response.results[0].label, "Example: Alpha");
    }
}
