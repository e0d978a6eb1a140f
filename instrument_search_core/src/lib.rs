//! Recipe-driven search over external instrument registries.
//!
//! Providers are declared in a TOML document: how to query a registry, how to
//! pull ids and labels out of its answers, and how to fetch a detail record.
//! Handlers map detail records onto catalog attribute URIs.
//!
//! ```ignore
//! use instrument_search_core::{ConfigSource, InstrumentSearch, Settings};
//!
//! let settings = Settings::load(&ConfigSource::default())?;
//! let search = InstrumentSearch::connect(settings)?;
//! let response = search.search("seismometer").await;
//! for result in &response.results {
//!     println!("{} {}", result.external_id, result.label);
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod federated;
pub mod handlers;
pub mod identity;
pub mod path_query;
pub mod recipe;
pub mod template;

pub use client::{FetchRequest, Fetcher, HttpFetcher, MemoryFetcher, Transport};
pub use config::{ConfigSource, ProviderSpec, Settings};
pub use error::{ConfigError, IdentifierError, MappingError, ProviderError};
pub use federated::{AggregatedResponse, Aggregator, SearchResult, SourceError};
pub use handlers::{AttributeValues, MappingEngine, MappingOutcome, SkipReason};
pub use identity::ExternalId;
pub use path_query::PathExpr;
pub use recipe::RecipeEngine;

use std::sync::Arc;

/// Search and mapping over one configuration, sharing a transport.
#[derive(Debug, Clone)]
pub struct InstrumentSearch {
    settings: Arc<Settings>,
    aggregator: Aggregator,
    mapper: MappingEngine,
}

impl InstrumentSearch {
    pub fn new(settings: Arc<Settings>, fetcher: Arc<dyn Fetcher>) -> Self {
        let engine = RecipeEngine::new(fetcher);
        Self {
            aggregator: Aggregator::new(Arc::clone(&settings), engine.clone()),
            mapper: MappingEngine::new(Arc::clone(&settings), engine),
            settings,
        }
    }

    /// Build with an [`HttpFetcher`] configured from `settings`.
    pub fn connect(settings: Settings) -> Result<Self, ProviderError> {
        let fetcher = HttpFetcher::new(&settings.user_agent, settings.timeout)?;
        Ok(Self::new(Arc::new(settings), Arc::new(fetcher)))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn mapper(&self) -> &MappingEngine {
        &self.mapper
    }

    /// Search with the configured minimum query length.
    pub async fn search(&self, query: &str) -> AggregatedResponse {
        self.aggregator.search_default(query).await
    }

    pub async fn map_detail(
        &self,
        external_id: &str,
        catalog_uri: &str,
    ) -> Result<MappingOutcome, MappingError> {
        self.mapper.map_detail(external_id, catalog_uri).await
    }
}
