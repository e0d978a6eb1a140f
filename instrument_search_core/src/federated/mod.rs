//! Aggregated search across every configured provider.
//!
//! This module provides:
//! - `SearchResult`: a display-ready hit carrying its provider-qualified id
//! - `AggregatedResponse`: merged results plus per-provider failures
//! - `Aggregator`: the concurrent fan-out engine
//!
//! # Example
//!
//! ```ignore
//! use instrument_search_core::federated::Aggregator;
//!
//! let aggregator = Aggregator::new(settings, RecipeEngine::new(fetcher));
//! let response = aggregator.search_default("seismometer").await;
//! ```

mod engine;
mod types;

pub use engine::Aggregator;
pub use types::{AggregatedResponse, SearchResult, SourceError};
