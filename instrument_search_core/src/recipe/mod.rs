//! Recipe execution.
//!
//! A recipe is the declarative search descriptor plus detail pipeline of one
//! provider. [`RecipeEngine`] interprets it against a [`Fetcher`].

mod detail;
mod search;
pub mod transforms;

use crate::client::Fetcher;
use crate::config::ProviderSpec;
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One normalized search hit, before identity encoding and label templating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeHit {
    pub native_id: String,
    pub label: String,
    /// The matched item as the registry returned it
    pub item: Value,
}

#[derive(Clone)]
pub struct RecipeEngine {
    fetcher: Arc<dyn Fetcher>,
}

impl RecipeEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Run the provider's search step.
    ///
    /// Hits come back in registry order; truncation to `max_hits` is left to
    /// the caller.
    pub async fn search(
        &self,
        provider: &ProviderSpec,
        query: &str,
    ) -> Result<Vec<NativeHit>, ProviderError> {
        search::run(self.fetcher.as_ref(), provider, query).await
    }

    /// Run the provider's detail pipeline and return the detail document.
    pub async fn detail(
        &self,
        provider: &ProviderSpec,
        native_id: &str,
    ) -> Result<Value, ProviderError> {
        detail::run(self.fetcher.as_ref(), provider, native_id).await
    }
}

impl std::fmt::Debug for RecipeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeEngine").finish_non_exhaustive()
    }
}
