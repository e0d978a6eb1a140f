//! Mapping selected results onto catalog attributes.
//!
//! The host calls in when a user picks a result in an autocomplete field. The
//! owning provider's detail pipeline is re-run for the selected identifier and
//! each configured path is evaluated against the detail document.

use crate::config::{HandlerSpec, Settings};
use crate::error::MappingError;
use crate::identity::{self, ExternalId};
use crate::recipe::RecipeEngine;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Attribute URI to value, in mapping order.
pub type AttributeValues = IndexMap<String, Value>;

/// Why a selection produced no mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No handler is configured for the identifier's provider
    NoHandler,
    /// Handlers exist for the provider, but none for this catalog
    CatalogMismatch,
    /// The question is not an autocomplete field of any handler in the catalog
    QuestionNotHandled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NoHandler => "no handler configured for this provider",
            SkipReason::CatalogMismatch => "provider has no handler for this catalog",
            SkipReason::QuestionNotHandled => "question is not an autocomplete field here",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MappingOutcome {
    Skipped { reason: SkipReason },
    Mapped { values: AttributeValues },
}

impl MappingOutcome {
    pub fn values(&self) -> Option<&AttributeValues> {
        match self {
            MappingOutcome::Mapped { values } => Some(values),
            MappingOutcome::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MappingEngine {
    settings: Arc<Settings>,
    engine: RecipeEngine,
}

impl MappingEngine {
    pub fn new(settings: Arc<Settings>, engine: RecipeEngine) -> Self {
        Self { settings, engine }
    }

    /// Fetch the detail document for `external_id` and map it for `catalog_uri`.
    ///
    /// A missing handler is a skip, not an error. Malformed or stale
    /// identifiers and detail fetch failures are errors.
    pub async fn map_detail(
        &self,
        external_id: &str,
        catalog_uri: &str,
    ) -> Result<MappingOutcome, MappingError> {
        let id = identity::decode(&self.settings, external_id)?;
        match self.settings.handler_for(id.id_prefix(), catalog_uri) {
            Some(handler) => self.run(handler, &id).await,
            None => Ok(self.skip_for(&id)),
        }
    }

    /// Like [`map_detail`](Self::map_detail), for a selection made in the
    /// question `question_uri`.
    ///
    /// Only handlers whose autocomplete field is that question are used.
    /// Values of questions no handler listens to are not decoded at all.
    pub async fn map_selection(
        &self,
        external_id: &str,
        catalog_uri: &str,
        question_uri: &str,
    ) -> Result<MappingOutcome, MappingError> {
        if self
            .settings
            .handlers_for_question(catalog_uri, question_uri)
            .next()
            .is_none()
        {
            debug!(question = %question_uri, "no handler listens to this question");
            return Ok(MappingOutcome::Skipped {
                reason: SkipReason::QuestionNotHandled,
            });
        }

        let id = identity::decode(&self.settings, external_id)?;
        let handler = self
            .settings
            .handlers_for_question(catalog_uri, question_uri)
            .find(|h| h.id_prefix == id.id_prefix());
        match handler {
            Some(handler) => self.run(handler, &id).await,
            None if self.settings.handler_for(id.id_prefix(), catalog_uri).is_some() => {
                debug!(external_id = %id, question = %question_uri, "handler listens elsewhere");
                Ok(MappingOutcome::Skipped {
                    reason: SkipReason::QuestionNotHandled,
                })
            }
            None => Ok(self.skip_for(&id)),
        }
    }

    /// Attribute URIs to clear when the autocomplete field is emptied.
    pub fn clear_selection(&self, catalog_uri: &str, question_uri: &str) -> Vec<String> {
        let mut uris: Vec<String> = Vec::new();
        for handler in self.settings.handlers_for_question(catalog_uri, question_uri) {
            for mapping in &handler.attribute_mapping {
                if !uris.contains(&mapping.attribute_uri) {
                    uris.push(mapping.attribute_uri.clone());
                }
            }
        }
        uris
    }

    async fn run(
        &self,
        handler: &HandlerSpec,
        id: &ExternalId,
    ) -> Result<MappingOutcome, MappingError> {
        let provider = self
            .settings
            .provider(id.id_prefix())
            .ok_or_else(|| crate::error::IdentifierError::UnknownPrefix {
                identifier: id.to_string(),
                id_prefix: id.id_prefix().to_string(),
            })?;

        let document = self
            .engine
            .detail(provider, id.native_id())
            .await
            .map_err(|source| MappingError::Provider {
                external_id: id.to_string(),
                source,
            })?;

        let values = apply_mapping(handler, &document);
        info!(
            external_id = %id,
            catalog = %handler.catalog_uri,
            mapped = values.len(),
            configured = handler.attribute_mapping.len(),
            "mapped detail document"
        );
        Ok(MappingOutcome::Mapped { values })
    }

    fn skip_for(&self, id: &ExternalId) -> MappingOutcome {
        let any_handler = self
            .settings
            .handlers()
            .iter()
            .any(|h| h.id_prefix == id.id_prefix());
        let reason = if any_handler {
            SkipReason::CatalogMismatch
        } else {
            SkipReason::NoHandler
        };
        debug!(external_id = %id, %reason, "selection not mapped");
        MappingOutcome::Skipped { reason }
    }
}

/// Evaluate every mapping against `document`.
///
/// Absent values are omitted. When several paths target one attribute, the
/// first that yields a value wins.
pub fn apply_mapping(handler: &HandlerSpec, document: &Value) -> AttributeValues {
    let mut values = AttributeValues::new();
    for mapping in &handler.attribute_mapping {
        if values.contains_key(&mapping.attribute_uri) {
            continue;
        }
        if let Some(value) = mapping.path.evaluate_scalar(document) {
            values.insert(mapping.attribute_uri.clone(), value);
        }
    }
    values
}
