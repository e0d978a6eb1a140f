//! Serde shape of the TOML configuration document.
//!
//! These types mirror the file one to one and carry no behavior. They are
//! compiled into [`super::Settings`], which is what the engines consume.
//!
//! ```toml
//! [generic_search]
//! min_search_len = 3
//! max_total_hits = 25
//!
//! [[generic_search.providers]]
//! id_prefix = "ex"
//! text_prefix = "Example:"
//! base_url = "https://api.example.org"
//!
//! [generic_search.providers.search]
//! mode = "server"
//! url = "{base_url}/devices?q={query}"
//! items_path = "data"
//! id_path = "id"
//! label_path = "attributes.long_name || attributes.short_name"
//!
//! [[generic_search.providers.detail.steps]]
//! url = "{base_url}/devices/{id}"
//!
//! [[generic_search.handlers]]
//! id_prefix = "ex"
//! catalog_uri = "https://rdmo.example.org/terms/questions/instruments"
//! auto_complete_field_uri = "https://rdmo.example.org/terms/questions/instruments/name"
//!
//! [generic_search.handlers.attribute_mapping]
//! "attributes.long_name" = "https://rdmo.example.org/terms/domain/instrument/name"
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default minimum query length before any provider is contacted
pub const DEFAULT_MIN_SEARCH_LEN: usize = 3;

/// Default results per provider
pub const DEFAULT_MAX_HITS: i64 = 10;

/// Default per-provider timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default engine kind
pub const DEFAULT_ENGINE: &str = "recipe";

/// Default label template for search results
pub const DEFAULT_LABEL_TEMPLATE: &str = "{prefix} {label}";

/// Whole configuration file.
///
/// Only the `generic_search` dialect is understood. Other top-level tables
/// are ignored so the file can be shared with unrelated settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub generic_search: Option<GenericSearchSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenericSearchSection {
    /// Queries shorter than this return no results (default: 3)
    #[serde(default = "default_min_search_len")]
    pub min_search_len: usize,

    /// Cap on the merged result list (default: no cap)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_hits: Option<i64>,

    /// Per-provider timeout in milliseconds (default: 10000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Domain advertised in the outbound User-Agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent_domain: Option<String>,

    /// Contact advertised in the outbound User-Agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent_contact: Option<String>,

    #[serde(default)]
    pub providers: Vec<ProviderEntry>,

    #[serde(default)]
    pub handlers: Vec<HandlerEntry>,
}

fn default_min_search_len() -> usize {
    DEFAULT_MIN_SEARCH_LEN
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_hits() -> i64 {
    DEFAULT_MAX_HITS
}

fn default_engine() -> String {
    DEFAULT_ENGINE.to_string()
}

/// One `[[generic_search.providers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderEntry {
    #[serde(default)]
    pub id_prefix: String,

    #[serde(default = "default_engine")]
    pub engine: String,

    #[serde(default)]
    pub text_prefix: String,

    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_max_hits")]
    pub max_hits: i64,

    /// Overrides the global timeout for this provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Requires a handler for this provider; must equal `id_prefix`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchEntry>,

    #[serde(default)]
    pub detail: DetailEntry,
}

/// `[generic_search.providers.search]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchEntry {
    /// server | client_filter | sparql | wikidata_action
    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_template: Option<String>,

    /// Regex whose first capture group becomes the native id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_regex: Option<String>,

    /// client_filter: paths checked against the query
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_any_paths: Vec<String>,

    /// sparql: endpoint URL template (default: `{base_url}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// sparql: query template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Value of `{language}` in search templates (default: en)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// `[generic_search.providers.detail]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailEntry {
    #[serde(default)]
    pub steps: Vec<DetailStepEntry>,

    #[serde(default)]
    pub transforms: Vec<TransformEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailStepEntry {
    pub url: String,

    /// Path to the identifier handed to the next step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<String>,

    /// Key under which this step's response is kept in the detail document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_langs: Option<Vec<String>>,
}

/// One `[[generic_search.handlers]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerEntry {
    #[serde(default)]
    pub id_prefix: String,

    #[serde(default)]
    pub catalog_uri: String,

    #[serde(default)]
    pub auto_complete_field_uri: String,

    /// Path expression -> attribute URI, in document order
    #[serde(default)]
    pub attribute_mapping: IndexMap<String, String>,
}
