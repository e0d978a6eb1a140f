//! Configuration model.
//!
//! The TOML document ([`schema`]) is compiled once at startup into an
//! immutable [`Settings`] value. Compilation is where every recipe is checked:
//! path expressions are parsed, templates are dry-run against the placeholders
//! their execution context provides, and cross references between providers
//! and handlers are resolved. A document that fails any check is rejected as a
//! whole.

mod loader;
pub mod schema;

pub use loader::{
    resolve_config_path, ConfigSource, CONFIG_DIR_NAME, CONFIG_FILE_NAME_ENV, CONFIG_FILE_PATH_ENV,
    DEFAULT_CONFIG_FILE_NAME,
};

use crate::client::Transport;
use crate::error::ConfigError;
use crate::path_query::PathExpr;
use crate::template::{self, Template};
use once_cell::sync::Lazy;
use regex::Regex;
use schema::{
    ConfigDocument, DetailEntry, GenericSearchSection, HandlerEntry, ProviderEntry, SearchEntry,
    DEFAULT_LABEL_TEMPLATE,
};
use std::collections::HashSet;
use std::time::Duration;

static ID_PREFIX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap());

const DEFAULT_WIKIDATA_URL: &str = "{base_url}/w/api.php?action=wbsearchentities&search={query}&language={language}&uselang={language}&type=item&format=json&limit={max_hits}";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_PREFER_LANGS: &[&str] = &["en", "de"];

/// Engine kinds a provider can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Recipe,
}

/// How a provider's search step talks to its registry.
#[derive(Debug, Clone)]
pub enum SearchMode {
    /// One GET with the query substituted into the URL.
    Server { url: Template },
    /// One GET of an unparameterized listing, filtered locally.
    ClientFilter {
        url: Template,
        filter_any_paths: Vec<PathExpr>,
    },
    /// A SPARQL query POSTed to a triple store.
    Sparql { endpoint: Template, query: Template },
    /// The `wbsearchentities` action of a Wikibase API.
    WikidataAction { url: Template },
}

impl SearchMode {
    pub fn name(&self) -> &'static str {
        match self {
            SearchMode::Server { .. } => "server",
            SearchMode::ClientFilter { .. } => "client_filter",
            SearchMode::Sparql { .. } => "sparql",
            SearchMode::WikidataAction { .. } => "wikidata_action",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchDescriptor {
    pub mode: SearchMode,
    /// Value of `{language}` in every search template
    pub language: String,
    /// Transport of the search `url` or SPARQL `endpoint`
    pub transport: Transport,
    pub items_path: PathExpr,
    pub id_path: PathExpr,
    pub label_path: PathExpr,
    pub label_template: Template,
    pub id_regex: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct DetailStep {
    pub url: Template,
    pub transport: Transport,
    pub extract: Option<PathExpr>,
    pub assign: Option<String>,
}

/// Post-processing applied to a detail document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailTransform {
    WikidataFlatten { prefer_langs: Vec<String> },
    TrimStrings,
}

#[derive(Debug, Clone, Default)]
pub struct DetailPipeline {
    pub steps: Vec<DetailStep>,
    pub transforms: Vec<DetailTransform>,
}

impl DetailPipeline {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub id_prefix: String,
    pub engine: Engine,
    pub text_prefix: String,
    pub base_url: String,
    pub max_hits: usize,
    pub timeout: Duration,
    pub handler: Option<String>,
    pub search: SearchDescriptor,
    pub detail: DetailPipeline,
}

#[derive(Debug, Clone)]
pub struct AttributeMapping {
    pub path: PathExpr,
    pub attribute_uri: String,
}

#[derive(Debug, Clone)]
pub struct HandlerSpec {
    pub id_prefix: String,
    pub catalog_uri: String,
    pub auto_complete_field_uri: String,
    pub attribute_mapping: Vec<AttributeMapping>,
}

/// The compiled, immutable configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub min_search_len: usize,
    pub max_total_hits: Option<usize>,
    pub timeout: Duration,
    pub user_agent: String,
    providers: Vec<ProviderSpec>,
    handlers: Vec<HandlerSpec>,
}

impl Settings {
    /// Parse and compile a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let document: ConfigDocument = toml::from_str(content)?;
        Self::from_document(document)
    }

    /// Load and compile the document at `source`.
    pub fn load(source: &ConfigSource) -> Result<Self, ConfigError> {
        let path = source.resolve();
        tracing::debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|source| {
            tracing::error!("Cannot open configuration file: {}", path.display());
            ConfigError::Io {
                path: path.clone(),
                source,
            }
        })?;
        let settings = Self::from_toml_str(&content)?;
        tracing::info!(
            providers = settings.providers.len(),
            handlers = settings.handlers.len(),
            "Loaded configuration from {}",
            path.display()
        );
        Ok(settings)
    }

    pub fn from_document(document: ConfigDocument) -> Result<Self, ConfigError> {
        let section = document.generic_search.ok_or_else(|| {
            ConfigError::Invalid(
                "missing [generic_search] table (the legacy per-class schema is not supported)"
                    .to_string(),
            )
        })?;
        compile(section)
    }

    /// Providers in configuration order.
    pub fn providers(&self) -> &[ProviderSpec] {
        &self.providers
    }

    pub fn provider(&self, id_prefix: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|p| p.id_prefix == id_prefix)
    }

    pub fn handlers(&self) -> &[HandlerSpec] {
        &self.handlers
    }

    /// The handler for a provider within one catalog, if any.
    pub fn handler_for(&self, id_prefix: &str, catalog_uri: &str) -> Option<&HandlerSpec> {
        self.handlers
            .iter()
            .find(|h| h.id_prefix == id_prefix && h.catalog_uri == catalog_uri)
    }

    /// Handlers of a catalog that populate the given question.
    pub fn handlers_for_question<'a>(
        &'a self,
        catalog_uri: &'a str,
        question_uri: &'a str,
    ) -> impl Iterator<Item = &'a HandlerSpec> + 'a {
        self.handlers.iter().filter(move |h| {
            h.catalog_uri == catalog_uri && h.auto_complete_field_uri == question_uri
        })
    }

    pub fn is_known_prefix(&self, id_prefix: &str) -> bool {
        self.provider(id_prefix).is_some()
    }
}

/// Outbound User-Agent, with optional domain and contact.
pub fn build_user_agent(domain: Option<&str>, contact: Option<&str>) -> String {
    let base = concat!(
        "rdmo/",
        env!("CARGO_PKG_VERSION"),
        " Instrument Search Plugin"
    );

    let mut meta = Vec::new();
    if let Some(domain) = domain.filter(|d| !d.trim().is_empty()) {
        meta.push(format!("https://{}", domain.trim()));
    }
    if let Some(contact) = contact.filter(|c| !c.trim().is_empty()) {
        meta.push(contact.trim().to_string());
    }

    if meta.is_empty() {
        base.to_string()
    } else {
        format!("{} (+{})", base, meta.join("; "))
    }
}

fn compile(section: GenericSearchSection) -> Result<Settings, ConfigError> {
    if section.timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "timeout_ms must be a positive integer".to_string(),
        ));
    }
    let max_total_hits = match section.max_total_hits {
        None => None,
        Some(n) if n > 0 => Some(n as usize),
        Some(n) => {
            return Err(ConfigError::Invalid(format!(
                "max_total_hits must be a positive integer, got {}",
                n
            )))
        }
    };
    let timeout = Duration::from_millis(section.timeout_ms);

    let mut seen = HashSet::new();
    let mut providers = Vec::with_capacity(section.providers.len());
    for entry in section.providers {
        let provider = compile_provider(entry, timeout)?;
        if !seen.insert(provider.id_prefix.clone()) {
            return Err(ConfigError::Provider {
                id_prefix: provider.id_prefix,
                message: "id_prefix is declared more than once".to_string(),
            });
        }
        providers.push(provider);
    }

    let mut handlers = Vec::with_capacity(section.handlers.len());
    for entry in section.handlers {
        handlers.push(compile_handler(entry, &providers, &handlers)?);
    }

    // Handlers are keyed by the provider's id_prefix, so a reference can
    // only name the provider itself.
    for provider in &providers {
        if let Some(reference) = &provider.handler {
            if reference != &provider.id_prefix {
                return Err(ConfigError::Provider {
                    id_prefix: provider.id_prefix.clone(),
                    message: format!(
                        "handler '{}' must equal the provider's own id_prefix",
                        reference
                    ),
                });
            }
            if !handlers.iter().any(|h| &h.id_prefix == reference) {
                return Err(ConfigError::Provider {
                    id_prefix: provider.id_prefix.clone(),
                    message: format!("handler '{}' is not declared", reference),
                });
            }
        }
    }

    if providers.is_empty() {
        tracing::warn!("Configuration declares no providers; every search will be empty");
    }

    Ok(Settings {
        min_search_len: section.min_search_len,
        max_total_hits,
        timeout,
        user_agent: build_user_agent(
            section.user_agent_domain.as_deref(),
            section.user_agent_contact.as_deref(),
        ),
        providers,
        handlers,
    })
}

fn compile_provider(entry: ProviderEntry, default_timeout: Duration) -> Result<ProviderSpec, ConfigError> {
    let id_prefix = entry.id_prefix.trim().to_string();
    if id_prefix.is_empty() {
        return Err(ConfigError::Invalid(
            "every provider needs a non-empty id_prefix".to_string(),
        ));
    }
    let invalid = |message: String| ConfigError::Provider {
        id_prefix: id_prefix.clone(),
        message,
    };

    if !ID_PREFIX_PATTERN.is_match(&id_prefix) {
        return Err(invalid(
            "id_prefix may only contain ASCII letters, digits, '_', '-' and '.'".to_string(),
        ));
    }

    let engine = match entry.engine.as_str() {
        "recipe" => Engine::Recipe,
        other => return Err(invalid(format!("unknown engine '{}'", other))),
    };

    let base_url = entry.base_url.trim().trim_end_matches('/').to_string();
    if base_url.is_empty() {
        return Err(invalid("base_url is required".to_string()));
    }
    let base_scheme = url::Url::parse(&base_url)
        .map_err(|e| invalid(format!("base_url '{}' is not a valid URL: {}", base_url, e)))?
        .scheme()
        .to_string();

    if entry.max_hits <= 0 {
        return Err(invalid(format!(
            "max_hits must be a positive integer, got {}",
            entry.max_hits
        )));
    }

    let timeout = match entry.timeout_ms {
        Some(0) => return Err(invalid("timeout_ms must be a positive integer".to_string())),
        Some(ms) => Duration::from_millis(ms),
        None => default_timeout,
    };

    let search = entry
        .search
        .ok_or_else(|| invalid("a [search] table is required".to_string()))?;
    let search = compile_search(&id_prefix, &base_scheme, search)?;
    let detail = compile_detail(&id_prefix, &base_scheme, entry.detail)?;

    let handler = entry
        .handler
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());

    Ok(ProviderSpec {
        id_prefix,
        engine,
        text_prefix: entry.text_prefix.trim().to_string(),
        base_url,
        max_hits: entry.max_hits as usize,
        timeout,
        handler,
        search,
        detail,
    })
}

fn compile_search(
    id_prefix: &str,
    base_scheme: &str,
    entry: SearchEntry,
) -> Result<SearchDescriptor, ConfigError> {
    let context = |field: &str| format!("provider '{}' search.{}", id_prefix, field);
    let missing = |field: &str| ConfigError::Provider {
        id_prefix: id_prefix.to_string(),
        message: format!("search.{} is required", field),
    };

    let mode_name = entry.mode.as_deref().unwrap_or("server");
    let is_wikidata = mode_name == "wikidata_action";

    let mode = match mode_name {
        "server" => SearchMode::Server {
            url: compile_template(
                &context("url"),
                entry.url.as_deref().ok_or_else(|| missing("url"))?,
                template::SEARCH_URL_VARS,
            )?,
        },
        "client_filter" => SearchMode::ClientFilter {
            url: compile_template(
                &context("url"),
                entry.url.as_deref().ok_or_else(|| missing("url"))?,
                template::SEARCH_URL_VARS,
            )?,
            filter_any_paths: entry
                .filter_any_paths
                .iter()
                .map(|p| compile_path(&context("filter_any_paths"), p))
                .collect::<Result<_, _>>()?,
        },
        "sparql" => SearchMode::Sparql {
            endpoint: compile_template(
                &context("endpoint"),
                entry.endpoint.as_deref().unwrap_or("{base_url}"),
                template::SPARQL_ENDPOINT_VARS,
            )?,
            query: compile_template(
                &context("query"),
                entry.query.as_deref().ok_or_else(|| missing("query"))?,
                template::SPARQL_QUERY_VARS,
            )?,
        },
        "wikidata_action" => SearchMode::WikidataAction {
            url: compile_template(
                &context("url"),
                entry.url.as_deref().unwrap_or(DEFAULT_WIKIDATA_URL),
                template::SEARCH_URL_VARS,
            )?,
        },
        other => {
            return Err(ConfigError::Provider {
                id_prefix: id_prefix.to_string(),
                message: format!(
                    "unknown search mode '{}' (expected server, client_filter, sparql or wikidata_action)",
                    other
                ),
            })
        }
    };

    let unused = |field: &str| ConfigError::Provider {
        id_prefix: id_prefix.to_string(),
        message: format!("search.{} is not used by mode '{}'", field, mode_name),
    };
    let is_sparql = matches!(mode, SearchMode::Sparql { .. });
    if !matches!(mode, SearchMode::ClientFilter { .. }) && !entry.filter_any_paths.is_empty() {
        return Err(unused("filter_any_paths"));
    }
    if !is_sparql && entry.endpoint.is_some() {
        return Err(unused("endpoint"));
    }
    if !is_sparql && entry.query.is_some() {
        return Err(unused("query"));
    }
    if is_sparql && entry.url.is_some() {
        return Err(unused("url"));
    }

    let language = match entry.language.as_deref().map(str::trim) {
        None => DEFAULT_LANGUAGE.to_string(),
        Some("") => {
            return Err(ConfigError::Provider {
                id_prefix: id_prefix.to_string(),
                message: "search.language is empty".to_string(),
            })
        }
        Some(language) => language.to_string(),
    };

    let transport = match &mode {
        SearchMode::Server { url }
        | SearchMode::ClientFilter { url, .. }
        | SearchMode::WikidataAction { url } => {
            url_transport(&context("url"), url, base_scheme)?
        }
        SearchMode::Sparql { endpoint, .. } => {
            match url_transport(&context("endpoint"), endpoint, base_scheme)? {
                Transport::Network => Transport::Network,
                Transport::LocalFile => {
                    return Err(ConfigError::Provider {
                        id_prefix: id_prefix.to_string(),
                        message: "search.endpoint must be an http(s) URL".to_string(),
                    })
                }
            }
        }
    };

    let default_items = if is_wikidata { "search" } else { "@" };
    let items_path = compile_path(
        &context("items_path"),
        entry.items_path.as_deref().unwrap_or(default_items),
    )?;

    let id_source = match (&entry.id_path, is_wikidata) {
        (Some(path), _) => path.as_str(),
        (None, true) => "id",
        (None, false) => return Err(missing("id_path")),
    };
    let id_path = compile_path(&context("id_path"), id_source)?;

    let label_source = match (&entry.label_path, is_wikidata) {
        (Some(path), _) => path.as_str(),
        (None, true) => "label || id",
        (None, false) => id_source,
    };
    let label_path = compile_path(&context("label_path"), label_source)?;

    let label_template = compile_template(
        &context("label_template"),
        entry
            .label_template
            .as_deref()
            .unwrap_or(DEFAULT_LABEL_TEMPLATE),
        template::LABEL_VARS,
    )?;

    let id_regex = match &entry.id_regex {
        None => None,
        Some(pattern) => {
            let regex = Regex::new(pattern).map_err(|e| ConfigError::Provider {
                id_prefix: id_prefix.to_string(),
                message: format!("search.id_regex is invalid: {}", e),
            })?;
            if regex.captures_len() < 2 {
                return Err(ConfigError::Provider {
                    id_prefix: id_prefix.to_string(),
                    message: "search.id_regex needs a capture group".to_string(),
                });
            }
            Some(regex)
        }
    };

    Ok(SearchDescriptor {
        mode,
        language,
        transport,
        items_path,
        id_path,
        label_path,
        label_template,
        id_regex,
    })
}

fn compile_detail(
    id_prefix: &str,
    base_scheme: &str,
    entry: DetailEntry,
) -> Result<DetailPipeline, ConfigError> {
    let invalid = |message: String| ConfigError::Provider {
        id_prefix: id_prefix.to_string(),
        message,
    };

    let last = entry.steps.len().saturating_sub(1);
    let mut steps = Vec::with_capacity(entry.steps.len());
    for (index, step) in entry.steps.into_iter().enumerate() {
        let context = format!("provider '{}' detail.steps[{}]", id_prefix, index);
        let url = compile_template(&context, &step.url, template::DETAIL_URL_VARS)?;
        let transport = url_transport(&context, &url, base_scheme)?;
        let extract = step
            .extract
            .as_deref()
            .map(|p| compile_path(&context, p))
            .transpose()?;
        let assign = step.assign.map(|a| a.trim().to_string());

        if index == last && extract.is_some() {
            return Err(invalid(format!(
                "detail.steps[{}] is the final step and cannot declare extract",
                index
            )));
        }
        if let Some(key) = &assign {
            if key.is_empty() {
                return Err(invalid(format!("detail.steps[{}].assign is empty", index)));
            }
            if index == last {
                return Err(invalid(format!(
                    "detail.steps[{}] is the final step and cannot declare assign",
                    index
                )));
            }
        }

        steps.push(DetailStep {
            url,
            transport,
            extract,
            assign,
        });
    }

    let transforms = entry
        .transforms
        .into_iter()
        .map(|t| match t.name.as_str() {
            "wikidata_flatten" => Ok(DetailTransform::WikidataFlatten {
                prefer_langs: t.prefer_langs.unwrap_or_else(|| {
                    DEFAULT_PREFER_LANGS.iter().map(|l| l.to_string()).collect()
                }),
            }),
            "trim_strings" if t.prefer_langs.is_none() => Ok(DetailTransform::TrimStrings),
            "trim_strings" => Err(invalid(
                "transform trim_strings takes no prefer_langs".to_string(),
            )),
            other => Err(invalid(format!("unknown detail transform '{}'", other))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DetailPipeline { steps, transforms })
}

fn compile_handler(
    entry: HandlerEntry,
    providers: &[ProviderSpec],
    declared: &[HandlerSpec],
) -> Result<HandlerSpec, ConfigError> {
    let id_prefix = entry.id_prefix.trim().to_string();
    let catalog_uri = entry.catalog_uri.trim().to_string();
    let invalid = |message: &str| ConfigError::Handler {
        id_prefix: id_prefix.clone(),
        catalog_uri: catalog_uri.clone(),
        message: message.to_string(),
    };

    if id_prefix.is_empty() {
        return Err(invalid("id_prefix is required"));
    }
    if catalog_uri.is_empty() {
        return Err(invalid("catalog_uri is required"));
    }
    let auto_complete_field_uri = entry.auto_complete_field_uri.trim().to_string();
    if auto_complete_field_uri.is_empty() {
        return Err(invalid("auto_complete_field_uri is required"));
    }

    let provider = providers
        .iter()
        .find(|p| p.id_prefix == id_prefix)
        .ok_or_else(|| invalid("no provider is configured with this id_prefix"))?;
    if provider.detail.is_empty() {
        return Err(invalid("the provider declares no detail steps"));
    }
    if declared
        .iter()
        .any(|h| h.id_prefix == id_prefix && h.catalog_uri == catalog_uri)
    {
        return Err(invalid("a handler for this provider and catalog already exists"));
    }

    let mut attribute_mapping = Vec::with_capacity(entry.attribute_mapping.len());
    for (expression, attribute_uri) in entry.attribute_mapping {
        let attribute_uri = attribute_uri.trim().to_string();
        if attribute_uri.is_empty() {
            return Err(invalid(&format!(
                "attribute_mapping '{}' has an empty attribute URI",
                expression
            )));
        }
        let context = format!("handler '{}' attribute_mapping", id_prefix);
        attribute_mapping.push(AttributeMapping {
            path: compile_path(&context, &expression)?,
            attribute_uri,
        });
    }

    Ok(HandlerSpec {
        id_prefix,
        catalog_uri,
        auto_complete_field_uri,
        attribute_mapping,
    })
}

fn compile_path(context: &str, expression: &str) -> Result<PathExpr, ConfigError> {
    PathExpr::parse(expression).map_err(|source| ConfigError::PathSyntax {
        context: context.to_string(),
        source,
    })
}

fn compile_template(
    context: &str,
    source: &str,
    allowed: &[&'static str],
) -> Result<Template, ConfigError> {
    let as_error = |e: template::TemplateError| ConfigError::Template {
        context: context.to_string(),
        message: e.to_string(),
    };
    let compiled = Template::parse(source).map_err(as_error)?;
    compiled.dry_run(allowed).map_err(as_error)?;
    Ok(compiled)
}

fn scheme_transport(scheme: &str) -> Option<Transport> {
    match scheme {
        "http" | "https" => Some(Transport::Network),
        "file" => Some(Transport::LocalFile),
        _ => None,
    }
}

/// Transport of a URL template, from its literal start.
///
/// `{base_url}` contributes its own scheme. Any other leading placeholder is
/// request data and may only render to a network URL.
fn url_transport(
    context: &str,
    url: &Template,
    base_scheme: &str,
) -> Result<Transport, ConfigError> {
    let unsupported = |scheme: &str| ConfigError::Template {
        context: context.to_string(),
        message: format!("'{}': unsupported scheme '{}'", url, scheme),
    };

    if let Some(name) = url.leading_placeholder() {
        if name == template::BASE_URL {
            return scheme_transport(base_scheme).ok_or_else(|| unsupported(base_scheme));
        }
        return Ok(Transport::Network);
    }

    let prefix = url.literal_prefix();
    match prefix.find(':').map(|end| &prefix[..end]) {
        // A single letter is a drive, not a scheme.
        Some(scheme)
            if scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            let scheme = scheme.to_ascii_lowercase();
            scheme_transport(&scheme).ok_or_else(|| unsupported(&scheme))
        }
        _ => Ok(Transport::LocalFile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [generic_search]
        min_search_len = 2
        max_total_hits = 5
        user_agent_domain = "rdmo.example.org"
        user_agent_contact = "admin@example.org"

        [[generic_search.providers]]
        id_prefix = "ex"
        text_prefix = "Example:"
        base_url = "https://api.example.org/"
        max_hits = 2
        handler = "ex"

        [generic_search.providers.search]
        mode = "server"
        url = "{base_url}/devices?q={query}"
        items_path = "data"
        id_path = "id"
        label_path = "name"

        [[generic_search.providers.detail.steps]]
        url = "{base_url}/devices/{id}"

        [[generic_search.providers]]
        id_prefix = "wd"
        base_url = "https://www.wikidata.org"
        [generic_search.providers.search]
        mode = "wikidata_action"

        [[generic_search.handlers]]
        id_prefix = "ex"
        catalog_uri = "https://rdmo.example.org/catalog"
        auto_complete_field_uri = "https://rdmo.example.org/question"
        [generic_search.handlers.attribute_mapping]
        "longName" = "U1"
        "serialNumber" = "U2"
    "#;

    fn expect_invalid(doc: &str) -> ConfigError {
        match Settings::from_toml_str(doc) {
            Ok(_) => panic!("configuration should have been rejected"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_compiles_valid_document() {
        let settings = Settings::from_toml_str(VALID).unwrap();
        assert_eq!(settings.min_search_len, 2);
        assert_eq!(settings.max_total_hits, Some(5));
        assert_eq!(settings.providers().len(), 2);

        let ex = settings.provider("ex").unwrap();
        assert_eq!(ex.base_url, "https://api.example.org");
        assert_eq!(ex.max_hits, 2);
        assert_eq!(ex.search.mode.name(), "server");
        assert_eq!(ex.detail.steps.len(), 1);

        let wd = settings.provider("wd").unwrap();
        assert_eq!(wd.max_hits, 10);
        assert_eq!(wd.search.items_path.as_str(), "search");
        assert!(matches!(&wd.search.mode, SearchMode::WikidataAction { .. }));
        assert_eq!(wd.search.language, "en");
        assert_eq!(wd.search.transport, Transport::Network);

        let handler = settings
            .handler_for("ex", "https://rdmo.example.org/catalog")
            .unwrap();
        assert_eq!(handler.attribute_mapping[0].attribute_uri, "U1");
        assert_eq!(handler.attribute_mapping[1].path.as_str(), "serialNumber");
        assert!(settings.handler_for("ex", "other").is_none());
    }

    #[test]
    fn test_user_agent() {
        let settings = Settings::from_toml_str(VALID).unwrap();
        assert!(settings
            .user_agent
            .ends_with("Instrument Search Plugin (+https://rdmo.example.org; admin@example.org)"));
        assert_eq!(
            build_user_agent(None, Some(" ")),
            concat!("rdmo/", env!("CARGO_PKG_VERSION"), " Instrument Search Plugin")
        );
    }

    #[test]
    fn test_legacy_dialect_rejected() {
        let err = expect_invalid("[InstrumentsOptionSetProvider]\nmin_search_len = 3\n");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let doc = VALID.replace("id_prefix = \"wd\"", "id_prefix = \"ex\"");
        let err = expect_invalid(&doc);
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_prefix_with_separator_rejected() {
        let doc = VALID.replace("id_prefix = \"wd\"", "id_prefix = \"w:d\"");
        assert!(matches!(expect_invalid(&doc), ConfigError::Provider { .. }));
    }

    #[test]
    fn test_unresolvable_placeholder_rejected() {
        let doc = VALID.replace("{base_url}/devices?q={query}", "{base_url}/devices?q={term}");
        let err = expect_invalid(&doc);
        assert!(matches!(err, ConfigError::Template { .. }));
        assert!(err.to_string().contains("term"));
    }

    #[test]
    fn test_malformed_path_rejected() {
        let doc = VALID.replace("label_path = \"name\"", "label_path = \"name.\"");
        assert!(matches!(expect_invalid(&doc), ConfigError::PathSyntax { .. }));

        let doc = VALID.replace("\"serialNumber\" = \"U2\"", "\"serial[\" = \"U2\"");
        assert!(matches!(expect_invalid(&doc), ConfigError::PathSyntax { .. }));
    }

    #[test]
    fn test_non_positive_limits_rejected() {
        let doc = VALID.replace("max_hits = 2", "max_hits = 0");
        assert!(expect_invalid(&doc).to_string().contains("max_hits"));

        let doc = VALID.replace("max_total_hits = 5", "max_total_hits = -1");
        assert!(expect_invalid(&doc).to_string().contains("max_total_hits"));
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        let doc = VALID.replace("base_url = \"https://www.wikidata.org\"", "");
        assert!(expect_invalid(&doc).to_string().contains("base_url"));

        let doc = VALID.replace("id_path = \"id\"", "");
        assert!(expect_invalid(&doc).to_string().contains("id_path"));
    }

    #[test]
    fn test_dangling_handler_reference_rejected() {
        let doc = VALID.replace(
            "id_prefix = \"wd\"\n        base_url",
            "id_prefix = \"wd\"\n        handler = \"wd\"\n        base_url",
        );
        let err = expect_invalid(&doc);
        assert!(matches!(err, ConfigError::Provider { ref id_prefix, .. } if id_prefix == "wd"));
        assert!(err.to_string().contains("not declared"));
    }

    #[test]
    fn test_handler_reference_must_name_own_provider() {
        let doc = VALID.replace("handler = \"ex\"", "handler = \"wd\"");
        let err = expect_invalid(&doc);
        assert!(matches!(err, ConfigError::Provider { ref id_prefix, .. } if id_prefix == "ex"));
        assert!(err.to_string().contains("own id_prefix"));
    }

    #[test]
    fn test_handler_requires_detail_steps() {
        let doc = VALID.replace(
            "id_prefix = \"ex\"\n        catalog_uri",
            "id_prefix = \"wd\"\n        catalog_uri",
        );
        let err = expect_invalid(&doc);
        assert!(matches!(err, ConfigError::Handler { .. }));
    }

    #[test]
    fn test_final_step_cannot_extract() {
        let doc = VALID.replace(
            "url = \"{base_url}/devices/{id}\"",
            "url = \"{base_url}/devices/{id}\"\n        extract = \"data.id\"",
        );
        assert!(expect_invalid(&doc).to_string().contains("final step"));
    }

    #[test]
    fn test_mode_irrelevant_keys_rejected() {
        let cases = [
            ("mode = \"server\"", "mode = \"server\"\n        filter_any_paths = [\"name\"]", "filter_any_paths"),
            ("mode = \"server\"", "mode = \"server\"\n        query = \"SELECT\"", "query"),
            ("mode = \"wikidata_action\"", "mode = \"wikidata_action\"\n        endpoint = \"{base_url}\"", "endpoint"),
        ];
        for (from, to, field) in cases {
            let err = expect_invalid(&VALID.replace(from, to));
            assert!(matches!(err, ConfigError::Provider { .. }));
            assert!(err.to_string().contains(field), "{}", err);
        }

        let sparql_with_url = VALID.replace(
            "mode = \"wikidata_action\"",
            "mode = \"sparql\"\n        url = \"{base_url}/x\"\n        query = \"SELECT {query}\"\n        id_path = \"item\"",
        );
        assert!(expect_invalid(&sparql_with_url).to_string().contains("search.url"));
    }

    #[test]
    fn test_language_applies_to_every_mode() {
        let doc = VALID.replace(
            "mode = \"wikidata_action\"",
            "mode = \"sparql\"\n        language = \"de\"\n        query = \"SELECT {language}\"\n        id_path = \"item\"",
        );
        let settings = Settings::from_toml_str(&doc).unwrap();
        assert_eq!(settings.provider("wd").unwrap().search.language, "de");
        assert_eq!(settings.provider("ex").unwrap().search.language, "en");

        let blank = VALID.replace("mode = \"server\"", "mode = \"server\"\n        language = \" \"");
        assert!(expect_invalid(&blank).to_string().contains("language"));
    }

    #[test]
    fn test_transport_follows_literal_url_start() {
        let settings = Settings::from_toml_str(VALID).unwrap();
        let ex = settings.provider("ex").unwrap();
        assert_eq!(ex.search.transport, Transport::Network);
        assert_eq!(ex.detail.steps[0].transport, Transport::Network);

        let base = "https://api.example.org";
        let transport = |source: &str| {
            url_transport("test", &Template::parse(source).unwrap(), "https")
        };
        assert_eq!(transport("{id}").unwrap(), Transport::Network);
        assert_eq!(transport("{id_encoded}.json").unwrap(), Transport::Network);
        assert_eq!(transport(&format!("{}/{{id}}", base)).unwrap(), Transport::Network);
        assert_eq!(transport("HTTP://x/{id}").unwrap(), Transport::Network);
        assert_eq!(transport("file:///srv/{id}.json").unwrap(), Transport::LocalFile);
        assert_eq!(transport("/srv/registry/{id}.json").unwrap(), Transport::LocalFile);
        assert_eq!(transport("C:/registry/{id}.json").unwrap(), Transport::LocalFile);
        assert!(transport("ftp://mirror/{id}").is_err());

        let local_base = url_transport("test", &Template::parse("{base_url}/x").unwrap(), "file");
        assert_eq!(local_base.unwrap(), Transport::LocalFile);
    }

    #[test]
    fn test_local_sparql_endpoint_rejected() {
        let doc = VALID.replace(
            "mode = \"wikidata_action\"",
            "mode = \"sparql\"\n        endpoint = \"/srv/sparql.json\"\n        query = \"SELECT {query}\"\n        id_path = \"item\"",
        );
        assert!(expect_invalid(&doc).to_string().contains("endpoint"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let doc = VALID.replace("mode = \"server\"", "mode = \"graphql\"");
        assert!(expect_invalid(&doc).to_string().contains("graphql"));
    }
}
