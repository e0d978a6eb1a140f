use super::NativeHit;
use crate::client::{FetchRequest, Fetcher};
use crate::config::{ProviderSpec, SearchDescriptor, SearchMode};
use crate::error::ProviderError;
use crate::path_query::{value_to_text, PathExpr};
use crate::template::{self, escape_sparql_literal, Template, TemplateVars};
use serde_json::{Map, Value};
use tracing::debug;

pub(super) async fn run(
    fetcher: &dyn Fetcher,
    provider: &ProviderSpec,
    query: &str,
) -> Result<Vec<NativeHit>, ProviderError> {
    let descriptor = &provider.search;
    let items = match &descriptor.mode {
        SearchMode::Server { url } | SearchMode::WikidataAction { url } => {
            let url = render(url, &url_vars(provider, query))?;
            let doc = fetcher.fetch(get(provider, url)).await?;
            items_at(&descriptor.items_path, &doc)
        }
        SearchMode::ClientFilter {
            url,
            filter_any_paths,
        } => {
            let url = render(url, &url_vars(provider, query))?;
            let doc = fetcher.fetch(get(provider, url)).await?;
            let listing = items_at(&descriptor.items_path, &doc);
            let total = listing.len();
            let kept = filter_items(listing, query, filter_any_paths, descriptor);
            debug!(
                provider = %provider.id_prefix,
                total,
                kept = kept.len(),
                "client-side filter applied"
            );
            kept
        }
        SearchMode::Sparql { endpoint, query: body } => {
            let mut vars = TemplateVars::new();
            vars.insert(template::BASE_URL, provider.base_url.clone());
            let endpoint = render(endpoint, &vars)?;

            let mut vars = TemplateVars::new();
            vars.insert(template::QUERY, escape_sparql_literal(query));
            vars.insert(template::MAX_HITS, provider.max_hits.to_string());
            vars.insert(template::LANGUAGE, descriptor.language.clone());
            let body = render(body, &vars)?;

            let request = FetchRequest::sparql(endpoint, body).with_timeout(provider.timeout);
            let doc = fetcher.fetch(request).await?;
            let rows = Value::Array(sparql_rows(&doc));
            items_at(&descriptor.items_path, &rows)
        }
    };

    Ok(normalize(items, descriptor))
}

fn get(provider: &ProviderSpec, url: String) -> FetchRequest {
    FetchRequest::get(url)
        .with_timeout(provider.timeout)
        .with_transport(provider.search.transport)
}

fn render(template: &Template, vars: &TemplateVars) -> Result<String, ProviderError> {
    template
        .render(vars)
        .map_err(|e| ProviderError::Template(e.to_string()))
}

fn url_vars(provider: &ProviderSpec, query: &str) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert(template::BASE_URL, provider.base_url.clone());
    vars.insert(template::QUERY, urlencoding::encode(query).into_owned());
    vars.insert(template::QUERY_RAW, query.to_string());
    vars.insert(template::MAX_HITS, provider.max_hits.to_string());
    vars.insert(template::LANGUAGE, provider.search.language.clone());
    vars
}

/// The item list under `items_path`. A single object counts as one item.
fn items_at(path: &PathExpr, doc: &Value) -> Vec<Value> {
    match path.evaluate(doc) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

/// Flatten `results.bindings` rows into `{variable: value}` objects.
fn sparql_rows(doc: &Value) -> Vec<Value> {
    let Some(bindings) = doc
        .get("results")
        .and_then(|r| r.get("bindings"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    bindings
        .iter()
        .filter_map(Value::as_object)
        .map(|row| {
            let flat: Map<String, Value> = row
                .iter()
                .filter_map(|(var, binding)| {
                    binding
                        .get("value")
                        .map(|value| (var.clone(), value.clone()))
                })
                .collect();
            Value::Object(flat)
        })
        .collect()
}

/// Keep items where every query token occurs in one of the filter values.
fn filter_items(
    items: Vec<Value>,
    query: &str,
    filter_any_paths: &[PathExpr],
    descriptor: &SearchDescriptor,
) -> Vec<Value> {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    if tokens.is_empty() {
        return items;
    }

    let default_paths = [descriptor.label_path.clone(), descriptor.id_path.clone()];
    let paths: &[PathExpr] = if filter_any_paths.is_empty() {
        &default_paths
    } else {
        filter_any_paths
    };

    items
        .into_iter()
        .filter(|item| {
            let haystacks: Vec<String> = paths
                .iter()
                .filter_map(|p| p.evaluate(item))
                .flat_map(|v| texts(&v))
                .map(|t| t.to_lowercase())
                .collect();
            tokens
                .iter()
                .all(|token| haystacks.iter().any(|h| h.contains(token.as_str())))
        })
        .collect()
}

fn texts(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(texts).collect(),
        other => value_to_text(other).into_iter().collect(),
    }
}

fn normalize(items: Vec<Value>, descriptor: &SearchDescriptor) -> Vec<NativeHit> {
    let mut hits = Vec::with_capacity(items.len());
    for item in items {
        let Some(raw_id) = descriptor.id_path.evaluate_text(&item) else {
            debug!(path = %descriptor.id_path, "skipping item without id");
            continue;
        };
        let native_id = match &descriptor.id_regex {
            Some(regex) => regex
                .captures(&raw_id)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or(raw_id),
            None => raw_id,
        };
        if native_id.is_empty() {
            continue;
        }
        let label = descriptor
            .label_path
            .evaluate_text(&item)
            .unwrap_or_else(|| native_id.clone());
        hits.push(NativeHit {
            native_id,
            label,
            item,
        });
    }
    hits
}
