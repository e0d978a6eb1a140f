use crate::cli::OutputFormat;
use crate::commands::Result;
use instrument_search_core::{AggregatedResponse, MappingOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub id_prefix: String,
    pub mode: String,
    pub base_url: String,
    pub max_hits: usize,
    pub timeout_ms: u64,
    pub detail_steps: usize,
    pub handlers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub path: String,
    pub valid: bool,
    pub providers: usize,
    pub handlers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OutputData {
    SearchResults(AggregatedResponse),
    Mapping {
        external_id: String,
        catalog: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        question: Option<String>,
        outcome: MappingOutcome,
    },
    ProviderList(Vec<ProviderSummary>),
    Validation(ValidationReport),
}

/// Machine-readable output. Pretty output is rendered by each command.
pub fn format_output(data: &OutputData, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(data)?),
        OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(data)?),
    }
    Ok(())
}

/// First line of `s`, cut to `max_len` characters with an ellipsis.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or(s);
    if first_line.chars().count() <= max_len {
        first_line.to_string()
    } else {
        let truncated: String = first_line.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Compact single-line rendering of a mapped value.
pub fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
