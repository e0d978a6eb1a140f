use crate::cli::{Cli, OutputFormat};
use crate::commands::{load_settings, terminal_width, Result};
use crate::output::{format_output, OutputData, ProviderSummary};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use instrument_search_core::Settings;
use owo_colors::OwoColorize;

pub fn run(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    let summaries = summarize(&settings);

    match cli.output {
        OutputFormat::Pretty => {
            println!("{}", "Configured Providers".cyan().bold());
            println!();
            if summaries.is_empty() {
                println!("   {}", "No providers configured".dimmed());
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_width(terminal_width() as u16)
                .set_header(vec![
                    "Prefix", "Mode", "Base URL", "Max hits", "Timeout", "Detail", "Catalogs",
                ]);
            for s in &summaries {
                table.add_row(vec![
                    s.id_prefix.clone(),
                    s.mode.clone(),
                    s.base_url.clone(),
                    s.max_hits.to_string(),
                    format!("{}ms", s.timeout_ms),
                    format!("{} steps", s.detail_steps),
                    s.handlers.join("\n"),
                ]);
            }
            println!("{table}");
            Ok(())
        }
        _ => format_output(&OutputData::ProviderList(summaries), &cli.output),
    }
}

fn summarize(settings: &Settings) -> Vec<ProviderSummary> {
    settings
        .providers()
        .iter()
        .map(|p| ProviderSummary {
            id_prefix: p.id_prefix.clone(),
            mode: p.search.mode.name().to_string(),
            base_url: p.base_url.clone(),
            max_hits: p.max_hits,
            timeout_ms: p.timeout.as_millis() as u64,
            detail_steps: p.detail.steps.len(),
            handlers: settings
                .handlers()
                .iter()
                .filter(|h| h.id_prefix == p.id_prefix)
                .map(|h| h.catalog_uri.clone())
                .collect(),
        })
        .collect()
}
