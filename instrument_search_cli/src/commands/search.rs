use crate::cli::{Cli, OutputFormat};
use crate::commands::{connect, spinner, terminal_width, CommandError, Result};
use crate::output::{format_output, truncate_text, OutputData};
use instrument_search_core::AggregatedResponse;
use owo_colors::OwoColorize;

/// Run an aggregated search across every configured provider.
pub async fn run(cli: &Cli, query: &str, min_len: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        return Err(CommandError::InvalidInput(
            "Missing search query. Usage: instrument-search search \"<query>\"".to_string(),
        ));
    }

    let search = connect(cli)?;
    let min_len = min_len.unwrap_or(search.settings().min_search_len);

    let spinner = spinner(format!(
        "Searching {} providers for '{}'...",
        search.settings().providers().len(),
        query
    ));
    let response = search.aggregator().search(query, min_len).await;
    spinner.finish_and_clear();

    tracing::info!(
        results = response.len(),
        failed = response.errors.len(),
        duration_ms = response.duration_ms.unwrap_or_default(),
        "search finished"
    );

    match cli.output {
        OutputFormat::Pretty => format_pretty(&response, min_len),
        _ => format_output(&OutputData::SearchResults(response), &cli.output),
    }
}

fn format_pretty(response: &AggregatedResponse, min_len: usize) -> Result<()> {
    println!("{} {}", "Search:".bold().cyan(), response.query.yellow());
    println!();

    if response.skipped {
        println!(
            "   {}",
            format!("Query shorter than {} characters; no provider was asked.", min_len).dimmed()
        );
        return Ok(());
    }

    let header = format!("Results ({} total)", response.len());
    let line_len = terminal_width().saturating_sub(header.len() + 6).min(60);
    println!(
        "{} {} {}",
        "──".cyan(),
        header.green().bold(),
        "─".repeat(line_len).cyan()
    );
    println!();

    if response.is_empty() {
        println!("   {}", "No results".dimmed());
        println!();
    }

    for (i, r) in response.results.iter().enumerate() {
        println!(
            " {:>3}. {} {}",
            (i + 1).to_string().cyan().bold(),
            truncate_text(&r.label, 70).bold(),
            format!("[{}]", r.provider).dimmed()
        );
        println!("      {}", r.external_id.to_string().blue());
        println!();
    }

    if response.partial && !response.errors.is_empty() {
        println!("{}", "⚠ Partial results - some providers failed:".yellow());
        for err in &response.errors {
            let kind = if err.is_timeout { "timeout" } else { err.code.as_str() };
            println!(
                "   {} {} {}",
                err.provider.red(),
                format!("({})", kind).dimmed(),
                truncate_text(&err.error, 80)
            );
        }
        println!();
    }

    if let Some(ms) = response.duration_ms {
        println!(
            "{}",
            format!("Completed: {} in {}ms", response.completed.join(", "), ms).dimmed()
        );
    }
    Ok(())
}
