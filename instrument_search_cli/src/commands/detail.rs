use crate::cli::{Cli, OutputFormat};
use crate::commands::{connect, spinner, Result};
use crate::output::{display_value, format_output, truncate_text, OutputData};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use instrument_search_core::MappingOutcome;
use owo_colors::OwoColorize;

/// Map one selected result onto the attributes of a catalog.
pub async fn run(
    cli: &Cli,
    external_id: &str,
    catalog: &str,
    question: Option<&str>,
) -> Result<()> {
    let search = connect(cli)?;

    let spinner = spinner(format!("Fetching detail record for {}...", external_id));
    let outcome = match question {
        Some(question) => {
            search
                .mapper()
                .map_selection(external_id, catalog, question)
                .await
        }
        None => search.map_detail(external_id, catalog).await,
    };
    spinner.finish_and_clear();
    let outcome = outcome?;

    match cli.output {
        OutputFormat::Pretty => {
            format_pretty(external_id, catalog, &outcome);
            Ok(())
        }
        _ => format_output(
            &OutputData::Mapping {
                external_id: external_id.to_string(),
                catalog: catalog.to_string(),
                question: question.map(str::to_string),
                outcome,
            },
            &cli.output,
        ),
    }
}

fn format_pretty(external_id: &str, catalog: &str, outcome: &MappingOutcome) {
    println!("{} {}", "Detail:".bold().cyan(), external_id.yellow());
    println!("{} {}", "Catalog:".dimmed(), catalog.green());
    println!();

    match outcome {
        MappingOutcome::Skipped { reason } => {
            println!("   {} {}", "Skipped:".yellow(), reason);
        }
        MappingOutcome::Mapped { values } if values.is_empty() => {
            println!("   {}", "No attribute had a value in the detail record".dimmed());
        }
        MappingOutcome::Mapped { values } => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_width(super::terminal_width() as u16)
                .set_header(vec!["Attribute", "Value"]);
            for (attribute, value) in values {
                table.add_row(vec![
                    attribute.clone(),
                    truncate_text(&display_value(value), 120),
                ]);
            }
            println!("{table}");
        }
    }
}
