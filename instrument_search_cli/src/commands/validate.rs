use crate::cli::{Cli, OutputFormat};
use crate::commands::{config_source, CommandError, Result};
use crate::output::{format_output, OutputData, ValidationReport};
use instrument_search_core::Settings;
use owo_colors::OwoColorize;

/// Load the configuration and report whether it compiles.
///
/// Exits non-zero on an invalid document in every output format.
pub fn run(cli: &Cli) -> Result<()> {
    let source = config_source(cli);
    let path = source.resolve();
    let loaded = Settings::load(&source);

    let report = match &loaded {
        Ok(settings) => ValidationReport {
            path: path.display().to_string(),
            valid: true,
            providers: settings.providers().len(),
            handlers: settings.handlers().len(),
            error: None,
        },
        Err(e) => ValidationReport {
            path: path.display().to_string(),
            valid: false,
            providers: 0,
            handlers: 0,
            error: Some(e.to_string()),
        },
    };

    match cli.output {
        OutputFormat::Pretty => {
            if report.valid {
                println!(
                    "{} {} ({} providers, {} handlers)",
                    "✓".green().bold(),
                    report.path.bold(),
                    report.providers,
                    report.handlers
                );
            }
        }
        _ => format_output(&OutputData::Validation(report), &cli.output)?,
    }

    loaded.map(|_| ()).map_err(CommandError::from)
}
