use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "instrument_search_cli=info,instrument_search_core=warn",
        1 => "instrument_search_cli=debug,instrument_search_core=debug",
        _ => "instrument_search_cli=trace,instrument_search_core=trace",
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Commands::Search { query, min_len } => search::run(&cli, query, *min_len).await,
        Commands::Detail {
            external_id,
            catalog,
            question,
        } => detail::run(&cli, external_id, catalog, question.as_deref()).await,
        Commands::Providers => providers::run(&cli),
        Commands::Validate => validate::run(&cli),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(1);
    }
}
