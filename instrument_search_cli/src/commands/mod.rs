pub mod detail;
pub mod providers;
pub mod search;
pub mod validate;

use crate::cli::Cli;
use indicatif::{ProgressBar, ProgressStyle};
use instrument_search_core::{ConfigError, ConfigSource, InstrumentSearch, Settings};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] instrument_search_core::ProviderError),

    #[error("Mapping failed ({}): {}", .0.code_str(), .0)]
    Mapping(#[from] instrument_search_core::MappingError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;

pub fn config_source(cli: &Cli) -> ConfigSource {
    ConfigSource::new(cli.config.clone())
}

pub fn load_settings(cli: &Cli) -> Result<Settings> {
    Ok(Settings::load(&config_source(cli))?)
}

pub fn connect(cli: &Cli) -> Result<InstrumentSearch> {
    let settings = load_settings(cli)?;
    Ok(InstrumentSearch::connect(settings)?)
}

pub fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

pub fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}
