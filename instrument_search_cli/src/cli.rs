use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "instrument-search")]
#[command(about = "Search instrument registries and map their records onto catalog attributes")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  instrument-search validate                      Check the configuration
  instrument-search providers                     List configured providers
  instrument-search search \"seismometer\"          Search every provider
  instrument-search detail ex:42 --catalog URI    Map one result for a catalog

\x1b[1;36mConfiguration:\x1b[0m
  --config PATH, or INSTRUMENT_SEARCH_PROVIDER_CONFIG_FILE_PATH,
  or INSTRUMENT_SEARCH_PROVIDER_CONFIG_FILE_NAME inside ~/.config/instrument-search")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        value_enum,
        env = "INSTRUMENT_SEARCH_OUTPUT",
        default_value_t = OutputFormat::Pretty
    )]
    pub output: OutputFormat,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search every configured provider
    ///
    /// Providers are queried concurrently. Failing providers are reported
    /// alongside the results instead of aborting the search.
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  instrument-search search \"ctd probe\"
  instrument-search search gps --min-len 2
  instrument-search search seismometer --output json")]
    Search {
        /// The search query
        query: String,
        /// Minimum query length (defaults to the configured min_search_len)
        #[arg(long)]
        min_len: Option<usize>,
    },

    /// Fetch a result's detail record and map it onto catalog attributes
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  instrument-search detail ex:42 --catalog https://rdmo.example.org/catalog
  instrument-search detail wd:Q123 --catalog URI --question URI")]
    Detail {
        /// Identifier from a search result (prefix:native_id)
        external_id: String,
        /// Catalog URI the handler is scoped to
        #[arg(long)]
        catalog: String,
        /// Question URI of the autocomplete field the value was picked in
        #[arg(long)]
        question: Option<String>,
    },

    /// List configured providers
    #[command(alias = "ls")]
    Providers,

    /// Load and validate the configuration
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}
