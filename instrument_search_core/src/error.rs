// src/error.rs
use crate::path_query::PathSyntaxError;
use std::path::PathBuf;

/// A malformed or inconsistent configuration document. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Provider '{id_prefix}': {message}")]
    Provider { id_prefix: String, message: String },

    #[error("Handler '{id_prefix}' ({catalog_uri}): {message}")]
    Handler {
        id_prefix: String,
        catalog_uri: String,
        message: String,
    },

    #[error("Invalid path expression in {context}: {source}")]
    PathSyntax {
        context: String,
        #[source]
        source: PathSyntaxError,
    },

    #[error("Invalid template in {context}: {message}")]
    Template { context: String, message: String },
}

/// A single provider's search or detail call failed.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("{url} returned error status: {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Cannot read local source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Detail step {step} produced no value for '{path}'")]
    MissingChainValue { step: usize, path: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Provider '{0}' declares no detail steps")]
    NoDetailSteps(String),
}

impl ProviderError {
    pub fn code_str(&self) -> &'static str {
        match self {
            ProviderError::HttpRequest(e) if e.is_timeout() => "timeout",
            ProviderError::HttpRequest(_) => "upstream_error",
            ProviderError::Status { status: 404, .. } => "not_found",
            ProviderError::Status { .. } => "upstream_error",
            ProviderError::Parse { .. } => "parse_error",
            ProviderError::Io { .. } => "io_error",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::MissingChainValue { .. } => "missing_value",
            ProviderError::Template(_) => "internal_error",
            ProviderError::InvalidUrl { .. } | ProviderError::NoDetailSteps(_) => "invalid_input",
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.code_str() == "timeout"
    }
}

/// An external identifier that cannot be routed back to a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("Malformed identifier '{0}'")]
    Malformed(String),

    #[error("Identifier '{identifier}' refers to unknown provider '{id_prefix}'")]
    UnknownPrefix {
        identifier: String,
        id_prefix: String,
    },
}

/// Failure while mapping a selected result onto catalog attributes.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("Detail fetch for {external_id} failed: {source}")]
    Provider {
        external_id: String,
        #[source]
        source: ProviderError,
    },
}

impl MappingError {
    pub fn code_str(&self) -> &'static str {
        match self {
            MappingError::Identifier(IdentifierError::Malformed(_)) => "malformed_identifier",
            MappingError::Identifier(IdentifierError::UnknownPrefix { .. }) => "unknown_provider",
            MappingError::Provider { source, .. } => source.code_str(),
        }
    }
}
