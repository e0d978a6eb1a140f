//! Outbound transport.
//!
//! Every registry call goes through [`Fetcher`], so the engines never touch
//! `reqwest` directly and tests can substitute an in-memory source.

use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const ACCEPT_JSON: &str = "application/json";
pub const ACCEPT_SPARQL_JSON: &str = "application/sparql-results+json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMethod {
    Get,
    /// `application/x-www-form-urlencoded` POST
    PostForm(Vec<(String, String)>),
}

/// Where a request is served from.
///
/// Chosen when the recipe is compiled, from the literal start of the URL
/// template, so substituted values never switch a request to the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// `http://` or `https://` only
    #[default]
    Network,
    /// `file://` URLs and bare paths
    LocalFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: FetchMethod,
    pub url: String,
    pub accept: &'static str,
    pub timeout: Option<Duration>,
    pub transport: Transport,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: FetchMethod::Get,
            url: url.into(),
            accept: ACCEPT_JSON,
            timeout: None,
            transport: Transport::Network,
        }
    }

    /// A SPARQL protocol query sent as a form POST.
    pub fn sparql(endpoint: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            method: FetchMethod::PostForm(vec![("query".to_string(), query.into())]),
            url: endpoint.into(),
            accept: ACCEPT_SPARQL_JSON,
            timeout: None,
            transport: Transport::Network,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
}

/// Source of JSON documents.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<Value, ProviderError>;
}

/// `reqwest`-backed fetcher. [`Transport::LocalFile`] requests are read from disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, timeout })
    }

    async fn fetch_http(&self, request: FetchRequest) -> Result<Value, ProviderError> {
        let timeout = request.timeout.unwrap_or(self.timeout);
        let builder = match &request.method {
            FetchMethod::Get => self.client.get(&request.url),
            FetchMethod::PostForm(fields) => self.client.post(&request.url).form(fields),
        };

        let t0 = Instant::now();
        let response = builder
            .header(ACCEPT, HeaderValue::from_static(request.accept))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(timeout.as_millis() as u64)
                } else {
                    ProviderError::HttpRequest(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                url: request.url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        info!(
            target: "instrument_search.fetch",
            url = %request.url,
            status = status.as_u16(),
            total_ms = %t0.elapsed().as_millis(),
            "fetched"
        );

        serde_json::from_str(&body).map_err(|e| ProviderError::Parse {
            url: request.url,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<Value, ProviderError> {
        match request.transport {
            Transport::Network => {
                ensure_network_url(&request.url)?;
                self.fetch_http(request).await
            }
            Transport::LocalFile => read_local_json(local_path(&request.url)?).await,
        }
    }
}

/// Canned response served by [`MemoryFetcher`].
#[derive(Debug, Clone)]
enum Canned {
    Json(Value),
    Status(u16),
}

/// In-memory fetcher keyed by exact URL, for offline runs and tests.
///
/// Unknown URLs answer with status 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    routes: HashMap<String, (Canned, Option<Duration>)>,
    calls: Mutex<Vec<FetchRequest>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(mut self, url: impl Into<String>, body: Value) -> Self {
        self.routes.insert(url.into(), (Canned::Json(body), None));
        self
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.routes.insert(url.into(), (Canned::Status(status), None));
        self
    }

    /// Delay the response for `url` (which must already be routed).
    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        if let Some(route) = self.routes.get_mut(url) {
            route.1 = Some(delay);
        }
        self
    }

    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<Value, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        let Some((canned, delay)) = self.routes.get(&request.url).cloned() else {
            return Err(ProviderError::Status {
                url: request.url,
                status: 404,
            });
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match canned {
            Canned::Json(body) => Ok(body),
            Canned::Status(status) => Err(ProviderError::Status {
                url: request.url,
                status,
            }),
        }
    }
}

fn ensure_network_url(target: &str) -> Result<(), ProviderError> {
    if target.starts_with("http://") || target.starts_with("https://") {
        Ok(())
    } else {
        Err(ProviderError::InvalidUrl {
            url: target.to_string(),
            message: "expected an http(s) URL".to_string(),
        })
    }
}

/// Map `file://` URLs and scheme-less strings to filesystem paths.
fn local_path(target: &str) -> Result<PathBuf, ProviderError> {
    if target.starts_with("file://") {
        let parsed = url::Url::parse(target).map_err(|e| ProviderError::InvalidUrl {
            url: target.to_string(),
            message: e.to_string(),
        })?;
        return parsed.to_file_path().map_err(|_| ProviderError::InvalidUrl {
                url: target.to_string(),
                message: "not a local file URL".to_string(),
            });
    }
    match url::Url::parse(target) {
        // A drive letter parses as a one-letter scheme.
        Ok(parsed) if parsed.scheme().len() > 1 => Err(ProviderError::InvalidUrl {
            url: target.to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        }),
        _ => Ok(PathBuf::from(target)),
    }
}

async fn read_local_json(path: PathBuf) -> Result<Value, ProviderError> {
    debug!("Reading local source {}", path.display());
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ProviderError::Io {
            path: path.clone(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|e| ProviderError::Parse {
        url: path.display().to_string(),
        message: e.to_string(),
    })
}
