//! Helper configuration
//!
//! Loaded from TOML; every field has a default so a partial file (or no
//! file at all) yields a usable local setup.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Cluster name the nodes must report
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    /// Cluster nodes as `host:port` (or full URLs)
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub bulk: BulkConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_cluster_name() -> String {
    "elasticsearch".to_string()
}

fn default_nodes() -> Vec<String> {
    vec!["127.0.0.1:9200".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_name: default_cluster_name(),
            nodes: default_nodes(),
            transport: TransportConfig::default(),
            query: QueryConfig::default(),
            bulk: BulkConfig::default(),
            schema: SchemaConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Scheme used for nodes given as bare `host:port`
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    30000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// How range clauses join the term clauses in the filter layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeJoin {
    /// Ranges go under `should` next to the `must` term clauses
    #[default]
    Should,
    /// Ranges are required like the term clauses
    Must,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Hits per bucket when not in top-only mode
    #[serde(default = "default_top_hits_size")]
    pub top_hits_size: u32,

    /// Upper bound on the number of buckets requested from the engine
    #[serde(default = "default_max_buckets")]
    pub max_buckets: u32,

    #[serde(default)]
    pub range_join: RangeJoin,

    /// Sort field (descending) for match queries
    #[serde(default = "default_match_sort_field")]
    pub match_sort_field: String,
}

fn default_top_hits_size() -> u32 {
    320
}

fn default_max_buckets() -> u32 {
    10_000
}

fn default_match_sort_field() -> String {
    "createat".to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_hits_size: default_top_hits_size(),
            max_buckets: default_max_buckets(),
            range_join: RangeJoin::default(),
            match_sort_field: default_match_sort_field(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulkConfig {
    /// Accepted lines per bulk request when ingesting a file
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
}

fn default_flush_every() -> usize {
    10
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            flush_every: default_flush_every(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaConfig {
    /// Cache resolved field sets per (index, type)
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Seconds a cached field set is trusted; mappings changed by other
    /// clients or by dynamic mapping are seen after this long
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Indices and types containing this marker are hidden from `all_mappings`
    #[serde(default = "default_hidden_marker")]
    pub hidden_marker: String,
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_hidden_marker() -> String {
    "marvel".to_string()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_secs: default_cache_ttl_secs(),
            hidden_marker: default_hidden_marker(),
        }
    }
}

impl SchemaConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_level")]
    pub level: String,

    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info,easysearch=debug".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl Config {
    /// Config for a single node
    pub fn single(cluster_name: impl Into<String>, host: &str, port: u16) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            nodes: vec![format!("{}:{}", host, port)],
            ..Self::default()
        }
    }

    /// Config for a list of `host:port` nodes
    pub fn with_nodes<I, S>(cluster_name: impl Into<String>, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cluster_name: cluster_name.into(),
            nodes: nodes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file path, or create default
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            let _ = config.save(path);
            Ok(config)
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Config("at least one node is required".to_string()));
        }
        self.node_urls()?;
        if self.query.top_hits_size == 0 {
            return Err(Error::Config("query.top_hits_size must be positive".to_string()));
        }
        if self.query.max_buckets == 0 {
            return Err(Error::Config("query.max_buckets must be positive".to_string()));
        }
        if self.bulk.flush_every == 0 {
            return Err(Error::Config("bulk.flush_every must be positive".to_string()));
        }
        Ok(())
    }

    /// Base URLs for every configured node
    pub fn node_urls(&self) -> Result<Vec<Url>> {
        self.nodes
            .iter()
            .map(|node| node_url(&self.transport.scheme, node))
            .collect()
    }
}

/// Split a comma-separated `host:port` list
pub fn parse_nodes(nodes: &str) -> Vec<String> {
    nodes
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

fn node_url(scheme: &str, node: &str) -> Result<Url> {
    let node = node.trim();
    let raw = if node.contains("://") {
        node.to_string()
    } else {
        let (host, port) = node
            .rsplit_once(':')
            .ok_or_else(|| Error::Config(format!("node '{}' must be host:port", node)))?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(Error::Config(format!("node '{}' must be host:port", node)));
        }
        format!("{}://{}", scheme, node)
    };

    let url = Url::parse(&raw)?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(Error::Config(format!("node '{}' is not a base URL", node)));
    }
    Ok(url)
}
