use crate::types::IndexCoord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema unavailable for {coord}: {reason}")]
    SchemaUnavailable { coord: IndexCoord, reason: String },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Engine rejected request (status {status}): {reason}")]
    Engine { status: u16, reason: String },

    #[error("Bulk line {line} rejected: {reason}")]
    PartialBulkItem { line: usize, reason: String },

    #[error("Mapping build failed for field '{field}': {reason}")]
    MappingBuild { field: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

impl Error {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::SchemaUnavailable { .. } => "schema_unavailable",
            Error::MalformedRequest(_) => "malformed_request",
            Error::Transport(_) => "transport",
            Error::Http(_) => "http",
            Error::Engine { .. } => "engine",
            Error::PartialBulkItem { .. } => "partial_bulk_item",
            Error::MappingBuild { .. } => "mapping_build",
            Error::Config(_) => "config",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::TomlParse(_) | Error::TomlWrite(_) => "toml",
        }
    }

    /// Whether the request/response round trip with the cluster failed
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Http(_) | Error::Engine { .. }
        )
    }

    /// HTTP-ish status reported by the engine, if it answered at all
    pub fn engine_status(&self) -> Option<u16> {
        match self {
            Error::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_kinds() {
        assert!(Error::Transport("reset".into()).is_transport_failure());
        assert!(Error::Engine {
            status: 500,
            reason: "boom".into()
        }
        .is_transport_failure());
        assert!(!Error::MalformedRequest("pageno".into()).is_transport_failure());
        assert!(!Error::Config("nodes".into()).is_transport_failure());
    }

    #[test]
    fn test_error_display() {
        let err = Error::SchemaUnavailable {
            coord: IndexCoord::new("news", "article"),
            reason: "index missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "Schema unavailable for news/article: index missing"
        );
        assert_eq!(err.error_type(), "schema_unavailable");

        let err = Error::Engine {
            status: 404,
            reason: "IndexMissingException[[news] missing]".into(),
        };
        assert_eq!(err.engine_status(), Some(404));
    }
}
