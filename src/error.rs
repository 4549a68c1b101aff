//! Error types for specification ingestion

use std::fmt;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Maximum number of violations carried by a validation error
pub const MAX_REPORTED_VIOLATIONS: usize = 25;

/// A single rule violation reported by the meta-schema validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer into the document, empty for the root
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// Errors raised while turning a source into a validated document
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to fetch specification: {message}")]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to read {origin}: {message}")]
    Read { origin: String, message: String },

    #[error("Could not parse the specification as YAML ({yaml}) or as JSON ({json})")]
    Parse { yaml: String, json: String },

    #[error("Specification is invalid: {}", join_violations(.violations))]
    Validation { violations: Vec<Violation> },

    #[error("Unsupported specification version: {version}. Supported versions are Swagger 2.0 and OpenAPI 3.0.0 through 3.0.3")]
    UnsupportedVersion { version: String },

    #[error("Validation failed after overriding version {original} to 3.0.3: {source}")]
    OverrideRetryFailed {
        original: String,
        #[source]
        source: Box<IngestError>,
    },

    #[error("Failed to resolve references: {0}")]
    Bundle(String),

    #[error("Embedded meta-schema is unusable: {0}")]
    MetaSchema(String),
}

impl IngestError {
    pub fn bundle(message: impl Into<String>) -> Self {
        IngestError::Bundle(message.into())
    }

    /// HTTP status of a failed fetch, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            IngestError::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    let shown: Vec<String> = violations
        .iter()
        .take(MAX_REPORTED_VIOLATIONS)
        .map(|v| v.to_string())
        .collect();
    let mut joined = shown.join("; ");
    if violations.len() > MAX_REPORTED_VIOLATIONS {
        joined.push_str(&format!(
            " (and {} more)",
            violations.len() - MAX_REPORTED_VIOLATIONS
        ));
    }
    joined
}

/// Errors returned by the active specification store
#[derive(Error, Debug)]
pub enum LoadError {
    /// A newer load or a clear started before this load finished
    #[error("Load was superseded by a newer request")]
    Superseded,

    #[error(transparent)]
    Ingest(#[from] IngestError),
}
