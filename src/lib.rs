//! Ingestion of OpenAPI 3.0 and Swagger 2.0 specifications
//!
//! A source (URL, uploaded text or local path) goes through parsing, version
//! normalization, meta-schema validation and `$ref` bundling before it becomes
//! a [`ValidatedDocument`]. Endpoint lists and the schema usage graph are
//! derived from validated documents, and [`SpecStore`] holds the active one.

pub mod bundle;
pub mod config;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod model;
pub mod operations;
pub mod parsers;
pub mod pipeline;
pub mod refs;
pub mod report;
pub mod source;
pub mod store;
pub mod validate;
pub mod version;

pub use error::{IngestError, LoadError, Violation};
pub use fetch::FetchOptions;
pub use graph::{build_schema_usage, SchemaUsage, SchemaUsageMap};
pub use model::{ApiDocument, ValidatedDocument};
pub use operations::{extract_operations, list_endpoints, Endpoint, HttpMethod, OperationDetails};
pub use pipeline::{IngestedSpec, Ingestor};
pub use source::SpecSource;
pub use store::{LoadedSpec, SpecSnapshot, SpecStore};
pub use validate::SpecFamily;
pub use version::VersionOverride;
