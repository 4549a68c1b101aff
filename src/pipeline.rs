//! Ingestion pipeline: acquire → parse → normalize → validate → bundle → type

use crate::bundle::{self, ExternalLoader, LocationLoader};
use crate::error::{IngestError, Result};
use crate::fetch::{FetchOptions, SpecFetcher};
use crate::model::{ApiDocument, ValidatedDocument};
use crate::parsers::ParserRegistry;
use crate::source::{RawSpecInput, SpecOrigin, SpecSource};
use crate::validate::{self, SpecFamily};
use crate::version::{self, OverrideStage, VersionOverride};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Result of a successful ingestion
#[derive(Debug, Clone)]
pub struct IngestedSpec {
    /// Display name derived from the URL or file name
    pub name: String,
    pub document: ValidatedDocument,
    /// YAML serialization of the bundled document
    pub raw_text: String,
}

/// Drives a source through every ingestion stage
#[derive(Clone)]
pub struct Ingestor {
    fetcher: SpecFetcher,
    loader: Arc<dyn ExternalLoader>,
    parsers: Arc<ParserRegistry>,
}

impl Ingestor {
    pub fn new(options: FetchOptions) -> Result<Self> {
        let fetcher = SpecFetcher::new(options)?;
        let loader = Arc::new(LocationLoader::new(fetcher.clone()));
        Ok(Self {
            fetcher,
            loader,
            parsers: Arc::new(ParserRegistry::new()),
        })
    }

    /// Replace the loader used for external references
    pub fn with_loader(mut self, loader: Arc<dyn ExternalLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Turn a source into raw text
    pub async fn acquire(&self, source: &SpecSource) -> Result<RawSpecInput> {
        match source {
            SpecSource::Url(raw) => {
                let url = Url::parse(raw.trim()).map_err(|e| IngestError::Fetch {
                    status: None,
                    message: format!("invalid URL `{}`: {}", raw, e),
                })?;
                let fetched = self.fetcher.fetch(&url).await?;
                Ok(RawSpecInput {
                    text: fetched.text,
                    origin: SpecOrigin::Url(url),
                    content_type: fetched.content_type,
                })
            }
            SpecSource::Upload { file_name, text } => {
                Ok(RawSpecInput::from_upload(file_name, text.clone()))
            }
            SpecSource::Path(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| IngestError::Read {
                        origin: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Ok(RawSpecInput {
                    text,
                    origin: SpecOrigin::File {
                        name,
                        path: Some(path.clone()),
                    },
                    content_type: None,
                })
            }
        }
    }

    /// Run the whole pipeline for a source
    pub async fn ingest(&self, source: &SpecSource) -> Result<IngestedSpec> {
        let input = self.acquire(source).await?;
        self.ingest_input(input).await
    }

    /// Run the pipeline on text that has already been acquired
    pub async fn ingest_input(&self, input: RawSpecInput) -> Result<IngestedSpec> {
        info!(origin = %input.origin, bytes = input.text.len(), "Ingesting specification");

        let hint = input.format_hint();
        let mut document = self.parsers.parse_spec(&input.text, hint.as_deref())?;

        let mut version_override = version::normalize(&mut document);
        let family = validate_with_retry(&mut document, &mut version_override)?;

        let base = input.origin.base_url();
        let tree = bundle::bundle(&document, base.as_ref(), self.loader.as_ref(), &self.parsers).await?;
        if tree != document {
            // Inlined external content has not been checked yet
            debug!("Validating bundled document");
            validate::validate(&tree)?;
        }

        let api = ApiDocument::from_tree(family, &tree)?;
        let document = ValidatedDocument::new(tree, api, version_override);
        let raw_text = document.to_yaml()?;

        info!(
            title = document.title(),
            version = document.api().spec_version(),
            overridden = document.version_overridden(),
            "Specification ingested"
        );

        Ok(IngestedSpec {
            name: input.origin.display_name(),
            document,
            raw_text,
        })
    }
}

/// Validate, downgrading once more when the validator rejects a 3.0.x version
/// the normalizer let through
fn validate_with_retry(
    document: &mut Value,
    version_override: &mut Option<VersionOverride>,
) -> Result<SpecFamily> {
    match validate::validate(document) {
        Err(IngestError::UnsupportedVersion { version })
            if version_override.is_none() && version::is_retry_eligible(&version) =>
        {
            debug!(version = %version, "Retrying validation with overridden version");
            *version_override =
                version::apply_override(document, version.clone(), OverrideStage::ValidationRetry);
            validate::validate(document).map_err(|e| IngestError::OverrideRetryFailed {
                original: version,
                source: Box::new(e),
            })
        }
        other => other,
    }
}
