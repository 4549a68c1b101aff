//! Version gate and structural validation against the published OpenAPI 3.0
//! (2021-09-28) and Swagger 2.0 JSON Schemas, embedded at build time

use crate::error::{IngestError, Result, Violation};
use crate::version::{SUPPORTED_OPENAPI_VERSIONS, SUPPORTED_SWAGGER_VERSION};
use jsonschema::{Draft, JSONSchema};
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

const OPENAPI_3_0_SCHEMA: &str = include_str!("../schemas/openapi-3.0.json");
const SWAGGER_2_0_SCHEMA: &str = include_str!("../schemas/swagger-2.0.json");

/// Longest violation message kept; oneOf failures echo the whole instance
const MAX_MESSAGE_LEN: usize = 240;

/// Specification family of a validated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpecFamily {
    #[serde(rename = "swagger2")]
    Swagger2,
    #[serde(rename = "openapi3")]
    OpenApi3,
}

impl SpecFamily {
    /// Pointer prefix of named schemas for this family
    pub fn schema_ref_prefix(&self) -> &'static str {
        match self {
            SpecFamily::Swagger2 => "#/definitions/",
            SpecFamily::OpenApi3 => "#/components/schemas/",
        }
    }

    /// JSON pointer to the container of named schemas
    pub fn schema_container_pointer(&self) -> &'static str {
        match self {
            SpecFamily::Swagger2 => "/definitions",
            SpecFamily::OpenApi3 => "/components/schemas",
        }
    }
}

/// Check the declared version and the document structure
pub fn validate(document: &Value) -> Result<SpecFamily> {
    let family = check_version(document)?;

    let schema = match family {
        SpecFamily::Swagger2 => meta_schema(&SWAGGER_2, SWAGGER_2_0_SCHEMA)?,
        SpecFamily::OpenApi3 => meta_schema(&OPENAPI_3, OPENAPI_3_0_SCHEMA)?,
    };

    if let Err(errors) = schema.validate(document) {
        let violations: Vec<Violation> = errors
            .map(|error| Violation {
                path: error.instance_path.to_string(),
                message: truncate(error.to_string()),
            })
            .collect();
        tracing::debug!(count = violations.len(), "Meta-schema validation failed");
        return Err(IngestError::Validation { violations });
    }

    Ok(family)
}

/// Determine the family and reject versions the validator does not support
pub fn check_version(document: &Value) -> Result<SpecFamily> {
    if let Some(openapi) = document.get("openapi") {
        let version = version_text(openapi);
        if SUPPORTED_OPENAPI_VERSIONS.contains(&version.as_str()) {
            return Ok(SpecFamily::OpenApi3);
        }
        return Err(IngestError::UnsupportedVersion { version });
    }

    if let Some(swagger) = document.get("swagger") {
        let version = version_text(swagger);
        if version == SUPPORTED_SWAGGER_VERSION {
            return Ok(SpecFamily::Swagger2);
        }
        return Err(IngestError::UnsupportedVersion { version });
    }

    Err(IngestError::Validation {
        violations: vec![Violation {
            path: String::new(),
            message: "document declares neither `swagger` nor `openapi`".to_string(),
        }],
    })
}

fn version_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

static OPENAPI_3: OnceLock<std::result::Result<JSONSchema, String>> = OnceLock::new();
static SWAGGER_2: OnceLock<std::result::Result<JSONSchema, String>> = OnceLock::new();

fn meta_schema(
    cell: &'static OnceLock<std::result::Result<JSONSchema, String>>,
    source: &'static str,
) -> Result<&'static JSONSchema> {
    cell.get_or_init(|| compile(source))
        .as_ref()
        .map_err(|e| IngestError::MetaSchema(e.clone()))
}

fn compile(source: &str) -> std::result::Result<JSONSchema, String> {
    let schema: Value = serde_json::from_str(source).map_err(|e| e.to_string())?;
    // Swagger's schema points into the draft-04 meta-schema; serve it locally
    JSONSchema::options()
        .with_draft(Draft::Draft4)
        .with_meta_schemas()
        .compile(&schema)
        .map_err(|e| e.to_string())
}

fn truncate(mut message: String) -> String {
    if message.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
        message.push_str("...");
    }
    message
}
