use crate::error::{IngestError, Result, Violation};
use crate::validate::SpecFamily;
use crate::version::VersionOverride;
use indexmap::IndexMap;
use openapiv3::{Info, OpenAPI, ReferenceOr, Tag};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Typed view of a validated document
#[derive(Debug, Clone)]
pub enum ApiDocument {
    Swagger2(Box<Swagger2Document>),
    OpenApi3(Box<OpenAPI>),
}

impl ApiDocument {
    /// Convert a bundled tree into the typed model for its family
    pub fn from_tree(family: SpecFamily, tree: &JsonValue) -> Result<Self> {
        match family {
            SpecFamily::OpenApi3 => serde_json::from_value::<OpenAPI>(tree.clone())
                .map(|doc| ApiDocument::OpenApi3(Box::new(doc)))
                .map_err(typing_error),
            SpecFamily::Swagger2 => {
                let mut tree = tree.clone();
                strip_extensions(&mut tree);
                serde_json::from_value::<Swagger2Document>(tree)
                    .map(|doc| ApiDocument::Swagger2(Box::new(doc)))
                    .map_err(typing_error)
            }
        }
    }

    pub fn family(&self) -> SpecFamily {
        match self {
            ApiDocument::Swagger2(_) => SpecFamily::Swagger2,
            ApiDocument::OpenApi3(_) => SpecFamily::OpenApi3,
        }
    }

    pub fn info(&self) -> &Info {
        match self {
            ApiDocument::Swagger2(doc) => &doc.info,
            ApiDocument::OpenApi3(doc) => &doc.info,
        }
    }

    /// Declared specification version (`2.0`, `3.0.3`, ...)
    pub fn spec_version(&self) -> &str {
        match self {
            ApiDocument::Swagger2(doc) => &doc.swagger,
            ApiDocument::OpenApi3(doc) => &doc.openapi,
        }
    }

    /// First server URL, or `scheme://host/basePath` for Swagger documents
    pub fn base_url(&self) -> Option<String> {
        match self {
            ApiDocument::OpenApi3(doc) => doc.servers.first().map(|s| s.url.clone()),
            ApiDocument::Swagger2(doc) => {
                let host = doc.host.as_ref()?;
                let scheme = doc
                    .schemes
                    .first()
                    .map(|s| s.as_str())
                    .unwrap_or("https");
                Some(format!(
                    "{}://{}{}",
                    scheme,
                    host,
                    doc.base_path.as_deref().unwrap_or("")
                ))
            }
        }
    }

    pub fn tags(&self) -> &[Tag] {
        match self {
            ApiDocument::Swagger2(doc) => &doc.tags,
            ApiDocument::OpenApi3(doc) => &doc.tags,
        }
    }
}

fn typing_error(error: serde_json::Error) -> IngestError {
    IngestError::Validation {
        violations: vec![Violation {
            path: String::new(),
            message: format!("document does not match the typed model: {}", error),
        }],
    }
}

const SWAGGER_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// Drop `x-` entries from maps the Swagger model types by value
///
/// Under `paths` and under an operation's `responses` such entries carry
/// arbitrary values, not path items or responses.
fn strip_extensions(tree: &mut JsonValue) {
    let Some(paths) = tree.get_mut("paths").and_then(JsonValue::as_object_mut) else {
        return;
    };
    paths.retain(|key, _| !key.starts_with("x-"));

    for item in paths.values_mut() {
        for method in SWAGGER_METHODS {
            if let Some(responses) = item
                .get_mut(method)
                .and_then(|operation| operation.get_mut("responses"))
                .and_then(JsonValue::as_object_mut)
            {
                responses.retain(|key, _| !key.starts_with("x-"));
            }
        }
    }
}

/// Swagger 2.0 document
///
/// Schemas stay untyped: their structure is walked generically and only
/// summarized for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swagger2Document {
    pub swagger: String,
    pub info: Info,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default)]
    pub produces: Vec<String>,
    #[serde(default)]
    pub paths: IndexMap<String, Swagger2PathItem>,
    #[serde(default)]
    pub definitions: IndexMap<String, JsonValue>,
    #[serde(default)]
    pub parameters: IndexMap<String, Swagger2Parameter>,
    #[serde(default)]
    pub responses: IndexMap<String, Swagger2Response>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Swagger2PathItem {
    #[serde(default)]
    pub get: Option<Swagger2Operation>,
    #[serde(default)]
    pub put: Option<Swagger2Operation>,
    #[serde(default)]
    pub post: Option<Swagger2Operation>,
    #[serde(default)]
    pub delete: Option<Swagger2Operation>,
    #[serde(default)]
    pub options: Option<Swagger2Operation>,
    #[serde(default)]
    pub head: Option<Swagger2Operation>,
    #[serde(default)]
    pub patch: Option<Swagger2Operation>,
    #[serde(default)]
    pub parameters: Vec<ReferenceOr<Swagger2Parameter>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swagger2Operation {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default)]
    pub produces: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ReferenceOr<Swagger2Parameter>>,
    #[serde(default)]
    pub responses: IndexMap<String, ReferenceOr<Swagger2Response>>,
    #[serde(default)]
    pub deprecated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swagger2Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "type")]
    pub param_type: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub schema: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swagger2Response {
    pub description: String,
    #[serde(default)]
    pub schema: Option<JsonValue>,
}

/// A document that passed validation and bundling
///
/// Only the ingestion pipeline constructs these, so holding one means the
/// tree is structurally valid and every `$ref` in it resolves locally.
#[derive(Debug, Clone)]
pub struct ValidatedDocument {
    tree: JsonValue,
    api: ApiDocument,
    version_override: Option<VersionOverride>,
}

impl ValidatedDocument {
    pub(crate) fn new(
        tree: JsonValue,
        api: ApiDocument,
        version_override: Option<VersionOverride>,
    ) -> Self {
        Self {
            tree,
            api,
            version_override,
        }
    }

    /// Bundled document tree
    pub fn tree(&self) -> &JsonValue {
        &self.tree
    }

    pub fn api(&self) -> &ApiDocument {
        &self.api
    }

    pub fn family(&self) -> SpecFamily {
        self.api.family()
    }

    pub fn title(&self) -> &str {
        &self.api.info().title
    }

    /// Present when the declared version was rewritten to make the document loadable
    pub fn version_override(&self) -> Option<&VersionOverride> {
        self.version_override.as_ref()
    }

    pub fn version_overridden(&self) -> bool {
        self.version_override.is_some()
    }

    /// YAML serialization of the bundled tree
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.tree)
            .map_err(|e| IngestError::bundle(format!("failed to serialize bundled document: {}", e)))
    }
}
