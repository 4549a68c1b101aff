pub mod markdown;
pub mod json;
pub mod yaml;

use crate::config::ReportConfig;
use crate::graph::{self, SchemaUsage};
use crate::model::ValidatedDocument;
use crate::operations::{self, Endpoint};
use crate::store::LoadedSpec;
use crate::validate::SpecFamily;
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;

pub use json::JsonRenderer;
pub use markdown::MarkdownRenderer;
pub use yaml::YamlRenderer;

/// Everything a report shows about one loaded specification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecReport {
    pub name: String,
    pub title: String,
    pub api_version: String,
    pub description: Option<String>,
    /// `OpenAPI` or `Swagger`
    pub format: String,
    pub spec_version: String,
    pub base_url: Option<String>,
    pub version_warning: Option<String>,
    pub endpoints: Vec<Endpoint>,
    pub schemas: Vec<SchemaReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaReport {
    pub name: String,
    pub unused: bool,
    pub usage: SchemaUsage,
}

impl SpecReport {
    pub fn new(name: &str, document: &ValidatedDocument) -> Self {
        let api = document.api();
        let info = api.info();

        let schemas = graph::build_schema_usage(document)
            .into_iter()
            .map(|(name, usage)| SchemaReport {
                name,
                unused: usage.is_unused(),
                usage,
            })
            .collect();

        Self {
            name: name.to_string(),
            title: info.title.clone(),
            api_version: info.version.clone(),
            description: info.description.clone(),
            format: match document.family() {
                SpecFamily::OpenApi3 => "OpenAPI".to_string(),
                SpecFamily::Swagger2 => "Swagger".to_string(),
            },
            spec_version: api.spec_version().to_string(),
            base_url: api.base_url(),
            version_warning: document.version_override().map(|o| o.warning()),
            endpoints: operations::list_endpoints(api),
            schemas,
        }
    }

    pub fn from_loaded(spec: &LoadedSpec) -> Self {
        Self::new(&spec.name, &spec.document)
    }
}

/// Renderer trait - turns a SpecReport into text
pub trait ReportRenderer: Send + Sync {
    /// Unique name of the renderer (e.g., "markdown", "json")
    fn name(&self) -> &str;

    /// File extension for rendered output (e.g., "md", "json")
    fn file_extension(&self) -> &str;

    fn render(&self, report: &SpecReport, config: &ReportConfig) -> Result<String>;
}

/// Renderer registry for managing available report formats
pub struct RendererRegistry {
    renderers: HashMap<String, Box<dyn ReportRenderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            renderers: HashMap::new(),
        };

        registry.register(Box::new(MarkdownRenderer));
        registry.register(Box::new(JsonRenderer));
        registry.register(Box::new(YamlRenderer));

        registry
    }

    pub fn register(&mut self, renderer: Box<dyn ReportRenderer>) {
        self.renderers.insert(renderer.name().to_string(), renderer);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ReportRenderer> {
        self.renderers.get(name).map(|r| r.as_ref())
    }

    pub fn available_renderers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.renderers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::SpecReport;
    use crate::model::{ApiDocument, ValidatedDocument};
    use crate::validate::SpecFamily;
    use crate::version::{OverrideStage, VersionOverride};
    use serde_json::json;

    pub fn sample_report() -> SpecReport {
        let tree = json!({
            "openapi": "3.0.3",
            "info": { "title": "Pet Store", "version": "1.2.0" },
            "servers": [ { "url": "https://pets.example.com/v1" } ],
            "paths": {
                "/pets": {
                    "get": {
                        "summary": "List pets",
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {
                                    "application/json": {
                                        "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Pet" } }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Pet": { "type": "object", "properties": { "tag": { "$ref": "#/components/schemas/Tag" } } },
                    "Tag": { "type": "string" },
                    "Orphan": { "type": "object" }
                }
            }
        });
        let api = ApiDocument::from_tree(SpecFamily::OpenApi3, &tree).unwrap();
        let record = VersionOverride {
            original: "3.0.7".to_string(),
            applied: "3.0.3".to_string(),
            stage: OverrideStage::Normalizer,
        };
        SpecReport::new("openapi.yaml", &ValidatedDocument::new(tree, api, Some(record)))
    }
}
