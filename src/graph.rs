//! Schema usage graph
//!
//! For every named schema: which operations use it as a request body or a
//! response, and which other named schemas reference it. Edges point from the
//! referencing schema to the referenced one; the referenced schema's entry
//! records the referencer.

use crate::model::ValidatedDocument;
use crate::operations::HttpMethod;
use crate::refs::{self, decode_token, follow_local};
use crate::validate::SpecFamily;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UsageRole {
    RequestBody,
    Response,
}

/// An operation that uses a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationUsage {
    pub path: String,
    pub method: HttpMethod,
    pub role: UsageRole,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaUsage {
    pub operations: Vec<OperationUsage>,
    pub referenced_by_schemas: Vec<String>,
}

impl SchemaUsage {
    /// Defined but neither used by an operation nor referenced by another schema
    pub fn is_unused(&self) -> bool {
        self.operations.is_empty() && self.referenced_by_schemas.is_empty()
    }

    fn add_operation(&mut self, usage: OperationUsage) {
        if !self.operations.contains(&usage) {
            self.operations.push(usage);
        }
    }

    fn add_referencer(&mut self, name: &str) {
        if !self.referenced_by_schemas.iter().any(|n| n == name) {
            self.referenced_by_schemas.push(name.to_string());
        }
    }
}

/// Usage of every named schema, in declaration order
pub type SchemaUsageMap = IndexMap<String, SchemaUsage>;

/// Build the usage map for a validated document
pub fn build_schema_usage(document: &ValidatedDocument) -> SchemaUsageMap {
    build_from_tree(document.tree(), document.family())
}

/// Build the usage map from a bundled tree
pub fn build_from_tree(tree: &Value, family: SpecFamily) -> SchemaUsageMap {
    let prefix = family.schema_ref_prefix();
    let schemas = tree
        .pointer(family.schema_container_pointer())
        .and_then(Value::as_object);

    let mut usage: SchemaUsageMap = IndexMap::new();
    let Some(schemas) = schemas else {
        return usage;
    };
    for name in schemas.keys() {
        usage.insert(name.clone(), SchemaUsage::default());
    }

    // Schema → schema edges
    for (name, body) in schemas {
        refs::visit_refs(body, &mut |reference| {
            if let Some(target) = schema_name(reference, prefix) {
                if target != *name {
                    if let Some(entry) = usage.get_mut(&target) {
                        entry.add_referencer(name);
                    }
                }
            }
        });
    }

    // Operation → schema edges
    let Some(paths) = tree.get("paths").and_then(Value::as_object) else {
        return usage;
    };
    for (path, item) in paths {
        let item = follow_local(tree, item);
        let Some(item) = item.as_object() else {
            continue;
        };

        for (key, operation) in item {
            let Some(method) = HttpMethod::from_key(key) else {
                continue;
            };
            let mut record = |node: &Value, role: UsageRole| {
                refs::visit_refs(node, &mut |reference| {
                    if let Some(target) = schema_name(reference, prefix) {
                        if let Some(entry) = usage.get_mut(&target) {
                            entry.add_operation(OperationUsage {
                                path: path.clone(),
                                method,
                                role,
                            });
                        }
                    }
                });
            };

            match family {
                SpecFamily::OpenApi3 => {
                    if let Some(body) = operation.get("requestBody") {
                        for schema in content_schemas(follow_local(tree, body)) {
                            record(schema, UsageRole::RequestBody);
                        }
                    }
                    for response in responses(tree, operation) {
                        for schema in content_schemas(response) {
                            record(schema, UsageRole::Response);
                        }
                    }
                }
                SpecFamily::Swagger2 => {
                    let path_parameters = item.get("parameters");
                    let operation_parameters = operation.get("parameters");
                    for parameters in [path_parameters, operation_parameters].into_iter().flatten() {
                        for parameter in parameters.as_array().into_iter().flatten() {
                            let parameter = follow_local(tree, parameter);
                            if parameter.get("in").and_then(Value::as_str) == Some("body") {
                                if let Some(schema) = parameter.get("schema") {
                                    record(schema, UsageRole::RequestBody);
                                }
                            }
                        }
                    }
                    for response in responses(tree, operation) {
                        if let Some(schema) = response.get("schema") {
                            record(schema, UsageRole::Response);
                        }
                    }
                }
            }
        }
    }

    usage
}

/// Named schema a reference points at, if it points into the schema container
///
/// `#/components/schemas/Pet/properties/id` still counts as a use of `Pet`.
fn schema_name(reference: &str, prefix: &str) -> Option<String> {
    let rest = reference.strip_prefix(prefix)?;
    let token = rest.split('/').next().filter(|t| !t.is_empty())?;
    Some(decode_token(token))
}

/// Response objects of an operation, following local `$ref`s one level
fn responses<'a>(tree: &'a Value, operation: &'a Value) -> Vec<&'a Value> {
    operation
        .get("responses")
        .and_then(Value::as_object)
        .map(|responses| {
            responses
                .iter()
                .filter(|(code, _)| !code.starts_with("x-"))
                .map(|(_, response)| follow_local(tree, response))
                .collect()
        })
        .unwrap_or_default()
}

/// Schemas under a `content` map (OpenAPI 3)
fn content_schemas(node: &Value) -> Vec<&Value> {
    node.get("content")
        .and_then(Value::as_object)
        .map(|content| {
            content
                .values()
                .filter_map(|media_type| media_type.get("schema"))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usage_for(tree: Value, family: SpecFamily) -> SchemaUsageMap {
        build_from_tree(&tree, family)
    }

    #[test]
    fn test_edges_point_from_referencer_to_referenced() {
        let usage = usage_for(
            json!({
                "openapi": "3.0.0",
                "paths": {
                    "/b": {
                        "get": {
                            "responses": {
                                "200": {
                                    "description": "ok",
                                    "content": {
                                        "application/json": {
                                            "schema": { "$ref": "#/components/schemas/B" }
                                        }
                                    }
                                }
                            }
                        }
                    }
                },
                "components": {
                    "schemas": {
                        "A": {
                            "type": "object",
                            "properties": { "b": { "$ref": "#/components/schemas/B" } }
                        },
                        "B": { "type": "string" }
                    }
                }
            }),
            SpecFamily::OpenApi3,
        );

        let b = &usage["B"];
        assert_eq!(b.referenced_by_schemas, vec!["A".to_string()]);
        assert_eq!(
            b.operations,
            vec![OperationUsage {
                path: "/b".to_string(),
                method: HttpMethod::Get,
                role: UsageRole::Response,
            }]
        );

        let a = &usage["A"];
        assert!(a.referenced_by_schemas.is_empty());
        assert!(a.operations.is_empty());
    }

    #[test]
    fn test_self_and_duplicate_edges_suppressed() {
        let usage = usage_for(
            json!({
                "openapi": "3.0.0",
                "paths": {
                    "/nodes": {
                        "post": {
                            "requestBody": {
                                "content": {
                                    "application/json": { "schema": { "$ref": "#/components/schemas/Node" } },
                                    "application/xml": { "schema": { "$ref": "#/components/schemas/Node" } }
                                }
                            },
                            "responses": {
                                "200": {
                                    "description": "ok",
                                    "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Node" } } }
                                },
                                "201": {
                                    "description": "created",
                                    "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Node" } } }
                                }
                            }
                        }
                    }
                },
                "components": {
                    "schemas": {
                        "Node": {
                            "type": "object",
                            "properties": {
                                "children": { "type": "array", "items": { "$ref": "#/components/schemas/Node" } }
                            }
                        },
                        "Tree": {
                            "properties": {
                                "root": { "$ref": "#/components/schemas/Node" },
                                "leaf": { "$ref": "#/components/schemas/Node/properties/children" }
                            }
                        }
                    }
                }
            }),
            SpecFamily::OpenApi3,
        );

        let node = &usage["Node"];
        assert_eq!(node.referenced_by_schemas, vec!["Tree".to_string()]);
        assert_eq!(node.operations.len(), 2);
        assert_eq!(node.operations[0].role, UsageRole::RequestBody);
        assert_eq!(node.operations[1].role, UsageRole::Response);
        assert!(usage["Tree"].is_unused());
    }

    #[test]
    fn test_component_request_bodies_and_responses_followed() {
        let usage = usage_for(
            json!({
                "openapi": "3.0.0",
                "paths": {
                    "/pets": {
                        "put": {
                            "requestBody": { "$ref": "#/components/requestBodies/PetBody" },
                            "responses": { "default": { "$ref": "#/components/responses/Problem" } }
                        }
                    }
                },
                "components": {
                    "requestBodies": {
                        "PetBody": { "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } } }
                    },
                    "responses": {
                        "Problem": { "description": "error", "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Problem" } } } }
                    },
                    "schemas": { "Pet": {}, "Problem": {}, "Unused": {} }
                }
            }),
            SpecFamily::OpenApi3,
        );

        assert_eq!(usage["Pet"].operations[0].role, UsageRole::RequestBody);
        assert_eq!(usage["Pet"].operations[0].method, HttpMethod::Put);
        assert_eq!(usage["Problem"].operations[0].role, UsageRole::Response);
        assert!(usage["Unused"].is_unused());
        let names: Vec<&String> = usage.keys().collect();
        assert_eq!(names, vec!["Pet", "Problem", "Unused"]);
    }

    #[test]
    fn test_swagger_body_parameters_and_response_schemas() {
        let usage = usage_for(
            json!({
                "swagger": "2.0",
                "paths": {
                    "/pets/{id}": {
                        "parameters": [
                            { "name": "pet", "in": "body", "schema": { "$ref": "#/definitions/Pet" } }
                        ],
                        "get": {
                            "parameters": [ { "$ref": "#/parameters/Filter" } ],
                            "responses": {
                                "200": {
                                    "description": "ok",
                                    "schema": { "type": "array", "items": { "$ref": "#/definitions/Pet" } }
                                }
                            }
                        }
                    }
                },
                "parameters": {
                    "Filter": { "name": "filter", "in": "body", "schema": { "$ref": "#/definitions/Filter" } }
                },
                "definitions": {
                    "Pet": { "properties": { "owner": { "$ref": "#/definitions/Owner" } } },
                    "Owner": {},
                    "Filter": {}
                }
            }),
            SpecFamily::Swagger2,
        );

        let pet = &usage["Pet"];
        assert_eq!(pet.operations.len(), 2);
        assert_eq!(pet.operations[0].role, UsageRole::RequestBody);
        assert_eq!(pet.operations[1].role, UsageRole::Response);
        assert_eq!(usage["Owner"].referenced_by_schemas, vec!["Pet".to_string()]);
        assert_eq!(usage["Filter"].operations[0].path, "/pets/{id}");
    }

    #[test]
    fn test_encoded_schema_names() {
        let usage = usage_for(
            json!({
                "swagger": "2.0",
                "paths": {
                    "/pets": {
                        "get": {
                            "responses": {
                                "200": { "description": "ok", "schema": { "$ref": "#/definitions/Pet%20Info" } }
                            }
                        }
                    }
                },
                "definitions": {
                    "Pet Info": { "properties": { "tag": { "$ref": "#/definitions/tag~1v2" } } },
                    "tag/v2": {}
                }
            }),
            SpecFamily::Swagger2,
        );

        assert_eq!(usage["Pet Info"].operations[0].path, "/pets");
        assert_eq!(usage["tag/v2"].referenced_by_schemas, vec!["Pet Info".to_string()]);
    }

    #[test]
    fn test_no_schema_container() {
        let usage = usage_for(json!({ "openapi": "3.0.0", "paths": {} }), SpecFamily::OpenApi3);
        assert!(usage.is_empty());
    }

    #[test]
    fn test_schema_name_extraction() {
        assert_eq!(
            schema_name("#/components/schemas/Pet", "#/components/schemas/").as_deref(),
            Some("Pet")
        );
        assert_eq!(
            schema_name("#/definitions/a~1b/properties/x", "#/definitions/").as_deref(),
            Some("a/b")
        );
        assert_eq!(
            schema_name("#/definitions/Pet%20Info", "#/definitions/").as_deref(),
            Some("Pet Info")
        );
        assert_eq!(schema_name("#/components/responses/Pet", "#/components/schemas/"), None);
    }
}
