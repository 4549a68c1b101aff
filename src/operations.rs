use crate::model::{ApiDocument, Swagger2Document, Swagger2Operation, Swagger2Parameter, Swagger2Response};
use crate::refs;
use indexmap::IndexMap;
use openapiv3::{
    MediaType, OpenAPI, Operation, Parameter, ParameterSchemaOrContent, PathItem, ReferenceOr,
    RequestBody, Response, Schema, SchemaKind, Type,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    /// Method for a path item key (`get`, `post`, ...)
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "get" => Some(HttpMethod::Get),
            "put" => Some(HttpMethod::Put),
            "post" => Some(HttpMethod::Post),
            "delete" => Some(HttpMethod::Delete),
            "options" => Some(HttpMethod::Options),
            "head" => Some(HttpMethod::Head),
            "patch" => Some(HttpMethod::Patch),
            "trace" => Some(HttpMethod::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDetails {
    pub id: String,
    pub method: HttpMethod,
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub parameters: Vec<ParameterDetails>,
    pub request_body: Option<RequestBodyDetails>,
    pub responses: Vec<ResponseDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDetails {
    pub name: String,
    pub location: String, // query, path, header, cookie, formData, body
    pub required: bool,
    pub schema_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBodyDetails {
    pub required: bool,
    pub content_type: String,
    pub schema_ref: Option<String>,
    pub schema_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDetails {
    pub status_code: String,
    pub description: String,
    pub content_type: Option<String>,
    pub schema_ref: Option<String>,
    pub schema_type: Option<String>,
    pub is_array: bool,
}

/// One row of the endpoint list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
    pub operation_id: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
}

impl From<&OperationDetails> for Endpoint {
    fn from(op: &OperationDetails) -> Self {
        Self {
            method: op.method,
            path: op.path.clone(),
            operation_id: op.id.clone(),
            summary: op.summary.clone(),
            tags: op.tags.clone(),
            deprecated: op.deprecated,
        }
    }
}

/// Endpoint list of a document, in path order
pub fn list_endpoints(api: &ApiDocument) -> Vec<Endpoint> {
    extract_operations(api).iter().map(Endpoint::from).collect()
}

/// Details of every operation, in path order
pub fn extract_operations(api: &ApiDocument) -> Vec<OperationDetails> {
    match api {
        ApiDocument::OpenApi3(openapi) => extract_openapi_operations(openapi),
        ApiDocument::Swagger2(swagger) => extract_swagger_operations(swagger),
    }
}

/// Find one operation by method and path
pub fn find_operation(api: &ApiDocument, method: HttpMethod, path: &str) -> Option<OperationDetails> {
    extract_operations(api)
        .into_iter()
        .find(|op| op.method == method && op.path == path)
}

fn fallback_id(method: HttpMethod, path: &str) -> String {
    format!(
        "{}_{}",
        method.as_str().to_lowercase(),
        path.replace('/', "_").replace(['{', '}'], "")
    )
}

/// Last segment of a `$ref`, i.e. the referenced component's name
fn ref_name(reference: &str) -> String {
    refs::decode_token(reference.split('/').next_back().unwrap_or("Unknown"))
}

/// Decoded entry name of a `<prefix><name>` reference
fn named_ref(reference: &str, prefix: &str) -> Option<String> {
    reference.strip_prefix(prefix).map(refs::decode_token)
}

// ---------------------------------------------------------------------------
// OpenAPI 3.0

fn extract_openapi_operations(openapi: &OpenAPI) -> Vec<OperationDetails> {
    let mut operations = Vec::new();

    for (path, path_item) in &openapi.paths.paths {
        if let ReferenceOr::Item(item) = path_item {
            for (method, operation) in path_item_operations(item) {
                operations.push(process_operation(openapi, item, operation, method, path));
            }
        }
    }

    operations
}

fn path_item_operations(item: &PathItem) -> Vec<(HttpMethod, &Operation)> {
    let ops = [
        (HttpMethod::Get, &item.get),
        (HttpMethod::Put, &item.put),
        (HttpMethod::Post, &item.post),
        (HttpMethod::Delete, &item.delete),
        (HttpMethod::Options, &item.options),
        (HttpMethod::Head, &item.head),
        (HttpMethod::Patch, &item.patch),
        (HttpMethod::Trace, &item.trace),
    ];

    ops.into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
        .collect()
}

fn process_operation(
    openapi: &OpenAPI,
    item: &PathItem,
    operation: &Operation,
    method: HttpMethod,
    path: &str,
) -> OperationDetails {
    let id = operation
        .operation_id
        .clone()
        .unwrap_or_else(|| fallback_id(method, path));

    // Operation-level parameters override path-level ones with the same name and location
    let mut parameters: Vec<ParameterDetails> = Vec::new();
    for param_ref in item.parameters.iter().chain(operation.parameters.iter()) {
        if let Some(param) = process_parameter(openapi, param_ref) {
            match parameters
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(existing) => *existing = param,
                None => parameters.push(param),
            }
        }
    }

    let request_body = operation
        .request_body
        .as_ref()
        .and_then(|body| resolve_request_body(openapi, body))
        .map(process_request_body);

    let mut responses: Vec<ResponseDetails> = operation
        .responses
        .responses
        .iter()
        .filter_map(|(status, resp)| {
            resolve_response(openapi, resp).map(|r| process_response(status.to_string(), r))
        })
        .collect();
    if let Some(default) = &operation.responses.default {
        if let Some(response) = resolve_response(openapi, default) {
            responses.push(process_response("default".to_string(), response));
        }
    }

    OperationDetails {
        id,
        method,
        path: path.to_string(),
        summary: operation.summary.clone(),
        description: operation.description.clone(),
        tags: operation.tags.clone(),
        deprecated: operation.deprecated,
        parameters,
        request_body,
        responses,
    }
}

/// Follow a `#/components/<section>/<name>` reference one level
fn resolve_component<'a, T>(
    reference: &str,
    section: &str,
    items: impl Fn(&'a openapiv3::Components) -> &'a IndexMap<String, ReferenceOr<T>>,
    openapi: &'a OpenAPI,
) -> Option<&'a T> {
    let name = named_ref(reference, &format!("#/components/{}/", section))?;
    let components = openapi.components.as_ref()?;
    match items(components).get(&name)? {
        ReferenceOr::Item(item) => Some(item),
        ReferenceOr::Reference { .. } => None,
    }
}

fn resolve_parameter<'a>(openapi: &'a OpenAPI, param: &'a ReferenceOr<Parameter>) -> Option<&'a Parameter> {
    match param {
        ReferenceOr::Item(param) => Some(param),
        ReferenceOr::Reference { reference } => {
            resolve_component(reference, "parameters", |c| &c.parameters, openapi)
        }
    }
}

fn resolve_request_body<'a>(
    openapi: &'a OpenAPI,
    body: &'a ReferenceOr<RequestBody>,
) -> Option<&'a RequestBody> {
    match body {
        ReferenceOr::Item(body) => Some(body),
        ReferenceOr::Reference { reference } => {
            resolve_component(reference, "requestBodies", |c| &c.request_bodies, openapi)
        }
    }
}

fn resolve_response<'a>(openapi: &'a OpenAPI, response: &'a ReferenceOr<Response>) -> Option<&'a Response> {
    match response {
        ReferenceOr::Item(response) => Some(response),
        ReferenceOr::Reference { reference } => {
            resolve_component(reference, "responses", |c| &c.responses, openapi)
        }
    }
}

fn process_parameter(openapi: &OpenAPI, param_ref: &ReferenceOr<Parameter>) -> Option<ParameterDetails> {
    let param = resolve_parameter(openapi, param_ref)?;
    let location = match param {
        Parameter::Query { .. } => "query",
        Parameter::Header { .. } => "header",
        Parameter::Path { .. } => "path",
        Parameter::Cookie { .. } => "cookie",
    };
    let data = param.parameter_data_ref();

    Some(ParameterDetails {
        name: data.name.clone(),
        location: location.to_string(),
        required: data.required,
        schema_type: parameter_type(&data.format),
        description: data.description.clone(),
    })
}

fn parameter_type(format: &ParameterSchemaOrContent) -> String {
    match format {
        ParameterSchemaOrContent::Schema(ReferenceOr::Item(schema)) => schema_kind_label(schema).to_string(),
        ParameterSchemaOrContent::Schema(ReferenceOr::Reference { reference }) => ref_name(reference),
        ParameterSchemaOrContent::Content(_) => "any".to_string(),
    }
}

fn process_request_body(body: &RequestBody) -> RequestBodyDetails {
    let content_type = body
        .content
        .keys()
        .next()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/json".to_string());

    let (schema_ref, schema_type, _) = body
        .content
        .get(&content_type)
        .and_then(media_type_schema_info)
        .unwrap_or((None, None, false));

    RequestBodyDetails {
        required: body.required,
        content_type,
        schema_ref,
        schema_type,
    }
}

fn process_response(status: String, response: &Response) -> ResponseDetails {
    let content_type = response.content.keys().next().map(|s| s.to_string());

    let (schema_ref, schema_type, is_array) = content_type
        .as_ref()
        .and_then(|ct| response.content.get(ct))
        .and_then(media_type_schema_info)
        .unwrap_or((None, None, false));

    ResponseDetails {
        status_code: status,
        description: response.description.clone(),
        content_type,
        schema_ref,
        schema_type,
        is_array,
    }
}

fn schema_kind_label(schema: &Schema) -> &'static str {
    match &schema.schema_kind {
        SchemaKind::Type(Type::String(_)) => "string",
        SchemaKind::Type(Type::Number(_)) => "number",
        SchemaKind::Type(Type::Integer(_)) => "integer",
        SchemaKind::Type(Type::Boolean(_)) => "boolean",
        SchemaKind::Type(Type::Array(_)) => "array",
        SchemaKind::Type(Type::Object(_)) => "object",
        SchemaKind::OneOf { .. } => "oneOf",
        SchemaKind::AllOf { .. } => "allOf",
        SchemaKind::AnyOf { .. } => "anyOf",
        _ => "any",
    }
}

/// Referenced schema name, type label and array flag of a media type
fn media_type_schema_info(media_type: &MediaType) -> Option<(Option<String>, Option<String>, bool)> {
    media_type.schema.as_ref().map(|schema_ref| match schema_ref {
        ReferenceOr::Reference { reference } => {
            (Some(ref_name(reference)), Some("object".to_string()), false)
        }
        ReferenceOr::Item(schema) => match &schema.schema_kind {
            SchemaKind::Type(Type::Array(array_type)) => match &array_type.items {
                Some(ReferenceOr::Reference { reference }) => {
                    (Some(ref_name(reference)), Some("object".to_string()), true)
                }
                Some(ReferenceOr::Item(item)) => {
                    (None, Some(schema_kind_label(item).to_string()), true)
                }
                None => (None, Some("any".to_string()), true),
            },
            _ => (None, Some(schema_kind_label(schema).to_string()), false),
        },
    })
}

// ---------------------------------------------------------------------------
// Swagger 2.0

fn extract_swagger_operations(swagger: &Swagger2Document) -> Vec<OperationDetails> {
    let mut operations = Vec::new();

    for (path, item) in &swagger.paths {
        let ops = [
            (HttpMethod::Get, &item.get),
            (HttpMethod::Put, &item.put),
            (HttpMethod::Post, &item.post),
            (HttpMethod::Delete, &item.delete),
            (HttpMethod::Options, &item.options),
            (HttpMethod::Head, &item.head),
            (HttpMethod::Patch, &item.patch),
        ];
        for (method, op) in ops {
            if let Some(op) = op {
                operations.push(process_swagger_operation(swagger, &item.parameters, op, method, path));
            }
        }
    }

    operations
}

fn process_swagger_operation(
    swagger: &Swagger2Document,
    path_parameters: &[ReferenceOr<Swagger2Parameter>],
    operation: &Swagger2Operation,
    method: HttpMethod,
    path: &str,
) -> OperationDetails {
    let mut parameters: Vec<&Swagger2Parameter> = Vec::new();
    for param_ref in path_parameters.iter().chain(operation.parameters.iter()) {
        let param = match param_ref {
            ReferenceOr::Item(param) => Some(param),
            ReferenceOr::Reference { reference } => named_ref(reference, "#/parameters/")
                .and_then(|name| swagger.parameters.get(&name)),
        };
        if let Some(param) = param {
            match parameters
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(existing) => *existing = param,
                None => parameters.push(param),
            }
        }
    }

    let consumes = operation
        .consumes
        .first()
        .or_else(|| swagger.consumes.first())
        .cloned()
        .unwrap_or_else(|| "application/json".to_string());
    let produces = operation
        .produces
        .first()
        .or_else(|| swagger.produces.first())
        .cloned();

    let request_body = parameters
        .iter()
        .find(|p| p.location == "body")
        .map(|p| {
            let (schema_ref, schema_type, _) = p
                .schema
                .as_ref()
                .map(json_schema_info)
                .unwrap_or((None, None, false));
            RequestBodyDetails {
                required: p.required,
                content_type: consumes.clone(),
                schema_ref,
                schema_type,
            }
        });

    let parameter_details = parameters
        .iter()
        .filter(|p| p.location != "body")
        .map(|p| ParameterDetails {
            name: p.name.clone(),
            location: p.location.clone(),
            required: p.required,
            schema_type: p.param_type.clone().unwrap_or_else(|| "any".to_string()),
            description: p.description.clone(),
        })
        .collect();

    let responses = operation
        .responses
        .iter()
        .filter_map(|(status, response_ref)| {
            let response: &Swagger2Response = match response_ref {
                ReferenceOr::Item(response) => response,
                ReferenceOr::Reference { reference } => named_ref(reference, "#/responses/")
                    .and_then(|name| swagger.responses.get(&name))?,
            };
            let (schema_ref, schema_type, is_array) = response
                .schema
                .as_ref()
                .map(json_schema_info)
                .unwrap_or((None, None, false));
            Some(ResponseDetails {
                status_code: status.clone(),
                description: response.description.clone(),
                content_type: response.schema.as_ref().and(produces.clone()),
                schema_ref,
                schema_type,
                is_array,
            })
        })
        .collect();

    OperationDetails {
        id: operation
            .operation_id
            .clone()
            .unwrap_or_else(|| fallback_id(method, path)),
        method,
        path: path.to_string(),
        summary: operation.summary.clone(),
        description: operation.description.clone(),
        tags: operation.tags.clone(),
        deprecated: operation.deprecated,
        parameters: parameter_details,
        request_body,
        responses,
    }
}

/// Referenced schema name, type label and array flag of an untyped schema
fn json_schema_info(schema: &JsonValue) -> (Option<String>, Option<String>, bool) {
    if let Some(reference) = schema.get("$ref").and_then(JsonValue::as_str) {
        return (Some(ref_name(reference)), Some("object".to_string()), false);
    }

    let type_label = schema
        .get("type")
        .and_then(JsonValue::as_str)
        .unwrap_or("any")
        .to_string();

    if type_label == "array" {
        let items = schema.get("items");
        if let Some(reference) = items
            .and_then(|i| i.get("$ref"))
            .and_then(JsonValue::as_str)
        {
            return (Some(ref_name(reference)), Some("object".to_string()), true);
        }
        let item_type = items
            .and_then(|i| i.get("type"))
            .and_then(JsonValue::as_str)
            .unwrap_or("any")
            .to_string();
        return (None, Some(item_type), true);
    }

    (None, Some(type_label), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::SpecFamily;
    use serde_json::json;

    fn openapi_doc() -> ApiDocument {
        let tree = json!({
            "openapi": "3.0.3",
            "info": { "title": "Pets", "version": "1" },
            "paths": {
                "/pets/{petId}": {
                    "parameters": [
                        { "name": "petId", "in": "path", "required": true, "schema": { "type": "string" } }
                    ],
                    "get": {
                        "operationId": "getPet",
                        "tags": ["pets"],
                        "parameters": [
                            { "name": "petId", "in": "path", "required": true, "schema": { "type": "integer" } },
                            { "$ref": "#/components/parameters/Verbose" }
                        ],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } }
                            },
                            "default": { "$ref": "#/components/responses/Problem" }
                        }
                    },
                    "put": {
                        "requestBody": {
                            "required": true,
                            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } }
                        },
                        "responses": { "204": { "description": "updated" } }
                    }
                }
            },
            "components": {
                "parameters": {
                    "Verbose": { "name": "verbose", "in": "query", "schema": { "type": "boolean" } }
                },
                "responses": {
                    "Problem": {
                        "description": "error",
                        "content": {
                            "application/problem+json": {
                                "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Problem" } }
                            }
                        }
                    }
                },
                "schemas": { "Pet": { "type": "object" }, "Problem": { "type": "object" } }
            }
        });
        ApiDocument::from_tree(SpecFamily::OpenApi3, &tree).unwrap()
    }

    #[test]
    fn test_openapi_operations() {
        let ops = extract_operations(&openapi_doc());
        assert_eq!(ops.len(), 2);

        let get = &ops[0];
        assert_eq!(get.id, "getPet");
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.parameters.len(), 2);
        assert_eq!(get.parameters[0].schema_type, "integer");
        assert_eq!(get.parameters[1].name, "verbose");
        assert_eq!(get.responses[0].schema_ref.as_deref(), Some("Pet"));
        assert_eq!(get.responses[1].status_code, "default");
        assert_eq!(get.responses[1].schema_ref.as_deref(), Some("Problem"));
        assert!(get.responses[1].is_array);

        let put = &ops[1];
        assert_eq!(put.id, "put__pets_petId");
        let body = put.request_body.as_ref().unwrap();
        assert!(body.required);
        assert_eq!(body.schema_ref.as_deref(), Some("Pet"));
    }

    #[test]
    fn test_endpoint_list_and_lookup() {
        let doc = openapi_doc();
        let endpoints = list_endpoints(&doc);
        assert_eq!(endpoints[0].method.to_string(), "GET");
        assert_eq!(endpoints[0].tags, vec!["pets".to_string()]);
        assert!(find_operation(&doc, HttpMethod::Put, "/pets/{petId}").is_some());
        assert!(find_operation(&doc, HttpMethod::Delete, "/pets/{petId}").is_none());
    }

    #[test]
    fn test_swagger_operations() {
        let tree = json!({
            "swagger": "2.0",
            "info": { "title": "Pets", "version": "1" },
            "produces": ["application/json"],
            "paths": {
                "/pets": {
                    "post": {
                        "operationId": "addPet",
                        "parameters": [
                            { "name": "pet", "in": "body", "required": true, "schema": { "$ref": "#/definitions/Pet" } },
                            { "$ref": "#/parameters/Trace" }
                        ],
                        "responses": {
                            "200": { "description": "ok", "schema": { "type": "array", "items": { "$ref": "#/definitions/Pet" } } },
                            "405": { "description": "invalid input" }
                        }
                    }
                }
            },
            "parameters": {
                "Trace": { "name": "X-Trace", "in": "header", "type": "string" }
            },
            "definitions": { "Pet": { "type": "object" } }
        });
        let doc = ApiDocument::from_tree(SpecFamily::Swagger2, &tree).unwrap();
        let ops = extract_operations(&doc);
        assert_eq!(ops.len(), 1);

        let post = &ops[0];
        assert_eq!(post.request_body.as_ref().unwrap().schema_ref.as_deref(), Some("Pet"));
        assert_eq!(post.parameters.len(), 1);
        assert_eq!(post.parameters[0].location, "header");
        assert!(post.responses[0].is_array);
        assert_eq!(post.responses[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(post.responses[1].content_type, None);
    }

    #[test]
    fn test_swagger_escaped_component_names() {
        let tree = json!({
            "swagger": "2.0",
            "info": { "title": "Pets", "version": "1" },
            "paths": {
                "/pets": {
                    "get": {
                        "parameters": [{ "$ref": "#/parameters/paging~1limit" }],
                        "responses": {
                            "200": { "$ref": "#/responses/Pet%20List" },
                            "404": { "$ref": "#/responses/not~0found" }
                        }
                    }
                }
            },
            "parameters": {
                "paging/limit": { "name": "limit", "in": "query", "type": "integer" }
            },
            "responses": {
                "Pet List": { "description": "pets", "schema": { "$ref": "#/definitions/Pet%20Info" } },
                "not~found": { "description": "missing" }
            },
            "definitions": { "Pet Info": { "type": "object" } }
        });
        let doc = ApiDocument::from_tree(SpecFamily::Swagger2, &tree).unwrap();
        let ops = extract_operations(&doc);

        let get = &ops[0];
        assert_eq!(get.parameters.len(), 1);
        assert_eq!(get.parameters[0].name, "limit");
        assert_eq!(get.responses.len(), 2);
        assert_eq!(get.responses[0].description, "pets");
        assert_eq!(get.responses[0].schema_ref.as_deref(), Some("Pet Info"));
        assert_eq!(get.responses[1].description, "missing");
    }
}
