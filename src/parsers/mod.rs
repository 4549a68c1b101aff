pub mod json_parser;
pub mod yaml_parser;

use crate::error::{IngestError, Result};
use serde_json::Value;

pub use json_parser::JsonParser;
pub use yaml_parser::YamlParser;

/// Text format parser - converts document text to a generic tree
pub trait FormatParser: Send + Sync {
    /// Name of the format (e.g., "yaml", "json")
    fn format_name(&self) -> &str;

    /// File extensions this parser is tried first for
    fn supported_extensions(&self) -> Vec<&str>;

    /// Parse text into a generic document tree
    fn parse(&self, text: &str) -> std::result::Result<Value, String>;
}

/// Parser registry, ordered by default preference
pub struct ParserRegistry {
    parsers: Vec<Box<dyn FormatParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: Vec::new(),
        };

        // YAML first: it accepts most JSON as well
        registry.register(Box::new(YamlParser));
        registry.register(Box::new(JsonParser));

        registry
    }

    pub fn register(&mut self, parser: Box<dyn FormatParser>) {
        self.parsers.push(parser);
    }

    pub fn get(&self, format: &str) -> Option<&dyn FormatParser> {
        self.parsers
            .iter()
            .find(|p| p.format_name() == format)
            .map(|p| p.as_ref())
    }

    /// Parsers in the order they should be tried for the given hint
    ///
    /// The hint is a file extension or a format name. Parsers claiming it come
    /// first, the rest keep registration order.
    pub fn attempt_order(&self, hint: Option<&str>) -> Vec<&dyn FormatParser> {
        let claims = |parser: &dyn FormatParser| match hint {
            Some(hint) => {
                parser.format_name() == hint || parser.supported_extensions().contains(&hint)
            }
            None => false,
        };

        let mut ordered: Vec<&dyn FormatParser> = Vec::new();
        ordered.extend(self.parsers.iter().map(|p| p.as_ref()).filter(|p| claims(*p)));
        ordered.extend(self.parsers.iter().map(|p| p.as_ref()).filter(|p| !claims(*p)));
        ordered
    }

    /// Parse a candidate specification
    ///
    /// Each parser is tried in turn; a result is accepted only when it is an
    /// object carrying a recognizable `swagger` or `openapi` version key.
    pub fn parse_spec(&self, text: &str, hint: Option<&str>) -> Result<Value> {
        let mut failures: Vec<(String, String)> = Vec::new();

        for parser in self.attempt_order(hint) {
            match parser.parse(text) {
                Ok(value) if is_candidate(&value) => {
                    tracing::debug!(format = parser.format_name(), "Parsed specification text");
                    return Ok(value);
                }
                Ok(_) => failures.push((
                    parser.format_name().to_string(),
                    "parsed, but the result has no `swagger` (2.x) or `openapi` (3.x) version key"
                        .to_string(),
                )),
                Err(message) => failures.push((parser.format_name().to_string(), message)),
            }
        }

        let message_for = |format: &str| {
            failures
                .iter()
                .find(|(name, _)| name == format)
                .map(|(_, message)| message.clone())
                .unwrap_or_else(|| "not attempted".to_string())
        };

        Err(IngestError::Parse {
            yaml: message_for("yaml"),
            json: message_for("json"),
        })
    }

    /// Parse any YAML or JSON document, without the version-key check
    ///
    /// Used for external documents pulled in by `$ref`, which are often bare
    /// schema files.
    pub fn parse_any(&self, text: &str, hint: Option<&str>) -> std::result::Result<Value, String> {
        let mut messages = Vec::new();
        for parser in self.attempt_order(hint) {
            match parser.parse(text) {
                Ok(value) => return Ok(value),
                Err(message) => messages.push(format!("{}: {}", parser.format_name(), message)),
            }
        }
        Err(messages.join("; "))
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a parsed tree looks like a Swagger 2.x or OpenAPI 3.x document
pub fn is_candidate(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };

    let swagger = object
        .get("swagger")
        .and_then(Value::as_str)
        .map(|v| v.starts_with("2."))
        .unwrap_or(false);
    let openapi = object
        .get("openapi")
        .and_then(Value::as_str)
        .map(|v| v.starts_with("3."))
        .unwrap_or(false);

    swagger || openapi
}
