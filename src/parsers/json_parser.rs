use super::FormatParser;
use serde_json::Value;

pub struct JsonParser;

impl FormatParser for JsonParser {
    fn format_name(&self) -> &str {
        "json"
    }

    fn supported_extensions(&self) -> Vec<&str> {
        vec!["json"]
    }

    fn parse(&self, text: &str) -> Result<Value, String> {
        // Strip a UTF-8 BOM, which some editors and servers prepend
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        serde_json::from_str(text).map_err(|e| e.to_string())
    }
}
