use super::{ReportRenderer, SpecReport};
use crate::config::ReportConfig;
use anyhow::{Context, Result};

pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn name(&self) -> &str {
        "json"
    }

    fn file_extension(&self) -> &str {
        "json"
    }

    fn render(&self, report: &SpecReport, _config: &ReportConfig) -> Result<String> {
        serde_json::to_string_pretty(report).context("Failed to serialize report as JSON")
    }
}
