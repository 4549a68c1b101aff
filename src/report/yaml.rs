use super::{ReportRenderer, SpecReport};
use crate::config::ReportConfig;
use anyhow::{Context, Result};

pub struct YamlRenderer;

impl ReportRenderer for YamlRenderer {
    fn name(&self) -> &str {
        "yaml"
    }

    fn file_extension(&self) -> &str {
        "yaml"
    }

    fn render(&self, report: &SpecReport, _config: &ReportConfig) -> Result<String> {
        serde_yaml::to_string(report).context("Failed to serialize report as YAML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::sample_report;

    #[test]
    fn test_yaml_reloads() {
        let content = YamlRenderer
            .render(&sample_report(), &ReportConfig::default())
            .unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
        assert_eq!(value["title"].as_str(), Some("Pet Store"));
        assert_eq!(value["schemas"][2]["unused"].as_bool(), Some(true));
    }
}
