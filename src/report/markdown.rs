use super::{ReportRenderer, SpecReport};
use crate::config::ReportConfig;
use anyhow::{Context as _, Result};
use tera::{Context, Tera};

const TEMPLATE_NAME: &str = "report.md.tera";
const DEFAULT_TEMPLATE: &str = include_str!("../../templates/report.md.tera");

pub struct MarkdownRenderer;

impl MarkdownRenderer {
    fn load_templates(config: &ReportConfig) -> Result<Tera> {
        match config.template.as_ref().and_then(|p| p.to_str()) {
            Some(template_path) => Tera::new(&format!("{}/**/*.tera", template_path))
                .with_context(|| format!("Failed to load templates from {}", template_path)),
            None => {
                let mut tera = Tera::default();
                tera.add_raw_template(TEMPLATE_NAME, DEFAULT_TEMPLATE)?;
                Ok(tera)
            }
        }
    }
}

impl ReportRenderer for MarkdownRenderer {
    fn name(&self) -> &str {
        "markdown"
    }

    fn file_extension(&self) -> &str {
        "md"
    }

    fn render(&self, report: &SpecReport, config: &ReportConfig) -> Result<String> {
        let tera = Self::load_templates(config)?;
        let mut context = Context::new();
        context.insert("report", report);

        tera.render(TEMPLATE_NAME, &context)
            .with_context(|| format!("Failed to render {}", TEMPLATE_NAME))
    }
}
