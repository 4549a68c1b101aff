use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use api_harmony::config::{load_config, merge_with_cli_args, CliOverrides, Config};
use api_harmony::report::{RendererRegistry, SpecReport};
use api_harmony::{Ingestor, LoadedSpec, SpecFamily, SpecSource, SpecStore};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file (overrides default location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds for URL imports
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Relay endpoint for URL imports; receives the target as `?url=`
    #[arg(long, global = true)]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a specification and print a summary
    Inspect {
        /// URL (http:// or https://) or file path
        source: String,
    },

    /// List every endpoint
    Endpoints { source: String },

    /// Show which operations and schemas use each named schema
    Deps { source: String },

    /// Write the bundled document as YAML
    Bundle {
        source: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a report (markdown, json or yaml)
    Report {
        source: String,

        #[arg(short, long)]
        format: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Command {
    fn source(&self) -> &str {
        match self {
            Command::Inspect { source }
            | Command::Endpoints { source }
            | Command::Deps { source }
            | Command::Bundle { source, .. }
            | Command::Report { source, .. } => source,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("api_harmony=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (format, output) = match &args.command {
        Command::Report { format, output, .. } => (format.clone(), output.clone()),
        _ => (None, None),
    };
    let config = load_config(args.config.as_deref())?;
    let config = merge_with_cli_args(
        config,
        CliOverrides {
            timeout_secs: args.timeout,
            proxy: args.proxy.clone(),
            format,
            output,
        },
    );

    let ingestor = Ingestor::new(config.fetch.to_options()).context("Failed to set up the HTTP client")?;
    let store = SpecStore::new(ingestor);

    let source = SpecSource::from_arg(args.command.source());
    let spec = store
        .load(source.clone())
        .await
        .with_context(|| format!("Failed to load specification from {}", source))?;

    match &args.command {
        Command::Inspect { .. } => inspect(&spec),
        Command::Endpoints { .. } => endpoints(&spec),
        Command::Deps { .. } => deps(&spec),
        Command::Bundle { output, .. } => write_output(output.as_deref(), &spec.raw_text)?,
        Command::Report { .. } => report(&spec, &config)?,
    }

    Ok(())
}

fn inspect(spec: &LoadedSpec) {
    let document = &spec.document;
    let api = document.api();
    let info = api.info();

    println!("📖 {} ({})", info.title, spec.name);
    println!("   API version:  {}", info.version);
    let format = match document.family() {
        SpecFamily::OpenApi3 => "OpenAPI",
        SpecFamily::Swagger2 => "Swagger",
    };
    println!("   Format:       {} {}", format, api.spec_version());
    if let Some(base_url) = api.base_url() {
        println!("   Base URL:     {}", base_url);
    }
    println!("   Endpoints:    {}", spec.endpoints().len());
    println!("   Schemas:      {}", spec.schema_usage().len());
    println!("   Load id:      {}", spec.id);

    if let Some(record) = document.version_override() {
        println!("⚠️  {}", record.warning());
    }
}

fn endpoints(spec: &LoadedSpec) {
    let endpoints = spec.endpoints();
    for endpoint in &endpoints {
        let mut line = format!("{:<8}{}", endpoint.method.as_str(), endpoint.path);
        if let Some(summary) = &endpoint.summary {
            line.push_str(&format!("  {}", summary));
        }
        if endpoint.deprecated {
            line.push_str("  (deprecated)");
        }
        println!("{}", line);
    }
    println!("✅ {} endpoint(s)", endpoints.len());
}

fn deps(spec: &LoadedSpec) {
    let usage = spec.schema_usage();
    for (name, schema) in &usage {
        if schema.is_unused() {
            println!("{} (unused)", name);
            continue;
        }
        println!("{}", name);
        for operation in &schema.operations {
            println!("  ← {} {} ({:?})", operation.method, operation.path, operation.role);
        }
        for referencer in &schema.referenced_by_schemas {
            println!("  ← schema {}", referencer);
        }
    }
    let unused = usage.values().filter(|u| u.is_unused()).count();
    println!("✅ {} schema(s), {} unused", usage.len(), unused);
}

fn report(spec: &LoadedSpec, config: &Config) -> Result<()> {
    let registry = RendererRegistry::new();
    let renderer = registry.get(&config.report.format).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown report format: {} (available: {})",
            config.report.format,
            registry.available_renderers().join(", ")
        )
    })?;

    let content = renderer
        .render(&SpecReport::from_loaded(spec), &config.report)
        .with_context(|| format!("Failed to render '{}' report", renderer.name()))?;

    write_output(config.report.output.as_deref(), &content)
}

fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)
                .with_context(|| format!("Failed to write output file: {:?}", path))?;
            println!("✅ Written: {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}
