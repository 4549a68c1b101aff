use super::schema::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "./.config/api-harmony/config.yaml";

/// Load configuration from file or return default
pub fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config_path = match custom_path {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(DEFAULT_CONFIG_PATH),
    };

    if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::debug!(path = ?config_path, "Loaded configuration");
        Ok(config)
    } else if custom_path.is_some() {
        anyhow::bail!("Config file not found: {:?}", config_path);
    } else {
        Ok(Config::default())
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub timeout_secs: Option<u64>,
    pub proxy: Option<String>,
    pub format: Option<String>,
    pub output: Option<PathBuf>,
}

/// Merge config with CLI arguments (CLI takes precedence)
pub fn merge_with_cli_args(mut config: Config, cli: CliOverrides) -> Config {
    if let Some(timeout) = cli.timeout_secs {
        config.fetch.timeout_secs = timeout;
    }

    if let Some(proxy) = cli.proxy {
        config.fetch.proxy = Some(proxy);
    }

    if let Some(format) = cli.format {
        config.report.format = format;
    }

    if let Some(output) = cli.output {
        config.report.output = Some(output);
    }

    config
}
