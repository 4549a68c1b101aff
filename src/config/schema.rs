use crate::fetch::{FetchOptions, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FetchConfig {
    #[serde(rename = "timeoutSecs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Relay endpoint; the target URL is passed as `?url=`
    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(rename = "userAgent", default)]
    pub user_agent: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_report_format")]
    pub format: String,

    /// Directory holding a `report.md.tera` override
    #[serde(default)]
    pub template: Option<PathBuf>,

    #[serde(default)]
    pub output: Option<PathBuf>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_report_format() -> String {
    "markdown".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            fetch: FetchConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy: None,
            user_agent: None,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: default_report_format(),
            template: None,
            output: None,
        }
    }
}

impl FetchConfig {
    pub fn to_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            proxy: self.proxy.clone().filter(|p| !p.trim().is_empty()),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        }
    }
}
