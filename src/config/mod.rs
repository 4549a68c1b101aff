pub mod schema;
pub mod loader;

pub use schema::{Config, FetchConfig, ReportConfig};
pub use loader::{load_config, merge_with_cli_args, CliOverrides, DEFAULT_CONFIG_PATH};
