use std::path::PathBuf;

use clap::{Args, FromArgMatches, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the storefront edge binary.
#[derive(Debug, Parser)]
#[command(
    name = "storefront-edge",
    version,
    about = "Region-aware edge service for the storefront"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "STOREFRONT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP edge service.
    Serve(Box<ServeArgs>),
    /// Fetch the region list once and print the country index.
    #[command(name = "regions")]
    Regions(RegionsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

impl ServeArgs {
    /// Serve arguments taken from their environment variables alone, used
    /// when the binary runs without a subcommand.
    pub fn from_env() -> Result<Self, clap::Error> {
        let matches =
            Self::augment_args(clap::Command::new("serve")).try_get_matches_from(["serve"])?;
        Self::from_arg_matches(&matches)
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct BackendOverrides {
    /// Override the commerce backend base URL.
    #[arg(long = "backend-url", env = "MEDUSA_BACKEND_URL", value_name = "URL")]
    pub backend_url: Option<String>,

    /// Override the publishable API key sent to the backend.
    #[arg(
        long = "publishable-key",
        env = "NEXT_PUBLIC_MEDUSA_PUBLISHABLE_KEY",
        value_name = "KEY",
        hide_env_values = true
    )]
    pub publishable_key: Option<String>,

    /// Override the backend request timeout.
    #[arg(long = "backend-timeout-seconds", value_name = "SECONDS")]
    pub backend_timeout_seconds: Option<u64>,

    /// Override the default region country code.
    #[arg(
        long = "default-region",
        env = "NEXT_PUBLIC_DEFAULT_REGION",
        value_name = "CODE"
    )]
    pub default_region: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub backend: BackendOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override how long a region snapshot stays fresh.
    #[arg(long = "region-refresh-interval-seconds", value_name = "SECONDS")]
    pub region_refresh_interval_seconds: Option<u64>,

    /// Override the storefront renderer that passed-through requests go to.
    #[arg(long = "upstream-url", value_name = "URL")]
    pub upstream_url: Option<String>,

    /// Override the client-correlation cookie name.
    #[arg(long = "cache-id-cookie", value_name = "NAME")]
    pub cache_id_cookie: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct RegionsArgs {
    #[command(flatten)]
    pub backend: BackendOverrides,

    /// Also print how this country code resolves.
    #[arg(long = "resolve", value_name = "CODE")]
    pub resolve: Option<String>,
}
