//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU64, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::{
    cache::{
        DEFAULT_CACHE_ID_COOKIE, DEFAULT_CACHE_ID_MAX_AGE_SECS, DEFAULT_FALLBACK_NAME,
        DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_REGION, default_excluded_prefixes,
    },
    domain::regions::{is_country_code, normalize_country_code},
};

mod cli;

pub use cli::{BackendOverrides, CliArgs, Command, RegionsArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "storefront";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BACKEND_REVALIDATE_SECS: u64 = 3600;
const DEFAULT_TRANSPORT_CACHE_ENTRIES: u64 = 1024;
const DEFAULT_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub backend: BackendSettings,
    pub regions: RegionSettings,
    pub storefront: StorefrontSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Commerce backend base URL; `None` serves the default region only.
    pub url: Option<Url>,
    pub publishable_key: Option<String>,
    pub timeout: Duration,
    /// Lifetime of a cached region response in the HTTP source.
    pub revalidate: Duration,
    pub transport_cache_entries: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct RegionSettings {
    pub default_region: Option<String>,
    pub refresh_interval: Duration,
    pub fallback_name: String,
}

#[derive(Debug, Clone)]
pub struct StorefrontSettings {
    pub upstream_url: Option<Url>,
    pub cache_id_cookie: String,
    pub cache_id_max_age: Duration,
    pub max_body_bytes: NonZeroU64,
    pub excluded_prefixes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("STOREFRONT").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Regions(args)) => raw.apply_backend_overrides(&args.backend),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let mut args = CliArgs::parse();
    if args.command.is_none() {
        let serve =
            ServeArgs::from_env().map_err(|err| LoadError::invalid("cli", err.to_string()))?;
        args.command = Some(Command::Serve(Box::new(serve)));
    }
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    backend: RawBackendSettings,
    regions: RawRegionSettings,
    storefront: RawStorefrontSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.region_refresh_interval_seconds {
            self.regions.refresh_interval_seconds = Some(seconds);
        }
        if let Some(url) = overrides.upstream_url.as_ref() {
            self.storefront.upstream_url = Some(url.clone());
        }
        if let Some(name) = overrides.cache_id_cookie.as_ref() {
            self.storefront.cache_id_cookie = Some(name.clone());
        }

        self.apply_backend_overrides(&overrides.backend);
    }

    fn apply_backend_overrides(&mut self, overrides: &BackendOverrides) {
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.url = Some(url.clone());
        }
        if let Some(key) = overrides.publishable_key.as_ref() {
            self.backend.publishable_key = Some(key.clone());
        }
        if let Some(seconds) = overrides.backend_timeout_seconds {
            self.backend.timeout_seconds = Some(seconds);
        }
        if let Some(code) = overrides.default_region.as_ref() {
            self.regions.default_region = Some(code.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            backend,
            regions,
            storefront,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            backend: build_backend_settings(backend)?,
            regions: build_region_settings(regions)?,
            storefront: build_storefront_settings(storefront)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let url = parse_optional_url(backend.url, "backend.url")?;
    let publishable_key = non_blank(backend.publishable_key);

    let timeout = non_zero_secs(
        backend
            .timeout_seconds
            .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS),
        "backend.timeout_seconds",
    )?;
    let revalidate = non_zero_secs(
        backend
            .revalidate_seconds
            .unwrap_or(DEFAULT_BACKEND_REVALIDATE_SECS),
        "backend.revalidate_seconds",
    )?;

    let entries = backend
        .transport_cache_entries
        .unwrap_or(DEFAULT_TRANSPORT_CACHE_ENTRIES);
    let entries = usize::try_from(entries).map_err(|_| {
        LoadError::invalid(
            "backend.transport_cache_entries",
            "value exceeds supported range for usize",
        )
    })?;
    let transport_cache_entries = NonZeroUsize::new(entries).ok_or_else(|| {
        LoadError::invalid(
            "backend.transport_cache_entries",
            "must be greater than zero",
        )
    })?;

    Ok(BackendSettings {
        url,
        publishable_key,
        timeout,
        revalidate,
        transport_cache_entries,
    })
}

fn build_region_settings(regions: RawRegionSettings) -> Result<RegionSettings, LoadError> {
    // An explicitly blank default disables the default-region preference.
    let default_region = match regions.default_region {
        Some(value) => match normalize_country_code(&value) {
            Some(code) if is_country_code(&code) => Some(code),
            Some(code) => {
                return Err(LoadError::invalid(
                    "regions.default_region",
                    format!("`{code}` is not an ISO-3166 alpha-2 code"),
                ));
            }
            None => None,
        },
        None => Some(DEFAULT_REGION.to_string()),
    };

    let refresh_interval = non_zero_secs(
        regions
            .refresh_interval_seconds
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
        "regions.refresh_interval_seconds",
    )?;

    let fallback_name = non_blank(regions.fallback_name)
        .unwrap_or_else(|| DEFAULT_FALLBACK_NAME.to_string());

    Ok(RegionSettings {
        default_region,
        refresh_interval,
        fallback_name,
    })
}

fn build_storefront_settings(
    storefront: RawStorefrontSettings,
) -> Result<StorefrontSettings, LoadError> {
    let upstream_url = parse_optional_url(storefront.upstream_url, "storefront.upstream_url")?;

    let cache_id_cookie = non_blank(storefront.cache_id_cookie)
        .unwrap_or_else(|| DEFAULT_CACHE_ID_COOKIE.to_string());
    if !cache_id_cookie
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(LoadError::invalid(
            "storefront.cache_id_cookie",
            "cookie name may only contain ASCII letters, digits, `_`, `-` and `.`",
        ));
    }

    let cache_id_max_age = non_zero_secs(
        storefront
            .cache_id_max_age_seconds
            .unwrap_or(DEFAULT_CACHE_ID_MAX_AGE_SECS),
        "storefront.cache_id_max_age_seconds",
    )?;

    let max_body_bytes_value = storefront
        .max_body_bytes
        .unwrap_or(DEFAULT_MAX_BODY_BYTES);
    let max_body_bytes = NonZeroU64::new(max_body_bytes_value).ok_or_else(|| {
        LoadError::invalid("storefront.max_body_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_body_bytes_value).map_err(|_| {
        LoadError::invalid(
            "storefront.max_body_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    let excluded_prefixes = match storefront.excluded_prefixes {
        Some(prefixes) => prefixes
            .into_iter()
            .map(|prefix| prefix.trim().trim_start_matches('/').to_string())
            .filter(|prefix| !prefix.is_empty())
            .collect(),
        None => default_excluded_prefixes(),
    };

    Ok(StorefrontSettings {
        upstream_url,
        cache_id_cookie,
        cache_id_max_age,
        max_body_bytes,
        excluded_prefixes,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    url: Option<String>,
    publishable_key: Option<String>,
    timeout_seconds: Option<u64>,
    revalidate_seconds: Option<u64>,
    transport_cache_entries: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRegionSettings {
    default_region: Option<String>,
    refresh_interval_seconds: Option<u64>,
    fallback_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorefrontSettings {
    upstream_url: Option<String>,
    cache_id_cookie: Option<String>,
    cache_id_max_age_seconds: Option<u64>,
    max_body_bytes: Option<u64>,
    excluded_prefixes: Option<Vec<String>>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_optional_url(value: Option<String>, key: &'static str) -> Result<Option<Url>, LoadError> {
    let Some(value) = non_blank(value) else {
        return Ok(None);
    };
    let url = Url::parse(&value)
        .map_err(|err| LoadError::invalid(key, format!("invalid URL `{value}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "URL scheme must be http or https"));
    }
    Ok(Some(url))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

#[cfg(test)]
mod tests;
