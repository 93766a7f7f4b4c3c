//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;
use crate::cache::config::{
    DEFAULT_POST_LIST_TTL_SECS, DEFAULT_POST_TTL_SECS, DEFAULT_RAW_CONTENT_TTL_SECS,
};
use crate::infra::notion::UpstreamConfig;
use crate::plugins::{BlogConfig, PluginEntry};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "foglio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_MAINTENANCE_CADENCE_SECS: u64 = 300;
const DEFAULT_UPSTREAM_API_BASE: &str = "https://api.notion.com";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Command-line arguments for the Foglio binary.
#[derive(Debug, Parser)]
#[command(name = "foglio", version, about = "Foglio multi-blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOGLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Foglio HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    /// Override the cache maintenance cadence.
    #[arg(long = "maintenance-cadence-seconds", value_name = "SECONDS")]
    pub maintenance_cadence_seconds: Option<u64>,

    /// Override the upstream API token applied to every configured blog.
    #[arg(
        long = "upstream-token",
        env = "FOGLIO_UPSTREAM_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true
    )]
    pub upstream_token: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub maintenance: MaintenanceSettings,
    pub blogs: Vec<BlogConfig>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    pub graceful_shutdown: Duration,
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
pub struct MaintenanceSettings {
    pub cadence: Duration,
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

    builder = builder.add_source(Environment::with_prefix("FOGLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    maintenance: RawMaintenanceSettings,
    blogs: Vec<RawBlogSettings>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(cadence) = overrides.maintenance_cadence_seconds {
            self.maintenance.cadence_seconds = Some(cadence);
        }
        if let Some(token) = overrides.upstream_token.as_ref() {
            for blog in &mut self.blogs {
                blog.upstream.token = Some(token.clone());
            }
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            maintenance,
            blogs,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let maintenance = build_maintenance_settings(maintenance)?;
        let blogs = build_blog_configs(blogs)?;

        Ok(Self {
            server,
            logging,
            maintenance,
            blogs,
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

    let bind_addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.bind_addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        bind_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
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

fn build_maintenance_settings(
    maintenance: RawMaintenanceSettings,
) -> Result<MaintenanceSettings, LoadError> {
    let cadence_seconds = maintenance
        .cadence_seconds
        .unwrap_or(DEFAULT_MAINTENANCE_CADENCE_SECS);
    if cadence_seconds == 0 {
        return Err(LoadError::invalid(
            "maintenance.cadence_seconds",
            "must be greater than zero",
        ));
    }

    Ok(MaintenanceSettings {
        cadence: Duration::from_secs(cadence_seconds),
    })
}

fn build_blog_configs(blogs: Vec<RawBlogSettings>) -> Result<Vec<BlogConfig>, LoadError> {
    let mut configs = Vec::with_capacity(blogs.len());
    let mut seen_ids: Vec<String> = Vec::new();

    for blog in blogs {
        let id = blog
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| LoadError::invalid("blogs.id", "blog id must not be empty"))?
            .to_string();
        if seen_ids.contains(&id) {
            return Err(LoadError::invalid(
                "blogs.id",
                format!("blog id `{id}` is configured more than once"),
            ));
        }
        seen_ids.push(id.clone());

        let name = blog
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&id)
            .to_string();

        let upstream = build_upstream_config(&id, blog.upstream)?;
        let cache = build_cache_config(blog.cache)?;

        let plugins = blog
            .plugins
            .into_iter()
            .map(|plugin| {
                let plugin_name = plugin
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| {
                        LoadError::invalid("blogs.plugins.name", "plugin name must not be empty")
                    })?
                    .to_string();
                Ok(PluginEntry {
                    name: plugin_name,
                    enabled: plugin.enabled.unwrap_or(true),
                    settings: plugin.settings.unwrap_or_else(|| Value::Object(Default::default())),
                })
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        configs.push(BlogConfig {
            id,
            name,
            upstream,
            cache,
            plugins,
        });
    }

    Ok(configs)
}

fn build_upstream_config(
    blog_id: &str,
    upstream: RawUpstreamSettings,
) -> Result<UpstreamConfig, LoadError> {
    let api_base = upstream
        .api_base
        .unwrap_or_else(|| DEFAULT_UPSTREAM_API_BASE.to_string());

    let token = upstream
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            LoadError::invalid(
                "blogs.upstream.token",
                format!("blog `{blog_id}` has no upstream token"),
            )
        })?
        .to_string();

    let database_id = upstream
        .database_id
        .as_deref()
        .map(str::trim)
        .filter(|db| !db.is_empty())
        .ok_or_else(|| {
            LoadError::invalid(
                "blogs.upstream.database_id",
                format!("blog `{blog_id}` has no upstream database id"),
            )
        })?
        .to_string();

    let timeout_seconds = upstream
        .timeout_seconds
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "blogs.upstream.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(UpstreamConfig {
        api_base,
        token,
        database_id,
        timeout: Duration::from_secs(timeout_seconds),
    })
}

fn build_cache_config(cache: RawCacheSettings) -> Result<CacheConfig, LoadError> {
    let defaults = CacheConfig::default();

    let post_list_ttl = cache.post_list_ttl_seconds.unwrap_or(DEFAULT_POST_LIST_TTL_SECS);
    let post_ttl = cache.post_ttl_seconds.unwrap_or(DEFAULT_POST_TTL_SECS);
    let raw_content_ttl = cache
        .raw_content_ttl_seconds
        .unwrap_or(DEFAULT_RAW_CONTENT_TTL_SECS);
    for (key, value) in [
        ("blogs.cache.post_list_ttl_seconds", post_list_ttl),
        ("blogs.cache.post_ttl_seconds", post_ttl),
        ("blogs.cache.raw_content_ttl_seconds", raw_content_ttl),
    ] {
        if value == 0 {
            return Err(LoadError::invalid(key, "must be greater than zero"));
        }
    }

    let post_list_capacity = cache
        .post_list_capacity
        .unwrap_or(defaults.post_list_capacity);
    let post_capacity = cache.post_capacity.unwrap_or(defaults.post_capacity);
    let raw_content_capacity = cache
        .raw_content_capacity
        .unwrap_or(defaults.raw_content_capacity);
    for (key, value) in [
        ("blogs.cache.post_list_capacity", post_list_capacity),
        ("blogs.cache.post_capacity", post_capacity),
        ("blogs.cache.raw_content_capacity", raw_content_capacity),
    ] {
        if value == 0 {
            return Err(LoadError::invalid(key, "must be greater than zero"));
        }
    }

    Ok(CacheConfig {
        post_list_ttl: Duration::from_secs(post_list_ttl),
        post_ttl: Duration::from_secs(post_ttl),
        raw_content_ttl: Duration::from_secs(raw_content_ttl),
        post_list_capacity,
        post_capacity,
        raw_content_capacity,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMaintenanceSettings {
    cadence_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBlogSettings {
    id: Option<String>,
    name: Option<String>,
    upstream: RawUpstreamSettings,
    cache: RawCacheSettings,
    plugins: Vec<RawPluginEntry>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    api_base: Option<String>,
    token: Option<String>,
    database_id: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    post_list_ttl_seconds: Option<u64>,
    post_ttl_seconds: Option<u64>,
    raw_content_ttl_seconds: Option<u64>,
    post_list_capacity: Option<usize>,
    post_capacity: Option<usize>,
    raw_content_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPluginEntry {
    name: Option<String>,
    enabled: Option<bool>,
    settings: Option<Value>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw_blog(id: &str) -> RawBlogSettings {
        RawBlogSettings {
            id: Some(id.to_string()),
            name: None,
            upstream: RawUpstreamSettings {
                api_base: None,
                token: Some("secret".to_string()),
                database_id: Some("db-1".to_string()),
                timeout_seconds: None,
            },
            cache: RawCacheSettings::default(),
            plugins: Vec::new(),
        }
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.bind_addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn cli_token_applies_to_every_blog() {
        let mut raw = RawSettings::default();
        let mut blog = raw_blog("alpha");
        blog.upstream.token = None;
        raw.blogs.push(blog);

        let overrides = ServeOverrides {
            upstream_token: Some("from-cli".to_string()),
            ..Default::default()
        };
        raw.apply_serve_overrides(&overrides);

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.blogs[0].upstream.token, "from-cli");
    }

    #[test]
    fn blog_name_defaults_to_its_id() {
        let mut raw = RawSettings::default();
        raw.blogs.push(raw_blog("alpha"));

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.blogs[0].name, "alpha");
        assert_eq!(
            settings.blogs[0].upstream.api_base,
            DEFAULT_UPSTREAM_API_BASE
        );
    }

    #[test]
    fn duplicate_blog_ids_are_rejected() {
        let mut raw = RawSettings::default();
        raw.blogs.push(raw_blog("alpha"));
        raw.blogs.push(raw_blog("alpha"));

        let err = Settings::from_raw(raw).expect_err("should reject");
        assert!(matches!(err, LoadError::Invalid { key: "blogs.id", .. }));
    }

    #[test]
    fn missing_upstream_token_is_rejected() {
        let mut raw = RawSettings::default();
        let mut blog = raw_blog("alpha");
        blog.upstream.token = Some("   ".to_string());
        raw.blogs.push(blog);

        let err = Settings::from_raw(raw).expect_err("should reject");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "blogs.upstream.token",
                ..
            }
        ));
    }

    #[test]
    fn plugin_entries_default_to_enabled_with_empty_settings() {
        let mut raw = RawSettings::default();
        let mut blog = raw_blog("alpha");
        blog.plugins.push(RawPluginEntry {
            name: Some("comments".to_string()),
            enabled: None,
            settings: None,
        });
        blog.plugins.push(RawPluginEntry {
            name: Some("analytics".to_string()),
            enabled: Some(false),
            settings: Some(json!({"tag": "x"})),
        });
        raw.blogs.push(blog);

        let settings = Settings::from_raw(raw).expect("valid settings");
        let plugins = &settings.blogs[0].plugins;
        assert!(plugins[0].enabled);
        assert_eq!(plugins[0].settings, json!({}));
        assert!(!plugins[1].enabled);
        assert_eq!(plugins[1].settings, json!({"tag": "x"}));
    }

    #[test]
    fn zero_cache_ttl_is_rejected() {
        let mut raw = RawSettings::default();
        let mut blog = raw_blog("alpha");
        blog.cache.post_ttl_seconds = Some(0);
        raw.blogs.push(blog);

        let err = Settings::from_raw(raw).expect_err("should reject");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "blogs.cache.post_ttl_seconds",
                ..
            }
        ));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["foglio"]);
        assert!(args.command.is_none());
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "foglio",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--maintenance-cadence-seconds",
            "60",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(serve.overrides.maintenance_cadence_seconds, Some(60));
            }
        }
    }
}
