//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    BackendOverride, CliArgs, Command, ComposeArgs, ComposeMode, ConvertArgs, ServeArgs,
    ServeOverrides, ToolsArgs,
};

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::preview::ComposePolicy;
use crate::domain::types::{DEFAULT_TOOL, ToolId};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "printcss";
const ENV_PREFIX: &str = "PRINTCSS";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;
const DEFAULT_BACKEND_URL: &str = "http://localhost:8080/";
const DEFAULT_DEBOUNCE_MS: u64 = 250;
const MAX_DEBOUNCE_MS: u64 = 10_000;
pub(crate) const DEFAULT_PAGINATION_SCRIPT_URL: &str =
    "https://unpkg.com/pagedjs/dist/paged.polyfill.js";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub backend: BackendSettings,
    pub preview: PreviewSettings,
    pub templates: TemplateSettings,
    pub watch: WatchSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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
pub struct BackendSettings {
    pub url: Url,
    pub default_tool: ToolId,
}

#[derive(Debug, Clone)]
pub struct PreviewSettings {
    pub debounce: Duration,
    pub compose_policy: ComposePolicy,
    /// Empty disables the pagination script.
    pub pagination_script_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateSettings {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct WatchSettings {
    pub dir: Option<PathBuf>,
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Convert(args)) => raw.apply_backend_override(&args.backend),
        Some(Command::Tools(args)) => raw.apply_backend_override(&args.backend),
        Some(Command::Compose(_)) => {}
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
    backend: RawBackendSettings,
    preview: RawPreviewSettings,
    templates: RawTemplateSettings,
    watch: RawWatchSettings,
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
        if let Some(tool) = overrides.default_tool.as_ref() {
            self.backend.default_tool = Some(tool.clone());
        }
        if let Some(ms) = overrides.debounce_ms {
            self.preview.debounce_ms = Some(ms);
        }
        if let Some(policy) = overrides.compose_policy.as_ref() {
            self.preview.compose_policy = Some(policy.clone());
        }
        if let Some(dir) = overrides.templates_dir.as_ref() {
            self.templates.dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.watch_dir.as_ref() {
            self.watch.dir = Some(dir.clone());
        }

        self.apply_backend_override(&overrides.backend);
    }

    fn apply_backend_override(&mut self, overrides: &BackendOverride) {
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            backend,
            preview,
            templates,
            watch,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            backend: build_backend_settings(backend)?,
            preview: build_preview_settings(preview)?,
            templates: TemplateSettings {
                dir: non_empty_path(templates.dir),
            },
            watch: WatchSettings {
                dir: non_empty_path(watch.dir),
            },
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
        addr,
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

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let raw_url = backend
        .url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    let url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("backend.url", format!("`{raw_url}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "backend.url",
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }

    let default_tool = ToolId::new(
        backend
            .default_tool
            .unwrap_or_else(|| DEFAULT_TOOL.to_string()),
    )
    .map_err(|err| LoadError::invalid("backend.default_tool", err.to_string()))?;

    Ok(BackendSettings { url, default_tool })
}

fn build_preview_settings(preview: RawPreviewSettings) -> Result<PreviewSettings, LoadError> {
    let debounce_ms = preview.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS);
    if debounce_ms > MAX_DEBOUNCE_MS {
        return Err(LoadError::invalid(
            "preview.debounce_ms",
            format!("must not exceed {MAX_DEBOUNCE_MS}"),
        ));
    }

    let compose_policy = match preview.compose_policy {
        Some(value) => ComposePolicy::from_str(&value)
            .map_err(|reason| LoadError::invalid("preview.compose_policy", reason))?,
        None => ComposePolicy::default(),
    };

    let pagination_script_url = preview
        .pagination_script_url
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_PAGINATION_SCRIPT_URL.to_string());

    Ok(PreviewSettings {
        debounce: Duration::from_millis(debounce_ms),
        compose_policy,
        pagination_script_url,
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
struct RawBackendSettings {
    url: Option<String>,
    default_tool: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPreviewSettings {
    debounce_ms: Option<u64>,
    compose_policy: Option<String>,
    pagination_script_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTemplateSettings {
    dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWatchSettings {
    dir: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|path| !path.as_os_str().is_empty())
}
