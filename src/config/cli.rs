use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the playground binary.
#[derive(Debug, Parser)]
#[command(
    name = "printcss-playground",
    version,
    about = "Live print-CSS preview with remote PDF conversion"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PRINTCSS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the local preview server.
    Serve(Box<ServeArgs>),
    /// Convert an exported document to PDF with a remote tool.
    Convert(ConvertArgs),
    /// List the tools supported by the conversion service.
    Tools(ToolsArgs),
    /// Print the composed HTML for an exported document.
    Compose(ComposeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct BackendOverride {
    /// Override the conversion service base URL.
    #[arg(long = "backend-url", value_name = "URL")]
    pub backend_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub backend: BackendOverride,

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

    /// Override the tool selected at startup.
    #[arg(long = "default-tool", value_name = "TOOL")]
    pub default_tool: Option<String>,

    /// Override the preview quiet period; 0 renders on every change.
    #[arg(long = "debounce-ms", value_name = "MILLIS")]
    pub debounce_ms: Option<u64>,

    /// Override how a preview pass replaces the previous one (direct|deferred).
    #[arg(long = "compose-policy", value_name = "POLICY")]
    pub compose_policy: Option<String>,

    /// Directory of template JSON files.
    #[arg(long = "templates-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub templates_dir: Option<PathBuf>,

    /// Directory whose index.html, style.css and script.js feed the editor.
    #[arg(long = "watch-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub watch_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub backend: BackendOverride,

    /// Exported document (`{"html","css","js"}`) to convert.
    #[arg(long, short, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Tool to render with; defaults to the configured default tool.
    #[arg(long, short, value_name = "TOOL")]
    pub tool: Option<String>,

    /// Where to write the PDF.
    #[arg(
        long,
        short,
        value_name = "FILE",
        value_hint = ValueHint::FilePath,
        default_value = "output.pdf"
    )]
    pub output: PathBuf,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ToolsArgs {
    #[command(flatten)]
    pub backend: BackendOverride,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ComposeMode {
    /// Document with the pagination script and preview styling.
    Preview,
    /// Document as sent to the conversion service.
    #[default]
    Export,
}

#[derive(Debug, Args, Clone)]
pub struct ComposeArgs {
    /// Exported document (`{"html","css","js"}`) to compose.
    #[arg(long, short, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = ComposeMode::Export)]
    pub target: ComposeMode,

    /// Write to a file instead of stdout.
    #[arg(long, short, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}
