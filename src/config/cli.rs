use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the skprod binary.
#[derive(Debug, Parser)]
#[command(
    name = "skprod",
    version,
    about = "Email template rendering and cache tooling"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SKPROD_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Render a stored email template and print it as JSON.
    Render(RenderArgs),
    /// Inspect and import email templates.
    Templates(TemplatesArgs),
    /// Apply pending database migrations.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Template key to render.
    #[arg(long, value_name = "KEY")]
    pub key: String,

    /// Preferred locale; falls back to the configured fallback locale.
    #[arg(long, value_name = "LOCALE")]
    pub locale: Option<String>,

    /// Force a variant instead of drawing one by weight.
    #[arg(long, value_name = "NAME")]
    pub variant: Option<String>,

    /// Placeholder data as an inline JSON object, or an array of objects to
    /// render one email per element.
    #[arg(long, value_name = "JSON", conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Placeholder data read from a JSON file.
    #[arg(long = "data-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub data_file: Option<PathBuf>,

    /// Override the fallback locale.
    #[arg(long = "fallback-locale", value_name = "LOCALE")]
    pub fallback_locale: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    pub command: TemplatesCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum TemplatesCommand {
    /// List stored templates.
    List(ListTemplatesArgs),
    /// Create or update templates from a JSON array.
    Import(ImportTemplatesArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ListTemplatesArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
pub struct ImportTemplatesArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Path to the JSON file to import.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}
