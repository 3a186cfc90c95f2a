use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Parser, Debug)]
#[command(
    name = "med-report",
    version,
    about = "Upload a PDF medical report, read the key findings, and ask questions about it"
)]
pub struct Cli {
    /// Base URL of the report backend
    #[arg(long, env = "REPORT_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Preference file (theme)
    #[arg(long, env = "REPORT_PREFERENCES", global = true)]
    pub preferences: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a report and chat about it. Only the first file is uploaded.
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show whether the backend is up
    Status,
    /// Check a single lab value against reference ranges
    CheckValue {
        #[arg(long)]
        term: String,
        #[arg(long)]
        value: f64,
        #[arg(long, default_value = "")]
        unit: String,
        #[arg(long)]
        age: Option<u32>,
        #[arg(long)]
        gender: Option<String>,
    },
    /// Show or change the color theme
    Theme {
        #[arg(value_enum)]
        action: Option<ThemeAction>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeAction {
    Light,
    Dark,
    Toggle,
    /// Forget the saved choice
    Reset,
}

/// Resolved client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub preferences_path: PathBuf,
}

impl ClientConfig {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let api_url = cli.api_url.trim().trim_end_matches('/').to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            bail!("API URL must start with http:// or https://, got {:?}", cli.api_url);
        }

        let preferences_path = match &cli.preferences {
            Some(path) => path.clone(),
            None => default_preferences_path()
                .context("No config directory available; pass --preferences")?,
        };

        Ok(Self {
            api_url,
            preferences_path,
        })
    }
}

fn default_preferences_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("med-report").join("preferences.json"))
}
