use crate::locale::Locale;
use crate::theme::ThemeKind;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use pac_client::{ClientConfig, StreamConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://localhost:8080/api";
pub const DEFAULT_STREAM_URL: &str = "ws://localhost:8080/ws/monitor";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const RETRY_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Flags shared by the console and `submit`. Each falls back to its
/// environment variable; either one overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Config file (default: <config dir>/pac/console.toml)
    #[arg(long, env = "PAC_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    /// Scheduler REST base, e.g. http://localhost:8080/api
    #[arg(long, env = "PAC_API_BASE", global = true)]
    pub api_base: Option<String>,
    /// Monitor stream address, e.g. ws://localhost:8080/ws/monitor
    #[arg(long, env = "PAC_STREAM_URL", global = true)]
    pub stream_url: Option<String>,
    /// Bearer token attached to every request
    #[arg(long, env = "PAC_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,
    #[arg(long, env = "PAC_LOCALE", global = true)]
    pub locale: Option<String>,
    #[arg(long, env = "PAC_THEME", global = true)]
    pub theme: Option<String>,
    #[arg(long, env = "PAC_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,
    #[arg(long, env = "PAC_SNAPSHOT_RETRIES", global = true)]
    pub snapshot_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_base: Option<String>,
    pub stream_url: Option<String>,
    pub token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub handshake_timeout_secs: Option<u64>,
    pub snapshot_retries: Option<u32>,
    pub locale: Option<String>,
    pub theme: Option<String>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    pub api_base: String,
    pub stream_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
    pub handshake_timeout: Duration,
    pub snapshot_retries: u32,
    pub locale: Locale,
    pub theme: ThemeKind,
    pub log_dir: PathBuf,
}

impl ConsoleConfig {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let path = overrides.config.clone().or_else(default_config_path);
        let file = match &path {
            Some(path) => load_file(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, overrides)
    }

    pub fn resolve(file: FileConfig, overrides: &Overrides) -> Result<Self> {
        let locale = pick(overrides.locale.clone(), file.locale)
            .map(|value| value.parse::<Locale>().map_err(|err| anyhow!(err)))
            .transpose()?
            .unwrap_or_default();
        let theme = pick(overrides.theme.clone(), file.theme)
            .map(|value| value.parse::<ThemeKind>().map_err(|err| anyhow!(err)))
            .transpose()?
            .unwrap_or_default();
        Ok(Self {
            api_base: pick(overrides.api_base.clone(), file.api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            stream_url: pick(overrides.stream_url.clone(), file.stream_url)
                .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string()),
            token: pick(overrides.token.clone(), file.token),
            request_timeout: Duration::from_secs(
                file.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1),
            ),
            handshake_timeout: Duration::from_secs(
                file.handshake_timeout_secs
                    .unwrap_or(DEFAULT_TIMEOUT_SECS)
                    .max(1),
            ),
            snapshot_retries: overrides
                .snapshot_retries
                .or(file.snapshot_retries)
                .unwrap_or(0),
            locale,
            theme,
            log_dir: overrides
                .log_dir
                .clone()
                .or(file.log_dir)
                .unwrap_or_else(default_log_dir),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_base: self.api_base.clone(),
            token: self.token.clone(),
            request_timeout: self.request_timeout,
            retries: self.snapshot_retries,
            initial_backoff: RETRY_INITIAL_BACKOFF,
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            token: self.token.clone(),
            handshake_timeout: self.handshake_timeout,
        }
    }
}

/// Blank values count as unset so `PAC_TOKEN=` does not wipe a file token.
fn pick(preferred: Option<String>, fallback: Option<String>) -> Option<String> {
    preferred
        .filter(|value| !value.trim().is_empty())
        .or_else(|| fallback.filter(|value| !value.trim().is_empty()))
}

pub fn load_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pac/console.toml"))
}

fn default_log_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("pac")
}
