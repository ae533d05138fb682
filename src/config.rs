use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::github::{DEFAULT_API_URL, DEFAULT_BOT_USER_ID};
use crate::report::{DEFAULT_MARKER, DEFAULT_SERVER_URL};

pub const DEFAULT_LCOV_FILE: &str = "./coverage/lcov.info";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default = "default_lcov_file")]
    pub lcov_file: PathBuf,
    /// Baseline report; deltas are skipped when unset or missing
    #[serde(default)]
    pub lcov_base: Option<PathBuf>,
    /// Path prefix to strip, environment variables are expanded
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_marker")]
    pub marker: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    /// Author id of earlier report comments
    #[serde(default = "default_bot_user_id")]
    pub bot_user_id: u64,
    /// HTTP timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_lcov_file() -> PathBuf {
    PathBuf::from(DEFAULT_LCOV_FILE)
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_bot_user_id() -> u64 {
    DEFAULT_BOT_USER_ID
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            lcov_file: default_lcov_file(),
            lcov_base: None,
            prefix: None,
            marker: default_marker(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            server_url: None,
            bot_user_id: default_bot_user_id(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load `path` when given, otherwise `default_path` if it exists, otherwise defaults
    pub fn load_or_default(path: Option<&Path>, default_path: &Path) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if default_path.is_file() => Self::load(default_path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.report.marker.is_empty() {
            anyhow::bail!("report.marker must not be empty");
        }
        if self.github.bot_user_id == 0 {
            anyhow::bail!("github.bot_user_id must be a real user id");
        }
        if self.github.timeout_secs == 0 {
            anyhow::bail!("github.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

impl ReportConfig {
    /// Configured prefix with `$VARS` expanded, or `$GITHUB_WORKSPACE/` in Actions
    pub fn resolved_prefix(&self, workspace: Option<&str>) -> Result<Option<String>> {
        match &self.prefix {
            Some(raw) => {
                let expanded = shellexpand::env(raw)
                    .with_context(|| format!("Failed to expand prefix: {}", raw))?;
                Ok(Some(expanded.into_owned()))
            }
            None => Ok(workspace
                .filter(|w| !w.is_empty())
                .map(|w| format!("{}/", w.trim_end_matches('/')))),
        }
    }
}

impl GithubConfig {
    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .or_else(|| std::env::var("GITHUB_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn server_url(&self) -> String {
        self.server_url
            .clone()
            .or_else(|| std::env::var("GITHUB_SERVER_URL").ok())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    pub fn token(&self) -> Result<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("GitHub token not found"))
    }
}
