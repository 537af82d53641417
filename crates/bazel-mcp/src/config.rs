//! Configuration for the bazel-mcp server

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bazel_mcp_core::BazelRunner;

/// Environment variable naming the bazel binary
pub const ENV_BAZEL: &str = "BAZEL_MCP_BAZEL";

/// Environment variable setting the per-invocation timeout in seconds
pub const ENV_TIMEOUT_SECS: &str = "BAZEL_MCP_TIMEOUT_SECS";

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("bazel-mcp")
}

/// Get the default configuration file path
pub fn get_config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// The bazel binary to run (name on PATH, or a path)
    #[serde(default = "default_bazel")]
    pub bazel: String,

    /// Kill bazel invocations running longer than this
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_bazel() -> String {
    "bazel".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bazel: default_bazel(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Apply `BAZEL_MCP_*` overrides from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bazel) = lookup(ENV_BAZEL).filter(|v| !v.is_empty()) {
            self.bazel = bazel;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.is_empty()) {
            let secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds, got {:?}", ENV_TIMEOUT_SECS, secs))?;
            self.timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }

    pub fn runner(&self) -> BazelRunner {
        BazelRunner::new(&self.bazel).with_timeout(self.timeout())
    }
}

/// Load configuration from `path`, or from the default location.
///
/// A missing file at the default location yields the defaults; a missing file
/// that was asked for explicitly is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let (config_path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (get_config_path(), false),
    };

    if !explicit && !config_path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", config_path.display()))
}
