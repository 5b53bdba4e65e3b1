//! Shell configuration loaded from `kestrel.toml`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, ShellError};

/// Top-level shell configuration.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShellConfig {
    /// Prompt printed before each interactive line.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// `env_logger` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Wall-clock limit for a single command (0 = unlimited).
    #[serde(default)]
    pub command_timeout_secs: u64,
    /// Maximum number of suggestions returned by the completion engine.
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    /// Reject commands that do not list the running platform.
    #[serde(default)]
    pub enforce_platform: bool,
    /// Reject commands that require elevation when the session has none.
    #[serde(default)]
    pub enforce_elevation: bool,
    #[serde(default)]
    pub scan: ScanConfig,
    /// Extra completion candidates, keyed by `command` or `command subcommand`.
    #[serde(default)]
    pub completions: BTreeMap<String, Vec<String>>,
}

fn default_prompt() -> String {
    "kestrel> ".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_max_suggestions() -> usize {
    5
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            log_level: default_log_level(),
            command_timeout_secs: 0,
            max_suggestions: default_max_suggestions(),
            enforce_platform: false,
            enforce_elevation: false,
            scan: ScanConfig::default(),
            completions: BTreeMap::new(),
        }
    }
}

impl ShellConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: ShellConfig = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ShellError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Per-command time box, if one is configured.
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    fn check(&self) -> Result<()> {
        if self.max_suggestions == 0 {
            return Err(ShellError::Config("max_suggestions must be at least 1".into()));
        }
        if self.scan.concurrency == 0 {
            return Err(ShellError::Config("scan.concurrency must be at least 1".into()));
        }
        if self.scan.progress_every == 0 {
            return Err(ShellError::Config("scan.progress_every must be at least 1".into()));
        }
        Ok(())
    }
}

/// Defaults for the port scanner's fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScanConfig {
    /// Maximum probes in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-probe connect timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Report progress after this many completed probes.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

fn default_concurrency() -> usize {
    100
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_progress_every() -> usize {
    50
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            progress_every: default_progress_every(),
        }
    }
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = ShellConfig::from_toml("").unwrap();
        assert_eq!(config, ShellConfig::default());
        assert_eq!(config.prompt, "kestrel> ");
        assert_eq!(config.max_suggestions, 5);
        assert_eq!(config.scan.concurrency, 100);
        assert_eq!(config.scan.progress_every, 50);
        assert!(config.command_timeout().is_none());
    }

    #[test]
    fn partial_override() {
        let config = ShellConfig::from_toml(
            r#"
            prompt = "$ "
            command_timeout_secs = 30
            enforce_platform = true

            [scan]
            concurrency = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(30)));
        assert!(config.enforce_platform);
        assert!(!config.enforce_elevation);
        assert_eq!(config.scan.concurrency, 8);
        assert_eq!(config.scan.timeout_ms, 1000);
    }

    #[test]
    fn completion_entries() {
        let config = ShellConfig::from_toml(
            r#"
            [completions]
            "portscan" = ["-p", "-t", "-c"]
            "ping host" = ["--count"]
            "#,
        )
        .unwrap();
        assert_eq!(config.completions["portscan"], vec!["-p", "-t", "-c"]);
        assert_eq!(config.completions["ping host"], vec!["--count"]);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = ShellConfig::from_toml("prompt = [").unwrap_err();
        assert!(matches!(err, ShellError::TomlParse(_)));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = ShellConfig::from_toml("[scan]\nconcurrency = 0").unwrap_err();
        assert!(matches!(err, ShellError::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ShellConfig::load(Path::new("/nonexistent/kestrel.toml")).unwrap_err();
        assert!(format!("{err}").contains("config error"));
    }
}
